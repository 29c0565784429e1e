//! Render session configuration
//!
//! Output naming, settings recovery, and logging options read from TOML, with
//! `RENDER_*` environment variables taking precedence.

pub mod config;

pub use config::*;
