//! Render Session
//!
//! Session state and queue processing for batch preview renders: per-camera frame
//! ranges, an ordered render queue, incremental output naming, and a scheduler that
//! always hands the host its render settings back the way it found them.

pub mod camera_range;
pub mod error;
pub mod job;
pub mod logging;
pub mod naming;
pub mod queue;
pub mod recovery;
pub mod scheduler;
pub mod session;
pub mod snapshot;

pub use camera_range::{CameraIdentity, CameraRangeStore, FrameRange};
pub use error::{ExecutorError, SessionError, SessionResult};
pub use job::{OutputFormat, RenderJob, RenderJobSpec, RenderOverrides, VideoQuality};
pub use logging::{init_default_logging, init_logging};
pub use naming::{scene_name, NamingOptions, OutputNamer};
pub use queue::RenderQueue;
pub use recovery::{find_backups, recover_latest, BackupFile};
pub use render_session_config as config;
pub use render_session_config::{Config, SaveMode};
pub use scheduler::{
    CancelToken, JobOutcome, JobStatus, QueueRunResult, QueueScheduler, RenderExecutor, RunState,
};
pub use session::RenderSession;
pub use snapshot::{RenderSettings, SettingsSnapshot};
