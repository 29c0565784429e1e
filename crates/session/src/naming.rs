//! Output file naming with incremental versions.
//!
//! File stems are built from up to three `_`-joined segments (scene, camera,
//! frame range). In incremental mode a `_vNNN` suffix is appended, where `NNN` is
//! one more than the highest version already present in the output directory for
//! the exact same stem and extension.

use crate::camera_range::{CameraIdentity, FrameRange};
use crate::config::{OutputConfig, SaveMode};
use crate::error::{SessionError, SessionResult};
use crate::job::OutputFormat;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Placeholder the executor replaces with the zero-padded frame number in
/// image sequence paths.
pub const FRAME_PLACEHOLDER: &str = "####";

/// Minimum number of digits in a version suffix.
pub const VERSION_DIGITS: usize = 3;

/// Stem used when every segment is disabled or empty.
const FALLBACK_STEM: &str = "preview";

/// Scene name used for documents that were never saved.
pub const UNTITLED_SCENE: &str = "untitled";

/// Which segments make up an output file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamingOptions {
    pub include_scene_name: bool,
    pub include_camera: bool,
    pub include_frame_range: bool,
}

impl Default for NamingOptions {
    fn default() -> Self {
        Self {
            include_scene_name: true,
            include_camera: true,
            include_frame_range: true,
        }
    }
}

impl From<&OutputConfig> for NamingOptions {
    fn from(cfg: &OutputConfig) -> Self {
        Self {
            include_scene_name: cfg.include_scene_name,
            include_camera: cfg.include_camera,
            include_frame_range: cfg.include_frame_range,
        }
    }
}

/// Builds output paths for render jobs.
#[derive(Debug, Clone, Default)]
pub struct OutputNamer {
    options: NamingOptions,
}

impl OutputNamer {
    pub fn new(options: NamingOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> NamingOptions {
        self.options
    }

    /// File stem for a render, before any version suffix.
    ///
    /// The viewport pseudo-camera never contributes a camera segment.
    pub fn stem(&self, base_name: &str, camera: &CameraIdentity, range: FrameRange) -> String {
        let mut parts = Vec::with_capacity(3);

        if self.options.include_scene_name {
            parts.push(sanitize_segment(base_name));
        }
        if self.options.include_camera && !camera.is_viewport() {
            parts.push(sanitize_segment(camera.as_str()));
        }
        if self.options.include_frame_range {
            parts.push(format!("{:03}-{:03}", range.start(), range.end()));
        }

        parts.retain(|p| !p.is_empty());
        if parts.is_empty() {
            FALLBACK_STEM.to_string()
        } else {
            parts.join("_")
        }
    }

    /// Compute the output path for a render.
    ///
    /// # Arguments
    /// * `base_dir` - Directory the render goes into (need not exist yet)
    /// * `base_name` - Scene segment of the file name
    /// * `camera` - Camera being rendered
    /// * `range` - Frames being rendered
    /// * `format` - Output format; sequences get their own folder and a frame placeholder
    /// * `incremental` - Pick the next free `_vNNN` version
    /// * `overwrite` - Reuse the unversioned path even if it exists
    ///
    /// # Returns
    /// * `Ok(PathBuf)` - For videos `<dir>/<name>.<ext>`, for sequences
    ///   `<dir>/<name>/<name>_####.<ext>`
    /// * `Err(SessionError::PathCollision)` - Neither incremental nor overwrite,
    ///   and the target already exists; or incremental and the highest
    ///   possible version is already on disk
    #[allow(clippy::too_many_arguments)]
    pub fn next_path(
        &self,
        base_dir: &Path,
        base_name: &str,
        camera: &CameraIdentity,
        range: FrameRange,
        format: OutputFormat,
        incremental: bool,
        overwrite: bool,
    ) -> SessionResult<PathBuf> {
        let stem = self.stem(base_name, camera, range);
        self.path_for_stem(base_dir, &stem, format, SaveMode::from_flags(incremental, overwrite))
    }

    /// Same as [`OutputNamer::next_path`] for an already built stem.
    pub fn path_for_stem(
        &self,
        base_dir: &Path,
        stem: &str,
        format: OutputFormat,
        mode: SaveMode,
    ) -> SessionResult<PathBuf> {
        let name = match mode {
            SaveMode::Incremental => match highest_version(base_dir, stem, format) {
                None => versioned_name(stem, 1),
                Some(v) => match v.checked_add(1) {
                    Some(next) => versioned_name(stem, next),
                    // Highest representable version is taken; nothing left to pick.
                    None => {
                        let taken = base_dir.join(entry_name(&versioned_name(stem, v), format));
                        return Err(SessionError::PathCollision { path: taken });
                    }
                },
            },
            SaveMode::Overwrite | SaveMode::Protect => stem.to_string(),
        };

        let target = base_dir.join(entry_name(&name, format));
        if mode == SaveMode::Protect && target.exists() {
            return Err(SessionError::PathCollision { path: target });
        }

        let path = if format.is_sequence() {
            target.join(format!("{}_{}.{}", name, FRAME_PLACEHOLDER, format.extension()))
        } else {
            target
        };

        debug!(path = %path.display(), %mode, "Resolved output path");
        Ok(path)
    }
}

/// `stem_v007` style name.
pub fn versioned_name(stem: &str, version: u32) -> String {
    format!("{}_v{:0width$}", stem, version, width = VERSION_DIGITS)
}

/// Directory entry that marks a render as existing: the video file itself, or the
/// folder holding a sequence.
fn entry_name(name: &str, format: OutputFormat) -> String {
    if format.is_sequence() {
        name.to_string()
    } else {
        format!("{}.{}", name, format.extension())
    }
}

/// Highest version of `stem` present in `dir`, or `None` if there is none or the
/// directory cannot be read.
pub fn highest_version(dir: &Path, stem: &str, format: OutputFormat) -> Option<u32> {
    if !dir.is_dir() {
        return None;
    }

    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|entry| {
            if format.is_sequence() {
                entry.file_type().is_dir()
            } else {
                entry.file_type().is_file()
            }
        })
        .filter_map(|entry| {
            let name = entry.file_name().to_str()?;
            parse_version(name, stem, format)
        })
        .max()
}

/// Version number of `name` if it is exactly `<stem>_vNNN` (plus `.<ext>` for
/// videos). Extensions compare case-insensitively.
pub fn parse_version(name: &str, stem: &str, format: OutputFormat) -> Option<u32> {
    let rest = name.strip_prefix(stem)?.strip_prefix("_v")?;

    let digits = if format.is_sequence() {
        rest
    } else {
        let (digits, ext) = rest.rsplit_once('.')?;
        if !ext.eq_ignore_ascii_case(format.extension()) {
            return None;
        }
        digits
    };

    if digits.len() < VERSION_DIGITS || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Scene segment derived from the document path.
///
/// Unsaved documents are `untitled`. Unless `keep_version` is set, a trailing
/// version such as `_v003`, `-v2` or `v10` is dropped from the file stem so that
/// previews of successive document versions share a name.
pub fn scene_name(document: Option<&Path>, keep_version: bool) -> String {
    let stem = match document.and_then(|p| p.file_stem()).and_then(|s| s.to_str()) {
        Some(stem) if !stem.is_empty() => stem,
        _ => return UNTITLED_SCENE.to_string(),
    };

    if keep_version {
        return stem.to_string();
    }
    strip_version_suffix(stem).to_string()
}

fn strip_version_suffix(stem: &str) -> &str {
    let without_digits = stem.trim_end_matches(|c: char| c.is_ascii_digit());
    if without_digits.len() == stem.len() {
        return stem;
    }
    let Some(before_v) = without_digits.strip_suffix('v') else {
        return stem;
    };
    let trimmed = before_v
        .strip_suffix('_')
        .or_else(|| before_v.strip_suffix('-'))
        .unwrap_or(before_v);
    if trimmed.is_empty() {
        stem
    } else {
        trimmed
    }
}

/// Replace characters that would break out of the output directory or are
/// rejected by common filesystems. A segment of only dots becomes `_`.
fn sanitize_segment(segment: &str) -> String {
    let segment = segment.trim();
    if !segment.is_empty() && segment.chars().all(|c| c == '.') {
        return "_".to_string();
    }
    segment
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}
