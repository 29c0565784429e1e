//! Render job descriptors.
//!
//! A [`RenderJob`] is validated when it is built and never changes afterwards,
//! apart from its enabled flag.

use crate::camera_range::{CameraIdentity, FrameRange};
use crate::config::SaveMode;
use crate::error::{SessionError, SessionResult};
use crate::snapshot::RenderSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use uuid::Uuid;

/// Frame rates a job may override to.
pub const FPS_RANGE: std::ops::RangeInclusive<u32> = 1..=120;

/// Resolution percentages a job may override to.
pub const RESOLUTION_RANGE: std::ops::RangeInclusive<u32> = 1..=100;

/// Output container or image sequence written by the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// H.264 in an MP4 container.
    Mp4,
    /// H.264 in a QuickTime container.
    Mov,
    /// One PNG per frame.
    PngSequence,
    /// One JPEG per frame.
    JpegSequence,
}

impl OutputFormat {
    /// File extension without the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Mp4 => "mp4",
            OutputFormat::Mov => "mov",
            OutputFormat::PngSequence => "png",
            OutputFormat::JpegSequence => "jpg",
        }
    }

    /// Whether the format writes one file per frame.
    pub fn is_sequence(self) -> bool {
        matches!(self, OutputFormat::PngSequence | OutputFormat::JpegSequence)
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Mp4 => write!(f, "mp4"),
            OutputFormat::Mov => write!(f, "mov"),
            OutputFormat::PngSequence => write!(f, "png_sequence"),
            OutputFormat::JpegSequence => write!(f, "jpeg_sequence"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mp4" | "mp4_h264" => Ok(OutputFormat::Mp4),
            "mov" | "mov_h264" | "quicktime" => Ok(OutputFormat::Mov),
            "png" | "png_seq" | "png_sequence" => Ok(OutputFormat::PngSequence),
            "jpg" | "jpeg" | "jpeg_seq" | "jpeg_sequence" => Ok(OutputFormat::JpegSequence),
            other => Err(SessionError::invalid_job(format!(
                "unrecognized output format '{}'",
                other
            ))),
        }
    }
}

/// Encoder quality preset for video formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoQuality {
    High,
    #[default]
    Medium,
    Low,
}

/// Settings a single job changes for the duration of its render.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderOverrides {
    #[serde(default)]
    pub fps: Option<u32>,
    #[serde(default)]
    pub resolution_percentage: Option<u32>,
    #[serde(default)]
    pub use_simplify: Option<bool>,
    #[serde(default)]
    pub burn_metadata: Option<bool>,
    #[serde(default)]
    pub video_quality: Option<VideoQuality>,
}

impl RenderOverrides {
    fn validate(&self) -> SessionResult<()> {
        if let Some(fps) = self.fps {
            if !FPS_RANGE.contains(&fps) {
                return Err(SessionError::invalid_job(format!(
                    "fps override {} outside {:?}",
                    fps, FPS_RANGE
                )));
            }
        }
        if let Some(pct) = self.resolution_percentage {
            if !RESOLUTION_RANGE.contains(&pct) {
                return Err(SessionError::invalid_job(format!(
                    "resolution override {}% outside {:?}",
                    pct, RESOLUTION_RANGE
                )));
            }
        }
        Ok(())
    }

    /// Write the overridden fields into `settings`, leaving the rest alone.
    pub fn apply(&self, settings: &mut RenderSettings) {
        if let Some(fps) = self.fps {
            settings.fps = fps;
        }
        if let Some(pct) = self.resolution_percentage {
            settings.resolution_percentage = pct;
        }
        if let Some(simplify) = self.use_simplify {
            settings.use_simplify = simplify;
        }
        if let Some(burn) = self.burn_metadata {
            settings.burn_metadata = burn;
        }
        if let Some(quality) = self.video_quality {
            settings.video_quality = quality;
        }
    }
}

fn default_true() -> bool {
    true
}

/// Unvalidated description of a job, used to build a [`RenderJob`] and as its
/// persisted form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderJobSpec {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub camera: CameraIdentity,
    pub frame_start: u32,
    pub frame_end: u32,
    pub format: OutputFormat,
    /// Output directory; the session default is used when absent.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub overwrite: bool,
    #[serde(default = "default_true")]
    pub incremental: bool,
    #[serde(default)]
    pub overrides: RenderOverrides,
}

impl RenderJobSpec {
    /// An enabled, incrementally saved job with no overrides.
    pub fn new(camera: impl Into<CameraIdentity>, frame_start: u32, frame_end: u32, format: OutputFormat) -> Self {
        Self {
            id: Uuid::new_v4(),
            camera: camera.into(),
            frame_start,
            frame_end,
            format,
            output_dir: None,
            enabled: true,
            overwrite: false,
            incremental: true,
            overrides: RenderOverrides::default(),
        }
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn with_save_mode(mut self, mode: SaveMode) -> Self {
        self.incremental = mode.is_incremental();
        self.overwrite = mode.is_overwrite();
        self
    }

    pub fn with_overrides(mut self, overrides: RenderOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Validate and build the job.
    pub fn build(self) -> SessionResult<RenderJob> {
        RenderJob::new(self)
    }
}

/// One unit of work for the queue scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RenderJobSpec", into = "RenderJobSpec")]
pub struct RenderJob {
    id: Uuid,
    camera: CameraIdentity,
    range: FrameRange,
    format: OutputFormat,
    output_dir: Option<PathBuf>,
    enabled: bool,
    overwrite: bool,
    incremental: bool,
    overrides: RenderOverrides,
}

impl RenderJob {
    /// Build a job from its description.
    ///
    /// Fails with `InvalidJob` if the camera name is empty, the frame range is
    /// inverted, a supplied output directory is empty, or an override is out of range.
    pub fn new(spec: RenderJobSpec) -> SessionResult<Self> {
        if spec.camera.as_str().trim().is_empty() {
            return Err(SessionError::invalid_job("camera name is empty"));
        }

        let range = FrameRange::new(spec.frame_start, spec.frame_end).map_err(|e| {
            SessionError::invalid_job(e.to_string())
        })?;

        if let Some(dir) = &spec.output_dir {
            if dir.as_os_str().is_empty() {
                return Err(SessionError::invalid_job("output path is empty"));
            }
        }

        spec.overrides.validate()?;

        Ok(Self {
            id: spec.id,
            camera: spec.camera,
            range,
            format: spec.format,
            output_dir: spec.output_dir,
            enabled: spec.enabled,
            overwrite: spec.overwrite,
            incremental: spec.incremental,
            overrides: spec.overrides,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn camera(&self) -> &CameraIdentity {
        &self.camera
    }

    pub fn range(&self) -> FrameRange {
        self.range
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn output_dir(&self) -> Option<&Path> {
        self.output_dir.as_deref()
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn overwrite(&self) -> bool {
        self.overwrite
    }

    pub fn incremental(&self) -> bool {
        self.incremental
    }

    pub fn save_mode(&self) -> SaveMode {
        SaveMode::from_flags(self.incremental, self.overwrite)
    }

    pub fn overrides(&self) -> &RenderOverrides {
        &self.overrides
    }

    /// Point `settings` at this job: output path and format, frame range, camera,
    /// then any overrides. The viewport pseudo-camera leaves the active camera as is.
    pub fn apply_to(&self, settings: &mut RenderSettings, output_path: &Path) {
        settings.output_path = output_path.to_path_buf();
        settings.output_format = self.format;
        settings.frame_start = self.range.start();
        settings.frame_end = self.range.end();
        if !self.camera.is_viewport() {
            settings.camera = Some(self.camera.as_str().to_string());
        }
        self.overrides.apply(settings);
    }
}

impl TryFrom<RenderJobSpec> for RenderJob {
    type Error = SessionError;

    fn try_from(spec: RenderJobSpec) -> Result<Self, Self::Error> {
        RenderJob::new(spec)
    }
}

impl From<RenderJob> for RenderJobSpec {
    fn from(job: RenderJob) -> Self {
        Self {
            id: job.id,
            camera: job.camera,
            frame_start: job.range.start(),
            frame_end: job.range.end(),
            format: job.format,
            output_dir: job.output_dir,
            enabled: job.enabled,
            overwrite: job.overwrite,
            incremental: job.incremental,
            overrides: job.overrides,
        }
    }
}
