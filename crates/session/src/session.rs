//! Document-level render session.
//!
//! Ties the pieces together the way a presentation layer drives them: pick a
//! camera, edit its frame range, queue it, and run the queue. The session owns
//! the per-camera ranges and the queue for as long as the document is open; the
//! host persists the ranges blob on save and hands it back on open.

use crate::camera_range::{CameraIdentity, CameraRangeStore, FrameRange};
use crate::config::Config;
use crate::error::SessionResult;
use crate::job::{OutputFormat, RenderJob, RenderJobSpec, RenderOverrides};
use crate::naming::{self, NamingOptions, OutputNamer};
use crate::queue::RenderQueue;
use crate::recovery;
use crate::scheduler::{CancelToken, QueueRunResult, QueueScheduler, RenderExecutor};
use crate::snapshot::RenderSettings;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Session state for one open document.
pub struct RenderSession {
    config: Config,
    /// Document frame range, used for cameras without a stored range.
    timeline: FrameRange,
    ranges: CameraRangeStore,
    camera: CameraIdentity,
    frame_range: FrameRange,
    format: OutputFormat,
    overrides: RenderOverrides,
    queue: RenderQueue,
    scheduler: QueueScheduler,
}

impl RenderSession {
    /// Open a session for a document.
    ///
    /// # Arguments
    /// * `config` - Loaded configuration
    /// * `document` - Path of the document file, `None` if it was never saved
    /// * `timeline` - The document's own start and end frames
    /// * `stored_ranges` - Ranges blob saved with the document, if any
    ///
    /// A blob that cannot be parsed is logged and the session starts with no
    /// stored ranges. The active camera starts as the viewport.
    pub fn open(
        config: Config,
        document: Option<&Path>,
        timeline: FrameRange,
        stored_ranges: Option<&str>,
    ) -> Self {
        let ranges = match stored_ranges.map(CameraRangeStore::from_blob) {
            Some(Ok(store)) => store,
            Some(Err(e)) => {
                warn!("Ignoring unreadable camera ranges: {}", e);
                CameraRangeStore::new()
            }
            None => CameraRangeStore::new(),
        };

        let scene = naming::scene_name(document, config.output.keep_scene_version);
        let output_dir = config.output_dir(document.and_then(Path::parent));
        let namer = OutputNamer::new(NamingOptions::from(&config.output));

        let mut scheduler = QueueScheduler::new(namer, output_dir, scene);
        if config.recovery.enabled {
            scheduler = scheduler.with_backup_dir(config.recovery.backup_dir());
        }

        info!(
            scene = scheduler.scene(),
            output_dir = %scheduler.output_dir().display(),
            stored_ranges = ranges.len(),
            "Opened render session"
        );

        Self {
            config,
            timeline,
            ranges,
            camera: CameraIdentity::viewport(),
            frame_range: timeline,
            format: OutputFormat::Mp4,
            overrides: RenderOverrides::default(),
            queue: RenderQueue::new(),
            scheduler,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn scene_name(&self) -> &str {
        self.scheduler.scene()
    }

    /// Default directory for renders that do not name their own.
    pub fn output_dir(&self) -> &Path {
        self.scheduler.output_dir()
    }

    pub fn ranges(&self) -> &CameraRangeStore {
        &self.ranges
    }

    pub fn camera(&self) -> &CameraIdentity {
        &self.camera
    }

    pub fn frame_range(&self) -> FrameRange {
        self.frame_range
    }

    pub fn timeline(&self) -> FrameRange {
        self.timeline
    }

    /// Update the document frame range, e.g. after the user edits the timeline.
    pub fn set_timeline(&mut self, timeline: FrameRange) {
        self.timeline = timeline;
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn set_format(&mut self, format: OutputFormat) {
        self.format = format;
    }

    pub fn overrides(&self) -> &RenderOverrides {
        &self.overrides
    }

    /// Overrides used for jobs created from now on. Out-of-range values are
    /// rejected when the job is built.
    pub fn set_overrides(&mut self, overrides: RenderOverrides) {
        self.overrides = overrides;
    }

    /// Make `camera` the active camera and load its frame range.
    ///
    /// A camera without a stored range gets the document timeline. Selecting the
    /// viewport keeps the current range.
    pub fn select_camera(&mut self, camera: impl Into<CameraIdentity>) -> FrameRange {
        let camera = camera.into();
        if !camera.is_viewport() {
            self.frame_range = self.ranges.resolve(&camera, self.timeline);
        }
        debug!(camera = %camera, range = %self.frame_range, "Selected camera");
        self.camera = camera;
        self.frame_range
    }

    /// Set the working frame range and remember it for the active camera.
    ///
    /// Nothing changes if `start > end`.
    pub fn set_frame_range(&mut self, start: u32, end: u32) -> SessionResult<FrameRange> {
        let range = FrameRange::new(start, end)?;
        self.frame_range = range;
        if !self.camera.is_viewport() {
            self.ranges.insert(self.camera.clone(), range);
        }
        Ok(range)
    }

    /// Reset the working range to the document timeline and remember it.
    pub fn use_timeline_range(&mut self) -> FrameRange {
        self.frame_range = self.timeline;
        if !self.camera.is_viewport() {
            self.ranges.insert(self.camera.clone(), self.timeline);
        }
        self.frame_range
    }

    /// Forget the stored range of `camera`. Returns false if none was stored.
    pub fn delete_camera_range(&mut self, camera: &CameraIdentity) -> bool {
        self.ranges.delete(camera)
    }

    /// Ranges blob for the host to store with the document.
    pub fn save_ranges(&self) -> SessionResult<String> {
        self.ranges.to_blob()
    }

    /// Job for the active camera and range with the current format and overrides.
    fn current_job(&self, output_dir: Option<PathBuf>) -> SessionResult<RenderJob> {
        let mut spec = RenderJobSpec::new(
            self.camera.clone(),
            self.frame_range.start(),
            self.frame_range.end(),
            self.format,
        )
        .with_save_mode(self.config.output.save_mode)
        .with_overrides(self.overrides.clone());
        spec.output_dir = output_dir;
        spec.build()
    }

    /// Queue the active camera and range.
    ///
    /// # Arguments
    /// * `output_dir` - Directory for this job, `None` for the session default
    ///
    /// # Returns
    /// * `Ok(Uuid)` - Id of the queued job
    /// * `Err(SessionError::InvalidJob)` - Empty directory or out-of-range overrides
    pub fn enqueue_current(&mut self, output_dir: Option<PathBuf>) -> SessionResult<Uuid> {
        let job = self.current_job(output_dir)?;
        Ok(self.queue.push(job))
    }

    pub fn queue(&self) -> &RenderQueue {
        &self.queue
    }

    pub fn queue_mut(&mut self) -> &mut RenderQueue {
        &mut self.queue
    }

    /// Path the active camera would render to right now, for display.
    ///
    /// Nothing is created on disk.
    pub fn preview_output_path(&self) -> SessionResult<PathBuf> {
        self.scheduler.namer().next_path(
            self.scheduler.output_dir(),
            self.scheduler.scene(),
            &self.camera,
            self.frame_range,
            self.format,
            self.config.output.save_mode.is_incremental(),
            self.config.output.save_mode.is_overwrite(),
        )
    }

    /// Run every enabled job in the queue.
    pub fn process_queue<E>(
        &self,
        executor: &mut E,
        settings: &mut RenderSettings,
        cancel: &CancelToken,
    ) -> SessionResult<QueueRunResult>
    where
        E: RenderExecutor + ?Sized,
    {
        if self.queue.enabled_count() == 0 {
            warn!(queued = self.queue.len(), "No enabled jobs to render");
        }
        self.scheduler.run(self.queue.jobs(), executor, settings, cancel)
    }

    /// Render the active camera and range immediately, without queueing it.
    pub fn render_current<E>(
        &self,
        executor: &mut E,
        settings: &mut RenderSettings,
        cancel: &CancelToken,
    ) -> SessionResult<QueueRunResult>
    where
        E: RenderExecutor + ?Sized,
    {
        let job = self.current_job(None)?;
        self.scheduler.run(std::slice::from_ref(&job), executor, settings, cancel)
    }

    /// Backups left behind by runs that never restored, oldest first.
    pub fn pending_recovery(&self) -> Vec<PathBuf> {
        if !self.config.recovery.enabled {
            return Vec::new();
        }
        recovery::find_backups(&self.config.recovery.backup_dir())
    }

    /// Restore the most recent leftover backup into `settings`.
    ///
    /// Returns the backup that was applied, or `None` if there was none or
    /// recovery is disabled.
    pub fn recover_settings(&self, settings: &mut RenderSettings) -> SessionResult<Option<PathBuf>> {
        if !self.config.recovery.enabled {
            return Ok(None);
        }
        recovery::recover_latest(&self.config.recovery.backup_dir(), settings)
    }
}
