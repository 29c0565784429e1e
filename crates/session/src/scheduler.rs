//! Sequential queue scheduler for preview renders.
//!
//! Runs the enabled jobs of a queue one after another through an external
//! [`RenderExecutor`], with the host render settings snapshotted before the first
//! job and restored after the last one, whatever happened in between.
//!
//! Jobs share one global render configuration, so they are never run in parallel.

use crate::error::{ExecutorError, SessionError, SessionResult};
use crate::job::RenderJob;
use crate::naming::OutputNamer;
use crate::recovery;
use crate::snapshot::{RenderSettings, SettingsSnapshot};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Performs the actual render of one job.
///
/// Called synchronously and may block for as long as the render takes. `settings`
/// is the configuration prepared for this job; the executor should render with it
/// and must not keep it beyond the call.
pub trait RenderExecutor {
    fn render(
        &mut self,
        job: &RenderJob,
        output_path: &Path,
        settings: &RenderSettings,
    ) -> Result<(), ExecutorError>;
}

impl<F> RenderExecutor for F
where
    F: FnMut(&RenderJob, &Path, &RenderSettings) -> Result<(), ExecutorError>,
{
    fn render(
        &mut self,
        job: &RenderJob,
        output_path: &Path,
        settings: &RenderSettings,
    ) -> Result<(), ExecutorError> {
        self(job, output_path, settings)
    }
}

/// Cancellation request shared between the scheduler and whoever may cancel a run.
///
/// Checked before each job starts; a job already rendering runs to completion.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clear a previous request so the token can be reused for another run.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Lifecycle of the scheduler's current or most recent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Cancelled,
}

impl RunState {
    pub fn as_str(&self) -> &str {
        match self {
            RunState::Idle => "idle",
            RunState::Running => "running",
            RunState::Completed => "completed",
            RunState::Cancelled => "cancelled",
        }
    }
}

/// Outcome of one job in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// The executor reported success.
    Success,
    /// The executor or output folder creation failed.
    Failed,
    /// The job never reached the executor because its output path was taken.
    Skipped,
    /// The run was cancelled before the job started.
    Cancelled,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Success => write!(f, "success"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Skipped => write!(f, "skipped"),
            JobStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Result record for one job.
#[derive(Debug)]
pub struct JobOutcome {
    pub job: RenderJob,
    pub status: JobStatus,
    /// Output path handed to the executor, if the job got that far.
    pub resolved_path: Option<PathBuf>,
    pub error: Option<SessionError>,
}

impl JobOutcome {
    fn success(job: &RenderJob, path: PathBuf) -> Self {
        Self {
            job: job.clone(),
            status: JobStatus::Success,
            resolved_path: Some(path),
            error: None,
        }
    }

    fn failed(job: &RenderJob, path: Option<PathBuf>, error: SessionError) -> Self {
        Self {
            job: job.clone(),
            status: JobStatus::Failed,
            resolved_path: path,
            error: Some(error),
        }
    }

    fn skipped(job: &RenderJob, error: SessionError) -> Self {
        Self {
            job: job.clone(),
            status: JobStatus::Skipped,
            resolved_path: None,
            error: Some(error),
        }
    }

    fn cancelled(job: &RenderJob) -> Self {
        Self {
            job: job.clone(),
            status: JobStatus::Cancelled,
            resolved_path: None,
            error: None,
        }
    }
}

/// Per-job outcomes of a run, in queue order, plus how the run ended.
#[derive(Debug)]
pub struct QueueRunResult {
    outcomes: Vec<JobOutcome>,
    state: RunState,
}

impl QueueRunResult {
    pub fn outcomes(&self) -> &[JobOutcome] {
        &self.outcomes
    }

    pub fn into_outcomes(self) -> Vec<JobOutcome> {
        self.outcomes
    }

    pub fn statuses(&self) -> Vec<JobStatus> {
        self.outcomes.iter().map(|o| o.status).collect()
    }

    /// `Completed` or `Cancelled`.
    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn count(&self, status: JobStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// True if every job in the run succeeded.
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.status == JobStatus::Success)
    }
}

/// Holds the live settings for the duration of a run and puts the snapshot back
/// exactly once, on [`RestoreGuard::restore`] or on drop if the run unwinds.
struct RestoreGuard<'a> {
    snapshot: SettingsSnapshot,
    target: &'a mut RenderSettings,
    restored: bool,
}

impl<'a> RestoreGuard<'a> {
    fn new(target: &'a mut RenderSettings) -> Self {
        Self {
            snapshot: SettingsSnapshot::capture(target),
            target,
            restored: false,
        }
    }

    fn snapshot(&self) -> &SettingsSnapshot {
        &self.snapshot
    }

    /// Start from the pre-run values so one job's overrides never leak into the next.
    fn prepare(&mut self, job: &RenderJob, output_path: &Path) {
        self.target.clone_from(self.snapshot.settings());
        job.apply_to(self.target, output_path);
    }

    fn settings(&self) -> &RenderSettings {
        &*self.target
    }

    fn restore(&mut self) {
        if !self.restored {
            self.snapshot.restore(self.target);
            self.restored = true;
        }
    }
}

impl Drop for RestoreGuard<'_> {
    fn drop(&mut self) {
        if !self.restored {
            warn!("Queue run ended abnormally, restoring render settings");
            self.restore();
        }
    }
}

/// Clears the scheduler's running flag when a run ends, including by panic.
struct RunningFlag<'a> {
    scheduler: &'a QueueScheduler,
}

impl Drop for RunningFlag<'_> {
    fn drop(&mut self) {
        if self.scheduler.state() == RunState::Running {
            self.scheduler.set_state(RunState::Idle);
        }
        self.scheduler.running.store(false, Ordering::Release);
    }
}

/// Sequential render queue runner.
pub struct QueueScheduler {
    namer: OutputNamer,
    /// Used for jobs without their own output directory.
    output_dir: PathBuf,
    /// Scene segment of output file names.
    scene: String,
    /// Where the on-disk settings backup goes; `None` disables it.
    backup_dir: Option<PathBuf>,
    running: AtomicBool,
    state: Mutex<RunState>,
}

impl QueueScheduler {
    /// Create a scheduler without an on-disk settings backup.
    ///
    /// # Arguments
    /// * `namer` - Builds output paths for each job
    /// * `output_dir` - Directory for jobs that do not name their own
    /// * `scene` - Scene segment used in output file names
    pub fn new(namer: OutputNamer, output_dir: PathBuf, scene: impl Into<String>) -> Self {
        Self {
            namer,
            output_dir,
            scene: scene.into(),
            backup_dir: None,
            running: AtomicBool::new(false),
            state: Mutex::new(RunState::Idle),
        }
    }

    /// Write a settings backup into `dir` for the duration of each run.
    pub fn with_backup_dir(mut self, dir: PathBuf) -> Self {
        self.backup_dir = Some(dir);
        self
    }

    pub fn namer(&self) -> &OutputNamer {
        &self.namer
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn scene(&self) -> &str {
        &self.scene
    }

    pub fn state(&self) -> RunState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: RunState) {
        debug!(state = state.as_str(), "Scheduler state changed");
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn begin_run(&self) -> SessionResult<RunningFlag<'_>> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Rejected queue run: another run is in progress");
            return Err(SessionError::Busy);
        }
        self.set_state(RunState::Running);
        Ok(RunningFlag { scheduler: self })
    }

    /// Run the enabled jobs in order.
    ///
    /// Takes one snapshot of `settings` before the first job and restores it after
    /// the last, also when jobs fail, the run is cancelled, or the executor panics.
    /// A failing job is recorded and the run moves on to the next one. Cancellation
    /// is checked before every job; once seen, all remaining jobs are recorded as
    /// cancelled.
    ///
    /// # Returns
    /// * `Ok(QueueRunResult)` - One outcome per enabled job, in queue order
    /// * `Err(SessionError::Busy)` - Another run on this scheduler is in progress
    pub fn run<E>(
        &self,
        jobs: &[RenderJob],
        executor: &mut E,
        settings: &mut RenderSettings,
        cancel: &CancelToken,
    ) -> SessionResult<QueueRunResult>
    where
        E: RenderExecutor + ?Sized,
    {
        let _running = self.begin_run()?;

        let enabled: Vec<&RenderJob> = jobs.iter().filter(|j| j.enabled()).collect();
        info!(
            queued = jobs.len(),
            enabled = enabled.len(),
            "Starting queue run"
        );

        let mut guard = RestoreGuard::new(settings);
        let backup = self.write_backup(guard.snapshot());

        let mut outcomes = Vec::with_capacity(enabled.len());
        let mut cancelled = false;

        for job in enabled {
            if !cancelled && cancel.is_cancelled() {
                info!("Cancellation requested, remaining jobs will not run");
                cancelled = true;
            }

            if cancelled {
                outcomes.push(JobOutcome::cancelled(job));
                continue;
            }

            outcomes.push(self.run_job(job, executor, &mut guard));
        }

        guard.restore();
        drop(guard);

        if let Some(path) = backup {
            if let Err(e) = recovery::remove_backup(&path) {
                warn!(path = %path.display(), "Could not delete settings backup: {}", e);
            }
        }

        let state = if cancelled {
            RunState::Cancelled
        } else {
            RunState::Completed
        };
        self.set_state(state);

        let result = QueueRunResult { outcomes, state };
        info!(
            state = state.as_str(),
            succeeded = result.count(JobStatus::Success),
            failed = result.count(JobStatus::Failed),
            skipped = result.count(JobStatus::Skipped),
            cancelled = result.count(JobStatus::Cancelled),
            "Queue run finished"
        );
        Ok(result)
    }

    fn run_job<E>(&self, job: &RenderJob, executor: &mut E, guard: &mut RestoreGuard<'_>) -> JobOutcome
    where
        E: RenderExecutor + ?Sized,
    {
        let dir = job.output_dir().unwrap_or(&self.output_dir);

        let path = match self.namer.next_path(
            dir,
            &self.scene,
            job.camera(),
            job.range(),
            job.format(),
            job.incremental(),
            job.overwrite(),
        ) {
            Ok(path) => path,
            Err(e) => {
                warn!(job_id = %job.id(), camera = %job.camera(), "Skipping job: {}", e);
                return JobOutcome::skipped(job, e);
            }
        };

        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!(
                    job_id = %job.id(),
                    dir = %parent.display(),
                    "Could not create output directory: {}",
                    e
                );
                return JobOutcome::failed(job, Some(path), e.into());
            }
        }

        guard.prepare(job, &path);
        info!(
            job_id = %job.id(),
            camera = %job.camera(),
            range = %job.range(),
            output = %path.display(),
            "Rendering job"
        );

        match executor.render(job, &path, guard.settings()) {
            Ok(()) => {
                info!(job_id = %job.id(), "Render finished");
                JobOutcome::success(job, path)
            }
            Err(e) => {
                warn!(job_id = %job.id(), code = e.code, "Render failed: {}", e.message);
                JobOutcome::failed(job, Some(path), SessionError::Executor(e))
            }
        }
    }

    /// Write the crash-recovery backup. A failure only costs crash recovery, so it
    /// is logged and the run goes ahead.
    fn write_backup(&self, snapshot: &SettingsSnapshot) -> Option<PathBuf> {
        let dir = self.backup_dir.as_ref()?;
        match recovery::write_backup(dir, &self.scene, snapshot) {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(dir = %dir.display(), "Could not write settings backup: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera_range::CameraIdentity;
    use crate::config::SaveMode;
    use crate::job::{OutputFormat, RenderJobSpec, RenderOverrides, VideoQuality};
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use tempfile::TempDir;

    /// Executor that records every call and fails or cancels on request.
    #[derive(Default)]
    struct ScriptedExecutor {
        fail_on: Vec<usize>,
        cancel_on: Option<(usize, CancelToken)>,
        write_output: bool,
        calls: Vec<(String, PathBuf, RenderSettings)>,
    }

    impl RenderExecutor for ScriptedExecutor {
        fn render(
            &mut self,
            job: &RenderJob,
            output_path: &Path,
            settings: &RenderSettings,
        ) -> Result<(), ExecutorError> {
            let index = self.calls.len();
            self.calls.push((
                job.camera().to_string(),
                output_path.to_path_buf(),
                settings.clone(),
            ));

            if let Some((on, token)) = &self.cancel_on {
                if *on == index {
                    token.cancel();
                }
            }
            if self.write_output {
                fs::write(output_path, b"frames").unwrap();
            }
            if self.fail_on.contains(&index) {
                return Err(ExecutorError::new(3, "GPU out of memory"));
            }
            Ok(())
        }
    }

    fn host_settings() -> RenderSettings {
        RenderSettings {
            resolution_percentage: 100,
            fps: 25,
            use_simplify: false,
            output_path: PathBuf::from("/project/final/frame_"),
            output_format: OutputFormat::PngSequence,
            frame_start: 1001,
            frame_end: 1100,
            camera: Some("HeroCam".to_string()),
            burn_metadata: false,
            stamp_font_size: 16,
            video_quality: VideoQuality::High,
        }
    }

    fn job(camera: &str) -> RenderJob {
        RenderJobSpec::new(camera, 1, 24, OutputFormat::Mov).build().unwrap()
    }

    fn scheduler(dir: &Path) -> QueueScheduler {
        QueueScheduler::new(OutputNamer::default(), dir.to_path_buf(), "shot")
    }

    #[test]
    fn test_partial_failure_continues_and_restores() {
        let temp_dir = TempDir::new().unwrap();
        let scheduler = scheduler(temp_dir.path());
        let jobs = vec![job("A"), job("B"), job("C")];
        let mut executor = ScriptedExecutor {
            fail_on: vec![1],
            ..Default::default()
        };
        let mut settings = host_settings();

        let result = scheduler
            .run(&jobs, &mut executor, &mut settings, &CancelToken::new())
            .unwrap();

        assert_eq!(
            result.statuses(),
            vec![JobStatus::Success, JobStatus::Failed, JobStatus::Success]
        );
        assert_eq!(result.state(), RunState::Completed);
        assert_eq!(executor.calls.len(), 3);
        assert!(matches!(
            &result.outcomes()[1].error,
            Some(SessionError::Executor(ExecutorError { code: 3, .. }))
        ));
        assert!(result.outcomes()[1].resolved_path.is_some());
        assert_eq!(settings, host_settings());
        assert_eq!(scheduler.state(), RunState::Completed);
    }

    #[test]
    fn test_cancel_after_first_job() {
        let temp_dir = TempDir::new().unwrap();
        let scheduler = scheduler(temp_dir.path());
        let jobs = vec![job("A"), job("B"), job("C")];
        let cancel = CancelToken::new();
        let mut executor = ScriptedExecutor {
            cancel_on: Some((0, cancel.clone())),
            ..Default::default()
        };
        let mut settings = host_settings();

        let result = scheduler.run(&jobs, &mut executor, &mut settings, &cancel).unwrap();

        assert_eq!(
            result.statuses(),
            vec![JobStatus::Success, JobStatus::Cancelled, JobStatus::Cancelled]
        );
        assert_eq!(result.state(), RunState::Cancelled);
        assert_eq!(executor.calls.len(), 1);
        assert!(result.outcomes()[1].resolved_path.is_none());
        assert_eq!(settings, host_settings());
        assert_eq!(scheduler.state(), RunState::Cancelled);
    }

    #[test]
    fn test_cancelled_before_start_runs_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let scheduler = scheduler(temp_dir.path());
        let jobs = vec![job("A"), job("B")];
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut executor = ScriptedExecutor::default();
        let mut settings = host_settings();

        let result = scheduler.run(&jobs, &mut executor, &mut settings, &cancel).unwrap();

        assert_eq!(result.statuses(), vec![JobStatus::Cancelled, JobStatus::Cancelled]);
        assert!(executor.calls.is_empty());
        assert_eq!(settings, host_settings());
    }

    #[test]
    fn test_disabled_jobs_are_excluded() {
        let temp_dir = TempDir::new().unwrap();
        let scheduler = scheduler(temp_dir.path());
        let mut skipped = job("B");
        skipped.set_enabled(false);
        let jobs = vec![job("A"), skipped, job("C"), job("D")];
        let mut executor = ScriptedExecutor::default();
        let mut settings = host_settings();

        let result = scheduler
            .run(&jobs, &mut executor, &mut settings, &CancelToken::new())
            .unwrap();

        let cameras: Vec<&str> = result.outcomes().iter().map(|o| o.job.camera().as_str()).collect();
        assert_eq!(cameras, vec!["A", "C", "D"]);
        let called: Vec<&str> = executor.calls.iter().map(|(c, _, _)| c.as_str()).collect();
        assert_eq!(called, vec!["A", "C", "D"]);
        assert!(result.all_succeeded());
    }

    #[test]
    fn test_executor_sees_job_settings_and_overrides_do_not_leak() {
        let temp_dir = TempDir::new().unwrap();
        let scheduler = scheduler(temp_dir.path());
        let fast = RenderJobSpec::new("A", 10, 20, OutputFormat::Mp4)
            .with_overrides(RenderOverrides {
                fps: Some(12),
                resolution_percentage: Some(50),
                use_simplify: Some(true),
                ..RenderOverrides::default()
            })
            .build()
            .unwrap();
        let plain = RenderJobSpec::new("B", 30, 40, OutputFormat::Mov).build().unwrap();
        let mut executor = ScriptedExecutor::default();
        let mut settings = host_settings();

        scheduler
            .run(&[fast, plain], &mut executor, &mut settings, &CancelToken::new())
            .unwrap();

        let (_, path_a, seen_a) = &executor.calls[0];
        assert_eq!(seen_a.output_path, *path_a);
        assert_eq!(*path_a, temp_dir.path().join("shot_A_010-020_v001.mp4"));
        assert_eq!(seen_a.output_format, OutputFormat::Mp4);
        assert_eq!((seen_a.frame_start, seen_a.frame_end), (10, 20));
        assert_eq!(seen_a.camera.as_deref(), Some("A"));
        assert_eq!(seen_a.fps, 12);
        assert_eq!(seen_a.resolution_percentage, 50);
        assert!(seen_a.use_simplify);

        let (_, _, seen_b) = &executor.calls[1];
        assert_eq!(seen_b.fps, 25);
        assert_eq!(seen_b.resolution_percentage, 100);
        assert!(!seen_b.use_simplify);
        assert_eq!(seen_b.camera.as_deref(), Some("B"));
    }

    #[test]
    fn test_collision_skips_job_without_calling_executor() {
        let temp_dir = TempDir::new().unwrap();
        let scheduler = scheduler(temp_dir.path());
        fs::write(temp_dir.path().join("shot_B_001-024.mov"), b"old").unwrap();
        let protected = RenderJobSpec::new("B", 1, 24, OutputFormat::Mov)
            .with_save_mode(SaveMode::Protect)
            .build()
            .unwrap();
        let jobs = vec![job("A"), protected, job("C")];
        let mut executor = ScriptedExecutor::default();
        let mut settings = host_settings();

        let result = scheduler
            .run(&jobs, &mut executor, &mut settings, &CancelToken::new())
            .unwrap();

        assert_eq!(
            result.statuses(),
            vec![JobStatus::Success, JobStatus::Skipped, JobStatus::Success]
        );
        assert!(matches!(
            result.outcomes()[1].error,
            Some(SessionError::PathCollision { .. })
        ));
        assert_eq!(executor.calls.len(), 2);
        assert_eq!(fs::read(temp_dir.path().join("shot_B_001-024.mov")).unwrap(), b"old");
    }

    #[test]
    fn test_exhausted_versions_skip_only_that_job() {
        let temp_dir = TempDir::new().unwrap();
        let scheduler = scheduler(temp_dir.path());
        fs::write(
            temp_dir.path().join(format!("shot_A_001-024_v{}.mov", u32::MAX)),
            b"old",
        )
        .unwrap();
        let mut executor = ScriptedExecutor::default();
        let mut settings = host_settings();

        let result = scheduler
            .run(&[job("A"), job("B")], &mut executor, &mut settings, &CancelToken::new())
            .unwrap();

        assert_eq!(result.statuses(), vec![JobStatus::Skipped, JobStatus::Success]);
        assert_eq!(executor.calls.len(), 1);
        assert_eq!(settings, host_settings());
    }

    #[test]
    fn test_versions_advance_within_one_run() {
        let temp_dir = TempDir::new().unwrap();
        let scheduler = scheduler(temp_dir.path());
        let jobs = vec![job("A"), job("A")];
        let mut executor = ScriptedExecutor {
            write_output: true,
            ..Default::default()
        };
        let mut settings = host_settings();

        let result = scheduler
            .run(&jobs, &mut executor, &mut settings, &CancelToken::new())
            .unwrap();

        let paths: Vec<PathBuf> = result
            .outcomes()
            .iter()
            .map(|o| o.resolved_path.clone().unwrap())
            .collect();
        assert_eq!(
            paths,
            vec![
                temp_dir.path().join("shot_A_001-024_v001.mov"),
                temp_dir.path().join("shot_A_001-024_v002.mov"),
            ]
        );
    }

    #[test]
    fn test_job_output_dir_is_created() {
        let temp_dir = TempDir::new().unwrap();
        let scheduler = scheduler(temp_dir.path());
        let elsewhere = temp_dir.path().join("custom").join("dir");
        let seq = RenderJobSpec::new("A", 1, 3, OutputFormat::PngSequence)
            .with_output_dir(&elsewhere)
            .build()
            .unwrap();
        let mut executor = ScriptedExecutor::default();
        let mut settings = host_settings();

        let result = scheduler
            .run(&[seq], &mut executor, &mut settings, &CancelToken::new())
            .unwrap();

        let path = result.outcomes()[0].resolved_path.clone().unwrap();
        assert_eq!(
            path,
            elsewhere.join("shot_A_001-003_v001").join("shot_A_001-003_v001_####.png")
        );
        assert!(elsewhere.join("shot_A_001-003_v001").is_dir());
    }

    #[test]
    fn test_reentrant_run_is_busy() {
        let temp_dir = TempDir::new().unwrap();
        let scheduler = scheduler(temp_dir.path());
        let mut inner_result = None;
        let mut executor = |_job: &RenderJob, _path: &Path, _settings: &RenderSettings| -> Result<(), ExecutorError> {
            let mut nested = ScriptedExecutor::default();
            let mut other = RenderSettings::default();
            inner_result = Some(scheduler.run(&[job("X")], &mut nested, &mut other, &CancelToken::new()));
            Ok(())
        };
        let mut settings = host_settings();

        let result = scheduler
            .run(&[job("A")], &mut executor, &mut settings, &CancelToken::new())
            .unwrap();

        assert!(result.all_succeeded());
        assert!(matches!(inner_result, Some(Err(SessionError::Busy))));
        assert!(!scheduler.is_running());

        // The flag is released once the outer run is done.
        let mut executor = ScriptedExecutor::default();
        assert!(scheduler
            .run(&[job("B")], &mut executor, &mut settings, &CancelToken::new())
            .is_ok());
    }

    #[test]
    fn test_panicking_executor_still_restores() {
        let temp_dir = TempDir::new().unwrap();
        let scheduler = scheduler(temp_dir.path());
        let mut settings = host_settings();
        let mut executor = |_job: &RenderJob, _path: &Path, _settings: &RenderSettings| -> Result<(), ExecutorError> {
            panic!("renderer crashed")
        };

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            scheduler.run(&[job("A")], &mut executor, &mut settings, &CancelToken::new())
        }));

        assert!(outcome.is_err());
        assert_eq!(settings, host_settings());
        assert!(!scheduler.is_running());
        assert_eq!(scheduler.state(), RunState::Idle);
    }

    #[test]
    fn test_backup_exists_only_during_run() {
        let temp_dir = TempDir::new().unwrap();
        let backups = temp_dir.path().join("backups");
        let scheduler = scheduler(temp_dir.path()).with_backup_dir(backups.clone());
        let mut seen_during_run = Vec::new();
        let mut executor = |_job: &RenderJob, _path: &Path, _settings: &RenderSettings| -> Result<(), ExecutorError> {
            seen_during_run.push(recovery::find_backups(&backups).len());
            Ok(())
        };
        let mut settings = host_settings();

        scheduler
            .run(&[job("A"), job("B")], &mut executor, &mut settings, &CancelToken::new())
            .unwrap();

        assert_eq!(seen_during_run, vec![1, 1]);
        assert!(recovery::find_backups(&backups).is_empty());
    }

    #[test]
    fn test_backup_holds_pre_run_settings() {
        let temp_dir = TempDir::new().unwrap();
        let backups = temp_dir.path().join("backups");
        let scheduler = scheduler(temp_dir.path()).with_backup_dir(backups.clone());
        let mut captured = None;
        let mut executor = |_job: &RenderJob, _path: &Path, _settings: &RenderSettings| -> Result<(), ExecutorError> {
            let path = recovery::find_backups(&backups).pop().unwrap();
            captured = Some(recovery::load_backup(&path).unwrap());
            Ok(())
        };
        let mut settings = host_settings();

        scheduler
            .run(&[job("A")], &mut executor, &mut settings, &CancelToken::new())
            .unwrap();

        let backup = captured.unwrap();
        assert_eq!(backup.scene, "shot");
        assert_eq!(backup.snapshot.settings(), &host_settings());
    }

    #[test]
    fn test_empty_queue_completes() {
        let temp_dir = TempDir::new().unwrap();
        let scheduler = scheduler(temp_dir.path());
        assert_eq!(scheduler.state(), RunState::Idle);
        let mut executor = ScriptedExecutor::default();
        let mut settings = host_settings();

        let result = scheduler
            .run(&[], &mut executor, &mut settings, &CancelToken::new())
            .unwrap();

        assert!(result.is_empty());
        assert_eq!(result.state(), RunState::Completed);
        assert_eq!(settings, host_settings());
    }

    #[test]
    fn test_viewport_job_name_has_no_camera() {
        let temp_dir = TempDir::new().unwrap();
        let scheduler = scheduler(temp_dir.path());
        let viewport = RenderJobSpec::new(CameraIdentity::viewport(), 1, 5, OutputFormat::Mp4)
            .build()
            .unwrap();
        let mut executor = ScriptedExecutor::default();
        let mut settings = host_settings();

        let result = scheduler
            .run(&[viewport], &mut executor, &mut settings, &CancelToken::new())
            .unwrap();

        assert_eq!(
            result.outcomes()[0].resolved_path.as_deref(),
            Some(temp_dir.path().join("shot_001-005_v001.mp4").as_path())
        );
        assert_eq!(executor.calls[0].2.camera.as_deref(), Some("HeroCam"));
    }
}
