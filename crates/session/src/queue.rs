//! Ordered render queue.
//!
//! Queue order is execution order. Jobs are added at the end and removed by id;
//! there is no priority or reordering. The queue lives for the session and is only
//! written to disk when the caller asks for it.

use crate::error::SessionResult;
use crate::job::RenderJob;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderQueue {
    jobs: Vec<RenderJob>,
}

impl RenderQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a job and return its id.
    pub fn push(&mut self, job: RenderJob) -> Uuid {
        let id = job.id();
        info!(
            job_id = %id,
            camera = %job.camera(),
            range = %job.range(),
            "Queued render job"
        );
        self.jobs.push(job);
        id
    }

    /// Remove a job by id. Returns the removed job.
    pub fn remove(&mut self, id: Uuid) -> Option<RenderJob> {
        let index = self.jobs.iter().position(|j| j.id() == id)?;
        debug!(job_id = %id, "Removed render job");
        Some(self.jobs.remove(index))
    }

    pub fn clear(&mut self) {
        debug!(count = self.jobs.len(), "Cleared render queue");
        self.jobs.clear();
    }

    /// Enable or disable a job. Returns false if no job has this id.
    pub fn set_enabled(&mut self, id: Uuid, enabled: bool) -> bool {
        match self.jobs.iter_mut().find(|j| j.id() == id) {
            Some(job) => {
                job.set_enabled(enabled);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: Uuid) -> Option<&RenderJob> {
        self.jobs.iter().find(|j| j.id() == id)
    }

    pub fn jobs(&self) -> &[RenderJob] {
        &self.jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Number of jobs a run would execute.
    pub fn enabled_count(&self) -> usize {
        self.jobs.iter().filter(|j| j.enabled()).count()
    }

    /// Saves the queue as pretty-printed JSON.
    pub fn save_to(&self, path: &Path) -> SessionResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Loads a queue saved with [`RenderQueue::save_to`].
    ///
    /// Every job goes through the same validation as a freshly built one.
    pub fn load_from(path: &Path) -> SessionResult<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}
