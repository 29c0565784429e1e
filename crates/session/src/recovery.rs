//! On-disk backup of the render settings for the duration of a run.
//!
//! If the host crashes mid-render, the in-memory snapshot is lost together with
//! the process. A copy is written to `render_backup_<scene>_<millis>.json` right
//! after capture and deleted once the settings are restored. A leftover file on
//! the next start means the previous run never finished restoring.

use crate::error::SessionResult;
use crate::snapshot::{RenderSettings, SettingsSnapshot};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// File name prefix shared by all backups.
pub const BACKUP_PREFIX: &str = "render_backup_";

const BACKUP_EXTENSION: &str = "json";

/// Contents of a backup file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupFile {
    /// Scene the settings belong to.
    pub scene: String,
    /// Unix timestamp (milliseconds) when the backup was written.
    pub created_at: i64,
    pub snapshot: SettingsSnapshot,
}

/// Get current timestamp in milliseconds since Unix epoch.
fn current_timestamp_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Path of a backup for `scene` written at `timestamp_ms`.
///
/// For example: `/tmp/render-session/render_backup_shot010_1701388800000.json`
pub fn backup_path(dir: &Path, scene: &str, timestamp_ms: i64) -> PathBuf {
    let scene: String = scene
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    dir.join(format!(
        "{}{}_{}.{}",
        BACKUP_PREFIX, scene, timestamp_ms, BACKUP_EXTENSION
    ))
}

/// Timestamp embedded in a backup file name.
fn backup_timestamp(path: &Path) -> Option<i64> {
    let name = path.file_name()?.to_str()?;
    let body = name
        .strip_prefix(BACKUP_PREFIX)?
        .strip_suffix(BACKUP_EXTENSION)?
        .strip_suffix('.')?;
    let (_, ts) = body.rsplit_once('_')?;
    ts.parse().ok()
}

/// Write `snapshot` to a new backup file in `dir`.
///
/// Creates `dir` if needed and returns the path written.
pub fn write_backup(dir: &Path, scene: &str, snapshot: &SettingsSnapshot) -> SessionResult<PathBuf> {
    fs::create_dir_all(dir)?;

    let created_at = current_timestamp_ms();
    let path = backup_path(dir, scene, created_at);
    let backup = BackupFile {
        scene: scene.to_string(),
        created_at,
        snapshot: snapshot.clone(),
    };
    fs::write(&path, serde_json::to_string_pretty(&backup)?)?;

    debug!(path = %path.display(), "Wrote settings backup");
    Ok(path)
}

/// Read a backup file.
pub fn load_backup(path: &Path) -> SessionResult<BackupFile> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Delete a backup after a successful restore.
pub fn remove_backup(path: &Path) -> SessionResult<()> {
    fs::remove_file(path)?;
    debug!(path = %path.display(), "Deleted settings backup");
    Ok(())
}

/// All backups in `dir`, oldest first. A missing directory has none.
pub fn find_backups(dir: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };

    let mut backups: Vec<(i64, PathBuf)> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter_map(|p| backup_timestamp(&p).map(|ts| (ts, p)))
        .collect();
    backups.sort();
    backups.into_iter().map(|(_, p)| p).collect()
}

/// Restore the most recent backup in `dir` into `target` and delete it.
///
/// Returns the path that was restored, or `None` if there was nothing to recover.
/// Older backups are left in place.
pub fn recover_latest(dir: &Path, target: &mut RenderSettings) -> SessionResult<Option<PathBuf>> {
    let Some(latest) = find_backups(dir).pop() else {
        return Ok(None);
    };

    let backup = load_backup(&latest)?;
    backup.snapshot.restore(target);
    info!(
        path = %latest.display(),
        scene = %backup.scene,
        "Recovered render settings from backup"
    );

    if let Err(e) = remove_backup(&latest) {
        warn!(path = %latest.display(), "Could not delete recovered backup: {}", e);
    }
    Ok(Some(latest))
}
