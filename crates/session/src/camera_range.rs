//! Per-camera frame range memory.
//!
//! Each camera remembers the last frame range the user picked for it. Entries are
//! keyed by camera name only, so renaming or deleting a camera in the scene leaves a
//! stale entry behind; that entry is simply never looked up again.

use crate::error::{SessionError, SessionResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Stable key for a camera, derived from its name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CameraIdentity(String);

impl CameraIdentity {
    /// Name of the pseudo-camera meaning "render through the current viewport".
    pub const VIEWPORT_NAME: &'static str = "VIEWPORT";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn viewport() -> Self {
        Self(Self::VIEWPORT_NAME.to_string())
    }

    pub fn is_viewport(&self) -> bool {
        self.0 == Self::VIEWPORT_NAME
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CameraIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CameraIdentity {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for CameraIdentity {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Inclusive frame range. Always satisfies `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawFrameRange")]
pub struct FrameRange {
    start: u32,
    end: u32,
}

#[derive(Deserialize)]
struct RawFrameRange {
    start: u32,
    end: u32,
}

impl TryFrom<RawFrameRange> for FrameRange {
    type Error = SessionError;

    fn try_from(raw: RawFrameRange) -> Result<Self, Self::Error> {
        FrameRange::new(raw.start, raw.end)
    }
}

impl FrameRange {
    /// Create a range, rejecting `start > end`.
    pub fn new(start: u32, end: u32) -> SessionResult<Self> {
        if start > end {
            return Err(SessionError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn end(&self) -> u32 {
        self.end
    }

    /// Number of frames in the range, counting both ends.
    pub fn len(&self) -> u64 {
        u64::from(self.end - self.start) + 1
    }

    /// Always false; a range covers at least one frame.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, frame: u32) -> bool {
        (self.start..=self.end).contains(&frame)
    }
}

impl std::fmt::Display for FrameRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Mapping of camera identity to its remembered frame range.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CameraRangeStore {
    ranges: HashMap<CameraIdentity, FrameRange>,
}

impl CameraRangeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored range for a camera. `None` means the caller should fall back to the
    /// document's own in/out frames.
    pub fn get(&self, identity: &CameraIdentity) -> Option<FrameRange> {
        self.ranges.get(identity).copied()
    }

    /// Store `start..=end` for a camera, replacing any previous entry.
    ///
    /// Fails with `InvalidRange` without touching the store if `start > end`.
    pub fn set(&mut self, identity: CameraIdentity, start: u32, end: u32) -> SessionResult<()> {
        let range = FrameRange::new(start, end)?;
        self.insert(identity, range);
        Ok(())
    }

    /// Store an already validated range.
    pub fn insert(&mut self, identity: CameraIdentity, range: FrameRange) {
        debug!(camera = %identity, %range, "Stored frame range");
        self.ranges.insert(identity, range);
    }

    /// Remove the entry for a camera. Returns whether anything was removed.
    pub fn delete(&mut self, identity: &CameraIdentity) -> bool {
        let removed = self.ranges.remove(identity).is_some();
        if removed {
            debug!(camera = %identity, "Deleted stored frame range");
        }
        removed
    }

    /// Stored range or `default` if the camera has none.
    pub fn resolve(&self, identity: &CameraIdentity, default: FrameRange) -> FrameRange {
        self.get(identity).unwrap_or(default)
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CameraIdentity, &FrameRange)> {
        self.ranges.iter()
    }

    /// Serialize the store into the opaque blob kept in the host document.
    ///
    /// Format: `{"CameraName": {"start": 1, "end": 250}, ...}`
    pub fn to_blob(&self) -> SessionResult<String> {
        let ordered: std::collections::BTreeMap<&str, RawEntry> = self
            .ranges
            .iter()
            .map(|(camera, range)| {
                (
                    camera.as_str(),
                    RawEntry {
                        start: range.start,
                        end: range.end,
                    },
                )
            })
            .collect();
        Ok(serde_json::to_string(&ordered)?)
    }

    /// Parse a blob written by [`CameraRangeStore::to_blob`].
    ///
    /// An empty blob is an empty store. Entries with `start > end` are dropped with a
    /// warning; malformed JSON is an error.
    pub fn from_blob(blob: &str) -> SessionResult<Self> {
        if blob.trim().is_empty() {
            return Ok(Self::new());
        }

        let raw: HashMap<String, RawEntry> = serde_json::from_str(blob)?;
        let mut store = Self::new();
        for (camera, entry) in raw {
            match FrameRange::new(entry.start, entry.end) {
                Ok(range) => {
                    store.ranges.insert(CameraIdentity::new(camera), range);
                }
                Err(e) => warn!(%camera, "Skipping stored frame range: {}", e),
            }
        }
        Ok(store)
    }
}

#[derive(Serialize, Deserialize)]
struct RawEntry {
    start: u32,
    end: u32,
}
