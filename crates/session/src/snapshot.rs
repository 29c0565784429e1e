//! Render settings and the snapshot taken around a queue run.

use crate::job::{OutputFormat, VideoQuality};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

/// The host's mutable global render configuration.
///
/// Only the fields a preview render changes are modelled here; the host copies
/// them in before a run and writes them back to its own configuration afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderSettings {
    /// Resolution scale in percent.
    pub resolution_percentage: u32,
    pub fps: u32,
    /// Scene simplification toggle.
    pub use_simplify: bool,
    pub output_path: PathBuf,
    pub output_format: OutputFormat,
    pub frame_start: u32,
    pub frame_end: u32,
    /// Active scene camera, `None` when the scene has none.
    pub camera: Option<String>,
    /// Burn frame/camera/lens/scene metadata into the image.
    pub burn_metadata: bool,
    pub stamp_font_size: u32,
    pub video_quality: VideoQuality,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            resolution_percentage: 100,
            fps: 24,
            use_simplify: false,
            output_path: PathBuf::new(),
            output_format: OutputFormat::PngSequence,
            frame_start: 1,
            frame_end: 250,
            camera: None,
            burn_metadata: false,
            stamp_font_size: 12,
            video_quality: VideoQuality::Medium,
        }
    }
}

/// Independent copy of [`RenderSettings`] taken before a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsSnapshot {
    settings: RenderSettings,
}

impl SettingsSnapshot {
    /// Copy every field of the live configuration.
    pub fn capture(current: &RenderSettings) -> Self {
        debug!(
            resolution = current.resolution_percentage,
            fps = current.fps,
            simplify = current.use_simplify,
            output = %current.output_path.display(),
            "Captured render settings"
        );
        Self {
            settings: current.clone(),
        }
    }

    /// Write every captured field back into `target`.
    ///
    /// Applying the same snapshot again leaves `target` unchanged.
    pub fn restore(&self, target: &mut RenderSettings) {
        target.clone_from(&self.settings);
        debug!("Restored render settings");
    }

    /// The captured values.
    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn format_strategy() -> impl Strategy<Value = OutputFormat> {
        prop_oneof![
            Just(OutputFormat::Mp4),
            Just(OutputFormat::Mov),
            Just(OutputFormat::PngSequence),
            Just(OutputFormat::JpegSequence),
        ]
    }

    fn quality_strategy() -> impl Strategy<Value = VideoQuality> {
        prop_oneof![
            Just(VideoQuality::High),
            Just(VideoQuality::Medium),
            Just(VideoQuality::Low),
        ]
    }

    fn settings_strategy() -> impl Strategy<Value = RenderSettings> {
        (
            (1u32..=100, 1u32..=120, proptest::bool::ANY, "[a-z/]{0,20}", format_strategy()),
            (0u32..500, 0u32..500, proptest::option::of("[A-Za-z.0-9]{1,10}")),
            (proptest::bool::ANY, 8u32..64, quality_strategy()),
        )
            .prop_map(
                |(
                    (resolution_percentage, fps, use_simplify, path, output_format),
                    (frame_start, len, camera),
                    (burn_metadata, stamp_font_size, video_quality),
                )| RenderSettings {
                    resolution_percentage,
                    fps,
                    use_simplify,
                    output_path: PathBuf::from(path),
                    output_format,
                    frame_start,
                    frame_end: frame_start + len,
                    camera,
                    burn_metadata,
                    stamp_font_size,
                    video_quality,
                },
            )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        // Restore reproduces the captured values even after the live settings changed.
        #[test]
        fn prop_restore_after_mutation(
            original in settings_strategy(),
            mutated in settings_strategy(),
        ) {
            let mut live = original.clone();
            let snapshot = SettingsSnapshot::capture(&live);

            live = mutated;
            snapshot.restore(&mut live);

            prop_assert_eq!(live, original);
        }

        #[test]
        fn prop_restore_is_idempotent(
            original in settings_strategy(),
            mutated in settings_strategy(),
        ) {
            let snapshot = SettingsSnapshot::capture(&original);

            let mut once = mutated.clone();
            snapshot.restore(&mut once);

            let mut twice = mutated;
            snapshot.restore(&mut twice);
            snapshot.restore(&mut twice);

            prop_assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_capture_is_independent_copy() {
        let mut live = RenderSettings {
            camera: Some("CamA".to_string()),
            output_path: PathBuf::from("/renders/a.mov"),
            ..RenderSettings::default()
        };
        let snapshot = SettingsSnapshot::capture(&live);

        live.camera.as_mut().unwrap().push_str("_changed");
        live.output_path.push("nested");
        live.fps = 60;

        assert_eq!(snapshot.settings().camera.as_deref(), Some("CamA"));
        assert_eq!(snapshot.settings().output_path, PathBuf::from("/renders/a.mov"));
        assert_eq!(snapshot.settings().fps, 24);
    }

    #[test]
    fn test_snapshot_json_keeps_all_fields() {
        let settings = RenderSettings {
            resolution_percentage: 50,
            fps: 30,
            use_simplify: true,
            output_format: OutputFormat::Mp4,
            camera: Some("Cam".to_string()),
            burn_metadata: true,
            video_quality: VideoQuality::High,
            ..RenderSettings::default()
        };
        let snapshot = SettingsSnapshot::capture(&settings);

        let json = serde_json::to_string(&snapshot).unwrap();
        let parsed: SettingsSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, snapshot);
    }
}
