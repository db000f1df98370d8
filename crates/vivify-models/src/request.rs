//! Animation and retargeting request/response types.

use std::path::PathBuf;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Upper bound of the retargeting sliders.
pub const RATIO_MAX: f32 = 0.8;

/// Default target ratio when blending is enabled but no value was given.
pub const DEFAULT_TARGET_RATIO: f32 = 0.3;

/// An eye-open or lip-open ratio, clamped to `[0, RATIO_MAX]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct Ratio(f32);

impl Ratio {
    /// Create a ratio, clamping into the valid range.
    pub fn new(value: f32) -> Self {
        Self(value.clamp(0.0, RATIO_MAX))
    }

    pub fn value(&self) -> f32 {
        self.0
    }
}

impl Default for Ratio {
    fn default() -> Self {
        Self(DEFAULT_TARGET_RATIO)
    }
}

impl From<f32> for Ratio {
    fn from(value: f32) -> Self {
        Self::new(value)
    }
}

/// Flags controlling one animation pass.
///
/// Defaults mirror the interactive defaults: relative motion, cropping and
/// paste-back on, target-ratio blending off.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AnimationOptions {
    /// Express driving motion relative to the driving sequence's first frame
    #[serde(default = "default_true")]
    pub relative_motion: bool,

    /// Detect and crop the face before extraction (source and driving frames)
    #[serde(default = "default_true")]
    pub do_crop: bool,

    /// Composite renders back into the original source frame
    #[serde(default = "default_true")]
    pub paste_back: bool,

    /// Blend the eye/lip target-ratio correction into every frame
    #[serde(default)]
    pub use_target_ratios: bool,

    /// Target eye-open ratio (used when `use_target_ratios` is set)
    #[serde(default)]
    pub target_eye_ratio: Ratio,

    /// Target lip-open ratio (used when `use_target_ratios` is set)
    #[serde(default)]
    pub target_lip_ratio: Ratio,
}

fn default_true() -> bool {
    true
}

impl Default for AnimationOptions {
    fn default() -> Self {
        Self {
            relative_motion: true,
            do_crop: true,
            paste_back: true,
            use_target_ratios: false,
            target_eye_ratio: Ratio::default(),
            target_lip_ratio: Ratio::default(),
        }
    }
}

/// Result of one animation pass.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AnimationOutcome {
    /// The animated video
    pub video: PathBuf,
    /// Driving video and result side by side, for comparison
    pub concat_video: PathBuf,
    /// Number of frames in the output
    pub frame_count: usize,
    /// Frames whose face could not be located and reused the previous
    /// frame's motion (hold-last recovery)
    pub held_frames: usize,
}

/// Slider defaults measured from a prepared source portrait.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema)]
pub struct RetargetDefaults {
    pub eye_ratio: Ratio,
    pub lip_ratio: Ratio,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_clamps_to_slider_range() {
        assert_eq!(Ratio::new(-0.5).value(), 0.0);
        assert_eq!(Ratio::new(0.3).value(), 0.3);
        assert_eq!(Ratio::new(1.5).value(), RATIO_MAX);
    }

    #[test]
    fn options_defaults_match_interactive_defaults() {
        let opts = AnimationOptions::default();
        assert!(opts.relative_motion);
        assert!(opts.do_crop);
        assert!(opts.paste_back);
        assert!(!opts.use_target_ratios);
        assert_eq!(opts.target_eye_ratio.value(), DEFAULT_TARGET_RATIO);
    }

    #[test]
    fn options_deserialize_with_missing_fields() {
        let opts: AnimationOptions = serde_json::from_str("{}").unwrap();
        assert!(opts.relative_motion);
        assert!(!opts.use_target_ratios);
    }
}
