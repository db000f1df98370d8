//! Pipeline configuration.

use std::path::PathBuf;

use vivify_models::EncodingConfig;

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory receiving generated video/image artifacts
    pub output_dir: PathBuf,
    /// Directory holding the collaborator model weights
    pub model_dir: PathBuf,
    /// Maximum concurrent per-frame extraction/render tasks
    pub max_frame_parallel: usize,
    /// Number of physical render devices (one in-flight render each)
    pub render_devices: usize,
    /// Resolution of face crops fed to the extractors
    pub crop_size: u32,
    /// Padding ratio around the detected face box
    pub crop_pad_ratio: f32,
    /// Feather width in source pixels at the paste-back boundary
    pub feather_px: u32,
    /// Output encoding settings
    pub encoding: EncodingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("animations"),
            model_dir: PathBuf::from("models"),
            max_frame_parallel: 4,
            render_devices: 1,
            crop_size: 256,
            crop_pad_ratio: 0.25,
            feather_px: 8,
            encoding: EncodingConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            output_dir: std::env::var("VIVIFY_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            model_dir: std::env::var("VIVIFY_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_dir),
            max_frame_parallel: std::env::var("VIVIFY_MAX_FRAME_PARALLEL")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_frame_parallel),
            render_devices: std::env::var("VIVIFY_RENDER_DEVICES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.render_devices),
            crop_size: std::env::var("VIVIFY_CROP_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.crop_size),
            crop_pad_ratio: std::env::var("VIVIFY_CROP_PAD_RATIO")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.crop_pad_ratio),
            feather_px: std::env::var("VIVIFY_FEATHER_PX")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.feather_px),
            encoding: EncodingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = PipelineConfig::default();
        assert!(cfg.max_frame_parallel >= 1);
        assert!(cfg.render_devices >= 1);
        assert_eq!(cfg.crop_size, 256);
    }
}
