//! Shared pipeline context.

use std::sync::Arc;

use tokio::sync::Semaphore;

use vivify_inference::{
    FaceLocator, MotionEncoder, OnnxFaceLocator, OnnxMotionEncoder, OnnxPortraitRenderer,
    PortraitRenderer,
};

use crate::config::PipelineConfig;
use crate::error::PipelineResult;

/// Configuration plus the neural collaborators, shared across requests.
///
/// Collaborators are held behind capability traits so tests can supply
/// deterministic stand-ins.
#[derive(Clone)]
pub struct PipelineContext {
    pub config: PipelineConfig,
    pub locator: Arc<dyn FaceLocator>,
    pub encoder: Arc<dyn MotionEncoder>,
    pub renderer: Arc<dyn PortraitRenderer>,
    /// Bounds concurrent per-frame extraction work.
    pub(crate) frame_permits: Arc<Semaphore>,
}

impl PipelineContext {
    /// Assemble a context from explicit collaborators.
    pub fn new(
        config: PipelineConfig,
        locator: Arc<dyn FaceLocator>,
        encoder: Arc<dyn MotionEncoder>,
        renderer: Arc<dyn PortraitRenderer>,
    ) -> Self {
        let permits = config.max_frame_parallel.max(1);
        Self {
            config,
            locator,
            encoder,
            renderer,
            frame_permits: Arc::new(Semaphore::new(permits)),
        }
    }

    /// Load the ONNX collaborators from `config.model_dir`.
    pub fn with_onnx(config: PipelineConfig) -> PipelineResult<Self> {
        let locator = OnnxFaceLocator::load(&config.model_dir)?;
        let encoder = OnnxMotionEncoder::load(&config.model_dir)?;
        let renderer = OnnxPortraitRenderer::load(&config.model_dir, config.render_devices)?;
        Ok(Self::new(
            config,
            Arc::new(locator),
            Arc::new(encoder),
            Arc::new(renderer),
        ))
    }
}
