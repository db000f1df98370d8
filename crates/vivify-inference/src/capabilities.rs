//! Capability traits consumed by the animation pipeline.
//!
//! Implementations are synchronous (the pipeline moves them onto blocking
//! threads), potentially expensive, and occasionally failing. They hold no
//! retry or skip policy; the orchestrator owns all of that.

use image::RgbImage;

use vivify_models::{AppearanceDescriptor, BoundingBox, FaceLandmarks, MotionDescriptor};

use crate::error::InferenceResult;

/// A located face: bounding box, landmarks, and detection confidence, all in
/// source pixel coordinates.
#[derive(Debug, Clone)]
pub struct FaceLocation {
    pub bbox: BoundingBox,
    pub landmarks: FaceLandmarks,
    pub confidence: f32,
}

/// Finds the primary face in a frame.
pub trait FaceLocator: Send + Sync {
    /// Locate the primary face, or `None` when no face is detectable.
    fn locate(&self, frame: &RgbImage) -> InferenceResult<Option<FaceLocation>>;

    /// Implementation name for logging.
    fn name(&self) -> &'static str;
}

/// Extracts motion (pose + expression) and appearance descriptors from a
/// cropped face image.
pub trait MotionEncoder: Send + Sync {
    /// Extract an absolute motion descriptor from a face crop.
    fn extract_motion(&self, crop: &RgbImage) -> InferenceResult<MotionDescriptor>;

    /// Extract the appearance descriptor from a face crop.
    fn extract_appearance(&self, crop: &RgbImage) -> InferenceResult<AppearanceDescriptor>;

    /// Implementation name for logging.
    fn name(&self) -> &'static str;
}

/// Renders a face image by applying a motion descriptor to an appearance
/// descriptor.
pub trait PortraitRenderer: Send + Sync {
    /// Render one frame. The motion descriptor must be absolute.
    fn render(
        &self,
        motion: &MotionDescriptor,
        appearance: &AppearanceDescriptor,
    ) -> InferenceResult<RgbImage>;

    /// Implementation name for logging.
    fn name(&self) -> &'static str;
}
