//! Deterministic collaborator stand-ins for pipeline tests.
//!
//! The stubs communicate through pixel channels so tests can verify motion
//! policy end to end without model weights:
//!
//! - red channel of a frame -> motion channel 0 (mean red / 255)
//! - green channel -> face presence and openness; [`NO_FACE_MARKER`] makes
//!   the locator report no face
//! - the renderer writes every motion value into the output image's first
//!   pixel row, recoverable via [`StubRenderer::decode_channel`]

use std::sync::Arc;

use image::{Rgb, RgbImage};

use vivify_inference::{
    FaceLocation, FaceLocator, InferenceError, InferenceResult, MotionEncoder, PortraitRenderer,
};
use vivify_models::{
    AppearanceDescriptor, BoundingBox, FaceLandmarks, MotionDescriptor, MotionKind,
    APPEARANCE_SHAPE, LANDMARK_COUNT, MOTION_DIM,
};

use crate::config::PipelineConfig;
use crate::context::PipelineContext;

/// Green-channel value that makes the stub locator report no face.
pub const NO_FACE_MARKER: u8 = 255;

/// Value range the renderer quantizes motion channels over.
const ENCODE_RANGE: f32 = 4.0;
const ENCODE_OFFSET: f32 = 2.0;

pub fn stub_context() -> PipelineContext {
    PipelineContext::new(
        PipelineConfig::default(),
        Arc::new(StubLocator),
        Arc::new(StubEncoder),
        Arc::new(StubRenderer),
    )
}

/// A uniform source frame: `red` drives motion channel 0, `open` the
/// measured eye/lip ratios.
pub fn stub_source_image(red: u8, open: f32) -> RgbImage {
    let green = (open * 200.0).clamp(0.0, 254.0) as u8;
    RgbImage::from_pixel(64, 48, Rgb([red, green, 0]))
}

/// A uniform driving frame with a detectable face.
pub fn stub_driving_frame(red: u8) -> RgbImage {
    RgbImage::from_pixel(80, 60, Rgb([red, 100, 0]))
}

fn mean_red(frame: &RgbImage) -> f32 {
    let sum: u64 = frame.pixels().map(|p| p.0[0] as u64).sum();
    sum as f32 / (frame.width() * frame.height()) as f32 / 255.0
}

pub struct StubLocator;

impl FaceLocator for StubLocator {
    fn locate(&self, frame: &RgbImage) -> InferenceResult<Option<FaceLocation>> {
        let green = frame.get_pixel(0, 0).0[1];
        if green == NO_FACE_MARKER {
            return Ok(None);
        }

        let (w, h) = (frame.width() as f32, frame.height() as f32);
        let bbox = BoundingBox::new(w / 4.0, h / 4.0, w / 2.0, h / 2.0);

        // Landmarks whose apertures reproduce the green-encoded openness.
        let open = green as f32 / 255.0;
        let mut points = vec![(0.0f32, 0.0f32); LANDMARK_COUNT];
        points[36] = (0.0, 50.0);
        points[39] = (10.0, 50.0);
        points[42] = (30.0, 50.0);
        points[45] = (40.0, 50.0);
        for &(u, l) in &[(37usize, 41usize), (38, 40), (43, 47), (44, 46)] {
            let cx = if u < 42 { 5.0 } else { 35.0 };
            points[u] = (cx, 50.0 - open * 5.0);
            points[l] = (cx, 50.0 + open * 5.0);
        }
        points[60] = (10.0, 80.0);
        points[64] = (30.0, 80.0);
        for &(u, l) in &[(61usize, 67usize), (62, 66), (63, 65)] {
            points[u] = (20.0, 80.0 - open * 5.0);
            points[l] = (20.0, 80.0 + open * 5.0);
        }

        Ok(Some(FaceLocation {
            bbox,
            landmarks: FaceLandmarks::new(points),
            confidence: 0.99,
        }))
    }

    fn name(&self) -> &'static str {
        "stub-locator"
    }
}

pub struct StubEncoder;

impl MotionEncoder for StubEncoder {
    fn extract_motion(&self, crop: &RgbImage) -> InferenceResult<MotionDescriptor> {
        let mut values = vec![0.0; MOTION_DIM];
        values[0] = mean_red(crop);
        Ok(MotionDescriptor {
            kind: MotionKind::Absolute,
            values,
        })
    }

    fn extract_appearance(&self, crop: &RgbImage) -> InferenceResult<AppearanceDescriptor> {
        let len: usize = APPEARANCE_SHAPE.iter().product();
        Ok(AppearanceDescriptor {
            values: vec![mean_red(crop); len],
            shape: APPEARANCE_SHAPE,
        })
    }

    fn name(&self) -> &'static str {
        "stub-encoder"
    }
}

pub struct StubRenderer;

impl StubRenderer {
    /// Recover a motion channel from a rendered stub frame.
    pub fn decode_channel(frame: &RgbImage, idx: usize) -> f32 {
        let p = frame.get_pixel(idx as u32, 0).0;
        let q = ((p[0] as u32) << 8 | p[1] as u32) as f32;
        q / 65535.0 * ENCODE_RANGE - ENCODE_OFFSET
    }
}

impl PortraitRenderer for StubRenderer {
    fn render(
        &self,
        motion: &MotionDescriptor,
        _appearance: &AppearanceDescriptor,
    ) -> InferenceResult<RgbImage> {
        if motion.kind != MotionKind::Absolute {
            return Err(InferenceError::shape_mismatch(
                "absolute motion descriptor",
                "relative",
            ));
        }
        let mut out = RgbImage::new(256, 256);
        for (i, v) in motion.values.iter().enumerate() {
            let q = (((v + ENCODE_OFFSET) / ENCODE_RANGE).clamp(0.0, 1.0) * 65535.0) as u32;
            out.put_pixel(i as u32, 0, Rgb([(q >> 8) as u8, (q & 0xff) as u8, 0]));
        }
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "stub-renderer"
    }
}
