//! Source portrait preparation.
//!
//! The source is processed exactly once per request: locate the face, crop
//! (or use the whole frame), and extract the appearance descriptor and
//! baseline motion. Everything downstream shares the result read-only.

use image::imageops::FilterType;
use image::RgbImage;
use tracing::debug;

use vivify_media::extract_crop;
use vivify_models::{AppearanceDescriptor, CropRegion, MotionDescriptor};

use crate::context::PipelineContext;
use crate::error::{PipelineError, PipelineResult};

/// A fully prepared source portrait.
#[derive(Debug, Clone)]
pub struct SourcePortrait {
    /// The original source frame, untouched.
    pub image: RgbImage,
    /// Crop transform used, `None` when cropping was disabled (paste-back is
    /// then impossible and the render is returned as-is).
    pub crop_region: Option<CropRegion>,
    /// The face crop fed to the extractors.
    pub crop: RgbImage,
    /// Identity/texture descriptor, extracted once.
    pub appearance: AppearanceDescriptor,
    /// Absolute motion of the source at rest.
    pub baseline_motion: MotionDescriptor,
    /// Eye-open ratio measured from the source landmarks.
    pub eye_ratio: f32,
    /// Lip-open ratio measured from the source landmarks.
    pub lip_ratio: f32,
}

/// Prepare `image` for animation or retargeting.
///
/// Fails with [`PipelineError::NoFaceDetected`] when the locator finds no
/// face; the face is required even with cropping disabled, because the
/// measured eye/lip ratios seed retargeting.
pub fn prepare(
    ctx: &PipelineContext,
    image: &RgbImage,
    do_crop: bool,
) -> PipelineResult<SourcePortrait> {
    let location = ctx
        .locator
        .locate(image)?
        .ok_or(PipelineError::NoFaceDetected)?;
    debug!(
        confidence = location.confidence,
        locator = ctx.locator.name(),
        "located source face"
    );

    let (crop_region, crop) = if do_crop {
        let region = CropRegion::from_bbox(
            &location.bbox,
            ctx.config.crop_pad_ratio,
            ctx.config.crop_size,
        );
        let crop = extract_crop(image, &region);
        (Some(region), crop)
    } else {
        let size = ctx.config.crop_size;
        let crop = image::imageops::resize(image, size, size, FilterType::Triangle);
        (None, crop)
    };

    let appearance = ctx.encoder.extract_appearance(&crop)?;
    let baseline_motion = ctx.encoder.extract_motion(&crop)?;

    Ok(SourcePortrait {
        image: image.clone(),
        crop_region,
        crop,
        appearance,
        baseline_motion,
        eye_ratio: location.landmarks.eye_open_ratio(),
        lip_ratio: location.landmarks.lip_open_ratio(),
    })
}
