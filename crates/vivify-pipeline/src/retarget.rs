//! Interactive eye/lip retargeting.
//!
//! A session prepares a source portrait once, reports its measured ratios as
//! slider defaults, then serves repeated retarget calls. Each call is a pure
//! function of the prepared portrait and the requested ratios, so equal
//! inputs produce identical images.

use std::sync::Arc;

use image::RgbImage;
use tracing::info;

use vivify_models::{
    MotionDescriptor, Ratio, RetargetDefaults, EYE_OPEN_IDX, LIP_OPEN_IDX, MOTION_DIM,
};

use crate::compositor::paste_back;
use crate::context::PipelineContext;
use crate::error::{PipelineError, PipelineResult};
use crate::portrait::{self, SourcePortrait};

/// Linear gain from a ratio difference to the matching expression channel.
const RATIO_GAIN: f32 = 1.0;

/// One retargeted render.
#[derive(Debug, Clone)]
pub struct RetargetOutcome {
    /// The raw rendered crop.
    pub crop: RgbImage,
    /// The render composited back into the source frame.
    pub composited: RgbImage,
}

/// Build the relative correction that moves measured ratios toward targets.
///
/// Only the eye and lip aperture channels are touched; the mapping is linear
/// and monotonic in each target.
pub fn ratio_correction(
    current_eye: f32,
    current_lip: f32,
    target_eye: Ratio,
    target_lip: Ratio,
) -> MotionDescriptor {
    let mut values = vec![0.0; MOTION_DIM];
    values[EYE_OPEN_IDX] = (target_eye.value() - current_eye) * RATIO_GAIN;
    values[LIP_OPEN_IDX] = (target_lip.value() - current_lip) * RATIO_GAIN;
    MotionDescriptor {
        kind: vivify_models::MotionKind::Relative,
        values,
    }
}

/// A prepared-source retargeting session.
pub struct RetargetSession {
    ctx: Arc<PipelineContext>,
    prepared: Option<SourcePortrait>,
}

impl RetargetSession {
    pub fn new(ctx: Arc<PipelineContext>) -> Self {
        Self {
            ctx,
            prepared: None,
        }
    }

    /// Prepare `image` as the session's source portrait.
    ///
    /// Returns the measured ratios (slider defaults) and the face crop as a
    /// preview. Replaces any previously prepared portrait.
    pub async fn prepare(&mut self, image: RgbImage) -> PipelineResult<(RetargetDefaults, RgbImage)> {
        let ctx = self.ctx.clone();
        let portrait = tokio::task::spawn_blocking(move || portrait::prepare(&ctx, &image, true))
            .await
            .map_err(|e| PipelineError::contract_violation(format!("prepare task failed: {e}")))??;

        let defaults = RetargetDefaults {
            eye_ratio: Ratio::new(portrait.eye_ratio),
            lip_ratio: Ratio::new(portrait.lip_ratio),
        };
        let preview = portrait.crop.clone();
        info!(
            eye = defaults.eye_ratio.value(),
            lip = defaults.lip_ratio.value(),
            "prepared retargeting source"
        );
        self.prepared = Some(portrait);
        Ok((defaults, preview))
    }

    /// Render the prepared portrait with its eye/lip apertures driven toward
    /// the given targets.
    pub async fn retarget(&self, eye: Ratio, lip: Ratio) -> PipelineResult<RetargetOutcome> {
        let portrait = self
            .prepared
            .as_ref()
            .ok_or(PipelineError::NoSourceLoaded)?
            .clone();
        let ctx = self.ctx.clone();
        let feather = ctx.config.feather_px;

        tokio::task::spawn_blocking(move || {
            let correction = ratio_correction(portrait.eye_ratio, portrait.lip_ratio, eye, lip);
            let motion = portrait.baseline_motion.compose(&correction)?;
            let crop = ctx.renderer.render(&motion, &portrait.appearance)?;

            let composited = match &portrait.crop_region {
                Some(region) => paste_back(&portrait.image, region, &crop, feather),
                None => crop.clone(),
            };
            Ok(RetargetOutcome { crop, composited })
        })
        .await
        .map_err(|e| PipelineError::contract_violation(format!("retarget task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stubs::{stub_context, stub_source_image, StubRenderer};

    #[test]
    fn correction_is_monotonic_in_targets() {
        let low = ratio_correction(0.3, 0.2, Ratio::new(0.1), Ratio::new(0.2));
        let mid = ratio_correction(0.3, 0.2, Ratio::new(0.4), Ratio::new(0.2));
        let high = ratio_correction(0.3, 0.2, Ratio::new(0.8), Ratio::new(0.2));
        assert!(low.values[EYE_OPEN_IDX] < mid.values[EYE_OPEN_IDX]);
        assert!(mid.values[EYE_OPEN_IDX] < high.values[EYE_OPEN_IDX]);
        // Untouched channels stay zero.
        assert_eq!(low.values[0], 0.0);
        assert_eq!(low.values[LIP_OPEN_IDX], mid.values[LIP_OPEN_IDX]);
    }

    #[test]
    fn correction_at_measured_ratios_is_identity() {
        let c = ratio_correction(0.3, 0.2, Ratio::new(0.3), Ratio::new(0.2));
        assert!(c.values.iter().all(|v| *v == 0.0));
    }

    #[tokio::test]
    async fn retarget_before_prepare_fails() {
        let session = RetargetSession::new(Arc::new(stub_context()));
        let err = session
            .retarget(Ratio::new(0.3), Ratio::new(0.3))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::NoSourceLoaded));
    }

    #[tokio::test]
    async fn retarget_is_deterministic() {
        let mut session = RetargetSession::new(Arc::new(stub_context()));
        let (defaults, preview) = session.prepare(stub_source_image(90, 0.5)).await.unwrap();
        assert!(defaults.eye_ratio.value() > 0.0);
        assert_eq!(preview.dimensions(), (256, 256));

        let a = session
            .retarget(Ratio::new(0.5), Ratio::new(0.1))
            .await
            .unwrap();
        let b = session
            .retarget(Ratio::new(0.5), Ratio::new(0.1))
            .await
            .unwrap();
        assert_eq!(a.crop, b.crop);
        assert_eq!(a.composited, b.composited);
    }

    #[tokio::test]
    async fn eye_target_moves_rendered_channel() {
        let mut session = RetargetSession::new(Arc::new(stub_context()));
        session.prepare(stub_source_image(90, 0.5)).await.unwrap();

        let closed = session
            .retarget(Ratio::new(0.0), Ratio::new(0.3))
            .await
            .unwrap();
        let open = session
            .retarget(Ratio::new(0.8), Ratio::new(0.3))
            .await
            .unwrap();
        let closed_eye = StubRenderer::decode_channel(&closed.crop, EYE_OPEN_IDX);
        let open_eye = StubRenderer::decode_channel(&open.crop, EYE_OPEN_IDX);
        assert!(open_eye > closed_eye);
    }
}
