//! The animation orchestrator.
//!
//! Drives a full request: decode the driving video, prepare the source
//! portrait, extract per-frame driving motion (bounded fan-out), apply the
//! motion-transfer policy (relative motion, hold-last recovery, optional
//! ratio correction), render every frame, composite, and assemble the
//! output videos.

use std::path::Path;

use image::imageops::FilterType;
use image::RgbImage;
use tracing::{info, warn};

use vivify_media::{assemble, concat_side_by_side, decode_frames, extract_crop};
use vivify_models::{AnimationOptions, AnimationOutcome, CropRegion, MotionDescriptor};

use crate::compositor::paste_back;
use crate::context::PipelineContext;
use crate::error::{PipelineError, PipelineResult};
use crate::portrait::{self, SourcePortrait};
use crate::retarget::ratio_correction;

/// Animate `source_image` with the motion of the video at `driving_path`.
pub async fn animate(
    ctx: &PipelineContext,
    source_image: &RgbImage,
    driving_path: &Path,
    options: &AnimationOptions,
) -> PipelineResult<AnimationOutcome> {
    let (video_info, driving_frames) = decode_frames(driving_path).await?;
    if driving_frames.is_empty() {
        return Err(PipelineError::EmptyInput);
    }
    info!(
        frames = driving_frames.len(),
        fps = video_info.fps,
        "decoded driving video"
    );

    let source = {
        let ctx = ctx.clone();
        let image = source_image.clone();
        let do_crop = options.do_crop;
        tokio::task::spawn_blocking(move || portrait::prepare(&ctx, &image, do_crop))
            .await
            .map_err(|e| PipelineError::contract_violation(format!("prepare task failed: {e}")))??
    };

    let frame_count = driving_frames.len();
    let (rendered, held_frames) = synthesize_frames(ctx, &source, driving_frames, options).await?;

    let audio_source = video_info.has_audio.then_some(driving_path);
    let video = assemble(
        &rendered,
        video_info.fps,
        audio_source,
        &ctx.config.output_dir,
        "animated",
        &ctx.config.encoding,
    )
    .await?;
    let concat_video = concat_side_by_side(
        driving_path,
        &video,
        &ctx.config.output_dir,
        "animated-concat",
        &ctx.config.encoding,
    )
    .await?;

    info!(
        video = %video.display(),
        frames = frame_count,
        held = held_frames,
        "animation complete"
    );
    Ok(AnimationOutcome {
        video,
        concat_video,
        frame_count,
        held_frames,
    })
}

/// The in-memory animation core: driving frames in, rendered frames out.
///
/// Returns the rendered frames in driving order plus the number of frames
/// recovered via hold-last.
pub async fn synthesize_frames(
    ctx: &PipelineContext,
    source: &SourcePortrait,
    driving_frames: Vec<RgbImage>,
    options: &AnimationOptions,
) -> PipelineResult<(Vec<RgbImage>, usize)> {
    if driving_frames.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let extracted = extract_driving_motion(ctx, driving_frames, options.do_crop).await?;
    let (filled, held_frames) = hold_last(extracted, &source.baseline_motion);
    if held_frames > 0 {
        warn!(
            held = held_frames,
            total = filled.len(),
            "driving frames without a detectable face reused the previous motion"
        );
    }

    let correction = options.use_target_ratios.then(|| {
        ratio_correction(
            source.eye_ratio,
            source.lip_ratio,
            options.target_eye_ratio,
            options.target_lip_ratio,
        )
    });

    // Effective motion per frame, fixed before any rendering starts.
    let mut motions = Vec::with_capacity(filled.len());
    for descriptor in &filled {
        let mut motion = if options.relative_motion {
            let delta = descriptor.delta(&filled[0])?;
            source.baseline_motion.compose(&delta)?
        } else {
            descriptor.clone()
        };
        if let Some(correction) = &correction {
            motion = motion.compose(correction)?;
        }
        motions.push(motion);
    }

    let rendered = render_frames(ctx, source, motions, options.paste_back).await?;
    Ok((rendered, held_frames))
}

/// Extract the driving motion of every frame, `None` where no face is found.
///
/// Fan-out is bounded by the context's frame permits; results come back in
/// frame order.
async fn extract_driving_motion(
    ctx: &PipelineContext,
    frames: Vec<RgbImage>,
    do_crop: bool,
) -> PipelineResult<Vec<Option<MotionDescriptor>>> {
    let mut handles = Vec::with_capacity(frames.len());
    for frame in frames {
        let permit = ctx
            .frame_permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| PipelineError::contract_violation(format!("permit pool closed: {e}")))?;
        let ctx = ctx.clone();
        handles.push(tokio::task::spawn_blocking(move || {
            let _permit = permit;
            frame_motion(&ctx, &frame, do_crop)
        }));
    }

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        let motion = handle
            .await
            .map_err(|e| PipelineError::contract_violation(format!("extract task failed: {e}")))??;
        results.push(motion);
    }
    Ok(results)
}

/// Locate and encode one driving frame.
fn frame_motion(
    ctx: &PipelineContext,
    frame: &RgbImage,
    do_crop: bool,
) -> PipelineResult<Option<MotionDescriptor>> {
    let Some(location) = ctx.locator.locate(frame)? else {
        return Ok(None);
    };

    let crop = if do_crop {
        let region = CropRegion::from_bbox(
            &location.bbox,
            ctx.config.crop_pad_ratio,
            ctx.config.crop_size,
        );
        extract_crop(frame, &region)
    } else {
        let size = ctx.config.crop_size;
        image::imageops::resize(frame, size, size, FilterType::Triangle)
    };

    Ok(Some(ctx.encoder.extract_motion(&crop)?))
}

/// Fill extraction gaps with the previous frame's motion.
///
/// A gap at frame 0 falls back to the source baseline; every filled gap
/// counts as one held frame.
fn hold_last(
    extracted: Vec<Option<MotionDescriptor>>,
    baseline: &MotionDescriptor,
) -> (Vec<MotionDescriptor>, usize) {
    let mut filled = Vec::with_capacity(extracted.len());
    let mut held = 0;
    for motion in extracted {
        match motion {
            Some(m) => filled.push(m),
            None => {
                held += 1;
                let previous = filled.last().unwrap_or(baseline).clone();
                filled.push(previous);
            }
        }
    }
    (filled, held)
}

/// Render every frame and composite. Output order matches input order.
async fn render_frames(
    ctx: &PipelineContext,
    source: &SourcePortrait,
    motions: Vec<MotionDescriptor>,
    do_paste_back: bool,
) -> PipelineResult<Vec<RgbImage>> {
    let mut handles = Vec::with_capacity(motions.len());
    for motion in motions {
        let permit = ctx
            .frame_permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| PipelineError::contract_violation(format!("permit pool closed: {e}")))?;
        let ctx = ctx.clone();
        let source = source.clone();
        handles.push(tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let crop = ctx.renderer.render(&motion, &source.appearance)?;
            match (&source.crop_region, do_paste_back) {
                (Some(region), true) => Ok::<_, PipelineError>(paste_back(
                    &source.image,
                    region,
                    &crop,
                    ctx.config.feather_px,
                )),
                _ => Ok(crop),
            }
        }));
    }

    let mut rendered = Vec::with_capacity(handles.len());
    for handle in handles {
        let frame = handle
            .await
            .map_err(|e| PipelineError::contract_violation(format!("render task failed: {e}")))??;
        rendered.push(frame);
    }
    Ok(rendered)
}
