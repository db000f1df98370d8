//! Video assembly: ordered frames (plus original audio) into an MP4.
//!
//! Output is written to a temporary path and renamed on success, so a failed
//! encode never leaves a partial artifact under the final name. Filenames
//! embed a UUID so concurrent requests sharing the output directory cannot
//! collide.

use std::path::{Path, PathBuf};

use image::RgbImage;
use tracing::info;

use vivify_models::EncodingConfig;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::{persist, unique_output_path};

/// Encode `frames` at `fps` into `{out_dir}/{stem}-{uuid}.mp4`.
///
/// When `audio_source` is given, its audio track is muxed in unchanged
/// (re-encoded to the configured audio codec, content untouched). The caller
/// decides whether the source actually carries audio.
pub async fn assemble(
    frames: &[RgbImage],
    fps: f64,
    audio_source: Option<&Path>,
    out_dir: &Path,
    stem: &str,
    encoding: &EncodingConfig,
) -> MediaResult<PathBuf> {
    if frames.is_empty() {
        return Err(MediaError::encode_failed("no frames to assemble"));
    }

    let (width, height) = frames[0].dimensions();
    if let Some(bad) = frames.iter().position(|f| f.dimensions() != (width, height)) {
        return Err(MediaError::encode_failed(format!(
            "frame {bad} has dimensions {:?}, expected {:?}",
            frames[bad].dimensions(),
            (width, height)
        )));
    }

    tokio::fs::create_dir_all(out_dir).await?;
    let final_path = unique_output_path(out_dir, stem, "mp4");
    let tmp_path = final_path.with_extension("mp4.tmp");

    let mut cmd = FfmpegCommand::raw_video(width, height, fps, &tmp_path)
        .format("mp4")
        .output_args(["-map", "0:v:0"]);

    if let Some(audio) = audio_source {
        cmd = cmd
            .second_input(audio)
            .output_args(["-map", "1:a:0"])
            .audio_codec(encoding.audio_codec.as_str())
            .audio_bitrate(encoding.audio_bitrate.as_str())
            .output_arg("-shortest");
    }

    cmd = cmd
        .video_codec(encoding.codec.as_str())
        .preset(encoding.preset.as_str())
        .crf(encoding.crf)
        .pix_fmt("yuv420p")
        .output_args(["-movflags", "+faststart"]);

    let mut payload = Vec::with_capacity(frames.len() * width as usize * height as usize * 3);
    for frame in frames {
        payload.extend_from_slice(frame.as_raw());
    }

    let runner = FfmpegRunner::new();
    if let Err(e) = runner.run_with_stdin(&cmd, &payload).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(e);
    }

    persist(&tmp_path, &final_path).await?;

    info!(
        "Assembled {} frames ({}x{} @ {:.3} fps) -> {}",
        frames.len(),
        width,
        height,
        fps,
        final_path.display()
    );

    Ok(final_path)
}

/// Produce a side-by-side comparison video: driving input on the left, the
/// rendered result on the right, audio carried from the driving input when
/// present.
pub async fn concat_side_by_side(
    driving: &Path,
    rendered: &Path,
    out_dir: &Path,
    stem: &str,
    encoding: &EncodingConfig,
) -> MediaResult<PathBuf> {
    tokio::fs::create_dir_all(out_dir).await?;
    let final_path = unique_output_path(out_dir, stem, "mp4");
    let tmp_path = final_path.with_extension("mp4.tmp");

    // Scale the rendered stream to the driving stream's height before
    // stacking; hstack requires equal heights.
    let filter = "[1:v][0:v]scale2ref=w=oh*mdar:h=ih[ren][drv];\
                  [drv][ren]hstack=inputs=2[v]";

    let cmd = FfmpegCommand::new(driving, &tmp_path)
        .second_input(rendered)
        .format("mp4")
        .filter_complex(filter)
        .output_args(["-map", "[v]", "-map", "0:a?"])
        .video_codec(encoding.codec.as_str())
        .preset(encoding.preset.as_str())
        .crf(encoding.crf)
        .audio_codec(encoding.audio_codec.as_str())
        .audio_bitrate(encoding.audio_bitrate.as_str())
        .pix_fmt("yuv420p")
        .output_args(["-movflags", "+faststart"]);

    let runner = FfmpegRunner::new();
    if let Err(e) = runner.run(&cmd).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(e);
    }

    persist(&tmp_path, &final_path).await?;

    info!("Concat view written -> {}", final_path.display());

    Ok(final_path)
}
