//! Media loading: still images and ordered in-memory frame sequences.

use std::path::Path;
use std::process::Stdio;

use image::RgbImage;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::{MediaError, MediaResult};
use crate::probe::{probe_video, VideoInfo};

/// Load and decode a still image into RGB.
pub fn load_image(path: impl AsRef<Path>) -> MediaResult<RgbImage> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }
    let img = image::open(path)
        .map_err(|e| MediaError::invalid_image(format!("{}: {e}", path.display())))?;
    Ok(img.to_rgb8())
}

/// Decode a video into an ordered sequence of RGB frames.
///
/// Frames are streamed out of FFmpeg as raw rgb24 and split on frame
/// boundaries; a trailing partial frame means the decode was cut short and is
/// reported as an invalid video rather than silently dropped.
pub async fn decode_frames(path: impl AsRef<Path>) -> MediaResult<(VideoInfo, Vec<RgbImage>)> {
    let path = path.as_ref();
    let info = probe_video(path).await?;

    if info.width == 0 || info.height == 0 {
        return Err(MediaError::invalid_video(format!(
            "{}: zero-sized video stream",
            path.display()
        )));
    }

    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;

    debug!(
        "Decoding frames: {} ({}x{} @ {:.3} fps)",
        path.display(),
        info.width,
        info.height,
        info.fps
    );

    let output = Command::new("ffmpeg")
        .args(["-v", "error", "-i"])
        .arg(path)
        .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1"])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::ffmpeg_failed(
            format!("Frame decode failed for {}", path.display()),
            Some(String::from_utf8_lossy(&output.stderr).to_string()),
            output.status.code(),
        ));
    }

    let frame_len = info.width as usize * info.height as usize * 3;
    let data = output.stdout;

    if data.len() % frame_len != 0 {
        return Err(MediaError::invalid_video(format!(
            "{}: truncated frame data ({} trailing bytes)",
            path.display(),
            data.len() % frame_len
        )));
    }

    let frames: Vec<RgbImage> = data
        .chunks_exact(frame_len)
        .map(|chunk| {
            // chunks_exact guarantees the length matches the dimensions
            RgbImage::from_raw(info.width, info.height, chunk.to_vec())
                .ok_or_else(|| MediaError::invalid_video("frame buffer size mismatch"))
        })
        .collect::<MediaResult<_>>()?;

    if reported_count_differs(frames.len(), info.frame_count) {
        warn!(
            "Decoded {} frames but the container reported {} for {}",
            frames.len(),
            info.frame_count,
            path.display()
        );
    }

    info!(
        "Decoded {} frames from {} ({:.2}s @ {:.3} fps)",
        frames.len(),
        path.display(),
        info.duration,
        info.fps
    );

    Ok((info, frames))
}

/// Container-reported frame counts are advisory; zero means unknown.
fn reported_count_differs(decoded: usize, reported: u64) -> bool {
    reported > 0 && decoded as u64 != reported
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_count_mismatch_only_flagged_when_reported() {
        assert!(!reported_count_differs(10, 0));
        assert!(!reported_count_differs(10, 10));
        assert!(reported_count_differs(9, 10));
        assert!(reported_count_differs(11, 10));
    }

    #[test]
    fn missing_image_is_not_found() {
        let err = load_image("/nonexistent/portrait.png").unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }

    #[test]
    fn undecodable_image_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.png");
        std::fs::write(&path, b"not an image").unwrap();
        let err = load_image(&path).unwrap_err();
        assert!(matches!(err, MediaError::InvalidImage(_)));
    }
}
