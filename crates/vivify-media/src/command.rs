//! FFmpeg command builder and runner.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::debug;

use crate::error::{MediaError, MediaResult};

/// Primary input of an FFmpeg command.
#[derive(Debug, Clone)]
enum Input {
    /// An existing media file.
    File(PathBuf),
    /// Raw rgb24 frames written to stdin.
    RawVideo { width: u32, height: u32, fps: f64 },
}

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Primary input
    input: Input,
    /// Optional secondary input (audio source for muxing)
    audio_input: Option<PathBuf>,
    /// Output file path
    output: PathBuf,
    /// Input arguments (before the first -i)
    input_args: Vec<String>,
    /// Output arguments (after inputs)
    output_args: Vec<String>,
    /// Whether to overwrite output
    overwrite: bool,
    /// Log level
    log_level: String,
}

impl FfmpegCommand {
    /// Create a command reading from a media file.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: Input::File(input.as_ref().to_path_buf()),
            audio_input: None,
            output: output.as_ref().to_path_buf(),
            input_args: Vec::new(),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
        }
    }

    /// Create a command fed raw rgb24 frames via stdin.
    pub fn raw_video(width: u32, height: u32, fps: f64, output: impl AsRef<Path>) -> Self {
        Self {
            input: Input::RawVideo { width, height, fps },
            audio_input: None,
            output: output.as_ref().to_path_buf(),
            input_args: Vec::new(),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
        }
    }

    /// Add a secondary input (audio source for muxing, or a second video
    /// stream for filter graphs).
    pub fn second_input(mut self, path: impl AsRef<Path>) -> Self {
        self.audio_input = Some(path.as_ref().to_path_buf());
        self
    }

    /// Add an input argument (before -i).
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        self.input_args.push(arg.into());
        self
    }

    /// Add an output argument (after inputs).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set video filter.
    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    /// Set filter complex.
    pub fn filter_complex(self, filter: impl Into<String>) -> Self {
        self.output_arg("-filter_complex").output_arg(filter)
    }

    /// Set video codec.
    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    /// Set audio codec.
    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:a").output_arg(codec)
    }

    /// Set CRF (quality).
    pub fn crf(self, crf: u8) -> Self {
        self.output_arg("-crf").output_arg(crf.to_string())
    }

    /// Set preset.
    pub fn preset(self, preset: impl Into<String>) -> Self {
        self.output_arg("-preset").output_arg(preset)
    }

    /// Set audio bitrate.
    pub fn audio_bitrate(self, bitrate: impl Into<String>) -> Self {
        self.output_arg("-b:a").output_arg(bitrate)
    }

    /// Set output pixel format.
    pub fn pix_fmt(self, fmt: impl Into<String>) -> Self {
        self.output_arg("-pix_fmt").output_arg(fmt)
    }

    /// Force the output container format.
    ///
    /// Required when writing to a `.tmp` path where FFmpeg cannot infer the
    /// muxer from the extension.
    pub fn format(self, fmt: impl Into<String>) -> Self {
        self.output_arg("-f").output_arg(fmt)
    }

    /// Set log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Whether this command expects raw frames on stdin.
    pub fn takes_stdin(&self) -> bool {
        matches!(self.input, Input::RawVideo { .. })
    }

    /// Bytes per raw frame, if this is a raw-video command.
    pub fn raw_frame_len(&self) -> Option<usize> {
        match self.input {
            Input::RawVideo { width, height, .. } => Some(width as usize * height as usize * 3),
            Input::File(_) => None,
        }
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-v".to_string());
        args.push(self.log_level.clone());

        args.extend(self.input_args.clone());

        match &self.input {
            Input::File(path) => {
                args.push("-i".to_string());
                args.push(path.to_string_lossy().to_string());
            }
            Input::RawVideo { width, height, fps } => {
                args.push("-f".to_string());
                args.push("rawvideo".to_string());
                args.push("-pix_fmt".to_string());
                args.push("rgb24".to_string());
                args.push("-s".to_string());
                args.push(format!("{width}x{height}"));
                args.push("-r".to_string());
                args.push(format!("{fps:.6}"));
                args.push("-i".to_string());
                args.push("pipe:0".to_string());
            }
        }

        if let Some(audio) = &self.audio_input {
            args.push("-i".to_string());
            args.push(audio.to_string_lossy().to_string());
        }

        args.extend(self.output_args.clone());

        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

/// Runner for FFmpeg commands.
#[derive(Debug, Default)]
pub struct FfmpegRunner;

impl FfmpegRunner {
    /// Create a new runner.
    pub fn new() -> Self {
        Self
    }

    /// Run an FFmpeg command with no stdin payload.
    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        self.run_inner(cmd, None).await
    }

    /// Run an FFmpeg command, writing `stdin_payload` to the process before
    /// waiting for completion. Used for raw-frame encoding.
    pub async fn run_with_stdin(&self, cmd: &FfmpegCommand, payload: &[u8]) -> MediaResult<()> {
        self.run_inner(cmd, Some(payload)).await
    }

    async fn run_inner(&self, cmd: &FfmpegCommand, payload: Option<&[u8]>) -> MediaResult<()> {
        which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;

        let args = cmd.build_args();
        debug!("Running FFmpeg: ffmpeg {}", args.join(" "));

        let stdin = if cmd.takes_stdin() {
            Stdio::piped()
        } else {
            Stdio::null()
        };

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(stdin)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        // Drain stderr concurrently with the stdin write: ffmpeg interleaves
        // log output with input consumption, and a full stderr pipe would
        // stall it while it still has stdin left to read.
        let stderr_pipe = child.stderr.take();
        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            if let Some(mut pipe) = stderr_pipe {
                let _ = pipe.read_to_string(&mut buf).await;
            }
            buf
        });

        if let Some(payload) = payload {
            let mut handle = child
                .stdin
                .take()
                .ok_or_else(|| MediaError::encode_failed("FFmpeg stdin not captured"))?;
            // A broken pipe here means ffmpeg died early; the stderr capture
            // carries the actual cause.
            let _ = handle.write_all(payload).await;
            let _ = handle.shutdown().await;
        }

        let status = child.wait().await?;
        let stderr = stderr_task.await.unwrap_or_default();

        if status.success() {
            Ok(())
        } else {
            Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with non-zero status",
                Some(stderr),
                status.code(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_input_args_order() {
        let cmd = FfmpegCommand::new("/in.mp4", "/out.mp4")
            .video_codec("libx264")
            .crf(18);
        let args = cmd.build_args();
        assert_eq!(args[0], "-y");
        let i = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(args[i + 1], "/in.mp4");
        assert!(i < args.iter().position(|a| a == "-c:v").unwrap());
        assert_eq!(args.last().unwrap(), "/out.mp4");
    }

    #[test]
    fn raw_video_input_reads_stdin() {
        let cmd = FfmpegCommand::raw_video(640, 480, 25.0, "/out.tmp").format("mp4");
        assert!(cmd.takes_stdin());
        assert_eq!(cmd.raw_frame_len(), Some(640 * 480 * 3));
        let args = cmd.build_args();
        assert!(args.windows(2).any(|w| w == ["-s", "640x480"]));
        assert!(args.windows(2).any(|w| w == ["-i", "pipe:0"]));
        assert!(args.windows(2).any(|w| w == ["-f", "mp4"]));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stderr_flood_does_not_stall_a_stdin_encode() {
        use std::os::unix::fs::PermissionsExt;

        // Stand-in ffmpeg that fills the stderr pipe well past its buffer
        // before touching stdin, then drains stdin and fails.
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("ffmpeg");
        std::fs::write(
            &fake,
            "#!/bin/sh\nhead -c 262144 /dev/zero | tr '\\0' 'e' >&2\ncat > /dev/null\nexit 1\n",
        )
        .unwrap();
        std::fs::set_permissions(&fake, std::fs::Permissions::from_mode(0o755)).unwrap();

        let old_path = std::env::var("PATH").unwrap_or_default();
        std::env::set_var("PATH", format!("{}:{old_path}", dir.path().display()));

        let cmd = FfmpegCommand::raw_video(64, 64, 25.0, dir.path().join("out.mp4"));
        let payload = vec![0u8; 4 * 1024 * 1024];
        let result = tokio::time::timeout(
            std::time::Duration::from_secs(10),
            FfmpegRunner::new().run_with_stdin(&cmd, &payload),
        )
        .await
        .expect("encode must fail fast, not hang on a full stderr pipe");

        std::env::set_var("PATH", old_path);

        match result {
            Err(MediaError::FfmpegFailed { stderr, .. }) => {
                assert!(stderr.unwrap_or_default().contains('e'));
            }
            other => panic!("expected FfmpegFailed, got {other:?}"),
        }
    }

    #[test]
    fn second_input_follows_primary_input() {
        let cmd = FfmpegCommand::raw_video(64, 64, 30.0, "/out.tmp").second_input("/drive.mp4");
        let args = cmd.build_args();
        let inputs: Vec<usize> = args
            .iter()
            .enumerate()
            .filter(|(_, a)| *a == "-i")
            .map(|(i, _)| i)
            .collect();
        assert_eq!(inputs.len(), 2);
        assert_eq!(args[inputs[0] + 1], "pipe:0");
        assert_eq!(args[inputs[1] + 1], "/drive.mp4");
    }
}
