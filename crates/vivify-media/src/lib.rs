#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper for the vivify pipeline.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building, including raw-frame stdin input
//! - FFprobe metadata (dimensions, fps, audio presence)
//! - Decoding a video into an ordered in-memory frame sequence
//! - Assembling frames back into a video with the original audio track,
//!   using temp-file-then-rename so a failed encode never leaves a partial
//!   artifact under the final name
//! - Crop extraction and bilinear sampling on `image::RgbImage`

pub mod assemble;
pub mod command;
pub mod error;
pub mod frames;
pub mod fs_utils;
pub mod imageops;
pub mod probe;

pub use assemble::{assemble, concat_side_by_side};
pub use command::{FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use frames::{decode_frames, load_image};
pub use fs_utils::{persist, unique_output_path};
pub use imageops::{bilinear_sample, extract_crop};
pub use probe::{probe_video, VideoInfo};
