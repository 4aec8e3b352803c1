#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper for caption GIF rendering.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - Progress parsing from `-progress pipe:2`
//! - Timeout support via tokio
//! - FFprobe metadata and frame counting
//! - yt-dlp video download and subtitle fetching
//! - Caption layout and the overlay filter chain
//! - Clip rendering to looping palette GIFs

pub mod caption;
pub mod command;
pub mod download;
pub mod error;
pub mod probe;
pub mod progress;
pub mod render;
pub mod subtitles;

pub use caption::{caption_font_size, CaptionLayout};
pub use command::{check_ffmpeg, check_ffprobe, check_ytdlp, FfmpegCommand, FfmpegRunner};
pub use download::download_video;
pub use error::{MediaError, MediaResult};
pub use probe::{probe_frame_count, probe_video, MediaHandle, VideoInfo};
pub use progress::FfmpegProgress;
pub use render::{ClipRenderer, FfmpegClipRenderer, RenderConfig};
pub use subtitles::{fetch_subtitles, parse_vtt, CaptionCue};
