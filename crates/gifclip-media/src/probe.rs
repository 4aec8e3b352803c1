//! FFprobe video information and opened media handles.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::warn;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// Video file information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    /// Duration in seconds
    pub duration: f64,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Frame rate (fps)
    pub fps: f64,
    /// Video codec
    pub codec: String,
    /// File size in bytes
    pub size: u64,
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    size: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_read_frames: Option<String>,
    #[serde(default)]
    side_data_list: Vec<FfprobeSideData>,
    #[serde(default)]
    tags: FfprobeStreamTags,
}

#[derive(Debug, Deserialize)]
struct FfprobeSideData {
    rotation: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeStreamTags {
    rotate: Option<String>,
}

impl FfprobeStream {
    /// Display rotation in degrees, from the display matrix or the legacy
    /// `rotate` tag.
    fn rotation(&self) -> f64 {
        self.side_data_list
            .iter()
            .find_map(|d| d.rotation)
            .or_else(|| self.tags.rotate.as_ref().and_then(|r| r.trim().parse().ok()))
            .unwrap_or(0.0)
    }

    /// Whether the stored frame is displayed rotated by a quarter turn.
    fn is_quarter_turn(&self) -> bool {
        let turns = (self.rotation() / 90.0).round() as i64;
        turns.rem_euclid(2) == 1
    }
}

#[derive(Debug, Deserialize)]
struct FfprobeStreamsOnly {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

/// Probe a video file for information.
pub async fn probe_video(path: impl AsRef<Path>) -> MediaResult<VideoInfo> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    let ffprobe = check_ffprobe()?;

    let output = Command::new(ffprobe)
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: "FFprobe failed".to_string(),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    parse_probe_output(&output.stdout)
}

fn parse_probe_output(stdout: &[u8]) -> MediaResult<VideoInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(stdout)?;

    let video_stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| MediaError::InvalidVideo("No video stream found".to_string()))?;

    let duration = probe
        .format
        .duration
        .as_ref()
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
        .unwrap_or(0.0);

    let size = probe
        .format
        .size
        .as_ref()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0);

    let fps = video_stream
        .avg_frame_rate
        .as_ref()
        .and_then(|r| parse_frame_rate(r))
        .or_else(|| video_stream.r_frame_rate.as_ref().and_then(|r| parse_frame_rate(r)))
        .unwrap_or(0.0);

    // FFmpeg autorotates on decode, so report the displayed size.
    let (width, height) = (video_stream.width.unwrap_or(0), video_stream.height.unwrap_or(0));
    let (width, height) = if video_stream.is_quarter_turn() {
        (height, width)
    } else {
        (width, height)
    };

    Ok(VideoInfo {
        duration,
        width,
        height,
        fps,
        codec: video_stream.codec_name.clone().unwrap_or_default(),
        size,
    })
}

/// Count decoded frames of the first video stream.
///
/// Decodes the whole stream, so only use it on short outputs.
pub async fn probe_frame_count(path: impl AsRef<Path>) -> MediaResult<u64> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    let ffprobe = check_ffprobe()?;

    let output = Command::new(ffprobe)
        .args([
            "-v",
            "error",
            "-count_frames",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=codec_type,nb_read_frames",
            "-print_format",
            "json",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: "FFprobe frame count failed".to_string(),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    let probe: FfprobeStreamsOnly = serde_json::from_slice(&output.stdout)?;
    probe
        .streams
        .iter()
        .find_map(|s| s.nb_read_frames.as_ref().and_then(|n| n.parse().ok()))
        .ok_or_else(|| MediaError::InvalidVideo("No frame count reported".to_string()))
}

/// Parse frame rate string (e.g., "30/1" or "29.97").
fn parse_frame_rate(s: &str) -> Option<f64> {
    if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den > 0.0 && num > 0.0 {
            return Some(num / den);
        }
        return None;
    }
    s.parse().ok().filter(|f: &f64| *f > 0.0)
}

/// An opened source video.
///
/// Probe failures are tolerated: the handle still exists, but duration and
/// dimensions are unknown.
#[derive(Debug, Clone)]
pub struct MediaHandle {
    path: PathBuf,
    info: Option<VideoInfo>,
}

impl MediaHandle {
    /// Open a local video file.
    pub async fn open(path: impl AsRef<Path>) -> MediaResult<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(MediaError::FileNotFound(path.to_path_buf()));
        }

        let info = match probe_video(path).await {
            Ok(info) => Some(info),
            Err(e) => {
                warn!(path = %path.display(), "Could not probe video, duration unknown: {}", e);
                None
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            info,
        })
    }

    /// Build a handle from already known parts.
    pub fn from_parts(path: impl Into<PathBuf>, info: Option<VideoInfo>) -> Self {
        Self {
            path: path.into(),
            info,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn info(&self) -> Option<&VideoInfo> {
        self.info.as_ref()
    }

    /// Source duration in seconds, 0 when unknown.
    pub fn duration_seconds(&self) -> f64 {
        self.info.as_ref().map(|i| i.duration).unwrap_or(0.0)
    }

    /// Frame dimensions, when known.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.info
            .as_ref()
            .filter(|i| i.width > 0 && i.height > 0)
            .map(|i| (i.width, i.height))
    }
}
