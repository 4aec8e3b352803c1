//! Request/response surface consumed from the front end.

use std::path::PathBuf;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::encoding::{DEFAULT_CLIP_COUNT, DEFAULT_MAX_CLIP_SECONDS};
use crate::utils::is_remote_reference;

/// Where the source video comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VideoSource {
    /// A file already saved on local disk
    Upload { path: PathBuf },
    /// A remote video page (downloaded with yt-dlp; may carry captions)
    Remote { url: String },
}

impl VideoSource {
    /// Remote reference usable for caption lookup, if any.
    pub fn remote_reference(&self) -> Option<&str> {
        match self {
            VideoSource::Upload { .. } => None,
            VideoSource::Remote { url } => Some(url.as_str()),
        }
    }
}

/// A request to turn one video into themed caption GIFs.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate)]
pub struct ClipRequest {
    /// Short thematic prompt, e.g. "funny moments"
    #[validate(length(min = 1, max = 500), custom(function = "validate_not_blank"))]
    pub theme_prompt: String,

    #[validate(custom(function = "validate_video_source"))]
    pub video_source: VideoSource,

    /// Maximum number of clips to produce
    #[serde(default = "default_clip_count")]
    #[validate(range(min = 1, max = 10))]
    pub clip_count: usize,

    /// Maximum length of each clip in seconds
    #[serde(default = "default_max_clip_seconds")]
    #[validate(range(exclusive_min = 0.0, max = 30.0))]
    pub max_clip_seconds: f64,
}

fn default_clip_count() -> usize {
    DEFAULT_CLIP_COUNT
}

fn default_max_clip_seconds() -> f64 {
    DEFAULT_MAX_CLIP_SECONDS
}

fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

fn validate_video_source(source: &VideoSource) -> Result<(), ValidationError> {
    match source {
        VideoSource::Upload { path } if path.as_os_str().is_empty() => {
            Err(ValidationError::new("empty_upload_path"))
        }
        VideoSource::Remote { url } if !is_remote_reference(url) => {
            Err(ValidationError::new("invalid_remote_url"))
        }
        _ => Ok(()),
    }
}

impl ClipRequest {
    /// Create a request with default count and clip length.
    pub fn new(theme_prompt: impl Into<String>, video_source: VideoSource) -> Self {
        Self {
            theme_prompt: theme_prompt.into(),
            video_source,
            clip_count: DEFAULT_CLIP_COUNT,
            max_clip_seconds: DEFAULT_MAX_CLIP_SECONDS,
        }
    }

    pub fn with_clip_count(mut self, clip_count: usize) -> Self {
        self.clip_count = clip_count;
        self
    }

    pub fn with_max_clip_seconds(mut self, seconds: f64) -> Self {
        self.max_clip_seconds = seconds;
        self
    }
}

/// Error categories surfaced to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Request failed validation
    InvalidRequest,
    /// Media could not be obtained or opened
    SourceUnavailable,
    /// Neither captions nor speech recognition yielded segments
    TranscriptUnavailable,
    /// No selectable non-empty segments exist
    SelectionFailed,
    /// No clip could be rendered
    RenderFailed,
    /// A required external binary is absent
    ToolchainMissing,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::SourceUnavailable => "source_unavailable",
            ErrorKind::TranscriptUnavailable => "transcript_unavailable",
            ErrorKind::SelectionFailed => "selection_failed",
            ErrorKind::RenderFailed => "render_failed",
            ErrorKind::ToolchainMissing => "toolchain_missing",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response returned for a [`ClipRequest`].
///
/// Success: `{success: true, clip_identifiers, source_duration_seconds, ...}`.
/// Failure: `{success: false, error_kind, message}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ClipResponse {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clip_identifiers: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_duration_seconds: Option<f64>,

    /// Number of highlights that were selected for rendering
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_clips: Option<usize>,

    /// True when some, but not all, selected highlights rendered
    #[serde(default)]
    pub partial: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ClipResponse {
    /// Build a success response.
    pub fn success(
        clip_identifiers: Vec<String>,
        source_duration_seconds: f64,
        requested_clips: usize,
    ) -> Self {
        let partial = clip_identifiers.len() < requested_clips;
        Self {
            success: true,
            clip_identifiers: Some(clip_identifiers),
            source_duration_seconds: Some(source_duration_seconds),
            requested_clips: Some(requested_clips),
            partial,
            error_kind: None,
            message: None,
        }
    }

    /// Build a hard-failure response.
    pub fn failure(error_kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            success: false,
            clip_identifiers: None,
            source_duration_seconds: None,
            requested_clips: None,
            partial: false,
            error_kind: Some(error_kind),
            message: Some(message.into()),
        }
    }
}
