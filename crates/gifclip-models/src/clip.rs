//! Clip models.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::highlight::Highlight;

/// Derived render window for one highlight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ClipSpec {
    /// Start of the extracted interval in source seconds
    pub source_start: f64,
    /// End of the extracted interval in source seconds (exclusive)
    pub source_end: f64,
    /// Caption to overlay
    pub caption_text: String,
    /// `min(max_duration, highlight.end - highlight.start)`
    pub render_duration: f64,
}

impl ClipSpec {
    /// Compute the render window for a highlight.
    ///
    /// Returns `None` when the window would be empty, in which case the
    /// highlight must not be rendered.
    pub fn for_highlight(highlight: &Highlight, max_duration: f64) -> Option<Self> {
        if !max_duration.is_finite() || max_duration <= 0.0 {
            return None;
        }

        let source_start = highlight.start;
        let source_end = (highlight.start + max_duration).min(highlight.end);
        if !(source_end > source_start) {
            return None;
        }

        Some(Self {
            source_start,
            source_end,
            caption_text: highlight.caption_text.clone(),
            render_duration: source_end - source_start,
        })
    }
}

/// A finished looping GIF.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RenderedClip {
    /// File name of the artifact (`<uuid>.gif`)
    pub identifier: String,

    /// Absolute or work-dir relative path of the artifact
    pub path: PathBuf,

    /// File size in bytes
    pub byte_size: u64,

    /// Output width in pixels
    pub width: u32,

    /// Output height in pixels (0 if the source size was unknown)
    pub height: u32,

    /// Output frame rate
    pub frame_rate: u32,

    /// Rendered duration in seconds
    pub duration_seconds: f64,

    /// Transcript index of the highlight this clip shows
    pub source_index: usize,

    /// When the artifact was written
    pub created_at: DateTime<Utc>,
}
