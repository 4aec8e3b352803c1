//! Highlight models.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::transcript::TranscriptSegment;

/// Which selection path produced a highlight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum HighlightOrigin {
    /// Ranked by the LLM, caption possibly rephrased
    Llm,
    /// Longest-text heuristic, caption is the cleaned transcript text
    Heuristic,
}

impl std::fmt::Display for HighlightOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HighlightOrigin::Llm => write!(f, "llm"),
            HighlightOrigin::Heuristic => write!(f, "heuristic"),
        }
    }
}

/// A transcript segment selected as caption-worthy for a theme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Highlight {
    /// Position of the originating segment in its transcript
    pub source_index: usize,

    /// Start time in seconds
    pub start: f64,

    /// End time in seconds
    pub end: f64,

    /// Transcript text the highlight was derived from
    pub original_text: String,

    /// Caption to burn into the clip
    pub caption_text: String,

    /// Selection path that produced this highlight
    pub origin: HighlightOrigin,
}

impl Highlight {
    /// Create a highlight from a transcript segment.
    pub fn from_segment(
        source_index: usize,
        segment: &TranscriptSegment,
        caption_text: impl Into<String>,
        origin: HighlightOrigin,
    ) -> Self {
        Self {
            source_index,
            start: segment.start,
            end: segment.end,
            original_text: segment.text.clone(),
            caption_text: caption_text.into(),
            origin,
        }
    }

    /// Length of the underlying segment in seconds.
    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }
}
