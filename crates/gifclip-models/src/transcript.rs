//! Transcript models.

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};

/// A timed span of spoken text.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct TranscriptSegment {
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds (never before `start`)
    pub end: f64,
    /// Raw text as produced by the caption source or speech engine
    pub text: String,
}

impl TranscriptSegment {
    /// Create a segment. An `end` before `start` is clamped to `start`.
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        let start = if start.is_finite() { start.max(0.0) } else { 0.0 };
        let end = if end.is_finite() { end.max(start) } else { start };
        Self {
            start,
            end,
            text: text.into(),
        }
    }

    /// Segment length in seconds.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Text with surrounding whitespace removed.
    pub fn trimmed_text(&self) -> &str {
        self.text.trim()
    }

    /// Whether the segment carries any non-whitespace text.
    pub fn has_text(&self) -> bool {
        !self.trimmed_text().is_empty()
    }
}

/// Time-ordered transcript of a video.
///
/// Segments are kept in non-decreasing `start` order. Overlapping segments
/// are tolerated; equal starts keep the order they were supplied in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, JsonSchema)]
pub struct Transcript {
    segments: Vec<TranscriptSegment>,
    /// Total duration of the source media (0 if unknown)
    pub source_duration_seconds: f64,
}

impl Transcript {
    /// Build a transcript, ordering segments by start time.
    pub fn new(mut segments: Vec<TranscriptSegment>, source_duration_seconds: f64) -> Self {
        // Stable: ties keep upstream order.
        segments.sort_by(|a, b| a.start.total_cmp(&b.start));
        Self {
            segments,
            source_duration_seconds: source_duration_seconds.max(0.0),
        }
    }

    /// Ordered segments.
    pub fn segments(&self) -> &[TranscriptSegment] {
        &self.segments
    }

    /// Segment at `index`, if any.
    pub fn get(&self, index: usize) -> Option<&TranscriptSegment> {
        self.segments.get(index)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TranscriptSegment> {
        self.segments.iter()
    }
}

/// Wire form, normalized through the constructors on the way in.
#[derive(Deserialize)]
struct RawSegment {
    start: f64,
    end: f64,
    text: String,
}

#[derive(Deserialize)]
struct RawTranscript {
    #[serde(default)]
    segments: Vec<TranscriptSegment>,
    #[serde(default)]
    source_duration_seconds: f64,
}

impl<'de> Deserialize<'de> for TranscriptSegment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawSegment::deserialize(deserializer)?;
        Ok(Self::new(raw.start, raw.end, raw.text))
    }
}

impl<'de> Deserialize<'de> for Transcript {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawTranscript::deserialize(deserializer)?;
        Ok(Self::new(raw.segments, raw.source_duration_seconds))
    }
}
