//! Shared data models for the GifClip pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Transcripts and their timed segments
//! - Highlights selected for a theme
//! - Clip specs and rendered clip artifacts
//! - Encoding constants for the caption overlay and GIF output
//! - The request/response surface consumed from the front end

pub mod clip;
pub mod encoding;
pub mod highlight;
pub mod request;
pub mod transcript;
pub mod utils;

// Re-export common types
pub use clip::{ClipSpec, RenderedClip};
pub use encoding::{CaptionStyle, GifEncodingConfig, IntermediateEncodingConfig};
pub use highlight::{Highlight, HighlightOrigin};
pub use request::{ClipRequest, ClipResponse, ErrorKind, VideoSource};
pub use transcript::{Transcript, TranscriptSegment};
pub use utils::{is_clip_identifier, is_remote_reference, new_clip_identifier};
