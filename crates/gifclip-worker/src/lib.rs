//! Caption GIF pipeline.
//!
//! This crate provides:
//! - Transcript resolution from platform captions or local speech recognition
//! - Theme-driven highlight selection (LLM ranking with a heuristic fallback)
//! - The request pipeline rendering highlights concurrently
//! - Configuration, logging, metrics and toolchain probing for the binaries

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod selector;
pub mod toolchain;
pub mod transcript;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use logging::{init_tracing, RequestLogger};
pub use pipeline::{respond, ClipFailure, Pipeline, PipelineOutcome};
pub use selector::HighlightSelector;
pub use toolchain::ToolchainReport;
pub use transcript::{CaptionSource, SpeechRetryPolicy, TranscriptResolver, YtDlpCaptionSource};
