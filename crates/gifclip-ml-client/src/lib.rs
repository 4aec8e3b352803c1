//! Model-backed collaborators for the GifClip pipeline.
//!
//! - [`OpenAiClient`]: chat completions against an OpenAI-compatible API,
//!   used to rank transcript segments for a theme.
//! - [`WhisperEngine`]: local speech-to-text through a long-lived Python
//!   Whisper worker process.

pub mod error;
pub mod llm;
pub mod stt;

pub use error::{MlError, MlResult};
pub use llm::{ChatMessage, ChatRole, LlmClient, LlmClientConfig, OpenAiClient};
pub use stt::{SpeechSegment, SpeechToTextEngine, TranscribeOptions, WhisperConfig, WhisperEngine};
