//! Worker error types.

use gifclip_media::MediaError;
use gifclip_models::ErrorKind;
use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Transcript unavailable: {message}")]
    TranscriptUnavailable {
        message: String,
        /// Probed source duration, kept for telemetry
        source_duration: f64,
    },

    #[error("Selection failed: {0}")]
    SelectionFailed(String),

    #[error("Render failed: {0}")]
    RenderFailed(String),

    #[error("Toolchain missing: {0}")]
    ToolchainMissing(String),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn source_unavailable(msg: impl Into<String>) -> Self {
        Self::SourceUnavailable(msg.into())
    }

    pub fn transcript_unavailable(msg: impl Into<String>, source_duration: f64) -> Self {
        Self::TranscriptUnavailable {
            message: msg.into(),
            source_duration,
        }
    }

    pub fn selection_failed(msg: impl Into<String>) -> Self {
        Self::SelectionFailed(msg.into())
    }

    pub fn render_failed(msg: impl Into<String>) -> Self {
        Self::RenderFailed(msg.into())
    }

    pub fn toolchain_missing(msg: impl Into<String>) -> Self {
        Self::ToolchainMissing(msg.into())
    }

    /// Category reported to the caller.
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkerError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            WorkerError::SourceUnavailable(_) => ErrorKind::SourceUnavailable,
            WorkerError::TranscriptUnavailable { .. } => ErrorKind::TranscriptUnavailable,
            WorkerError::SelectionFailed(_) => ErrorKind::SelectionFailed,
            WorkerError::RenderFailed(_) => ErrorKind::RenderFailed,
            WorkerError::ToolchainMissing(_) => ErrorKind::ToolchainMissing,
            WorkerError::Media(e) if e.is_tool_missing() => ErrorKind::ToolchainMissing,
            WorkerError::Media(_) | WorkerError::Io(_) => ErrorKind::SourceUnavailable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            WorkerError::transcript_unavailable("none", 12.0).kind(),
            ErrorKind::TranscriptUnavailable
        );
        assert_eq!(
            WorkerError::Media(MediaError::YtDlpNotFound).kind(),
            ErrorKind::ToolchainMissing
        );
        assert_eq!(
            WorkerError::Media(MediaError::FileNotFound(PathBuf::from("/x.mp4"))).kind(),
            ErrorKind::SourceUnavailable
        );
        assert_eq!(
            WorkerError::Media(MediaError::download_failed("private video")).kind(),
            ErrorKind::SourceUnavailable
        );
    }
}
