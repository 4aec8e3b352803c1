//! Structured request logging and tracing setup.

use tracing::{error, info, warn, Span};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

/// Install the global tracing subscriber.
///
/// `LOG_FORMAT=json` switches to JSON lines; otherwise ANSI text. Output
/// goes to stderr so the CLI can keep stdout for its JSON response.
pub fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("gifclip=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

/// Logger carrying one request's id and the stage being run.
#[derive(Debug, Clone)]
pub struct RequestLogger {
    request_id: String,
    stage: String,
}

impl RequestLogger {
    /// Logger with a fresh request id.
    pub fn new(stage: &str) -> Self {
        Self::with_id(&Uuid::new_v4().to_string(), stage)
    }

    pub fn with_id(request_id: &str, stage: &str) -> Self {
        Self {
            request_id: request_id.to_string(),
            stage: stage.to_string(),
        }
    }

    /// Same request, different stage.
    pub fn for_stage(&self, stage: &str) -> Self {
        Self::with_id(&self.request_id, stage)
    }

    pub fn log_start(&self, message: &str) {
        info!(
            request_id = %self.request_id,
            stage = %self.stage,
            "Started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            request_id = %self.request_id,
            stage = %self.stage,
            "Progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            request_id = %self.request_id,
            stage = %self.stage,
            "Warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            request_id = %self.request_id,
            stage = %self.stage,
            "Error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            request_id = %self.request_id,
            stage = %self.stage,
            "Completed: {}", message
        );
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// Span tagging everything logged inside it with the request id.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "request",
            request_id = %self.request_id,
            stage = %self.stage
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logger_ids() {
        let a = RequestLogger::new("pipeline");
        let b = RequestLogger::new("pipeline");
        assert_ne!(a.request_id(), b.request_id());
        assert!(Uuid::parse_str(a.request_id()).is_ok());
    }

    #[test]
    fn test_for_stage_keeps_id() {
        let logger = RequestLogger::with_id("req-1", "transcript");
        let render = logger.for_stage("render");
        assert_eq!(render.request_id(), "req-1");
        assert_eq!(render.stage(), "render");
    }
}
