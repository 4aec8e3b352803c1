//! Pipeline metrics.

use std::net::SocketAddr;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Metric names as constants for consistency.
pub mod names {
    pub const REQUESTS_TOTAL: &str = "gifclip_requests_total";
    pub const TRANSCRIPTS_TOTAL: &str = "gifclip_transcripts_total";
    pub const HIGHLIGHT_SELECTION_TOTAL: &str = "gifclip_highlight_selection_total";
    pub const CLIPS_RENDERED_TOTAL: &str = "gifclip_clips_rendered_total";
    pub const CLIPS_FAILED_TOTAL: &str = "gifclip_clips_failed_total";
    pub const RENDER_DURATION_SECONDS: &str = "gifclip_render_duration_seconds";
}

/// Serve Prometheus metrics on `addr`.
pub fn install_exporter(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()
}

/// Record a finished request; `outcome` is `success`, `partial` or an error kind.
pub fn record_request(outcome: &str) {
    let labels = [("outcome", outcome.to_string())];
    counter!(names::REQUESTS_TOTAL, &labels).increment(1);
}

/// Record where a transcript came from (`captions` or `speech`).
pub fn record_transcript(source: &str) {
    let labels = [("source", source.to_string())];
    counter!(names::TRANSCRIPTS_TOTAL, &labels).increment(1);
}

/// Record which selection path produced the highlights.
pub fn record_selection(origin: &str) {
    let labels = [("origin", origin.to_string())];
    counter!(names::HIGHLIGHT_SELECTION_TOTAL, &labels).increment(1);
}

pub fn record_clip_rendered(duration_secs: f64) {
    counter!(names::CLIPS_RENDERED_TOTAL).increment(1);
    histogram!(names::RENDER_DURATION_SECONDS).record(duration_secs);
}

pub fn record_clip_failed() {
    counter!(names::CLIPS_FAILED_TOTAL).increment(1);
}
