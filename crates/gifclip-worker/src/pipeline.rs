//! Request pipeline: transcript, selection, then rendering.
//!
//! Stages run strictly in order. Transcript and selection failures abort the
//! request. Individual render failures are recorded and the remaining clips
//! are still returned.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use gifclip_media::{download_video, ClipRenderer, FfmpegClipRenderer, MediaHandle};
use gifclip_ml_client::{LlmClient, SpeechToTextEngine};
use gifclip_models::{ClipRequest, ClipResponse, ClipSpec, Highlight, RenderedClip, VideoSource};
use tempfile::TempDir;
use tokio::sync::Semaphore;
use tracing::Instrument;
use validator::Validate;

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::RequestLogger;
use crate::metrics;
use crate::selector::HighlightSelector;
use crate::toolchain::ToolchainReport;
use crate::transcript::{CaptionSource, SpeechRetryPolicy, TranscriptResolver, YtDlpCaptionSource};

/// A highlight that was attempted but did not render.
#[derive(Debug, Clone)]
pub struct ClipFailure {
    pub source_index: usize,
    pub message: String,
}

/// Result of a pipeline run that got past selection.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    /// Rendered clips, in highlight order
    pub clips: Vec<RenderedClip>,
    pub failures: Vec<ClipFailure>,
    pub source_duration: f64,
    /// Number of highlights selected
    pub selected: usize,
}

impl PipelineOutcome {
    pub fn is_partial(&self) -> bool {
        self.clips.len() < self.selected
    }

    pub fn respond(&self) -> ClipResponse {
        ClipResponse::success(
            self.clips.iter().map(|c| c.identifier.clone()).collect(),
            self.source_duration,
            self.selected,
        )
    }
}

/// Map a pipeline result onto the caller-facing response.
pub fn respond(result: &WorkerResult<PipelineOutcome>) -> ClipResponse {
    match result {
        Ok(outcome) => outcome.respond(),
        Err(e) => ClipResponse::failure(e.kind(), e.to_string()),
    }
}

/// Sequences transcript resolution, highlight selection and rendering.
pub struct Pipeline {
    config: WorkerConfig,
    resolver: TranscriptResolver,
    selector: HighlightSelector,
    renderer: Arc<dyn ClipRenderer>,
    render_slots: Semaphore,
    toolchain: ToolchainReport,
}

impl Pipeline {
    pub fn new(
        config: WorkerConfig,
        resolver: TranscriptResolver,
        selector: HighlightSelector,
        renderer: Arc<dyn ClipRenderer>,
        toolchain: ToolchainReport,
    ) -> Self {
        let render_slots = Semaphore::new(config.max_render_parallel.max(1));
        Self {
            config,
            resolver,
            selector,
            renderer,
            render_slots,
            toolchain,
        }
    }

    /// Wire the production collaborators: yt-dlp captions, FFmpeg rendering
    /// and a toolchain probe of the current `PATH`.
    pub fn from_config(
        config: WorkerConfig,
        speech: Arc<dyn SpeechToTextEngine>,
        llm: Option<Arc<dyn LlmClient>>,
    ) -> Self {
        let toolchain = ToolchainReport::probe(speech.is_available(), llm.is_some());
        let captions: Arc<dyn CaptionSource> = Arc::new(YtDlpCaptionSource::new(&config.work_dir));
        let resolver = TranscriptResolver::new(
            Some(captions),
            speech,
            config.caption_languages.clone(),
            SpeechRetryPolicy::two_tier(&config.stt_fallback_language),
        );
        let renderer = Arc::new(FfmpegClipRenderer::new(config.render_config()));

        Self::new(config, resolver, HighlightSelector::new(llm), renderer, toolchain)
    }

    pub fn toolchain(&self) -> &ToolchainReport {
        &self.toolchain
    }

    /// Run `request` and return the caller-facing response.
    pub async fn handle(&self, request: &ClipRequest) -> ClipResponse {
        let result = self.run(request).await;
        let outcome = match &result {
            Ok(o) if o.is_partial() => "partial",
            Ok(_) => "success",
            Err(e) => e.kind().as_str(),
        };
        metrics::record_request(outcome);
        respond(&result)
    }

    /// Run `request` end to end.
    pub async fn run(&self, request: &ClipRequest) -> WorkerResult<PipelineOutcome> {
        let logger = RequestLogger::new("pipeline");
        let span = logger.create_span();
        self.run_logged(request, &logger).instrument(span).await
    }

    async fn run_logged(
        &self,
        request: &ClipRequest,
        logger: &RequestLogger,
    ) -> WorkerResult<PipelineOutcome> {
        request
            .validate()
            .map_err(|e| WorkerError::invalid_request(e.to_string()))?;
        self.toolchain.require_render()?;

        logger.log_start(&format!("theme '{}'", request.theme_prompt));

        // Held until the run ends so a downloaded source is removed.
        let (source_path, _scratch) = self.acquire_source(&request.video_source).await?;
        let media = MediaHandle::open(&source_path).await?;

        let result = self.run_with_media(&media, request, logger).await;
        match &result {
            Ok(outcome) => logger.log_completion(&format!(
                "{} of {} clips rendered",
                outcome.clips.len(),
                outcome.selected
            )),
            Err(e) => logger.log_error(&e.to_string()),
        }
        result
    }

    /// Local path of the source, plus the scratch directory owning it when
    /// it was downloaded.
    async fn acquire_source(&self, source: &VideoSource) -> WorkerResult<(PathBuf, Option<TempDir>)> {
        match source {
            VideoSource::Upload { path } => {
                if !path.is_file() {
                    return Err(WorkerError::source_unavailable(format!(
                        "uploaded file not found: {}",
                        path.display()
                    )));
                }
                Ok((path.clone(), None))
            }
            VideoSource::Remote { url } => {
                self.toolchain.require_download()?;
                tokio::fs::create_dir_all(&self.config.work_dir).await?;
                let scratch = tempfile::Builder::new()
                    .prefix("source_")
                    .tempdir_in(&self.config.work_dir)?;
                let path = download_video(url, scratch.path()).await?;
                Ok((path, Some(scratch)))
            }
        }
    }

    /// Resolve, select and render against already opened media.
    pub async fn run_with_media(
        &self,
        media: &MediaHandle,
        request: &ClipRequest,
        logger: &RequestLogger,
    ) -> WorkerResult<PipelineOutcome> {
        let transcript = self
            .resolver
            .resolve(media, request.video_source.remote_reference())
            .await?;
        logger.for_stage("transcript").log_progress(&format!(
            "{} segments, {:.1}s source",
            transcript.len(),
            transcript.source_duration_seconds
        ));

        let highlights = self
            .selector
            .select(&transcript, &request.theme_prompt, request.clip_count)
            .await?;
        let selected = highlights.len();
        let source_duration = transcript.source_duration_seconds;
        drop(transcript);

        let max_duration = request.max_clip_seconds;
        let attempts: Vec<&Highlight> = highlights
            .iter()
            .filter(|h| ClipSpec::for_highlight(h, max_duration).is_some())
            .collect();
        if attempts.len() < selected {
            logger.log_warning(&format!(
                "{} highlights have an empty render window",
                selected - attempts.len()
            ));
        }

        let render_logger = logger.for_stage("render");
        let futures: Vec<_> = attempts
            .iter()
            .map(|highlight| self.render_one(media, highlight, max_duration, &render_logger))
            .collect();
        let results = join_all(futures).await;

        let mut clips = Vec::new();
        let mut failures = Vec::new();
        for (highlight, result) in attempts.iter().zip(results) {
            match result {
                Ok(clip) => clips.push(clip),
                Err(message) => failures.push(ClipFailure {
                    source_index: highlight.source_index,
                    message,
                }),
            }
        }

        if clips.is_empty() && !attempts.is_empty() {
            let detail = failures
                .first()
                .map(|f| f.message.as_str())
                .unwrap_or("unknown error");
            return Err(WorkerError::render_failed(format!(
                "none of {} clips rendered: {}",
                attempts.len(),
                detail
            )));
        }

        Ok(PipelineOutcome {
            clips,
            failures,
            source_duration,
            selected,
        })
    }

    async fn render_one(
        &self,
        media: &MediaHandle,
        highlight: &Highlight,
        max_duration: f64,
        logger: &RequestLogger,
    ) -> Result<RenderedClip, String> {
        let _permit = self
            .render_slots
            .acquire()
            .await
            .map_err(|e| e.to_string())?;

        let started = Instant::now();
        match self.renderer.render(media, highlight, max_duration).await {
            Ok(clip) => {
                metrics::record_clip_rendered(started.elapsed().as_secs_f64());
                Ok(clip)
            }
            Err(e) => {
                metrics::record_clip_failed();
                logger.log_warning(&format!(
                    "clip for segment {} failed: {}",
                    highlight.source_index, e
                ));
                Err(e.to_string())
            }
        }
    }
}
