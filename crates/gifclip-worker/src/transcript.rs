//! Transcript resolution.
//!
//! Platform captions are preferred when the source is remote; otherwise the
//! local speech engine runs under a fixed two-tier retry policy.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use gifclip_media::{fetch_subtitles, CaptionCue, MediaHandle, MediaResult};
use gifclip_ml_client::{SpeechToTextEngine, TranscribeOptions};
use gifclip_models::{Transcript, TranscriptSegment};
use tracing::{debug, info, warn};

use crate::error::{WorkerError, WorkerResult};
use crate::metrics;

/// Remote caption tracks for a video reference.
#[async_trait]
pub trait CaptionSource: Send + Sync {
    /// Cues for `language`, or `None` when no such track exists.
    async fn fetch(&self, reference: &str, language: &str) -> MediaResult<Option<Vec<CaptionCue>>>;
}

/// Caption source backed by yt-dlp.
#[derive(Debug, Clone)]
pub struct YtDlpCaptionSource {
    work_dir: PathBuf,
}

impl YtDlpCaptionSource {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
        }
    }
}

#[async_trait]
impl CaptionSource for YtDlpCaptionSource {
    async fn fetch(&self, reference: &str, language: &str) -> MediaResult<Option<Vec<CaptionCue>>> {
        fetch_subtitles(reference, language, &self.work_dir).await
    }
}

/// Ordered speech-to-text attempts. The next tier runs only when the
/// previous one returned an error.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechRetryPolicy {
    tiers: Vec<TranscribeOptions>,
}

impl SpeechRetryPolicy {
    /// Engine defaults, then forced `language`, fp32 and verbose output.
    pub fn two_tier(fallback_language: &str) -> Self {
        Self {
            tiers: vec![
                TranscribeOptions::default(),
                TranscribeOptions::degraded(fallback_language),
            ],
        }
    }

    pub fn tiers(&self) -> &[TranscribeOptions] {
        &self.tiers
    }
}

/// Produces a [`Transcript`] for an opened media file.
pub struct TranscriptResolver {
    captions: Option<Arc<dyn CaptionSource>>,
    speech: Arc<dyn SpeechToTextEngine>,
    caption_languages: Vec<String>,
    retry: SpeechRetryPolicy,
}

impl TranscriptResolver {
    pub fn new(
        captions: Option<Arc<dyn CaptionSource>>,
        speech: Arc<dyn SpeechToTextEngine>,
        caption_languages: Vec<String>,
        retry: SpeechRetryPolicy,
    ) -> Self {
        Self {
            captions,
            speech,
            caption_languages,
            retry,
        }
    }

    pub fn retry_policy(&self) -> &SpeechRetryPolicy {
        &self.retry
    }

    /// Resolve the transcript for `media`.
    ///
    /// `remote_reference` enables the caption lookup; uploads skip it.
    pub async fn resolve(
        &self,
        media: &MediaHandle,
        remote_reference: Option<&str>,
    ) -> WorkerResult<Transcript> {
        let duration = media.duration_seconds();

        if let Some(reference) = remote_reference {
            if let Some(transcript) = self.from_captions(reference, duration).await {
                metrics::record_transcript("captions");
                return Ok(transcript);
            }
        }

        let segments = self.from_speech(media, duration).await?;
        if segments.is_empty() {
            return Err(WorkerError::transcript_unavailable(
                "speech recognition produced no segments",
                duration,
            ));
        }

        info!(segments = segments.len(), duration = duration, "Transcribed speech");
        metrics::record_transcript("speech");
        Ok(Transcript::new(segments, duration))
    }

    async fn from_captions(&self, reference: &str, duration: f64) -> Option<Transcript> {
        let source = self.captions.as_ref()?;

        for language in &self.caption_languages {
            match source.fetch(reference, language).await {
                Ok(Some(cues)) if !cues.is_empty() => {
                    info!(language = %language, cues = cues.len(), "Using platform captions");
                    let segments = cues
                        .into_iter()
                        .map(|cue| TranscriptSegment::new(cue.start, cue.end, cue.text))
                        .collect();
                    return Some(Transcript::new(segments, duration));
                }
                Ok(_) => debug!(language = %language, "No caption track"),
                Err(e) => warn!(language = %language, "Caption lookup failed: {}", e),
            }
        }

        None
    }

    async fn from_speech(
        &self,
        media: &MediaHandle,
        duration: f64,
    ) -> WorkerResult<Vec<TranscriptSegment>> {
        if !self.speech.is_available() {
            return Err(WorkerError::transcript_unavailable(
                "no caption track and the speech engine is unavailable",
                duration,
            ));
        }

        let mut last_error = None;
        for (tier, options) in self.retry.tiers().iter().enumerate() {
            match self.speech.transcribe(media.path(), options).await {
                Ok(segments) => {
                    return Ok(segments
                        .into_iter()
                        .map(|s| TranscriptSegment::new(s.start, s.end, s.text.trim()))
                        .collect());
                }
                Err(e) => {
                    warn!(tier = tier, ?options, "Speech recognition failed: {}", e);
                    last_error = Some(e);
                }
            }
        }

        Err(WorkerError::transcript_unavailable(
            format!(
                "speech recognition failed: {}",
                last_error.map(|e| e.to_string()).unwrap_or_default()
            ),
            duration,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gifclip_media::{MediaError, VideoInfo};
    use gifclip_ml_client::{MlError, MlResult, SpeechSegment};
    use std::path::Path;
    use std::sync::Mutex;

    struct FakeCaptions {
        tracks: Vec<(&'static str, Vec<CaptionCue>)>,
        fail: bool,
    }

    #[async_trait]
    impl CaptionSource for FakeCaptions {
        async fn fetch(&self, _reference: &str, language: &str) -> MediaResult<Option<Vec<CaptionCue>>> {
            if self.fail {
                return Err(MediaError::SubtitlesFailed("HTTP 429".to_string()));
            }
            Ok(self
                .tracks
                .iter()
                .find(|(lang, _)| *lang == language)
                .map(|(_, cues)| cues.clone()))
        }
    }

    /// Fails the first `failures` calls, then returns `segments`.
    struct FakeSpeech {
        available: bool,
        failures: usize,
        segments: Vec<SpeechSegment>,
        calls: Mutex<Vec<TranscribeOptions>>,
    }

    impl FakeSpeech {
        fn new(failures: usize, segments: Vec<SpeechSegment>) -> Self {
            Self {
                available: true,
                failures,
                segments,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<TranscribeOptions> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SpeechToTextEngine for FakeSpeech {
        fn is_available(&self) -> bool {
            self.available
        }

        async fn transcribe(&self, _media: &Path, options: &TranscribeOptions) -> MlResult<Vec<SpeechSegment>> {
            let mut calls = self.calls.lock().unwrap();
            calls.push(options.clone());
            if calls.len() <= self.failures {
                return Err(MlError::TranscriptionFailed("fp16 not supported".to_string()));
            }
            Ok(self.segments.clone())
        }
    }

    fn media() -> MediaHandle {
        MediaHandle::from_parts(
            "/tmp/source.mp4",
            Some(VideoInfo {
                duration: 42.0,
                width: 1280,
                height: 720,
                fps: 30.0,
                codec: "h264".to_string(),
                size: 0,
            }),
        )
    }

    fn cue(start: f64, end: f64, text: &str) -> CaptionCue {
        CaptionCue {
            start,
            end,
            text: text.to_string(),
        }
    }

    fn speech_segment(start: f64, end: f64, text: &str) -> SpeechSegment {
        SpeechSegment {
            start,
            end,
            text: text.to_string(),
        }
    }

    fn resolver(captions: Option<FakeCaptions>, speech: Arc<FakeSpeech>, languages: &[&str]) -> TranscriptResolver {
        TranscriptResolver::new(
            captions.map(|c| Arc::new(c) as Arc<dyn CaptionSource>),
            speech,
            languages.iter().map(|s| s.to_string()).collect(),
            SpeechRetryPolicy::two_tier("en"),
        )
    }

    #[test]
    fn test_two_tier_policy() {
        let policy = SpeechRetryPolicy::two_tier("en");
        assert_eq!(policy.tiers().len(), 2);
        assert_eq!(policy.tiers()[0], TranscribeOptions::default());
        assert_eq!(policy.tiers()[1].language.as_deref(), Some("en"));
        assert_eq!(policy.tiers()[1].fp16, Some(false));
        assert!(policy.tiers()[1].verbose);
    }

    #[tokio::test]
    async fn test_captions_short_circuit_speech() {
        let captions = FakeCaptions {
            tracks: vec![("en", vec![cue(3.0, 4.0, "second"), cue(0.0, 2.0, "first")])],
            fail: false,
        };
        let speech = Arc::new(FakeSpeech::new(0, vec![]));
        let resolver = resolver(Some(captions), speech.clone(), &["en"]);

        let transcript = resolver
            .resolve(&media(), Some("https://youtu.be/x"))
            .await
            .unwrap();

        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript.segments()[0].text, "first");
        assert_eq!(transcript.source_duration_seconds, 42.0);
        assert!(speech.calls().is_empty());
    }

    #[tokio::test]
    async fn test_caption_languages_tried_in_order() {
        let captions = FakeCaptions {
            tracks: vec![("de", vec![cue(0.0, 1.0, "hallo")])],
            fail: false,
        };
        let speech = Arc::new(FakeSpeech::new(0, vec![]));
        let resolver = resolver(Some(captions), speech, &["en", "de"]);

        let transcript = resolver.resolve(&media(), Some("https://youtu.be/x")).await.unwrap();
        assert_eq!(transcript.segments()[0].text, "hallo");
    }

    #[tokio::test]
    async fn test_upload_skips_captions() {
        let captions = FakeCaptions {
            tracks: vec![("en", vec![cue(0.0, 1.0, "caption")])],
            fail: false,
        };
        let speech = Arc::new(FakeSpeech::new(0, vec![speech_segment(0.0, 1.5, "  spoken  ")]));
        let resolver = resolver(Some(captions), speech.clone(), &["en"]);

        let transcript = resolver.resolve(&media(), None).await.unwrap();
        assert_eq!(transcript.segments()[0].text, "spoken");
        assert_eq!(speech.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_caption_error_falls_back_to_speech() {
        let captions = FakeCaptions {
            tracks: vec![],
            fail: true,
        };
        let speech = Arc::new(FakeSpeech::new(0, vec![speech_segment(0.0, 1.0, "hi")]));
        let resolver = resolver(Some(captions), speech, &["en"]);

        let transcript = resolver.resolve(&media(), Some("https://youtu.be/x")).await.unwrap();
        assert_eq!(transcript.len(), 1);
    }

    #[tokio::test]
    async fn test_degraded_retry_after_failure() {
        let speech = Arc::new(FakeSpeech::new(1, vec![speech_segment(0.0, 1.0, "hi")]));
        let resolver = resolver(None, speech.clone(), &["en"]);

        let transcript = resolver.resolve(&media(), None).await.unwrap();
        assert_eq!(transcript.len(), 1);

        let calls = speech.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], TranscribeOptions::default());
        assert_eq!(calls[1], TranscribeOptions::degraded("en"));
    }

    #[tokio::test]
    async fn test_both_tiers_fail() {
        let speech = Arc::new(FakeSpeech::new(2, vec![]));
        let resolver = resolver(None, speech.clone(), &["en"]);

        let err = resolver.resolve(&media(), None).await.unwrap_err();
        assert!(matches!(
            err,
            WorkerError::TranscriptUnavailable { source_duration, .. } if source_duration == 42.0
        ));
        assert_eq!(speech.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_speech_result_is_not_retried() {
        let speech = Arc::new(FakeSpeech::new(0, vec![]));
        let resolver = resolver(None, speech.clone(), &["en"]);

        let err = resolver.resolve(&media(), None).await.unwrap_err();
        assert!(matches!(err, WorkerError::TranscriptUnavailable { .. }));
        assert_eq!(speech.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_engine() {
        let mut speech = FakeSpeech::new(0, vec![]);
        speech.available = false;
        let speech = Arc::new(speech);
        let resolver = resolver(None, speech.clone(), &["en"]);

        let err = resolver.resolve(&media(), None).await.unwrap_err();
        assert!(matches!(err, WorkerError::TranscriptUnavailable { .. }));
        assert!(speech.calls().is_empty());
    }
}
