//! Theme-driven highlight selection.
//!
//! The LLM ranks transcript segments for the theme. Its answer is only
//! trusted line by line under a strict `<index>,<caption>` grammar; when the
//! call fails or nothing parses, a deterministic longest-text heuristic
//! takes over.

use std::collections::HashSet;
use std::sync::Arc;

use gifclip_ml_client::{ChatMessage, LlmClient};
use gifclip_models::{Highlight, HighlightOrigin, Transcript};
use tracing::{debug, info, warn};

use crate::error::{WorkerError, WorkerResult};
use crate::metrics;

pub const SYSTEM_PROMPT: &str =
    "You are a helpful assistant that identifies engaging moments in video transcripts.";

/// Characters stripped from the end of heuristic captions.
const TRAILING_PUNCTUATION: [char; 4] = ['.', ',', '!', '?'];

/// Picks caption-worthy moments from a transcript.
#[derive(Clone, Default)]
pub struct HighlightSelector {
    llm: Option<Arc<dyn LlmClient>>,
}

impl HighlightSelector {
    /// Selector using `llm` for ranking; `None` always uses the heuristic.
    pub fn new(llm: Option<Arc<dyn LlmClient>>) -> Self {
        Self { llm }
    }

    pub fn heuristic_only() -> Self {
        Self { llm: None }
    }

    /// Select at most `count` highlights for `theme`.
    ///
    /// Fails with `SelectionFailed` only when no segment carries text.
    /// LLM errors are logged and recovered through the heuristic.
    pub async fn select(
        &self,
        transcript: &Transcript,
        theme: &str,
        count: usize,
    ) -> WorkerResult<Vec<Highlight>> {
        if !transcript.iter().any(|s| s.has_text()) {
            return Err(WorkerError::selection_failed(
                "transcript has no segments with text",
            ));
        }

        if let Some(llm) = &self.llm {
            let messages = [
                ChatMessage::system(SYSTEM_PROMPT),
                ChatMessage::user(build_prompt(transcript, theme, count)),
            ];

            match llm.complete(&messages).await {
                Ok(reply) => {
                    let highlights = parse_llm_response(&reply, transcript, count);
                    if !highlights.is_empty() {
                        info!(selected = highlights.len(), theme = %theme, "LLM selected highlights");
                        metrics::record_selection("llm");
                        return Ok(highlights);
                    }
                    warn!("LLM reply contained no usable lines, using heuristic");
                    debug!(reply = %reply, "Unparsed LLM reply");
                }
                Err(e) => warn!("LLM selection failed, using heuristic: {}", e),
            }
        }

        let highlights = fallback_select(transcript, count);
        info!(selected = highlights.len(), "Heuristic selected highlights");
        metrics::record_selection("heuristic");
        Ok(highlights)
    }
}

/// User prompt enumerating every segment as `<index>: <text>`.
pub fn build_prompt(transcript: &Transcript, theme: &str, count: usize) -> String {
    let segments = transcript
        .iter()
        .enumerate()
        .map(|(i, s)| format!("{}: {}", i, s.trimmed_text()))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Given these video transcript segments and the theme '{theme}', \
         identify the {count} most engaging and caption-worthy moments.\n\
         For each segment, provide:\n\
         1. The segment number (0-based index)\n\
         2. The complete caption text that captures the essence\n\
         Format each line as: segment_index,caption_text\n\n\
         Segments:\n{segments}"
    )
}

/// Parse `<index>,<caption>` lines.
///
/// Malformed lines, out-of-range indices, empty captions and repeated
/// indices (first wins) are skipped. At most `count` highlights are kept.
pub fn parse_llm_response(reply: &str, transcript: &Transcript, count: usize) -> Vec<Highlight> {
    let mut seen = HashSet::new();
    let mut highlights = Vec::new();

    for line in reply.lines() {
        if highlights.len() >= count {
            break;
        }

        let Some((index, caption)) = line.split_once(',') else {
            continue;
        };
        let Ok(index) = index.trim().parse::<i64>() else {
            continue;
        };
        let Some(segment) = usize::try_from(index)
            .ok()
            .and_then(|i| transcript.get(i).map(|s| (i, s)))
        else {
            debug!(index = index, "LLM index out of range");
            continue;
        };

        let caption = caption.trim();
        if caption.is_empty() || !seen.insert(segment.0) {
            continue;
        }

        highlights.push(Highlight::from_segment(
            segment.0,
            segment.1,
            caption,
            HighlightOrigin::Llm,
        ));
    }

    highlights
}

/// Longest trimmed texts first; ties keep transcript order.
pub fn fallback_select(transcript: &Transcript, count: usize) -> Vec<Highlight> {
    let mut candidates: Vec<_> = transcript
        .iter()
        .enumerate()
        .filter(|(_, s)| s.has_text())
        .collect();

    candidates.sort_by_key(|(_, s)| std::cmp::Reverse(s.trimmed_text().chars().count()));

    candidates
        .into_iter()
        .take(count)
        .map(|(i, s)| {
            let caption = s.trimmed_text().trim_end_matches(TRAILING_PUNCTUATION);
            Highlight::from_segment(i, s, caption, HighlightOrigin::Heuristic)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gifclip_ml_client::{MlError, MlResult};
    use gifclip_models::{ClipSpec, TranscriptSegment};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeLlm {
        reply: MlResult<String>,
        calls: AtomicUsize,
    }

    impl FakeLlm {
        fn replying(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply.to_string()),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: Err(MlError::ServiceUnavailable("503".to_string())),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl LlmClient for FakeLlm {
        async fn complete(&self, messages: &[ChatMessage]) -> MlResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(messages.len(), 2);
            match &self.reply {
                Ok(s) => Ok(s.clone()),
                Err(_) => Err(MlError::ServiceUnavailable("503".to_string())),
            }
        }
    }

    fn two_segment_transcript() -> Transcript {
        Transcript::new(
            vec![
                TranscriptSegment::new(0.0, 2.0, "hello world"),
                TranscriptSegment::new(2.0, 5.0, "the quick brown fox jumps over"),
            ],
            5.0,
        )
    }

    fn transcript(texts: &[&str]) -> Transcript {
        let segments = texts
            .iter()
            .enumerate()
            .map(|(i, t)| TranscriptSegment::new(i as f64, i as f64 + 1.0, *t))
            .collect();
        Transcript::new(segments, texts.len() as f64)
    }

    #[tokio::test]
    async fn test_heuristic_picks_longest_segment() {
        let selector = HighlightSelector::heuristic_only();
        let highlights = selector.select(&two_segment_transcript(), "action", 1).await.unwrap();

        assert_eq!(highlights.len(), 1);
        assert_eq!(highlights[0].source_index, 1);
        assert_eq!(highlights[0].caption_text, "the quick brown fox jumps over");
        assert_eq!(highlights[0].origin, HighlightOrigin::Heuristic);

        let spec = ClipSpec::for_highlight(&highlights[0], 3.0).unwrap();
        assert_eq!(spec.render_duration, 3.0);
    }

    #[tokio::test]
    async fn test_empty_transcript_fails_without_llm_call() {
        let llm = FakeLlm::replying("0,anything");
        let selector = HighlightSelector::new(Some(llm.clone()));

        let err = selector
            .select(&Transcript::default(), "action", 3)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::SelectionFailed(_)));
        assert_eq!(llm.calls.load(Ordering::SeqCst), 0);

        let blank = transcript(&["  ", ""]);
        assert!(selector.select(&blank, "action", 3).await.is_err());
    }

    #[tokio::test]
    async fn test_llm_path() {
        let llm = FakeLlm::replying("1, Fox on the move \n0,Hi there");
        let selector = HighlightSelector::new(Some(llm));

        let highlights = selector.select(&two_segment_transcript(), "action", 3).await.unwrap();
        assert_eq!(highlights.len(), 2);
        assert_eq!(highlights[0].source_index, 1);
        assert_eq!(highlights[0].caption_text, "Fox on the move");
        assert_eq!(highlights[0].start, 2.0);
        assert_eq!(highlights[0].origin, HighlightOrigin::Llm);
        assert_eq!(highlights[1].source_index, 0);
    }

    #[tokio::test]
    async fn test_llm_failure_falls_back() {
        let selector = HighlightSelector::new(Some(FakeLlm::failing()));
        let highlights = selector.select(&two_segment_transcript(), "action", 1).await.unwrap();
        assert_eq!(highlights[0].source_index, 1);
        assert_eq!(highlights[0].origin, HighlightOrigin::Heuristic);
    }

    #[tokio::test]
    async fn test_unparseable_reply_falls_back() {
        let llm = FakeLlm::replying("Here are the best moments:\n- the fox one");
        let selector = HighlightSelector::new(Some(llm));
        let highlights = selector.select(&two_segment_transcript(), "action", 1).await.unwrap();
        assert_eq!(highlights[0].origin, HighlightOrigin::Heuristic);
    }

    #[test]
    fn test_parse_rejects_bad_lines() {
        let t = transcript(&["a", "b", "c"]);
        let reply = "2,first\n2,duplicate\n-1,negative\n3,out of range\nx,not a number\n1,   \n0,kept, with comma";
        let highlights = parse_llm_response(reply, &t, 10);

        let picked: Vec<_> = highlights
            .iter()
            .map(|h| (h.source_index, h.caption_text.as_str()))
            .collect();
        assert_eq!(picked, vec![(2, "first"), (0, "kept, with comma")]);
    }

    #[test]
    fn test_parse_truncates_to_count() {
        let t = transcript(&["a", "b", "c"]);
        let highlights = parse_llm_response("0,a\n1,b\n2,c", &t, 2);
        assert_eq!(highlights.len(), 2);
    }

    #[test]
    fn test_fallback_is_deterministic() {
        let t = transcript(&["tie one", "longest text here!", "tie two", "", "x."]);
        let first = fallback_select(&t, 3);
        let second = fallback_select(&t, 3);
        assert_eq!(first, second);

        let picked: Vec<_> = first
            .iter()
            .map(|h| (h.source_index, h.caption_text.as_str()))
            .collect();
        assert_eq!(
            picked,
            vec![(1, "longest text here"), (0, "tie one"), (2, "tie two")]
        );
    }

    #[test]
    fn test_fallback_strips_only_trailing_punctuation() {
        let t = transcript(&["Wait, what?!."]);
        assert_eq!(fallback_select(&t, 1)[0].caption_text, "Wait, what");
    }

    #[test]
    fn test_prompt_lists_segments() {
        let prompt = build_prompt(&two_segment_transcript(), "action", 1);
        assert!(prompt.contains("theme 'action'"));
        assert!(prompt.contains("0: hello world\n1: the quick brown fox jumps over"));
        assert!(prompt.contains("segment_index,caption_text"));
    }
}
