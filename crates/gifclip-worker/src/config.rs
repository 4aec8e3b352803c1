//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use gifclip_media::RenderConfig;
use gifclip_models::encoding::{DEFAULT_CLIP_COUNT, DEFAULT_MAX_CLIP_SECONDS};
use gifclip_models::CaptionStyle;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Work directory for downloads and intermediate files
    pub work_dir: PathBuf,
    /// Directory receiving finished GIFs
    pub output_dir: PathBuf,
    /// Clip count used when a request does not set one
    pub max_clips: usize,
    /// Clip length used when a request does not set one
    pub max_clip_seconds: f64,
    /// Maximum highlights rendered at the same time
    pub max_render_parallel: usize,
    /// Per-pass FFmpeg timeout
    pub ffmpeg_timeout: Duration,
    /// Caption languages tried in order on the remote caption source
    pub caption_languages: Vec<String>,
    /// Language forced on the degraded speech-to-text retry
    pub stt_fallback_language: String,
    /// Rendered artifacts older than this are swept at startup
    pub artifact_ttl: Duration,
    /// Fontconfig font name for captions
    pub caption_font: String,
    /// Font file for captions (overrides `caption_font`)
    pub caption_font_file: Option<String>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("/tmp/gifclip"),
            output_dir: PathBuf::from("/tmp/gifclip/output"),
            max_clips: DEFAULT_CLIP_COUNT,
            max_clip_seconds: DEFAULT_MAX_CLIP_SECONDS,
            max_render_parallel: 2,
            ffmpeg_timeout: Duration::from_secs(300),
            caption_languages: vec!["en".to_string()],
            stt_fallback_language: "en".to_string(),
            artifact_ttl: Duration::from_secs(24 * 3600),
            caption_font: "Sans".to_string(),
            caption_font_file: None,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let work_dir = std::env::var("GIFCLIP_WORK_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp/gifclip"));

        Self {
            output_dir: std::env::var("GIFCLIP_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| work_dir.join("output")),
            work_dir,
            max_clips: std::env::var("GIFCLIP_MAX_CLIPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_CLIP_COUNT),
            max_clip_seconds: std::env::var("GIFCLIP_MAX_CLIP_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MAX_CLIP_SECONDS),
            max_render_parallel: std::env::var("GIFCLIP_MAX_RENDER_PARALLEL")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(2),
            ffmpeg_timeout: Duration::from_secs(
                std::env::var("GIFCLIP_FFMPEG_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(300),
            ),
            caption_languages: std::env::var("GIFCLIP_CAPTION_LANGUAGES")
                .ok()
                .map(|s| parse_language_list(&s))
                .filter(|langs| !langs.is_empty())
                .unwrap_or_else(|| vec!["en".to_string()]),
            stt_fallback_language: std::env::var("GIFCLIP_STT_FALLBACK_LANGUAGE")
                .unwrap_or_else(|_| "en".to_string()),
            artifact_ttl: Duration::from_secs(
                std::env::var("GIFCLIP_ARTIFACT_TTL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(24 * 3600),
            ),
            caption_font: std::env::var("GIFCLIP_CAPTION_FONT")
                .unwrap_or_else(|_| "Sans".to_string()),
            caption_font_file: std::env::var("GIFCLIP_CAPTION_FONT_FILE")
                .ok()
                .filter(|s| !s.trim().is_empty()),
        }
    }

    /// Renderer settings derived from this config.
    pub fn render_config(&self) -> RenderConfig {
        let mut config = RenderConfig::new(&self.work_dir, &self.output_dir);
        config.caption = CaptionStyle {
            font: self.caption_font.clone(),
            font_file: self.caption_font_file.clone(),
            ..CaptionStyle::default()
        };
        config.timeout_secs = self.ffmpeg_timeout.as_secs();
        config
    }
}

/// Parse a comma separated language list, dropping blanks.
fn parse_language_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.max_clips, 3);
        assert_eq!(config.max_clip_seconds, 3.0);
        assert_eq!(config.max_render_parallel, 2);
        assert_eq!(config.caption_languages, vec!["en"]);
    }

    #[test]
    fn test_parse_language_list() {
        assert_eq!(parse_language_list("en, de ,,fr"), vec!["en", "de", "fr"]);
        assert!(parse_language_list(" , ").is_empty());
    }

    #[test]
    fn test_render_config_carries_font() {
        let config = WorkerConfig {
            caption_font_file: Some("/fonts/Impact.ttf".to_string()),
            ffmpeg_timeout: Duration::from_secs(42),
            ..Default::default()
        };
        let render = config.render_config();
        assert_eq!(render.caption.font_file.as_deref(), Some("/fonts/Impact.ttf"));
        assert_eq!(render.caption.base_font_size, 30);
        assert_eq!(render.timeout_secs, 42);
        assert_eq!(render.output_dir, config.output_dir);
    }
}
