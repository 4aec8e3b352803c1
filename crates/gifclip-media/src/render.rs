//! Highlight to looping GIF rendering.
//!
//! Two FFmpeg passes per highlight:
//! 1. seek/trim the source, burn in the caption plate and text, encode an
//!    intermediate H.264 file without audio;
//! 2. downsample the intermediate and encode a palette GIF that loops forever.
//!
//! Both artifacts are `tempfile` paths, so anything left behind by a failed
//! pass is removed when the path is dropped. The GIF is persisted under its
//! final `<uuid>.gif` name only after the second pass succeeds.

use std::path::{Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use gifclip_models::{
    new_clip_identifier, CaptionStyle, ClipSpec, GifEncodingConfig, Highlight,
    IntermediateEncodingConfig, RenderedClip,
};
use tempfile::TempPath;
use tracing::{debug, info, warn};

use crate::caption::CaptionLayout;
use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::{probe_video, MediaHandle};

/// Renders one highlight into a finished clip artifact.
#[async_trait]
pub trait ClipRenderer: Send + Sync {
    /// Render `highlight` from `media`, capped at `max_duration` seconds.
    async fn render(
        &self,
        media: &MediaHandle,
        highlight: &Highlight,
        max_duration: f64,
    ) -> MediaResult<RenderedClip>;
}

/// Renderer configuration.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Directory for intermediate files
    pub work_dir: PathBuf,
    /// Directory receiving finished GIFs
    pub output_dir: PathBuf,
    pub caption: CaptionStyle,
    pub gif: GifEncodingConfig,
    pub intermediate: IntermediateEncodingConfig,
    /// Per-pass FFmpeg timeout in seconds
    pub timeout_secs: u64,
}

impl RenderConfig {
    pub fn new(work_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            output_dir: output_dir.into(),
            caption: CaptionStyle::default(),
            gif: GifEncodingConfig::default(),
            intermediate: IntermediateEncodingConfig::default(),
            timeout_secs: 300,
        }
    }
}

/// FFmpeg-backed [`ClipRenderer`].
#[derive(Debug, Clone)]
pub struct FfmpegClipRenderer {
    config: RenderConfig,
    runner: FfmpegRunner,
}

impl FfmpegClipRenderer {
    pub fn new(config: RenderConfig) -> Self {
        let runner = FfmpegRunner::new().with_timeout(config.timeout_secs);
        Self { config, runner }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Pass 1 command: trim, even out the frame size, burn in the caption.
    fn intermediate_command(&self, media: &MediaHandle, spec: &ClipSpec, output: &Path) -> FfmpegCommand {
        let frame_width = media.dimensions().map(|(w, _)| w);
        let layout = CaptionLayout::compute(&spec.caption_text, &self.config.caption, frame_width);
        let overlay = layout.to_filter(&self.config.caption);
        if overlay.is_none() {
            debug!("Empty caption, rendering clip without overlay");
        }

        FfmpegCommand::new(media.path(), output)
            .seek(spec.source_start)
            .duration(spec.render_duration)
            .video_filter(self.config.intermediate.video_filter(overlay.as_deref()))
            .output_args(self.config.intermediate.to_ffmpeg_args())
    }

    /// Pass 1: trim, caption and encode the intermediate.
    async fn encode_intermediate(
        &self,
        media: &MediaHandle,
        spec: &ClipSpec,
        output: &Path,
    ) -> MediaResult<()> {
        let cmd = self.intermediate_command(media, spec, output);
        let progress = self.runner.run(&cmd).await?;

        debug!(
            frames = progress.frame,
            out_time_secs = progress.out_time_seconds(),
            "Intermediate encoded"
        );
        Ok(())
    }

    /// Pass 2: palette GIF from the intermediate.
    async fn encode_gif(&self, intermediate: &Path, output: &Path) -> MediaResult<()> {
        let cmd = FfmpegCommand::new(intermediate, output)
            .video_filter(self.config.gif.to_filter())
            .no_audio()
            .loop_count(self.config.gif.loop_count);

        let progress = self.runner.run(&cmd).await?;
        debug!(frames = progress.frame, "GIF encoded");
        Ok(())
    }

    /// Output dimensions, probing the GIF when the source size is unknown.
    async fn output_dimensions(&self, media: &MediaHandle, gif_path: &Path) -> (u32, u32) {
        let gif = &self.config.gif;
        if let Some((w, h)) = media.dimensions() {
            return (gif.width, gif.output_height(w, h));
        }
        match probe_video(gif_path).await {
            Ok(info) => (info.width, info.height),
            Err(e) => {
                debug!("Could not probe rendered GIF: {}", e);
                (gif.width, 0)
            }
        }
    }
}

fn scratch_path(dir: &Path, prefix: &str, suffix: &str) -> MediaResult<TempPath> {
    Ok(tempfile::Builder::new()
        .prefix(prefix)
        .suffix(suffix)
        .tempfile_in(dir)?
        .into_temp_path())
}

#[async_trait]
impl ClipRenderer for FfmpegClipRenderer {
    async fn render(
        &self,
        media: &MediaHandle,
        highlight: &Highlight,
        max_duration: f64,
    ) -> MediaResult<RenderedClip> {
        let spec = ClipSpec::for_highlight(highlight, max_duration).ok_or(MediaError::EmptyClip {
            start: highlight.start,
            end: highlight.end,
        })?;

        if !media.path().is_file() {
            return Err(MediaError::FileNotFound(media.path().to_path_buf()));
        }

        let started = Instant::now();
        tokio::fs::create_dir_all(&self.config.work_dir).await?;
        tokio::fs::create_dir_all(&self.config.output_dir).await?;

        let intermediate = scratch_path(&self.config.work_dir, "temp_", ".mp4")?;
        self.encode_intermediate(media, &spec, &intermediate).await?;

        let gif_tmp = scratch_path(&self.config.output_dir, ".partial_", ".gif")?;
        let gif_result = self.encode_gif(&intermediate, &gif_tmp).await;

        if let Err(e) = intermediate.close() {
            warn!("Failed to remove intermediate file: {}", e);
        }
        gif_result?;

        let identifier = new_clip_identifier();
        let final_path = self.config.output_dir.join(&identifier);
        gif_tmp
            .persist(&final_path)
            .map_err(|e| MediaError::Io(e.error))?;

        let byte_size = tokio::fs::metadata(&final_path).await?.len();
        let (width, height) = self.output_dimensions(media, &final_path).await;

        info!(
            identifier = %identifier,
            source_index = highlight.source_index,
            start = spec.source_start,
            duration = spec.render_duration,
            byte_size = byte_size,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Rendered clip"
        );

        Ok(RenderedClip {
            identifier,
            path: final_path,
            byte_size,
            width,
            height,
            frame_rate: self.config.gif.frame_rate,
            duration_seconds: spec.render_duration,
            source_index: highlight.source_index,
            created_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gifclip_models::{HighlightOrigin, TranscriptSegment};
    use tempfile::TempDir;

    fn highlight(start: f64, end: f64) -> Highlight {
        let seg = TranscriptSegment::new(start, end, "the quick brown fox jumps over");
        Highlight::from_segment(1, &seg, "the quick brown fox jumps over", HighlightOrigin::Heuristic)
    }

    fn dir_is_empty(path: &Path) -> bool {
        std::fs::read_dir(path)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(true)
    }

    #[tokio::test]
    async fn test_empty_window_is_not_rendered() {
        let work = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let renderer = FfmpegClipRenderer::new(RenderConfig::new(work.path(), out.path()));
        let media = MediaHandle::from_parts(work.path().join("missing.mp4"), None);

        let result = renderer.render(&media, &highlight(4.0, 4.0), 3.0).await;
        assert!(matches!(result, Err(MediaError::EmptyClip { .. })));

        let result = renderer.render(&media, &highlight(2.0, 5.0), 0.0).await;
        assert!(matches!(result, Err(MediaError::EmptyClip { .. })));
    }

    #[tokio::test]
    async fn test_failed_render_leaves_no_artifacts() {
        let work = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let renderer = FfmpegClipRenderer::new(RenderConfig::new(work.path(), out.path()));
        let media = MediaHandle::from_parts(work.path().join("missing.mp4"), None);

        let result = renderer.render(&media, &highlight(2.0, 5.0), 3.0).await;
        assert!(result.is_err());
        assert!(dir_is_empty(work.path()));
        assert!(dir_is_empty(out.path()));
    }

    #[tokio::test]
    async fn test_corrupt_source_cleans_up_intermediate() {
        let work = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let source_dir = TempDir::new().unwrap();
        let source = source_dir.path().join("broken.mp4");
        std::fs::write(&source, b"not a video").unwrap();

        let renderer = FfmpegClipRenderer::new(RenderConfig::new(work.path(), out.path()));
        let media = MediaHandle::from_parts(&source, None);

        // Fails with FfmpegNotFound or FfmpegFailed depending on the host
        let result = renderer.render(&media, &highlight(0.0, 2.0), 3.0).await;
        assert!(result.is_err());
        assert!(dir_is_empty(work.path()));
        assert!(dir_is_empty(out.path()));
    }

    #[test]
    fn test_intermediate_filter_evens_odd_frames() {
        let renderer = FfmpegClipRenderer::new(RenderConfig::new("/work", "/out"));
        let media = MediaHandle::from_parts(
            "/videos/odd.mp4",
            Some(crate::probe::VideoInfo {
                duration: 10.0,
                width: 853,
                height: 480,
                fps: 30.0,
                codec: "h264".to_string(),
                size: 0,
            }),
        );
        let filter_of = |caption: &str| {
            let mut h = highlight(1.0, 4.0);
            h.caption_text = caption.to_string();
            let spec = ClipSpec::for_highlight(&h, 3.0).unwrap();
            let args = renderer
                .intermediate_command(&media, &spec, Path::new("/work/temp.mp4"))
                .build_args();
            let vf = args.iter().position(|a| a == "-vf").unwrap();
            args[vf + 1].clone()
        };

        let captioned = filter_of("the quick brown fox");
        assert!(captioned.starts_with("scale=trunc(iw/2)*2:trunc(ih/2)*2,drawbox="));
        assert!(captioned.contains("drawtext="));

        assert_eq!(filter_of("   "), "scale=trunc(iw/2)*2:trunc(ih/2)*2");
    }
}
