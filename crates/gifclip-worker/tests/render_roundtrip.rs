//! End-to-end rendering against a real FFmpeg install.
//!
//! Run with `cargo test -p gifclip-worker -- --ignored`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use gifclip_media::{
    probe_frame_count, ClipRenderer, FfmpegClipRenderer, MediaHandle, RenderConfig,
};
use gifclip_ml_client::{MlResult, SpeechSegment, SpeechToTextEngine, TranscribeOptions};
use gifclip_models::{ClipRequest, Highlight, HighlightOrigin, TranscriptSegment, VideoSource};
use gifclip_worker::{
    HighlightSelector, Pipeline, SpeechRetryPolicy, ToolchainReport, TranscriptResolver,
    WorkerConfig,
};
use tempfile::TempDir;

/// Write a 4 second 640x360 test pattern with a tone.
async fn make_source(dir: &Path) -> PathBuf {
    let path = dir.join("source.mp4");
    let status = tokio::process::Command::new("ffmpeg")
        .args([
            "-y", "-v", "error",
            "-f", "lavfi", "-i", "testsrc=size=640x360:rate=30",
            "-f", "lavfi", "-i", "sine=frequency=440",
            "-t", "4",
            "-c:v", "libx264", "-pix_fmt", "yuv420p",
            "-c:a", "aac",
        ])
        .arg(&path)
        .status()
        .await
        .expect("ffmpeg should run");
    assert!(status.success(), "failed to generate test source");
    path
}

fn highlight(start: f64, end: f64, caption: &str) -> Highlight {
    let segment = TranscriptSegment::new(start, end, caption);
    Highlight::from_segment(0, &segment, caption, HighlightOrigin::Heuristic)
}

#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_gif_frame_count_matches_duration() {
    let dir = TempDir::new().unwrap();
    let source = make_source(dir.path()).await;
    let work_dir = dir.path().join("work");
    let output_dir = dir.path().join("out");

    let renderer = FfmpegClipRenderer::new(RenderConfig::new(&work_dir, &output_dir));
    let media = MediaHandle::open(&source).await.unwrap();
    let clip = renderer
        .render(&media, &highlight(0.5, 2.5, "Round trip caption"), 3.0)
        .await
        .unwrap();

    assert!(clip.identifier.ends_with(".gif"));
    assert_eq!(clip.width, 320);
    assert_eq!(clip.height, 180);
    assert_eq!(clip.frame_rate, 15);
    assert!(clip.byte_size > 0);
    assert!(clip.path.starts_with(&output_dir));

    let frames = probe_frame_count(&clip.path).await.unwrap();
    assert!(
        (28..=32).contains(&frames),
        "expected about 30 frames, got {frames}"
    );

    // Intermediate files are gone once the render returns.
    let leftovers = std::fs::read_dir(&work_dir).unwrap().count();
    assert_eq!(leftovers, 0);
}

#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_render_is_capped_at_max_duration() {
    let dir = TempDir::new().unwrap();
    let source = make_source(dir.path()).await;

    let renderer = FfmpegClipRenderer::new(RenderConfig::new(
        dir.path().join("work"),
        dir.path().join("out"),
    ));
    let media = MediaHandle::open(&source).await.unwrap();
    let clip = renderer
        .render(&media, &highlight(0.0, 4.0, "a caption long enough to wrap onto two lines"), 1.0)
        .await
        .unwrap();

    assert_eq!(clip.duration_seconds, 1.0);
    let frames = probe_frame_count(&clip.path).await.unwrap();
    assert!((13..=17).contains(&frames), "got {frames}");
}

struct ScriptedSpeech;

#[async_trait]
impl SpeechToTextEngine for ScriptedSpeech {
    fn is_available(&self) -> bool {
        true
    }

    async fn transcribe(&self, _media: &Path, _options: &TranscribeOptions) -> MlResult<Vec<SpeechSegment>> {
        Ok(vec![
            SpeechSegment {
                start: 0.0,
                end: 1.5,
                text: "hello world".to_string(),
            },
            SpeechSegment {
                start: 1.5,
                end: 4.0,
                text: "the quick brown fox jumps over".to_string(),
            },
        ])
    }
}

#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_pipeline_upload_end_to_end() {
    let dir = TempDir::new().unwrap();
    let source = make_source(dir.path()).await;

    let config = WorkerConfig {
        work_dir: dir.path().join("work"),
        output_dir: dir.path().join("out"),
        ..WorkerConfig::default()
    };
    let resolver = TranscriptResolver::new(
        None,
        Arc::new(ScriptedSpeech),
        config.caption_languages.clone(),
        SpeechRetryPolicy::two_tier("en"),
    );
    let renderer = Arc::new(FfmpegClipRenderer::new(config.render_config()));
    let pipeline = Pipeline::new(
        config,
        resolver,
        HighlightSelector::heuristic_only(),
        renderer,
        ToolchainReport::probe(true, false),
    );

    let request = ClipRequest::new("action", VideoSource::Upload { path: source.clone() })
        .with_clip_count(2);
    let response = pipeline.handle(&request).await;

    assert!(response.success, "{:?}", response.message);
    assert!(!response.partial);
    let identifiers = response.clip_identifiers.unwrap();
    assert_eq!(identifiers.len(), 2);
    for id in &identifiers {
        assert!(dir.path().join("out").join(id).is_file());
    }
    assert!((response.source_duration_seconds.unwrap() - 4.0).abs() < 0.1);

    // Uploads are left in place.
    assert!(source.is_file());
}
