//! GifClip command line entry point.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{ArgGroup, Parser};
use gifclip_ml_client::{
    LlmClient, LlmClientConfig, OpenAiClient, SpeechToTextEngine, WhisperConfig, WhisperEngine,
};
use gifclip_models::{ClipRequest, VideoSource};
use gifclip_storage::LocalArtifactStore;
use tracing::{info, warn};

use gifclip_worker::{init_tracing, metrics, Pipeline, WorkerConfig};

/// Turn a video and a theme into captioned, looping GIFs.
#[derive(Debug, Parser)]
#[command(name = "gifclip", version)]
#[command(group(ArgGroup::new("source").required(true).args(["video", "url"])))]
struct Args {
    /// Theme prompt, e.g. "funny moments"
    #[arg(long)]
    theme: String,

    /// Local video file
    #[arg(long)]
    video: Option<PathBuf>,

    /// Remote video page URL
    #[arg(long)]
    url: Option<String>,

    /// Maximum number of clips
    #[arg(long)]
    count: Option<usize>,

    /// Maximum clip length in seconds
    #[arg(long)]
    max_seconds: Option<f64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    dotenvy::dotenv().ok();
    init_tracing();

    let args = Args::parse();

    if let Ok(addr) = std::env::var("METRICS_LISTEN_ADDR") {
        let addr: SocketAddr = addr
            .parse()
            .with_context(|| format!("invalid METRICS_LISTEN_ADDR {addr}"))?;
        metrics::install_exporter(addr).context("failed to start metrics exporter")?;
        info!("Metrics exporter listening on {}", addr);
    }

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    let store = LocalArtifactStore::new(&config.output_dir);
    store.ensure_root().await?;
    match store.sweep_older_than(config.artifact_ttl).await {
        Ok(0) => {}
        Ok(n) => info!(removed = n, "Swept expired clips"),
        Err(e) => warn!("Artifact sweep failed: {}", e),
    }

    let speech: Arc<dyn SpeechToTextEngine> =
        Arc::new(WhisperEngine::init(WhisperConfig::from_env()).await);
    if !speech.is_available() {
        warn!("Speech engine unavailable, only platform captions can be used");
    }

    let llm_config = LlmClientConfig::from_env();
    let llm: Option<Arc<dyn LlmClient>> = if llm_config.is_enabled() {
        Some(Arc::new(OpenAiClient::new(llm_config)?))
    } else {
        info!("OPENAI_API_KEY not set, highlights use the heuristic");
        None
    };

    let source = match (args.video, args.url) {
        (Some(path), _) => VideoSource::Upload { path },
        (None, Some(url)) => VideoSource::Remote { url },
        (None, None) => anyhow::bail!("either --video or --url is required"),
    };
    let request = ClipRequest::new(args.theme, source)
        .with_clip_count(args.count.unwrap_or(config.max_clips))
        .with_max_clip_seconds(args.max_seconds.unwrap_or(config.max_clip_seconds));

    let pipeline = Pipeline::from_config(config, speech, llm);
    let response = pipeline.handle(&request).await;

    println!("{}", serde_json::to_string_pretty(&response)?);

    if !response.success {
        std::process::exit(1);
    }
    Ok(())
}
