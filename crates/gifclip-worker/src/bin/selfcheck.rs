use std::path::Path;

use gifclip_ml_client::LlmClientConfig;
use gifclip_worker::{ToolchainReport, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = WorkerConfig::from_env();

    println!(
        "gifclip-selfcheck: starting with work_dir={} output_dir={}",
        config.work_dir.display(),
        config.output_dir.display()
    );
    ensure_dir(&config.work_dir).await?;
    ensure_dir(&config.output_dir).await?;

    // Only the interpreter is checked, the Whisper model is not loaded.
    let python = std::env::var("WHISPER_PYTHON").unwrap_or_else(|_| "python3".to_string());
    let speech = which::which(&python).is_ok();
    let report = ToolchainReport::probe(speech, LlmClientConfig::from_env().is_enabled());
    println!("{report}");

    if report.ffmpeg.is_none() || report.ffprobe.is_none() {
        return Err(anyhow::anyhow!(
            "missing required binaries: {}",
            report.missing_binaries().join(", ")
        ));
    }
    if report.yt_dlp.is_none() {
        println!("gifclip-selfcheck: warning: yt-dlp missing, remote URLs will fail");
    }
    if !report.llm_configured {
        println!("gifclip-selfcheck: warning: OPENAI_API_KEY not set");
    }
    if !report.speech_engine {
        println!("gifclip-selfcheck: warning: {python} not found, speech recognition disabled");
    }

    println!("gifclip-selfcheck: ok");
    Ok(())
}

async fn ensure_dir<P: AsRef<Path>>(path: P) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(path.as_ref()).await?;
    Ok(())
}
