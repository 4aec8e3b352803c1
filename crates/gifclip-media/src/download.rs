//! Video download using yt-dlp.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::command::check_ytdlp;
use crate::error::{MediaError, MediaResult};

/// Format selectors tried in order: a single progressive MP4 stream first,
/// then anything yt-dlp labels as mp4.
const FORMAT_SELECTORS: [&str; 2] = ["best[ext=mp4]", "mp4"];

/// Download a remote video into `dir` as `<uuid>.mp4`.
///
/// Returns the path of the downloaded file.
pub async fn download_video(url: &str, dir: impl AsRef<Path>) -> MediaResult<PathBuf> {
    let dir = dir.as_ref();
    let ytdlp = check_ytdlp()?;

    tokio::fs::create_dir_all(dir).await?;
    let output_path = dir.join(format!("{}.mp4", Uuid::new_v4()));

    info!(url = %url, output = %output_path.display(), "Downloading video");

    let mut last_error = String::from("Unknown error");

    for format in FORMAT_SELECTORS {
        let output = Command::new(&ytdlp)
            .args(["--no-playlist", "--no-progress", "-f", format, "-o"])
            .arg(&output_path)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if output.status.success() && output_path.is_file() {
            let file_size = output_path.metadata()?.len();
            info!(
                output = %output_path.display(),
                format = format,
                size_mb = file_size as f64 / (1024.0 * 1024.0),
                "Downloaded video successfully"
            );
            return Ok(output_path);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        debug!("yt-dlp stderr: {}", stderr);
        last_error = last_error_line(&stderr)
            .unwrap_or("Output file not created")
            .to_string();
        warn!(url = %url, format = format, error = %last_error, "yt-dlp download attempt failed");

        // A failed attempt can leave a partial file behind
        tokio::fs::remove_file(&output_path).await.ok();
    }

    Err(MediaError::download_failed(format!(
        "yt-dlp failed: {}",
        last_error
    )))
}

fn last_error_line(stderr: &str) -> Option<&str> {
    stderr.lines().rev().map(str::trim).find(|l| !l.is_empty())
}
