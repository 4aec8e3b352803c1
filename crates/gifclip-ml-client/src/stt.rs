//! Local speech-to-text through a persistent Whisper worker.
//!
//! The Whisper model is loaded once by a Python child process at startup.
//! Requests and replies are single JSON lines over the child's stdin/stdout;
//! anything Whisper prints is diverted to stderr, which is forwarded to
//! tracing.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{MlError, MlResult};

const WORKER_SCRIPT: &str = r#"
import json
import sys

import whisper

model = whisper.load_model(sys.argv[1])
out = sys.stdout
out.write(json.dumps({"ready": True}) + "\n")
out.flush()

for line in sys.stdin:
    line = line.strip()
    if not line:
        continue
    try:
        req = json.loads(line)
        kwargs = {}
        if req.get("language") is not None:
            kwargs["language"] = req["language"]
        if req.get("fp16") is not None:
            kwargs["fp16"] = req["fp16"]
        if req.get("verbose"):
            kwargs["verbose"] = True
        sys.stdout = sys.stderr
        try:
            result = model.transcribe(req["path"], **kwargs)
        finally:
            sys.stdout = out
        segments = [
            {"start": float(s["start"]), "end": float(s["end"]), "text": s["text"]}
            for s in result.get("segments", [])
        ]
        out.write(json.dumps({"ok": True, "segments": segments}) + "\n")
    except Exception as e:
        out.write(json.dumps({"ok": False, "error": str(e)}) + "\n")
    out.flush()
"#;

/// Options for one transcription call. `None` leaves the engine default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranscribeOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fp16: Option<bool>,
    #[serde(default)]
    pub verbose: bool,
}

impl TranscribeOptions {
    /// Conservative settings: forced language, full-precision, verbose.
    pub fn degraded(language: impl Into<String>) -> Self {
        Self {
            language: Some(language.into()),
            fp16: Some(false),
            verbose: true,
        }
    }
}

/// A recognized span of speech.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// A speech recognizer that runs on a local media file.
#[async_trait]
pub trait SpeechToTextEngine: Send + Sync {
    /// Whether the engine initialized and can accept requests.
    fn is_available(&self) -> bool;

    /// Transcribe the audio of `media`.
    async fn transcribe(
        &self,
        media: &Path,
        options: &TranscribeOptions,
    ) -> MlResult<Vec<SpeechSegment>>;
}

/// Configuration for [`WhisperEngine`].
#[derive(Debug, Clone)]
pub struct WhisperConfig {
    /// Whisper model name (tiny, base, small, ...)
    pub model: String,
    /// Python interpreter with `openai-whisper` installed
    pub python: PathBuf,
    /// How long model loading may take
    pub init_timeout: Duration,
    /// How long a single transcription may take
    pub transcribe_timeout: Duration,
}

impl Default for WhisperConfig {
    fn default() -> Self {
        Self {
            model: "base".to_string(),
            python: PathBuf::from("python3"),
            init_timeout: Duration::from_secs(300),
            transcribe_timeout: Duration::from_secs(1800),
        }
    }
}

impl WhisperConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            model: std::env::var("WHISPER_MODEL").unwrap_or_else(|_| "base".to_string()),
            python: std::env::var("WHISPER_PYTHON")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("python3")),
            init_timeout: Duration::from_secs(
                std::env::var("WHISPER_INIT_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(300),
            ),
            transcribe_timeout: Duration::from_secs(
                std::env::var("WHISPER_TRANSCRIBE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1800),
            ),
        }
    }
}

#[derive(Debug, Serialize)]
struct WorkerRequest<'a> {
    path: &'a Path,
    #[serde(flatten)]
    options: &'a TranscribeOptions,
}

#[derive(Debug, Deserialize)]
struct WorkerReply {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    segments: Vec<SpeechSegment>,
    #[serde(default)]
    error: Option<String>,
}

struct WhisperWorker {
    _child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

/// Whisper engine backed by one long-lived worker process.
pub struct WhisperEngine {
    config: WhisperConfig,
    worker: Option<Mutex<WhisperWorker>>,
    healthy: AtomicBool,
}

impl WhisperEngine {
    /// Start the worker and wait for the model to load.
    ///
    /// Never fails: if the worker cannot start, the returned engine reports
    /// `is_available() == false`.
    pub async fn init(config: WhisperConfig) -> Self {
        match Self::spawn_worker(&config).await {
            Ok(worker) => {
                info!(model = %config.model, "Whisper engine ready");
                Self {
                    config,
                    worker: Some(Mutex::new(worker)),
                    healthy: AtomicBool::new(true),
                }
            }
            Err(e) => {
                warn!(model = %config.model, "Whisper engine unavailable, captions only: {}", e);
                Self::unavailable(config)
            }
        }
    }

    /// An engine that rejects every request.
    pub fn unavailable(config: WhisperConfig) -> Self {
        Self {
            config,
            worker: None,
            healthy: AtomicBool::new(false),
        }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    async fn spawn_worker(config: &WhisperConfig) -> MlResult<WhisperWorker> {
        let mut child = Command::new(&config.python)
            .args(["-c", WORKER_SCRIPT, config.model.as_str()])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| MlError::EngineUnavailable("worker stdin not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MlError::EngineUnavailable("worker stdout not captured".to_string()))?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "gifclip_ml_client::whisper", "{}", line);
                }
            });
        }

        let mut stdout = BufReader::new(stdout).lines();
        let ready = tokio::time::timeout(config.init_timeout, stdout.next_line())
            .await
            .map_err(|_| MlError::Timeout(config.init_timeout.as_secs()))??;

        match ready {
            Some(line) if is_ready_line(&line) => Ok(WhisperWorker {
                _child: child,
                stdin,
                stdout,
            }),
            Some(line) => Err(MlError::EngineUnavailable(format!(
                "unexpected worker greeting: {}",
                line
            ))),
            None => Err(MlError::EngineUnavailable(
                "worker exited while loading the model".to_string(),
            )),
        }
    }
}

fn is_ready_line(line: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(line)
        .map(|v| v.get("ready").and_then(|r| r.as_bool()) == Some(true))
        .unwrap_or(false)
}

#[async_trait]
impl SpeechToTextEngine for WhisperEngine {
    fn is_available(&self) -> bool {
        self.worker.is_some() && self.healthy.load(Ordering::Acquire)
    }

    async fn transcribe(
        &self,
        media: &Path,
        options: &TranscribeOptions,
    ) -> MlResult<Vec<SpeechSegment>> {
        let worker = match &self.worker {
            Some(worker) if self.is_available() => worker,
            _ => {
                return Err(MlError::EngineUnavailable(
                    "Whisper worker is not running".to_string(),
                ))
            }
        };

        let mut line = serde_json::to_string(&WorkerRequest {
            path: media,
            options,
        })?;
        line.push('\n');

        let mut worker = worker.lock().await;
        debug!(path = %media.display(), ?options, "Transcribing with Whisper");

        // Any exit before a full reply is read leaves the pipe out of step.
        let guard = UnhealthyOnDrop::arm(&self.healthy);
        let reply = async {
            worker.stdin.write_all(line.as_bytes()).await?;
            worker.stdin.flush().await?;
            worker.stdout.next_line().await
        };

        let reply = match tokio::time::timeout(self.config.transcribe_timeout, reply).await {
            Ok(Ok(Some(reply))) => reply,
            Ok(Ok(None)) => {
                return Err(MlError::EngineUnavailable("Whisper worker exited".to_string()));
            }
            Ok(Err(e)) => return Err(MlError::Io(e)),
            Err(_) => return Err(MlError::Timeout(self.config.transcribe_timeout.as_secs())),
        };
        guard.disarm();

        parse_reply(&reply)
    }
}

/// Marks the engine unhealthy when dropped while armed.
struct UnhealthyOnDrop<'a> {
    healthy: &'a AtomicBool,
    armed: bool,
}

impl<'a> UnhealthyOnDrop<'a> {
    fn arm(healthy: &'a AtomicBool) -> Self {
        Self {
            healthy,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for UnhealthyOnDrop<'_> {
    fn drop(&mut self) {
        if self.armed {
            warn!("Whisper request abandoned mid-flight, marking worker unhealthy");
            self.healthy.store(false, Ordering::Release);
        }
    }
}

fn parse_reply(line: &str) -> MlResult<Vec<SpeechSegment>> {
    let reply: WorkerReply = serde_json::from_str(line)
        .map_err(|e| MlError::InvalidResponse(format!("Bad worker reply: {}", e)))?;

    if reply.ok {
        Ok(reply.segments)
    } else {
        Err(MlError::TranscriptionFailed(
            reply.error.unwrap_or_else(|| "unknown error".to_string()),
        ))
    }
}
