//! External toolchain availability.

use std::fmt;
use std::path::PathBuf;

use gifclip_media::{check_ffmpeg, check_ffprobe, check_ytdlp};
use serde::Serialize;

use crate::error::{WorkerError, WorkerResult};

/// Which external collaborators are usable in this process.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ToolchainReport {
    pub ffmpeg: Option<PathBuf>,
    pub ffprobe: Option<PathBuf>,
    pub yt_dlp: Option<PathBuf>,
    pub speech_engine: bool,
    pub llm_configured: bool,
}

impl ToolchainReport {
    /// Look up binaries on `PATH`; the model-backed flags come from the caller.
    pub fn probe(speech_engine: bool, llm_configured: bool) -> Self {
        Self {
            ffmpeg: check_ffmpeg().ok(),
            ffprobe: check_ffprobe().ok(),
            yt_dlp: check_ytdlp().ok(),
            speech_engine,
            llm_configured,
        }
    }

    /// Fail unless everything needed to render is present.
    pub fn require_render(&self) -> WorkerResult<()> {
        if self.ffmpeg.is_none() {
            return Err(WorkerError::toolchain_missing("ffmpeg not found in PATH"));
        }
        Ok(())
    }

    /// Fail unless remote sources can be downloaded.
    pub fn require_download(&self) -> WorkerResult<()> {
        if self.yt_dlp.is_none() {
            return Err(WorkerError::toolchain_missing("yt-dlp not found in PATH"));
        }
        Ok(())
    }

    /// Names of missing binaries.
    pub fn missing_binaries(&self) -> Vec<&'static str> {
        [
            ("ffmpeg", self.ffmpeg.is_none()),
            ("ffprobe", self.ffprobe.is_none()),
            ("yt-dlp", self.yt_dlp.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, missing)| missing.then_some(name))
        .collect()
    }
}

impl fmt::Display for ToolchainReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |p: &Option<PathBuf>| {
            p.as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "missing".to_string())
        };
        writeln!(f, "ffmpeg:        {}", show(&self.ffmpeg))?;
        writeln!(f, "ffprobe:       {}", show(&self.ffprobe))?;
        writeln!(f, "yt-dlp:        {}", show(&self.yt_dlp))?;
        writeln!(
            f,
            "speech engine: {}",
            if self.speech_engine { "available" } else { "unavailable (captions only)" }
        )?;
        write!(
            f,
            "llm:           {}",
            if self.llm_configured { "configured" } else { "disabled (heuristic selection)" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gifclip_models::ErrorKind;

    #[test]
    fn test_missing_tools() {
        let report = ToolchainReport::default();
        assert_eq!(report.missing_binaries(), vec!["ffmpeg", "ffprobe", "yt-dlp"]);
        assert_eq!(
            report.require_render().unwrap_err().kind(),
            ErrorKind::ToolchainMissing
        );
        assert!(report.require_download().is_err());
    }

    #[test]
    fn test_complete_toolchain() {
        let report = ToolchainReport {
            ffmpeg: Some(PathBuf::from("/usr/bin/ffmpeg")),
            ffprobe: Some(PathBuf::from("/usr/bin/ffprobe")),
            yt_dlp: Some(PathBuf::from("/usr/bin/yt-dlp")),
            speech_engine: true,
            llm_configured: false,
        };
        assert!(report.missing_binaries().is_empty());
        assert!(report.require_render().is_ok());
        assert!(report.require_download().is_ok());
        assert!(report.to_string().contains("disabled"));
    }
}
