//! Platform caption retrieval via yt-dlp and WebVTT parsing.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::command::check_ytdlp;
use crate::error::{MediaError, MediaResult};

static CUE_TIMING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^((?:\d{2,}:)?\d{2}:\d{2}\.\d{3})\s+-->\s+((?:\d{2,}:)?\d{2}:\d{2}\.\d{3})")
        .expect("valid cue timing regex")
});

static INLINE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid tag regex"));

/// Largest gap between cues still treated as one rolling caption.
const ROLLING_GAP_SECS: f64 = 0.05;

/// One timed caption cue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionCue {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Fetch platform captions for `url` in `language`.
///
/// Both uploaded and automatic captions are accepted. Returns `Ok(None)` when
/// the platform has no captions in that language. Subtitle files are written
/// to a scratch directory under `dir` and removed before returning.
pub async fn fetch_subtitles(
    url: &str,
    language: &str,
    dir: impl AsRef<Path>,
) -> MediaResult<Option<Vec<CaptionCue>>> {
    let ytdlp = check_ytdlp()?;

    tokio::fs::create_dir_all(dir.as_ref()).await?;
    let scratch = tempfile::Builder::new()
        .prefix("subs_")
        .tempdir_in(dir.as_ref())?;
    let output_template = scratch.path().join("%(id)s");

    info!(url = %url, language = %language, "Fetching captions with yt-dlp");

    let output = Command::new(&ytdlp)
        .args([
            "--no-playlist",
            "--write-auto-sub",
            "--write-sub",
            "--sub-lang",
            language,
            "--skip-download",
            "--sub-format",
            "vtt",
            "--output",
        ])
        .arg(&output_template)
        .arg(url)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(MediaError::SubtitlesFailed(format!(
            "yt-dlp failed to fetch captions: {}",
            stderr.trim()
        )));
    }

    let Some(vtt_path) = pick_vtt_file(scratch.path(), language)? else {
        debug!(url = %url, language = %language, "No caption file produced");
        return Ok(None);
    };

    let content = tokio::fs::read_to_string(&vtt_path).await?;
    let cues = parse_vtt(&content);
    if cues.is_empty() {
        warn!(path = %vtt_path.display(), "Caption file contained no cues");
        return Ok(None);
    }

    info!(url = %url, cues = cues.len(), "Parsed platform captions");
    Ok(Some(cues))
}

/// Pick the `.vtt` file to use, preferring names tagged with `language`.
fn pick_vtt_file(dir: &Path, language: &str) -> MediaResult<Option<PathBuf>> {
    let mut vtt_files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().and_then(|s| s.to_str()) == Some("vtt"))
        .collect();

    let tag = format!(".{}", language);
    vtt_files.sort_by_key(|path| {
        let name = path.file_name().map(|n| n.to_string_lossy().to_string());
        match name {
            Some(n) if n.contains(&format!("{}.", tag)) => 0,
            Some(n) if n.contains(&tag) => 1,
            _ => 2,
        }
    });

    Ok(vtt_files.into_iter().next())
}

/// Parse WebVTT content into timed cues.
///
/// Inline tags are stripped. Rolling auto-captions repeat the previous line
/// at the top of each cue, so a line equal to the last emitted line is
/// dropped when its cue starts where the previous cue ended; a cue with
/// nothing new then extends the previous cue. Repeats after a gap are kept
/// as cues of their own.
pub fn parse_vtt(content: &str) -> Vec<CaptionCue> {
    let mut cues: Vec<CaptionCue> = Vec::new();
    let mut timing: Option<(f64, f64)> = None;
    let mut lines: Vec<String> = Vec::new();
    let mut last_line = String::new();

    for raw in content.lines() {
        let line = raw.trim();

        if let Some(caps) = CUE_TIMING.captures(line) {
            flush_cue(&mut timing, &mut lines, &mut cues);
            if let (Some(start), Some(end)) = (parse_timestamp(&caps[1]), parse_timestamp(&caps[2])) {
                timing = Some((start, end.max(start)));
            }
            continue;
        }

        if line.is_empty() {
            flush_cue(&mut timing, &mut lines, &mut cues);
            continue;
        }

        // Header, metadata blocks and cue identifiers outside a cue body
        if timing.is_none() {
            continue;
        }

        let text = INLINE_TAG.replace_all(line, "");
        let text = decode_entities(text.trim());
        if text.is_empty() {
            continue;
        }
        if text == last_line {
            let rolling = !lines.is_empty()
                || match (timing, cues.last()) {
                    (Some((start, _)), Some(prev)) => continues(prev, start),
                    _ => false,
                };
            if rolling {
                continue;
            }
        }
        last_line = text.clone();
        lines.push(text);
    }
    flush_cue(&mut timing, &mut lines, &mut cues);

    cues
}

fn flush_cue(timing: &mut Option<(f64, f64)>, lines: &mut Vec<String>, cues: &mut Vec<CaptionCue>) {
    if let Some((start, end)) = timing.take() {
        if lines.is_empty() {
            if let Some(prev) = cues.last_mut() {
                if continues(prev, start) && end > prev.end {
                    prev.end = end;
                }
            }
        } else {
            cues.push(CaptionCue {
                start,
                end,
                text: lines.join(" "),
            });
        }
    }
    lines.clear();
}

/// Whether a cue starting at `start` directly follows `prev`.
fn continues(prev: &CaptionCue, start: f64) -> bool {
    start <= prev.end + ROLLING_GAP_SECS
}

/// Parse `HH:MM:SS.mmm` or `MM:SS.mmm` into seconds.
fn parse_timestamp(ts: &str) -> Option<f64> {
    let mut seconds = 0.0;
    for part in ts.split(':') {
        let value: f64 = part.parse().ok()?;
        seconds = seconds * 60.0 + value;
    }
    Some(seconds)
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp("00:00:01.500"), Some(1.5));
        assert_eq!(parse_timestamp("01:02.250"), Some(62.25));
        assert_eq!(parse_timestamp("01:00:00.000"), Some(3600.0));
        assert_eq!(parse_timestamp("xx:00.000"), None);
    }

    #[test]
    fn test_parse_simple_vtt() {
        let vtt = "WEBVTT\nKind: captions\nLanguage: en\n\n1\n00:00:00.000 --> 00:00:02.000\nHello <c>there</c>\n\n2\n00:00:02.000 --> 00:00:04.500 align:start position:0%\nGeneral Kenobi\nyou are a bold one\n";
        let cues = parse_vtt(vtt);

        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].text, "Hello there");
        assert_eq!(cues[0].start, 0.0);
        assert_eq!(cues[0].end, 2.0);
        assert_eq!(cues[1].text, "General Kenobi you are a bold one");
        assert_eq!(cues[1].end, 4.5);
    }

    #[test]
    fn test_rolling_captions_deduplicated() {
        let vtt = "WEBVTT\n\n00:00:01.000 --> 00:00:03.000\nfirst line\n\n00:00:03.000 --> 00:00:03.010\nfirst line\n\n00:00:03.010 --> 00:00:05.000\nfirst line\nsecond line\n";
        let cues = parse_vtt(vtt);

        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].text, "first line");
        assert!((cues[0].end - 3.01).abs() < 1e-9);
        assert_eq!(cues[1].text, "second line");
        assert_eq!(cues[1].start, 3.01);
    }

    #[test]
    fn test_repeated_line_after_gap_is_separate_cue() {
        let vtt = "WEBVTT\n\n00:00:10.000 --> 00:00:12.000\nsomething else\n\n00:01:00.000 --> 00:01:02.000\nsomething else\n";
        let cues = parse_vtt(vtt);

        assert_eq!(
            cues,
            vec![
                CaptionCue {
                    start: 10.0,
                    end: 12.0,
                    text: "something else".to_string(),
                },
                CaptionCue {
                    start: 60.0,
                    end: 62.0,
                    text: "something else".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_empty_cue_after_gap_does_not_stretch_previous() {
        let vtt = "WEBVTT\n\n00:00:01.000 --> 00:00:02.000\nhello\n\n00:00:30.000 --> 00:00:31.000\n<c> </c>\n";
        let cues = parse_vtt(vtt);

        assert_eq!(cues.len(), 1);
        assert_eq!(cues[0].end, 2.0);
    }

    #[test]
    fn test_header_only_vtt() {
        assert!(parse_vtt("WEBVTT\n\n").is_empty());
        assert!(parse_vtt("").is_empty());
    }

    #[test]
    fn test_pick_vtt_prefers_language() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("abc.de.vtt"), "WEBVTT").unwrap();
        std::fs::write(dir.path().join("abc.en-GB.vtt"), "WEBVTT").unwrap();
        std::fs::write(dir.path().join("abc.en.vtt"), "WEBVTT").unwrap();
        std::fs::write(dir.path().join("abc.info.json"), "{}").unwrap();

        let picked = pick_vtt_file(dir.path(), "en").unwrap().unwrap();
        assert_eq!(picked.file_name().unwrap(), "abc.en.vtt");

        let empty = tempfile::TempDir::new().unwrap();
        assert!(pick_vtt_file(empty.path(), "en").unwrap().is_none());
    }
}
