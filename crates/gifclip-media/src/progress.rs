//! FFmpeg progress reports.

use serde::{Deserialize, Serialize};

/// Progress information parsed from `-progress pipe:2` output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FfmpegProgress {
    /// Frames encoded so far
    pub frame: u64,
    /// Current encode FPS
    pub fps: f64,
    /// Output time in milliseconds
    pub out_time_ms: i64,
    /// Encoding speed (1.5 = 1.5x realtime)
    pub speed: f64,
    /// Whether FFmpeg reported `progress=end`
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Calculate progress percentage given total duration in milliseconds.
    pub fn percentage(&self, total_duration_ms: i64) -> f64 {
        if total_duration_ms <= 0 {
            return 0.0;
        }
        ((self.out_time_ms as f64 / total_duration_ms as f64) * 100.0).min(100.0)
    }

    /// Output time in seconds.
    pub fn out_time_seconds(&self) -> f64 {
        self.out_time_ms as f64 / 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_percentage() {
        let progress = FfmpegProgress {
            out_time_ms: 1500,
            ..Default::default()
        };

        assert!((progress.percentage(3000) - 50.0).abs() < 0.01);
        assert!((progress.percentage(1000) - 100.0).abs() < 0.01);
        assert_eq!(progress.percentage(0), 0.0);
        assert!((progress.out_time_seconds() - 1.5).abs() < 1e-9);
    }
}
