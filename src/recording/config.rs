//! Recording configuration and result statistics.

use serde::{Deserialize, Serialize};

/// Parameters for one recording, derived from the session's active
/// format when a recording starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingConfig {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Target bitrate in bits per second.
    pub bitrate: u32,
    /// Write the moov atom before mdat so the file streams.
    pub fast_start: bool,
    pub title: Option<String>,
}

impl RecordingConfig {
    pub fn new(width: u32, height: u32, fps: f64) -> Self {
        Self {
            width,
            height,
            fps,
            bitrate: 5_000_000,
            fast_start: true,
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_bitrate(mut self, bitrate: u32) -> Self {
        self.bitrate = bitrate;
        self
    }

    pub fn with_fast_start(mut self, enabled: bool) -> Self {
        self.fast_start = enabled;
        self
    }
}

/// Statistics handed to the recording delegate after finalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingStats {
    pub video_frames: u64,
    pub duration_secs: f64,
    pub bytes_written: u64,
    /// Average frames per second actually achieved.
    pub actual_fps: f64,
    /// Frames skipped by rate limiting or empty encoder output.
    pub dropped_frames: u64,
    pub output_path: String,
}

impl RecordingStats {
    /// Average bitrate achieved over the recording.
    pub fn avg_bitrate(&self) -> f64 {
        if self.duration_secs > 0.0 {
            (self.bytes_written as f64 * 8.0) / self.duration_secs
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_builder_applies_options() {
        let config = RecordingConfig::new(1280, 720, 30.0)
            .with_title("clip")
            .with_bitrate(2_500_000)
            .with_fast_start(false);
        assert_eq!(config.title.as_deref(), Some("clip"));
        assert_eq!(config.bitrate, 2_500_000);
        assert!(!config.fast_start);
    }

    #[test]
    fn avg_bitrate_handles_zero_duration() {
        let stats = RecordingStats {
            video_frames: 0,
            duration_secs: 0.0,
            bytes_written: 0,
            actual_fps: 0.0,
            dropped_frames: 0,
            output_path: "out.mp4".to_string(),
        };
        assert_eq!(stats.avg_bitrate(), 0.0);
    }
}
