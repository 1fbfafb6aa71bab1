//! Encoder + muxer pairing that turns captured frames into an MP4 file.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::time::Instant;

use muxide::api::{Metadata, MuxerBuilder, VideoCodec};

use super::config::{RecordingConfig, RecordingStats};
use super::encoder::FrameEncoder;
use crate::errors::CameraError;
use crate::types::FrameResult;

/// Writes captured frames to an MP4 file: H.264 encode, then mux.
///
/// Frames arriving faster than the configured rate are dropped rather
/// than accelerating playback; frames with mismatched dimensions are a
/// hard error because the track header is already written.
pub struct Recorder {
    encoder: FrameEncoder,
    muxer: muxide::api::Muxer<BufWriter<File>>,
    config: RecordingConfig,
    output_path: String,
    frame_count: u64,
    dropped_frames: u64,
    start_time: Option<Instant>,
    last_frame_time: Option<Instant>,
    frame_duration_secs: f64,
}

impl Recorder {
    pub fn new<P: AsRef<Path>>(
        output_path: P,
        config: RecordingConfig,
    ) -> Result<Self, CameraError> {
        let output_path_str = output_path.as_ref().to_string_lossy().to_string();

        let file = File::create(&output_path)
            .map_err(|e| CameraError::IoError(format!("Failed to create output file: {}", e)))?;
        let writer = BufWriter::new(file);

        let encoder = FrameEncoder::new(config.width, config.height)?;

        let mut builder = MuxerBuilder::new(writer)
            .video(VideoCodec::H264, config.width, config.height, config.fps)
            .with_fast_start(config.fast_start);

        let metadata = match &config.title {
            Some(title) => Metadata::new().with_title(title).with_current_time(),
            None => Metadata::new().with_current_time(),
        };
        builder = builder.with_metadata(metadata);

        let muxer = builder
            .build()
            .map_err(|e| CameraError::MuxingError(format!("Failed to create muxer: {}", e)))?;

        let frame_duration_secs = 1.0 / config.fps;

        Ok(Self {
            encoder,
            muxer,
            config,
            output_path: output_path_str,
            frame_count: 0,
            dropped_frames: 0,
            start_time: None,
            last_frame_time: None,
            frame_duration_secs,
        })
    }

    /// Append one captured frame to the recording.
    pub fn write_frame(&mut self, frame: &FrameResult) -> Result<(), CameraError> {
        let now = Instant::now();

        if self.start_time.is_none() {
            self.start_time = Some(now);
        }

        // Rate limiting: a frame arriving well before its slot is skipped.
        if let Some(last_time) = self.last_frame_time {
            let elapsed = now.duration_since(last_time).as_secs_f64();
            if elapsed < self.frame_duration_secs * 0.8 {
                self.dropped_frames += 1;
                return Ok(());
            }
        }

        if frame.width != self.config.width || frame.height != self.config.height {
            return Err(CameraError::EncodingError(format!(
                "Frame dimensions {}x{} don't match recording config {}x{}",
                frame.width, frame.height, self.config.width, self.config.height
            )));
        }

        let encoded = self.encoder.encode_frame(frame)?;

        // The encoder may produce no output for some frames.
        if encoded.data.is_empty() {
            self.dropped_frames += 1;
            return Ok(());
        }

        let pts = self.frame_count as f64 * self.frame_duration_secs;

        self.muxer
            .write_video(pts, &encoded.data, encoded.is_keyframe)
            .map_err(|e| CameraError::MuxingError(format!("Failed to write frame: {}", e)))?;

        self.frame_count += 1;
        self.last_frame_time = Some(now);

        Ok(())
    }

    /// Finalize the file and return statistics.
    pub fn finish(self) -> Result<RecordingStats, CameraError> {
        let muxer_stats = self
            .muxer
            .finish_with_stats()
            .map_err(|e| CameraError::MuxingError(format!("Failed to finalize recording: {}", e)))?;

        let actual_duration = self
            .start_time
            .map(|start| start.elapsed().as_secs_f64())
            .unwrap_or(muxer_stats.duration_secs);

        let actual_fps = if actual_duration > 0.0 {
            self.frame_count as f64 / actual_duration
        } else {
            0.0
        };

        Ok(RecordingStats {
            video_frames: muxer_stats.video_frames,
            duration_secs: muxer_stats.duration_secs,
            bytes_written: muxer_stats.bytes_written,
            actual_fps,
            dropped_frames: self.dropped_frames,
            output_path: self.output_path,
        })
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames
    }

    /// Seconds since the first frame was written.
    pub fn duration(&self) -> f64 {
        self.start_time
            .map(|start| start.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    pub fn force_keyframe(&mut self) {
        self.encoder.force_keyframe();
    }
}
