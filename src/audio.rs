//! Microphone input binding.
//!
//! When a controller is constructed with `use_mic`, the default input
//! device is opened and its PCM frames are buffered with a drop-oldest
//! policy. The stream starts and stops with the capture session. Audio
//! is monitored, not muxed into recordings.

use crate::errors::CameraError;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Stream, StreamConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Bounded buffer: at 48kHz with ~20ms device callbacks this is about
/// five seconds before frames start dropping.
const MAX_BUFFER_FRAMES: usize = 256;

/// A chunk of interleaved f32 PCM as delivered by the device.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
    /// Seconds since the input was opened.
    pub timestamp: f64,
}

/// Microphone stream bound to the capture session.
pub struct MicrophoneInput {
    stream: Option<Stream>,
    receiver: crossbeam_channel::Receiver<AudioFrame>,
    is_running: Arc<AtomicBool>,
    sample_rate: u32,
    channels: u16,
}

impl MicrophoneInput {
    /// Open the system default input device.
    pub fn open() -> Result<Self, CameraError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| CameraError::AudioError("No default audio input device".to_string()))?;

        let supported_config = device
            .default_input_config()
            .map_err(|e| CameraError::AudioError(format!("No supported config: {}", e)))?;

        let config = StreamConfig {
            channels: supported_config.channels(),
            sample_rate: supported_config.sample_rate(),
            buffer_size: cpal::BufferSize::Default,
        };

        let (sender, receiver) = crossbeam_channel::bounded(MAX_BUFFER_FRAMES);
        let is_running = Arc::new(AtomicBool::new(false));
        let is_running_cb = is_running.clone();
        let origin = Instant::now();
        let sample_rate = config.sample_rate.0;
        let channels = config.channels;

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if !is_running_cb.load(Ordering::Relaxed) {
                        return;
                    }
                    let frame = AudioFrame {
                        samples: data.to_vec(),
                        sample_rate,
                        channels,
                        timestamp: origin.elapsed().as_secs_f64(),
                    };
                    // Non-blocking: a full buffer drops this frame.
                    let _ = sender.try_send(frame);
                },
                move |err| {
                    log::error!("Audio capture error: {}", err);
                },
                None,
            )
            .map_err(|e| CameraError::AudioError(format!("Failed to build stream: {}", e)))?;

        Ok(Self {
            stream: Some(stream),
            receiver,
            is_running,
            sample_rate,
            channels,
        })
    }

    /// Start capturing (idempotent).
    pub fn start(&mut self) -> Result<(), CameraError> {
        if self.is_running.load(Ordering::Relaxed) {
            return Ok(());
        }
        if let Some(ref stream) = self.stream {
            stream
                .play()
                .map_err(|e| CameraError::AudioError(format!("Failed to start stream: {}", e)))?;
            self.is_running.store(true, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Stop capturing (idempotent).
    pub fn stop(&mut self) -> Result<(), CameraError> {
        if !self.is_running.load(Ordering::Relaxed) {
            return Ok(());
        }
        if let Some(ref stream) = self.stream {
            stream
                .pause()
                .map_err(|e| CameraError::AudioError(format!("Failed to stop stream: {}", e)))?;
            self.is_running.store(false, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Read one buffered frame without blocking.
    pub fn try_read(&self) -> Option<AudioFrame> {
        self.receiver.try_recv().ok()
    }

    /// Drain all buffered frames without blocking.
    pub fn drain(&self) -> Vec<AudioFrame> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.receiver.try_recv() {
            frames.push(frame);
        }
        frames
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Relaxed)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }
}

impl Drop for MicrophoneInput {
    fn drop(&mut self) {
        let _ = self.stop();
        self.stream = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_stop_idempotent() {
        // Only exercised when an input device exists on the host.
        if let Ok(mut mic) = MicrophoneInput::open() {
            assert!(mic.start().is_ok());
            assert!(mic.start().is_ok());
            assert!(mic.stop().is_ok());
            assert!(mic.stop().is_ok());
        }
    }
}
