//! Synthetic capture backend producing deterministic gradient frames.

use crate::errors::CameraError;
use crate::permissions::PermissionStatus;
use crate::platform::{CameraBackend, CaptureSource, RawFrame};
use crate::types::{
    CameraDeviceInfo, CameraFormat, CameraPosition, FrameMetadata, FrameResult,
    OutputOrientation,
};
use bytes::Bytes;
use std::time::{Duration, Instant};

/// Gradient pattern that changes per frame, so temporal consumers (the
/// encoder, ordering assertions) see distinct content.
fn gradient(frame_number: u64, width: u32, height: u32) -> Vec<u8> {
    let mut data = vec![0u8; (width * height * 3) as usize];
    let base = (frame_number % 256) as u8;
    for y in 0..height {
        for x in 0..width {
            let idx = ((y * width + x) * 3) as usize;
            data[idx] = base.wrapping_add((x % 256) as u8);
            data[idx + 1] = base.wrapping_add((y % 256) as u8);
            data[idx + 2] = base.wrapping_add(((x + y) % 256) as u8);
        }
    }
    data
}

/// Build a ready-made `FrameResult` for unit tests.
pub fn synthetic_frame(sequence: u64, width: u32, height: u32, device_id: &str) -> FrameResult {
    FrameResult {
        width,
        height,
        data: Bytes::from(gradient(sequence, width, height)),
        metadata: FrameMetadata {
            sequence,
            timestamp: chrono::Utc::now(),
            orientation: OutputOrientation::default(),
            zoom: 1.0,
            device_id: device_id.to_string(),
        },
        error: None,
    }
}

/// A [`CameraBackend`] with no hardware behind it. Devices advertise
/// small formats with wide frame-rate ranges so tests run fast; named
/// presets resolve to the first format.
#[derive(Debug, Clone)]
pub struct SyntheticBackend {
    devices: Vec<CameraDeviceInfo>,
    authorization: PermissionStatus,
}

impl SyntheticBackend {
    /// `count` cameras: the first is Back, the second Front, any others
    /// Back again, mirroring the platform backend's position mapping.
    pub fn with_cameras(count: usize) -> Self {
        let devices = (0..count)
            .map(|slot| {
                let position = if slot == 1 {
                    CameraPosition::Front
                } else {
                    CameraPosition::Back
                };
                CameraDeviceInfo::new(
                    slot.to_string(),
                    format!("Synthetic Camera {}", slot),
                    position,
                )
                .with_formats(synthetic_formats())
            })
            .collect();
        Self {
            devices,
            authorization: PermissionStatus::Granted,
        }
    }

    /// A backend whose authorization probe reports `Denied`.
    pub fn denied() -> Self {
        Self {
            devices: Vec::new(),
            authorization: PermissionStatus::Denied,
        }
    }
}

fn synthetic_formats() -> Vec<CameraFormat> {
    vec![
        CameraFormat::new(320, 240, 120.0)
            .with_fps_range(1.0, 240.0)
            .with_max_zoom(4.0),
        CameraFormat::new(160, 120, 120.0)
            .with_fps_range(1.0, 240.0)
            .with_max_zoom(8.0),
    ]
}

impl CameraBackend for SyntheticBackend {
    fn authorization(&self) -> PermissionStatus {
        self.authorization
    }

    fn list_devices(&self) -> Result<Vec<CameraDeviceInfo>, CameraError> {
        Ok(self.devices.clone())
    }

    fn open(
        &self,
        device: &CameraDeviceInfo,
        format: &CameraFormat,
    ) -> Result<Box<dyn CaptureSource>, CameraError> {
        Ok(Box::new(SyntheticSource {
            device_id: device.id.clone(),
            width: format.width,
            height: format.height,
            frame_interval: Duration::from_secs_f64(1.0 / format.fps.max(1.0) as f64),
            counter: 0,
            streaming: false,
            last_frame: None,
        }))
    }
}

struct SyntheticSource {
    device_id: String,
    width: u32,
    height: u32,
    frame_interval: Duration,
    counter: u64,
    streaming: bool,
    last_frame: Option<Instant>,
}

impl CaptureSource for SyntheticSource {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn start_stream(&mut self) -> Result<(), CameraError> {
        self.streaming = true;
        Ok(())
    }

    fn stop_stream(&mut self) -> Result<(), CameraError> {
        self.streaming = false;
        Ok(())
    }

    fn capture_frame(&mut self) -> Result<RawFrame, CameraError> {
        if !self.streaming {
            return Err(CameraError::CaptureError(
                "stream is not open".to_string(),
            ));
        }
        if let Some(last) = self.last_frame {
            let elapsed = last.elapsed();
            if elapsed < self.frame_interval {
                std::thread::sleep(self.frame_interval - elapsed);
            }
        }
        self.last_frame = Some(Instant::now());
        self.counter += 1;
        Ok(RawFrame {
            data: gradient(self.counter, self.width, self.height),
            width: self.width,
            height: self.height,
            decode_error: None,
        })
    }

    fn apply_frame_rate(&mut self, fps: f32) -> Result<(), CameraError> {
        self.frame_interval = Duration::from_secs_f64(1.0 / fps.max(1.0) as f64);
        Ok(())
    }
}
