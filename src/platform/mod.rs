//! Hardware capture abstraction.
//!
//! The session talks to cameras through [`CaptureSource`] and discovers
//! them through [`CameraBackend`]. Production code uses
//! [`PlatformBackend`], which drives nokhwa's native backends; tests use
//! the synthetic backend in [`crate::testing`].

use crate::errors::CameraError;
use crate::permissions::{self, PermissionStatus};
use crate::types::{CameraDeviceInfo, CameraFormat, CameraPosition};
use nokhwa::{
    pixel_format::RgbFormat,
    query,
    utils::{RequestedFormat, RequestedFormatType},
    CallbackCamera,
};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// One buffer as it comes off the hardware, before it becomes a
/// [`crate::types::FrameResult`].
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// RGB24 pixel data; empty when `decode_error` is set.
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Set when the backend delivered a buffer it could not decode.
    /// The frame still flows downstream so the error is observable.
    pub decode_error: Option<String>,
}

/// An open stream on one capture device.
///
/// Implementations pace `capture_frame` to the configured frame rate and
/// must tolerate `start_stream`/`stop_stream` being called repeatedly.
pub trait CaptureSource: Send {
    fn device_id(&self) -> &str;

    fn start_stream(&mut self) -> Result<(), CameraError>;

    fn stop_stream(&mut self) -> Result<(), CameraError>;

    /// Block until the next frame is available and return it.
    fn capture_frame(&mut self) -> Result<RawFrame, CameraError>;

    /// Change the delivery frame rate. The caller has already validated
    /// the rate against the active format.
    fn apply_frame_rate(&mut self, _fps: f32) -> Result<(), CameraError> {
        Ok(())
    }

    /// Apply a (pre-clamped) zoom factor. Sources without optical or
    /// digital zoom record it as metadata only.
    fn apply_zoom(&mut self, _zoom: f32) -> Result<(), CameraError> {
        Ok(())
    }
}

/// Camera discovery and stream construction for one platform.
pub trait CameraBackend: Send + Sync {
    /// Authorization state for camera access. Checked once, at
    /// controller construction.
    fn authorization(&self) -> PermissionStatus;

    /// Devices in priority order. Position mapping for desktop
    /// enumerations: first device is Back, second is Front.
    fn list_devices(&self) -> Result<Vec<CameraDeviceInfo>, CameraError>;

    fn open(
        &self,
        device: &CameraDeviceInfo,
        format: &CameraFormat,
    ) -> Result<Box<dyn CaptureSource>, CameraError>;
}

/// Production backend on top of nokhwa's native camera APIs.
#[derive(Debug, Default)]
pub struct PlatformBackend;

impl PlatformBackend {
    pub fn new() -> Self {
        Self
    }
}

impl CameraBackend for PlatformBackend {
    fn authorization(&self) -> PermissionStatus {
        permissions::check_permission()
    }

    fn list_devices(&self) -> Result<Vec<CameraDeviceInfo>, CameraError> {
        let cameras = query(nokhwa::utils::ApiBackend::Auto).map_err(|e| {
            CameraError::DeviceNotFound(format!("Failed to query cameras: {}", e))
        })?;

        let mut device_list = Vec::new();
        for (slot, camera_info) in cameras.into_iter().enumerate() {
            let position = if slot == 1 {
                CameraPosition::Front
            } else {
                CameraPosition::Back
            };
            let device = CameraDeviceInfo::new(
                camera_info.index().to_string(),
                camera_info.human_name(),
                position,
            )
            .with_description(camera_info.description().to_string())
            .with_formats(common_formats());
            device_list.push(device);
        }

        Ok(device_list)
    }

    fn open(
        &self,
        device: &CameraDeviceInfo,
        format: &CameraFormat,
    ) -> Result<Box<dyn CaptureSource>, CameraError> {
        let device_index = device.id.parse::<u32>().map_err(|_| {
            CameraError::DeviceNotFound(format!("Invalid device ID: {}", device.id))
        })?;

        let requested_format = RequestedFormat::new::<RgbFormat>(RequestedFormatType::None);
        let camera = CallbackCamera::new(
            nokhwa::utils::CameraIndex::Index(device_index),
            requested_format,
            |_| {},
        )
        .map_err(|e| CameraError::StreamError(format!("Failed to initialize camera: {}", e)))?;

        Ok(Box::new(NokhwaSource {
            camera: Arc::new(Mutex::new(camera)),
            device_id: device.id.clone(),
            frame_interval: frame_interval(format.fps),
            last_frame: None,
        }))
    }
}

/// Formats advertised for native devices, priority order. Backends on
/// desktop APIs do not report per-format zoom or rate limits, so these
/// carry the ranges the session negotiates against.
fn common_formats() -> Vec<CameraFormat> {
    vec![
        CameraFormat::new(1920, 1080, 30.0)
            .with_fps_range(1.0, 60.0)
            .with_max_zoom(4.0),
        CameraFormat::new(1280, 720, 30.0)
            .with_fps_range(1.0, 60.0)
            .with_max_zoom(6.0),
        CameraFormat::new(640, 480, 30.0)
            .with_fps_range(1.0, 120.0)
            .with_max_zoom(8.0),
    ]
}

fn frame_interval(fps: f32) -> Duration {
    let fps = fps.max(1.0);
    Duration::from_secs_f64(1.0 / fps as f64)
}

struct NokhwaSource {
    camera: Arc<Mutex<CallbackCamera>>,
    device_id: String,
    frame_interval: Duration,
    last_frame: Option<Instant>,
}

impl CaptureSource for NokhwaSource {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn start_stream(&mut self) -> Result<(), CameraError> {
        let mut camera = self
            .camera
            .lock()
            .map_err(|_| CameraError::StreamError("Failed to lock camera".to_string()))?;
        if camera.is_stream_open() {
            return Ok(());
        }
        camera
            .open_stream()
            .map_err(|e| CameraError::StreamError(format!("Failed to start stream: {}", e)))?;
        Ok(())
    }

    fn stop_stream(&mut self) -> Result<(), CameraError> {
        let mut camera = self
            .camera
            .lock()
            .map_err(|_| CameraError::StreamError("Failed to lock camera".to_string()))?;
        if !camera.is_stream_open() {
            return Ok(());
        }
        camera
            .stop_stream()
            .map_err(|e| CameraError::StreamError(format!("Failed to stop stream: {}", e)))?;
        Ok(())
    }

    fn capture_frame(&mut self) -> Result<RawFrame, CameraError> {
        // Pace delivery to the negotiated rate; hardware may run faster.
        if let Some(last) = self.last_frame {
            let elapsed = last.elapsed();
            if elapsed < self.frame_interval {
                std::thread::sleep(self.frame_interval - elapsed);
            }
        }
        self.last_frame = Some(Instant::now());

        let mut camera = self
            .camera
            .lock()
            .map_err(|_| CameraError::CaptureError("Failed to lock camera".to_string()))?;

        let frame = camera
            .poll_frame()
            .map_err(|e| CameraError::CaptureError(format!("Failed to capture frame: {}", e)))?;

        let resolution = frame.resolution();
        match frame.decode_image::<RgbFormat>() {
            Ok(decoded) => Ok(RawFrame {
                data: decoded.into_raw(),
                width: resolution.width_x,
                height: resolution.height_y,
                decode_error: None,
            }),
            // A single undecodable buffer surfaces as an error frame and
            // the stream keeps going.
            Err(e) => Ok(RawFrame {
                data: Vec::new(),
                width: resolution.width_x,
                height: resolution.height_y,
                decode_error: Some(format!("Failed to decode frame: {}", e)),
            }),
        }
    }

    fn apply_frame_rate(&mut self, fps: f32) -> Result<(), CameraError> {
        self.frame_interval = frame_interval(fps);
        Ok(())
    }
}
