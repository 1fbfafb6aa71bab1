//! Preview integration: the always-available on-screen layer, the
//! consumer trait GPU surfaces implement, and the shared image context
//! used for conversion and snapshots.

use crate::errors::CameraError;
use crate::types::{FrameResult, VideoGravity};
use std::fs::File;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// A registered renderer. Implementations own their drawing surface and
/// rendering context; the controller only hands them frames.
///
/// `render` runs on the consumer's dedicated worker thread and receives
/// frames in capture order. It may be arbitrarily slow without affecting
/// other consumers, and it must not assume any frame outlives the call;
/// clone the `FrameResult` (cheap) to keep it.
pub trait PreviewConsumer: Send + Sync {
    fn render(&self, frame: &FrameResult);
}

/// The primary on-screen preview. Always present, fed directly by the
/// session (not through the frame tap), so it keeps updating even when
/// sample-buffer capture is toggled off.
///
/// A display-refresh driven renderer polls `current_frame` and draws it
/// with the layer's gravity.
#[derive(Debug, Default)]
pub struct PreviewLayer {
    gravity: Mutex<VideoGravity>,
    latest: Mutex<Option<FrameResult>>,
    frames_seen: AtomicU64,
}

impl PreviewLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the newest frame. Error frames are counted but not
    /// displayed; the layer keeps showing the last good frame.
    pub fn submit(&self, frame: FrameResult) {
        self.frames_seen.fetch_add(1, Ordering::Relaxed);
        if frame.is_ok() {
            *self.latest.lock().expect("lock poisoned") = Some(frame);
        }
    }

    pub fn current_frame(&self) -> Option<FrameResult> {
        self.latest.lock().expect("lock poisoned").clone()
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen.load(Ordering::Relaxed)
    }

    pub fn gravity(&self) -> VideoGravity {
        *self.gravity.lock().expect("lock poisoned")
    }

    pub fn set_gravity(&self, gravity: VideoGravity) {
        *self.gravity.lock().expect("lock poisoned") = gravity;
    }

    /// Cycle fit -> fill -> stretch, returning the new mode.
    pub fn toggle_gravity(&self) -> VideoGravity {
        let mut g = self.gravity.lock().expect("lock poisoned");
        *g = g.cycled();
        *g
    }
}

/// Shared color-processing context, owned by the controller and handed
/// to consumers that need CPU-side conversion or filtering.
#[derive(Debug, Default)]
pub struct ImageContext;

impl ImageContext {
    pub fn new() -> Self {
        Self
    }

    /// Materialize a frame as an owned `RgbImage` for filtering work.
    pub fn to_rgb_image(&self, frame: &FrameResult) -> Result<image::RgbImage, CameraError> {
        if let Some(err) = &frame.error {
            return Err(CameraError::CaptureError(format!(
                "frame {} carries a decode error: {}",
                frame.metadata.sequence, err
            )));
        }
        image::RgbImage::from_vec(frame.width, frame.height, frame.data.to_vec()).ok_or_else(
            || {
                CameraError::CaptureError(format!(
                    "frame data size {} does not match {}x{}",
                    frame.data.len(),
                    frame.width,
                    frame.height
                ))
            },
        )
    }

    /// Save a frame to disk. PNG unless the extension says JPEG.
    pub fn save_frame<P: AsRef<Path>>(
        &self,
        frame: &FrameResult,
        path: P,
    ) -> Result<(), CameraError> {
        let img = image::DynamicImage::ImageRgb8(self.to_rgb_image(frame)?);
        let path = path.as_ref();
        let lower = path.to_string_lossy().to_lowercase();
        let format = if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
            image::ImageFormat::Jpeg
        } else {
            image::ImageFormat::Png
        };
        img.save_with_format(path, format)
            .map_err(|e| CameraError::IoError(format!("Failed to save frame: {}", e)))
    }

    /// Save a frame as JPEG with an explicit quality (1-100).
    pub fn save_frame_compressed<P: AsRef<Path>>(
        &self,
        frame: &FrameResult,
        path: P,
        quality: u8,
    ) -> Result<(), CameraError> {
        let img = image::DynamicImage::ImageRgb8(self.to_rgb_image(frame)?);
        let mut file = File::create(path.as_ref())
            .map_err(|e| CameraError::IoError(format!("Failed to create file: {}", e)))?;
        let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut file, quality);
        img.write_with_encoder(encoder)
            .map_err(|e| CameraError::IoError(format!("Failed to save compressed frame: {}", e)))
    }
}
