//! Core value types shared across the capture pipeline.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Physical position of a capture device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CameraPosition {
    Back,
    Front,
}

impl CameraPosition {
    /// The opposite position, used by camera rotation.
    pub fn toggled(self) -> Self {
        match self {
            CameraPosition::Back => CameraPosition::Front,
            CameraPosition::Front => CameraPosition::Back,
        }
    }
}

impl fmt::Display for CameraPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraPosition::Back => write!(f, "back"),
            CameraPosition::Front => write!(f, "front"),
        }
    }
}

/// Fill mode for a preview surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoGravity {
    /// Fit inside the surface, preserving aspect ratio.
    ResizeAspect,
    /// Fill the surface, preserving aspect ratio (may crop).
    ResizeAspectFill,
    /// Stretch to the surface bounds.
    Resize,
}

impl VideoGravity {
    /// Next mode in the fit -> fill -> stretch cycle.
    pub fn cycled(self) -> Self {
        match self {
            VideoGravity::ResizeAspect => VideoGravity::ResizeAspectFill,
            VideoGravity::ResizeAspectFill => VideoGravity::Resize,
            VideoGravity::Resize => VideoGravity::ResizeAspect,
        }
    }
}

impl Default for VideoGravity {
    fn default() -> Self {
        VideoGravity::ResizeAspect
    }
}

/// Orientation applied to session output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputOrientation {
    Portrait,
    PortraitUpsideDown,
    LandscapeLeft,
    LandscapeRight,
}

impl Default for OutputOrientation {
    fn default() -> Self {
        OutputOrientation::Portrait
    }
}

/// A capture format a device can run: resolution, frame-rate range, and
/// the maximum zoom factor the format supports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraFormat {
    pub width: u32,
    pub height: u32,
    /// Default frame rate for this format.
    pub fps: f32,
    /// Inclusive supported frame-rate range.
    pub fps_min: f32,
    pub fps_max: f32,
    /// Zoom is clamped to [1.0, max_zoom].
    pub max_zoom: f32,
    /// Pixel format reported by the backend (RGB8, YUYV, MJPEG, ...).
    pub format_type: String,
}

impl CameraFormat {
    pub fn new(width: u32, height: u32, fps: f32) -> Self {
        Self {
            width,
            height,
            fps,
            fps_min: 1.0,
            fps_max: fps,
            max_zoom: 1.0,
            format_type: "RGB8".to_string(),
        }
    }

    pub fn with_fps_range(mut self, min: f32, max: f32) -> Self {
        self.fps_min = min;
        self.fps_max = max;
        self
    }

    pub fn with_max_zoom(mut self, max_zoom: f32) -> Self {
        self.max_zoom = max_zoom.max(1.0);
        self
    }

    pub fn with_format_type(mut self, format_type: String) -> Self {
        self.format_type = format_type;
        self
    }

    /// Whether `fps` falls inside this format's supported range.
    pub fn supports_fps(&self, fps: f32) -> bool {
        fps.is_finite() && fps >= self.fps_min && fps <= self.fps_max
    }

    /// Clamp a zoom request into this format's legal range.
    pub fn clamp_zoom(&self, zoom: f32) -> f32 {
        if !zoom.is_finite() {
            return 1.0;
        }
        zoom.clamp(1.0, self.max_zoom.max(1.0))
    }
}

/// Named capture capability requested at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapturePreset {
    /// 1920x1080
    High,
    /// 1280x720
    Medium,
    /// 640x480
    Low,
    /// Explicit resolution, e.g. "1920x1080".
    Exact { width: u32, height: u32 },
}

impl CapturePreset {
    /// Target resolution for the preset.
    pub fn resolution(&self) -> (u32, u32) {
        match self {
            CapturePreset::High => (1920, 1080),
            CapturePreset::Medium => (1280, 720),
            CapturePreset::Low => (640, 480),
            CapturePreset::Exact { width, height } => (*width, *height),
        }
    }
}

impl fmt::Display for CapturePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapturePreset::High => write!(f, "high"),
            CapturePreset::Medium => write!(f, "medium"),
            CapturePreset::Low => write!(f, "low"),
            CapturePreset::Exact { width, height } => write!(f, "{}x{}", width, height),
        }
    }
}

/// A preset string the parser does not recognize.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unrecognized capture preset: {0}")]
pub struct PresetParseError(pub String);

impl FromStr for CapturePreset {
    type Err = PresetParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(CapturePreset::High),
            "medium" => Ok(CapturePreset::Medium),
            "low" => Ok(CapturePreset::Low),
            other => {
                let (w, h) = other
                    .split_once('x')
                    .ok_or_else(|| PresetParseError(s.to_string()))?;
                let width = w.parse().map_err(|_| PresetParseError(s.to_string()))?;
                let height = h.parse().map_err(|_| PresetParseError(s.to_string()))?;
                if width == 0 || height == 0 {
                    return Err(PresetParseError(s.to_string()));
                }
                Ok(CapturePreset::Exact { width, height })
            }
        }
    }
}

/// A physical capture device as reported by a backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraDeviceInfo {
    pub id: String,
    pub name: String,
    pub position: CameraPosition,
    /// Supported formats in priority order (first = preferred).
    pub formats: Vec<CameraFormat>,
    pub description: Option<String>,
}

impl CameraDeviceInfo {
    pub fn new(id: String, name: String, position: CameraPosition) -> Self {
        Self {
            id,
            name,
            position,
            formats: Vec::new(),
            description: None,
        }
    }

    pub fn with_formats(mut self, formats: Vec<CameraFormat>) -> Self {
        self.formats = formats;
        self
    }

    pub fn with_description(mut self, description: String) -> Self {
        self.description = Some(description);
        self
    }

    /// Highest-priority format satisfying the preset, if any.
    ///
    /// Exact presets require an exact resolution match. Named presets
    /// resolve to an exact match when one exists, otherwise to the
    /// device's preferred (first) format.
    pub fn default_format_for(&self, preset: CapturePreset) -> Option<CameraFormat> {
        let (width, height) = preset.resolution();
        let exact = self
            .formats
            .iter()
            .find(|f| f.width == width && f.height == height)
            .cloned();
        match preset {
            CapturePreset::Exact { .. } => exact,
            _ => exact.or_else(|| self.formats.first().cloned()),
        }
    }
}

/// Metadata captured alongside every frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameMetadata {
    /// Monotonic capture sequence, starting at 1.
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub orientation: OutputOrientation,
    /// Zoom factor in effect when the frame was captured.
    pub zoom: f32,
    pub device_id: String,
}

/// Immutable per-frame snapshot handed to every consumer.
///
/// Pixel data is shared (`Bytes`), so cloning across consumer threads is
/// cheap. A frame that failed to decode carries `error` and empty data;
/// consumers skip it, the stream continues.
#[derive(Debug, Clone)]
pub struct FrameResult {
    pub width: u32,
    pub height: u32,
    /// RGB24 pixel data; empty when `error` is set.
    pub data: Bytes,
    pub metadata: FrameMetadata,
    pub error: Option<String>,
}

impl FrameResult {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }
}

/// Delivery counters for a running session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaptureStats {
    /// Frames handed to at least the preview layer.
    pub frames_delivered: u64,
    /// Frames discarded inside configuration-transaction windows.
    pub frames_dropped: u64,
}
