//! Device selection: position lookup, preset resolution, and frame-rate
//! validation against a device's advertised formats.

use crate::errors::CameraError;
use crate::types::{CameraDeviceInfo, CameraFormat, CameraPosition, CapturePreset};

/// A snapshot of the cameras a backend enumerated, with the selection
/// rules the session uses when binding and rotating devices.
#[derive(Debug, Clone)]
pub struct DeviceSelector {
    devices: Vec<CameraDeviceInfo>,
}

impl DeviceSelector {
    pub fn new(devices: Vec<CameraDeviceInfo>) -> Self {
        Self { devices }
    }

    pub fn devices(&self) -> &[CameraDeviceInfo] {
        &self.devices
    }

    /// First device at `position`, or `DeviceNotFound`.
    pub fn select(&self, position: CameraPosition) -> Result<&CameraDeviceInfo, CameraError> {
        self.devices
            .iter()
            .find(|d| d.position == position)
            .ok_or_else(|| {
                CameraError::DeviceNotFound(format!("no {} camera available", position))
            })
    }

    /// Whether rotation away from `position` has somewhere to go.
    pub fn has_position(&self, position: CameraPosition) -> bool {
        self.devices.iter().any(|d| d.position == position)
    }

    /// Resolve the preset into the device's highest-priority matching
    /// format, failing with `UnsupportedPreset` when the device cannot
    /// satisfy it.
    pub fn default_format(
        &self,
        device: &CameraDeviceInfo,
        preset: CapturePreset,
    ) -> Result<CameraFormat, CameraError> {
        device.default_format_for(preset).ok_or_else(|| {
            CameraError::UnsupportedPreset(format!(
                "preset {} is not supported by device {}",
                preset, device.name
            ))
        })
    }

    /// Validate a frame-rate request against the active format. Leaves
    /// nothing applied; callers only proceed on `Ok`.
    pub fn validate_fps(format: &CameraFormat, fps: f32) -> Result<(), CameraError> {
        if format.supports_fps(fps) {
            Ok(())
        } else {
            Err(CameraError::UnsupportedFrameRate(format!(
                "{} fps is outside the supported range {}..={} for {}x{}",
                fps, format.fps_min, format.fps_max, format.width, format.height
            )))
        }
    }
}
