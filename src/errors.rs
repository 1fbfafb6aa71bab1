use std::fmt;

#[derive(Debug)]
pub enum CameraError {
    /// No camera exists at the requested position.
    DeviceNotFound(String),
    /// Camera access has not been authorized for this process.
    AccessDenied(String),
    /// The capture preset is not recognized by the selected device.
    UnsupportedPreset(String),
    /// The requested frame rate is outside the active format's range.
    UnsupportedFrameRate(String),
    /// A recording is already in progress.
    AlreadyRecording(String),
    /// Recording could not be started, written, or finalized.
    RecordingFailed(String),
    /// A configuration transaction failed and was rolled back.
    ConfigurationFailed(String),
    /// Frame acquisition from the capture source failed.
    CaptureError(String),
    /// The capture stream could not be opened or closed.
    StreamError(String),
    /// Filesystem failure while writing frames or snapshots.
    IoError(String),
    #[cfg(feature = "recording")]
    EncodingError(String),
    #[cfg(feature = "recording")]
    MuxingError(String),
    #[cfg(feature = "audio")]
    AudioError(String),
}

impl fmt::Display for CameraError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CameraError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            CameraError::AccessDenied(msg) => write!(f, "Camera access denied: {}", msg),
            CameraError::UnsupportedPreset(msg) => write!(f, "Unsupported preset: {}", msg),
            CameraError::UnsupportedFrameRate(msg) => {
                write!(f, "Unsupported frame rate: {}", msg)
            }
            CameraError::AlreadyRecording(msg) => write!(f, "Already recording: {}", msg),
            CameraError::RecordingFailed(msg) => write!(f, "Recording failed: {}", msg),
            CameraError::ConfigurationFailed(msg) => {
                write!(f, "Configuration transaction failed: {}", msg)
            }
            CameraError::CaptureError(msg) => write!(f, "Capture error: {}", msg),
            CameraError::StreamError(msg) => write!(f, "Stream error: {}", msg),
            CameraError::IoError(msg) => write!(f, "IO error: {}", msg),
            #[cfg(feature = "recording")]
            CameraError::EncodingError(msg) => write!(f, "Encoding error: {}", msg),
            #[cfg(feature = "recording")]
            CameraError::MuxingError(msg) => write!(f, "Muxing error: {}", msg),
            #[cfg(feature = "audio")]
            CameraError::AudioError(msg) => write!(f, "Audio error: {}", msg),
        }
    }
}

impl std::error::Error for CameraError {}
