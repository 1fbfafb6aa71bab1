//! Viewfinder: a camera capture session controller.
//!
//! One hardware capture session per controller, fanned out to any
//! number of live preview consumers, an optional MP4 recording, and an
//! optional per-frame application callback.
//!
//! # Features
//! - Single-session orchestration with runtime reconfiguration
//!   (rotation, zoom, frame-rate switching) via rollback-safe
//!   configuration transactions
//! - Per-consumer frame queues: slow renderers never stall capture
//! - Always-available on-screen preview layer with gravity cycling
//! - H.264/MP4 recording with a completion delegate (`recording`
//!   feature, on by default)
//! - Microphone monitoring bound to the session (`audio` feature)
//!
//! # Usage
//! ```rust,ignore
//! use viewfinder::{CameraController, ControllerOptions, CapturePreset};
//!
//! let controller = CameraController::new(
//!     ControllerOptions::new(CapturePreset::High).with_file_output(true),
//! )?;
//! controller.start_camera_capture()?;
//! controller.start_recording("clip.mp4".into())?;
//! // ...
//! controller.stop_recording();
//! controller.stop_camera_capture()?;
//! ```

#[cfg(feature = "audio")]
pub mod audio;
pub mod config;
pub mod controller;
pub mod device;
pub mod errors;
pub mod permissions;
pub mod platform;
pub mod preview;
#[cfg(feature = "recording")]
pub mod recording;
pub mod session;
pub mod tap;
pub mod types;

// Testing utilities - synthetic backend for offline testing
pub mod testing;

// Re-exports for convenience
pub use controller::{CameraController, ControllerOptions};
pub use errors::CameraError;
pub use preview::{ImageContext, PreviewConsumer, PreviewLayer};
#[cfg(feature = "recording")]
pub use recording::{RecordingDelegate, RecordingState, RecordingStats};
pub use session::SessionState;
pub use tap::PreviewId;
pub use types::{
    CameraDeviceInfo, CameraFormat, CameraPosition, CaptureStats, CapturePreset, FrameMetadata,
    FrameResult, OutputOrientation, VideoGravity,
};

/// Initialize logging for the capture pipeline.
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "viewfinder=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Crate information structure
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CrateInfo {
    pub name: String,
    pub version: String,
    pub description: String,
}

/// Get crate information
pub fn get_info() -> CrateInfo {
    CrateInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: DESCRIPTION.to_string(),
    }
}

#[cfg(test)]
mod lib_tests {
    use super::*;

    #[test]
    fn test_crate_info() {
        let info = get_info();
        assert_eq!(info.name, "viewfinder");
        assert!(!info.version.is_empty());
        assert!(!info.description.is_empty());
    }

    #[test]
    fn test_crate_info_serializes() {
        let json = serde_json::to_string(&get_info()).expect("serialize failed");
        assert!(json.contains("viewfinder"));
    }
}
