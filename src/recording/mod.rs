//! File recording: H.264 encoding (openh264) muxed into MP4 (muxide),
//! driven by a writer thread fed directly from the capture session.
//!
//! Recording is independent of the frame tap: toggling sample-buffer
//! capture neither starts nor stops a recording.

mod config;
mod encoder;
mod output;
mod recorder;

pub use config::{RecordingConfig, RecordingStats};
pub use encoder::{EncodedFrame, FrameEncoder};
pub use output::{FileOutput, RecordingDelegate, RecordingState};
pub use recorder::Recorder;
