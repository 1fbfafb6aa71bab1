//! Recording contracts: state machine, delegate semantics, and the
//! end-to-end capture -> record -> finalize scenario.
//!
//! Run with: cargo test --test recording_test --features recording

#![cfg(feature = "recording")]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::tempdir;
use viewfinder::testing::SyntheticBackend;
use viewfinder::{
    CameraController, CameraError, CapturePreset, ControllerOptions, RecordingDelegate,
    RecordingState, RecordingStats,
};

struct CollectingDelegate {
    calls: AtomicUsize,
    last: Mutex<Option<(PathBuf, Result<RecordingStats, String>)>>,
}

impl CollectingDelegate {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            last: Mutex::new(None),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn last(&self) -> Option<(PathBuf, Result<RecordingStats, String>)> {
        self.last.lock().expect("lock poisoned").clone()
    }
}

impl RecordingDelegate for CollectingDelegate {
    fn on_recording_finished(&self, path: &Path, result: Result<RecordingStats, CameraError>) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().expect("lock poisoned") =
            Some((path.to_path_buf(), result.map_err(|e| e.to_string())));
    }
}

fn recording_controller() -> CameraController {
    CameraController::with_backend(
        Box::new(SyntheticBackend::with_cameras(1)),
        ControllerOptions::new(CapturePreset::High)
            .with_file_output(true)
            .with_warmup(0),
    )
    .expect("construction failed")
}

fn wait_until<F: Fn() -> bool>(cond: F, what: &str) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn end_to_end_record_and_finalize() {
    let dir = tempdir().expect("tempdir failed");
    let path = dir.path().join("clip.mp4");

    let controller = recording_controller();
    let delegate = CollectingDelegate::new();
    controller.set_recording_delegate(delegate.clone());

    controller.start_camera_capture().expect("start failed");
    controller
        .start_recording(path.clone())
        .expect("start_recording failed");
    assert!(controller.is_recording());
    assert_eq!(
        controller.recording_state(),
        RecordingState::Recording(path.clone())
    );

    // Let at least a handful of frames flow into the writer.
    let layer = controller.preview_layer().clone();
    wait_until(|| layer.frames_seen() >= 10, "captured frames");

    assert!(controller.stop_recording());
    assert!(!controller.is_recording());

    // stop_recording joins the writer, so the delegate has fired.
    assert_eq!(delegate.calls(), 1);
    let (reported_path, result) = delegate.last().expect("delegate result missing");
    assert_eq!(reported_path, path);
    let stats = result.expect("recording should finalize cleanly");
    assert!(stats.video_frames > 0);
    assert!(stats.bytes_written > 0);

    let metadata = std::fs::metadata(&path).expect("output file missing");
    assert!(metadata.len() > 0, "output file should be non-empty");

    controller.stop_camera_capture().expect("stop failed");
}

#[test]
fn second_start_fails_and_original_recording_continues() {
    let dir = tempdir().expect("tempdir failed");
    let first = dir.path().join("first.mp4");
    let second = dir.path().join("second.mp4");

    let controller = recording_controller();
    controller.start_camera_capture().expect("start failed");
    controller
        .start_recording(first.clone())
        .expect("start_recording failed");

    let err = controller.start_recording(second.clone()).unwrap_err();
    assert!(matches!(err, CameraError::AlreadyRecording(_)));
    assert_eq!(
        controller.recording_state(),
        RecordingState::Recording(first.clone()),
        "the original recording is unaffected"
    );

    let layer = controller.preview_layer().clone();
    wait_until(|| layer.frames_seen() >= 5, "captured frames");
    assert!(controller.stop_recording());

    assert!(std::fs::metadata(&first).expect("first file missing").len() > 0);
    assert!(!second.exists(), "rejected start must not create a file");

    controller.stop_camera_capture().expect("stop failed");
}

#[test]
fn stop_recording_when_idle_is_a_noop() {
    let controller = recording_controller();
    let delegate = CollectingDelegate::new();
    controller.set_recording_delegate(delegate.clone());

    assert!(!controller.stop_recording());
    assert_eq!(delegate.calls(), 0);
    assert_eq!(controller.recording_state(), RecordingState::Idle);
}

#[test]
fn recording_requires_file_output_at_construction() {
    let controller = CameraController::with_backend(
        Box::new(SyntheticBackend::with_cameras(1)),
        ControllerOptions::new(CapturePreset::High).with_warmup(0),
    )
    .expect("construction failed");

    let err = controller
        .start_recording(std::env::temp_dir().join("viewfinder_no_output.mp4"))
        .unwrap_err();
    assert!(matches!(err, CameraError::RecordingFailed(_)));
}

#[test]
fn recording_is_independent_of_the_sample_buffer_gate() {
    let dir = tempdir().expect("tempdir failed");
    let path = dir.path().join("gated.mp4");

    let controller = recording_controller();
    assert!(
        !controller.is_capturing_sample_buffers(),
        "tap stays disabled for this test"
    );

    controller.start_camera_capture().expect("start failed");
    controller
        .start_recording(path.clone())
        .expect("start_recording failed");

    let layer = controller.preview_layer().clone();
    wait_until(|| layer.frames_seen() >= 10, "captured frames");

    // Toggling the tap off/on while recording changes nothing for the
    // file output.
    controller.capture_sample_buffers(true);
    controller.capture_sample_buffers(false);

    assert!(controller.stop_recording());
    assert!(
        std::fs::metadata(&path).expect("output file missing").len() > 0,
        "frames reached the recorder without the tap"
    );

    controller.stop_camera_capture().expect("stop failed");
}

#[test]
fn stop_capture_during_recording_lets_finalization_complete() {
    let dir = tempdir().expect("tempdir failed");
    let path = dir.path().join("interrupted.mp4");

    let controller = recording_controller();
    let delegate = CollectingDelegate::new();
    controller.set_recording_delegate(delegate.clone());

    controller.start_camera_capture().expect("start failed");
    controller
        .start_recording(path.clone())
        .expect("start_recording failed");

    let layer = controller.preview_layer().clone();
    wait_until(|| layer.frames_seen() >= 5, "captured frames");

    // Pausing capture mid-recording cancels frame delivery but leaves
    // the writer free to finalize explicitly.
    controller.stop_camera_capture().expect("stop failed");
    assert!(controller.is_recording());

    assert!(controller.stop_recording());
    assert_eq!(delegate.calls(), 1);
    let (_, result) = delegate.last().expect("delegate result missing");
    assert!(result.is_ok(), "file must finalize, not corrupt");
    assert!(std::fs::metadata(&path).expect("output file missing").len() > 0);
}
