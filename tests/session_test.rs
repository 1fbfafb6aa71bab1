//! Session lifecycle and reconfiguration tests against the synthetic
//! backend (no hardware required).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use viewfinder::testing::SyntheticBackend;
use viewfinder::{
    CameraController, CameraError, CameraPosition, CapturePreset, ControllerOptions,
    OutputOrientation, SessionState, VideoGravity,
};

fn controller_with(cameras: usize) -> CameraController {
    CameraController::with_backend(
        Box::new(SyntheticBackend::with_cameras(cameras)),
        ControllerOptions::new(CapturePreset::High).with_warmup(0),
    )
    .expect("construction failed")
}

fn wait_until<F: Fn() -> bool>(cond: F, what: &str) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn start_is_idempotent() {
    let controller = controller_with(1);
    assert_eq!(controller.state(), SessionState::Configured);
    controller.start_camera_capture().expect("start failed");
    controller
        .start_camera_capture()
        .expect("second start should be a no-op");
    assert_eq!(controller.state(), SessionState::Running);
    controller.stop_camera_capture().expect("stop failed");
}

#[test]
fn double_stop_is_a_noop() {
    let controller = controller_with(1);
    controller.start_camera_capture().expect("start failed");
    controller.stop_camera_capture().expect("stop failed");
    assert_eq!(controller.state(), SessionState::Paused);
    controller
        .stop_camera_capture()
        .expect("second stop should be a no-op");
    assert_eq!(controller.state(), SessionState::Paused);
}

#[test]
fn stop_before_start_is_a_noop() {
    let controller = controller_with(1);
    controller.stop_camera_capture().expect("stop should no-op");
    assert_eq!(controller.state(), SessionState::Configured);
}

#[test]
fn frames_reach_the_preview_layer() {
    let controller = controller_with(1);
    controller.start_camera_capture().expect("start failed");

    let layer = controller.preview_layer().clone();
    wait_until(|| layer.frames_seen() >= 3, "layer frames");
    let frame = layer.current_frame().expect("layer should hold a frame");
    assert_eq!((frame.width, frame.height), (320, 240));
    assert!(frame.is_ok());

    controller.stop_camera_capture().expect("stop failed");
    assert!(controller.stats().frames_delivered >= 3);
}

#[test]
fn rotate_with_two_cameras_swaps_device() {
    let controller = controller_with(2);
    assert_eq!(controller.device().position, CameraPosition::Back);

    controller.rotate_camera().expect("rotate failed");
    assert_eq!(controller.device().position, CameraPosition::Front);

    controller.rotate_camera().expect("rotate back failed");
    assert_eq!(controller.device().position, CameraPosition::Back);
}

#[test]
fn rotate_with_single_camera_is_noop() {
    let controller = controller_with(1);
    let before = controller.device();
    let dropped_before = controller.stats().frames_dropped;

    controller.rotate_camera().expect("rotation must not error");

    let after = controller.device();
    assert_eq!(before.id, after.id);
    assert_eq!(before.position, after.position);
    assert_eq!(controller.stats().frames_dropped, dropped_before);
}

#[test]
fn rotation_while_running_keeps_frames_flowing() {
    let controller = controller_with(2);
    controller.start_camera_capture().expect("start failed");

    let layer = controller.preview_layer().clone();
    wait_until(|| layer.frames_seen() >= 2, "frames before rotation");

    controller.rotate_camera().expect("rotate failed");
    assert_eq!(controller.device().position, CameraPosition::Front);

    let seen = layer.frames_seen();
    wait_until(|| layer.frames_seen() > seen, "frames after rotation");

    controller.stop_camera_capture().expect("stop failed");
}

#[test]
fn zoom_requests_are_clamped() {
    let controller = controller_with(1);
    let max_zoom = controller.active_format().max_zoom;

    assert_eq!(controller.set_zoom(0.5), 1.0);
    assert_eq!(controller.set_zoom(2.0), 2.0);
    assert_eq!(controller.set_zoom(max_zoom + 50.0), max_zoom);
    assert_eq!(controller.zoom(), max_zoom);
}

#[test]
fn out_of_range_fps_leaves_format_unchanged() {
    let controller = controller_with(1);
    let before = controller.active_format();

    let err = controller.switch_fps(100_000.0).unwrap_err();
    assert!(matches!(err, CameraError::UnsupportedFrameRate(_)));
    assert_eq!(controller.active_format(), before);
}

#[test]
fn fps_switch_and_reset_round_trip() {
    let controller = controller_with(1);
    let default = controller.default_format();

    controller.switch_fps(60.0).expect("switch failed");
    assert_eq!(controller.active_format().fps, 60.0);

    controller
        .reset_to_default_format()
        .expect("reset failed");
    assert_eq!(controller.active_format(), default);
}

#[test]
fn layer_config_completion_fires_after_commit() {
    let controller = controller_with(1);
    let fired = Arc::new(AtomicBool::new(false));
    let flag = fired.clone();

    controller
        .apply_layer_config(
            Some(VideoGravity::Resize),
            Some(OutputOrientation::LandscapeLeft),
            Box::new(move || flag.store(true, Ordering::SeqCst)),
        )
        .expect("layer config failed");

    assert!(fired.load(Ordering::SeqCst));
    assert_eq!(controller.preview_layer().gravity(), VideoGravity::Resize);
    assert_eq!(
        controller.output_orientation(),
        OutputOrientation::LandscapeLeft
    );
}

#[test]
fn gravity_toggle_cycles_the_layer() {
    let controller = controller_with(1);
    assert_eq!(
        controller.toggle_contents_gravity(),
        VideoGravity::ResizeAspectFill
    );
    assert_eq!(controller.toggle_contents_gravity(), VideoGravity::Resize);
    assert_eq!(
        controller.toggle_contents_gravity(),
        VideoGravity::ResizeAspect
    );
}

#[test]
fn missing_back_camera_fails_construction() {
    let result = CameraController::with_backend(
        Box::new(SyntheticBackend::with_cameras(0)),
        ControllerOptions::new(CapturePreset::High),
    );
    assert!(matches!(result, Err(CameraError::DeviceNotFound(_))));
}
