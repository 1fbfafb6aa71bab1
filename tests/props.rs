//! Property-based tests for the clamp and range invariants.

use proptest::prelude::*;
use viewfinder::testing::SyntheticBackend;
use viewfinder::{CameraController, CameraError, CapturePreset, ControllerOptions};

fn controller() -> CameraController {
    CameraController::with_backend(
        Box::new(SyntheticBackend::with_cameras(1)),
        ControllerOptions::new(CapturePreset::High).with_warmup(0),
    )
    .expect("construction failed")
}

proptest! {
    /// For every zoom request z: applied = clamp(z, 1.0, max_zoom).
    #[test]
    fn zoom_is_always_clamped(zoom in -10.0f32..100.0) {
        let controller = controller();
        let max_zoom = controller.active_format().max_zoom;

        let applied = controller.set_zoom(zoom);

        prop_assert!(applied >= 1.0);
        prop_assert!(applied <= max_zoom);
        if (1.0..=max_zoom).contains(&zoom) {
            prop_assert_eq!(applied, zoom);
        }
        prop_assert_eq!(controller.zoom(), applied);
    }

    /// Out-of-range frame rates fail and the active format round-trips
    /// unchanged.
    #[test]
    fn out_of_range_fps_never_changes_the_format(
        fps in prop_oneof![-100.0f32..0.5, 241.0f32..100_000.0],
    ) {
        let controller = controller();
        let before = controller.active_format();

        let result = controller.switch_fps(fps);

        prop_assert!(matches!(result, Err(CameraError::UnsupportedFrameRate(_))));
        prop_assert_eq!(controller.active_format(), before);
    }

    /// In-range frame rates apply, and reset restores the default.
    #[test]
    fn in_range_fps_round_trips_through_reset(fps in 1.0f32..240.0) {
        let controller = controller();
        let default = controller.default_format();

        controller.switch_fps(fps).expect("in-range switch must succeed");
        prop_assert_eq!(controller.active_format().fps, fps);

        controller.reset_to_default_format().expect("reset must succeed");
        prop_assert_eq!(controller.active_format(), default);
    }
}
