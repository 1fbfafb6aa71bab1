//! The public controller: one capture session, N preview consumers, an
//! optional recording, and an optional frame callback.

#[cfg(feature = "audio")]
use crate::audio::MicrophoneInput;
use crate::config::ViewfinderConfig;
use crate::errors::CameraError;
use crate::platform::{CameraBackend, PlatformBackend};
use crate::preview::{ImageContext, PreviewConsumer, PreviewLayer};
#[cfg(feature = "recording")]
use crate::recording::{FileOutput, RecordingDelegate, RecordingState};
use crate::session::{SessionManager, SessionState};
use crate::tap::{FrameTap, PreviewId};
use crate::types::{
    CameraDeviceInfo, CameraFormat, CaptureStats, CapturePreset, FrameResult, OutputOrientation,
    VideoGravity,
};
#[cfg(feature = "recording")]
use std::path::PathBuf;
use std::sync::Arc;
#[cfg(feature = "audio")]
use std::sync::Mutex;

/// Construction-time toggles. Each is independent of the others.
pub struct ControllerOptions {
    pub preset: CapturePreset,
    pub use_mic: bool,
    pub use_file_output: bool,
    /// Frames discarded after stream start while the sensor settles.
    pub warmup_frames: u32,
    frame_callback: Option<Box<dyn Fn(FrameResult) + Send + Sync>>,
    preview: Option<Arc<dyn PreviewConsumer>>,
}

impl ControllerOptions {
    pub fn new(preset: CapturePreset) -> Self {
        Self {
            preset,
            use_mic: false,
            use_file_output: false,
            warmup_frames: 5,
            frame_callback: None,
            preview: None,
        }
    }

    /// Parse the preset from a named capability string, taking the
    /// remaining defaults from the config file.
    pub fn from_preset_str(preset: &str, config: &ViewfinderConfig) -> Result<Self, CameraError> {
        let preset = preset
            .parse::<CapturePreset>()
            .map_err(|e| CameraError::UnsupportedPreset(e.to_string()))?;
        Ok(Self::new(preset).with_warmup(config.capture.warmup_frames))
    }

    pub fn with_microphone(mut self, use_mic: bool) -> Self {
        self.use_mic = use_mic;
        self
    }

    pub fn with_file_output(mut self, use_file_output: bool) -> Self {
        self.use_file_output = use_file_output;
        self
    }

    pub fn with_warmup(mut self, warmup_frames: u32) -> Self {
        self.warmup_frames = warmup_frames;
        self
    }

    /// Initial frame-callback subscriber. Providing one also enables
    /// sample-buffer capture, since the caller clearly wants frames.
    pub fn with_frame_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(FrameResult) + Send + Sync + 'static,
    {
        self.frame_callback = Some(Box::new(callback));
        self
    }

    /// Preview consumer registered before the first frame flows.
    pub fn with_preview(mut self, preview: Arc<dyn PreviewConsumer>) -> Self {
        self.preview = Some(preview);
        self
    }
}

/// Owns the capture session and every output attached to it. Dropping
/// the controller tears the whole pipeline down.
pub struct CameraController {
    session: SessionManager,
    tap: Arc<FrameTap>,
    layer: Arc<PreviewLayer>,
    image_context: ImageContext,
    #[cfg(feature = "recording")]
    file_output: Option<Arc<FileOutput>>,
    #[cfg(feature = "audio")]
    microphone: Mutex<Option<MicrophoneInput>>,
}

impl CameraController {
    /// Construct against the platform camera backend.
    pub fn new(options: ControllerOptions) -> Result<Self, CameraError> {
        Self::with_backend(Box::new(PlatformBackend::new()), options)
    }

    /// Construct against an explicit backend (tests use the synthetic
    /// one). Fatal on authorization, device, or preset failure; no
    /// controller exists afterwards.
    pub fn with_backend(
        backend: Box<dyn CameraBackend>,
        options: ControllerOptions,
    ) -> Result<Self, CameraError> {
        let layer = Arc::new(PreviewLayer::new());
        let tap = Arc::new(FrameTap::new());

        #[cfg(feature = "recording")]
        let file_output = options.use_file_output.then(|| Arc::new(FileOutput::new()));
        #[cfg(not(feature = "recording"))]
        if options.use_file_output {
            log::warn!("file output requested but crate built without the recording feature");
        }

        #[cfg(feature = "recording")]
        let session = SessionManager::bind(
            backend,
            options.preset,
            options.warmup_frames,
            layer.clone(),
            tap.clone(),
            file_output.clone(),
        )?;
        #[cfg(not(feature = "recording"))]
        let session = SessionManager::bind(
            backend,
            options.preset,
            options.warmup_frames,
            layer.clone(),
            tap.clone(),
        )?;

        if let Some(callback) = options.frame_callback {
            tap.set_frame_callback(callback)?;
            tap.set_enabled(true);
        }
        if let Some(preview) = options.preview {
            tap.add_consumer(preview)?;
        }

        #[cfg(feature = "audio")]
        let microphone = if options.use_mic {
            match MicrophoneInput::open() {
                Ok(mic) => Some(mic),
                // A missing microphone never fails construction.
                Err(e) => {
                    log::warn!("microphone unavailable: {}", e);
                    None
                }
            }
        } else {
            None
        };
        #[cfg(not(feature = "audio"))]
        if options.use_mic {
            log::warn!("microphone requested but crate built without the audio feature");
        }

        Ok(Self {
            session,
            tap,
            layer,
            image_context: ImageContext::new(),
            #[cfg(feature = "recording")]
            file_output,
            #[cfg(feature = "audio")]
            microphone: Mutex::new(microphone),
        })
    }

    // --- lifecycle -----------------------------------------------------

    /// Start frame delivery. Idempotent while running.
    pub fn start_camera_capture(&self) -> Result<(), CameraError> {
        self.session.start_capture()?;
        #[cfg(feature = "audio")]
        if let Some(mic) = self.microphone.lock().expect("lock poisoned").as_mut() {
            if let Err(e) = mic.start() {
                log::warn!("microphone did not start: {}", e);
            }
        }
        Ok(())
    }

    /// Pause frame delivery, releasing the hardware but keeping the
    /// configuration. Idempotent; safe during recording finalization.
    pub fn stop_camera_capture(&self) -> Result<(), CameraError> {
        #[cfg(feature = "audio")]
        if let Some(mic) = self.microphone.lock().expect("lock poisoned").as_mut() {
            if let Err(e) = mic.stop() {
                log::warn!("microphone did not stop: {}", e);
            }
        }
        self.session.stop_capture()
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    // --- configuration -------------------------------------------------

    /// Toggle front/back camera. No-op when only one camera exists.
    pub fn rotate_camera(&self) -> Result<(), CameraError> {
        self.session.rotate_camera()
    }

    /// Switch the capture frame rate within the active format's range.
    pub fn switch_fps(&self, fps: f32) -> Result<(), CameraError> {
        self.session.switch_fps(fps)
    }

    /// Undo `switch_fps`, restoring the preset's format.
    pub fn reset_to_default_format(&self) -> Result<(), CameraError> {
        self.session.reset_to_default_format()
    }

    /// Apply zoom, clamped to the active format. Returns the factor in
    /// effect afterwards.
    pub fn set_zoom(&self, zoom: f32) -> f32 {
        self.session.set_zoom(zoom)
    }

    pub fn zoom(&self) -> f32 {
        self.session.zoom()
    }

    pub fn set_output_orientation(&self, orientation: OutputOrientation) {
        self.session.set_orientation(orientation);
    }

    pub fn output_orientation(&self) -> OutputOrientation {
        self.session.orientation()
    }

    /// Cycle the on-screen layer's fill mode, returning the new one.
    pub fn toggle_contents_gravity(&self) -> VideoGravity {
        self.layer.toggle_gravity()
    }

    /// Reconfigure the preview layer inside a configuration
    /// transaction; `completion` runs once, after commit.
    pub fn apply_layer_config(
        &self,
        gravity: Option<VideoGravity>,
        orientation: Option<OutputOrientation>,
        completion: Box<dyn FnOnce() + Send>,
    ) -> Result<(), CameraError> {
        self.session.apply_layer_config(gravity, orientation, completion)
    }

    // --- frame tap -----------------------------------------------------

    /// Gate sample-buffer distribution to previews and the frame
    /// callback. The on-screen layer is unaffected.
    pub fn capture_sample_buffers(&self, enabled: bool) {
        self.tap.set_enabled(enabled);
    }

    pub fn is_capturing_sample_buffers(&self) -> bool {
        self.tap.is_enabled()
    }

    /// Replace the frame-callback subscriber (at most one is active).
    pub fn set_frame_callback<F>(&self, callback: F) -> Result<(), CameraError>
    where
        F: Fn(FrameResult) + Send + Sync + 'static,
    {
        self.tap.set_frame_callback(callback)
    }

    /// Remove the frame callback. Returns whether one was set.
    pub fn clear_frame_callback(&self) -> bool {
        self.tap.clear_frame_callback()
    }

    /// Whether a frame callback is subscribed. Callers check this
    /// before enabling paths that assume delivery.
    pub fn has_frame_callback(&self) -> bool {
        self.tap.has_frame_callback()
    }

    // --- previews ------------------------------------------------------

    /// Register a preview consumer. Never blocks or restarts capture.
    pub fn add_preview(&self, consumer: Arc<dyn PreviewConsumer>) -> Result<PreviewId, CameraError> {
        self.tap.add_consumer(consumer)
    }

    /// Unregister a preview consumer; no frame reaches it after this
    /// returns.
    pub fn remove_preview(&self, id: PreviewId) -> bool {
        self.tap.remove_consumer(id)
    }

    pub fn preview_count(&self) -> usize {
        self.tap.consumer_count()
    }

    /// The always-available on-screen preview layer.
    pub fn preview_layer(&self) -> &Arc<PreviewLayer> {
        &self.layer
    }

    /// Shared context for CPU-side conversion and snapshots.
    pub fn image_context(&self) -> &ImageContext {
        &self.image_context
    }

    // --- recording -----------------------------------------------------

    /// Begin recording to `path`. Fails with `AlreadyRecording` while a
    /// recording is active, `RecordingFailed` when the controller was
    /// built without file output.
    #[cfg(feature = "recording")]
    pub fn start_recording(&self, path: PathBuf) -> Result<(), CameraError> {
        self.session.start_recording(path)
    }

    /// Finalize the active recording; no-op when idle. The recording
    /// delegate has fired by the time this returns.
    #[cfg(feature = "recording")]
    pub fn stop_recording(&self) -> bool {
        self.session.stop_recording()
    }

    #[cfg(feature = "recording")]
    pub fn is_recording(&self) -> bool {
        self.session.is_recording()
    }

    #[cfg(feature = "recording")]
    pub fn recording_state(&self) -> RecordingState {
        match &self.file_output {
            Some(output) => output.state(),
            None => RecordingState::Idle,
        }
    }

    /// Subscribe to recording completion. The delegate in place when a
    /// recording starts is notified for that recording.
    #[cfg(feature = "recording")]
    pub fn set_recording_delegate(&self, delegate: Arc<dyn RecordingDelegate>) {
        match &self.file_output {
            Some(output) => output.set_delegate(delegate),
            None => log::warn!("recording delegate set but file output was not configured"),
        }
    }

    // --- audio ---------------------------------------------------------

    /// Drain buffered microphone frames. Empty when the controller was
    /// built without a microphone.
    #[cfg(feature = "audio")]
    pub fn drain_audio(&self) -> Vec<crate::audio::AudioFrame> {
        match self.microphone.lock().expect("lock poisoned").as_ref() {
            Some(mic) => mic.drain(),
            None => Vec::new(),
        }
    }

    #[cfg(feature = "audio")]
    pub fn has_microphone(&self) -> bool {
        self.microphone.lock().expect("lock poisoned").is_some()
    }

    // --- introspection -------------------------------------------------

    pub fn device(&self) -> CameraDeviceInfo {
        self.session.device()
    }

    pub fn active_format(&self) -> CameraFormat {
        self.session.active_format()
    }

    pub fn default_format(&self) -> CameraFormat {
        self.session.default_format()
    }

    pub fn stats(&self) -> CaptureStats {
        self.session.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::SyntheticBackend;

    #[test]
    fn denied_authorization_is_fatal() {
        let result = CameraController::with_backend(
            Box::new(SyntheticBackend::denied()),
            ControllerOptions::new(CapturePreset::High),
        );
        assert!(matches!(result, Err(CameraError::AccessDenied(_))));
    }

    #[test]
    fn unknown_exact_preset_fails_construction() {
        let result = CameraController::with_backend(
            Box::new(SyntheticBackend::with_cameras(1)),
            ControllerOptions::new(CapturePreset::Exact {
                width: 9999,
                height: 9999,
            }),
        );
        assert!(matches!(result, Err(CameraError::UnsupportedPreset(_))));
    }

    #[test]
    fn construction_callback_enables_sample_capture() {
        let controller = CameraController::with_backend(
            Box::new(SyntheticBackend::with_cameras(1)),
            ControllerOptions::new(CapturePreset::High).with_frame_callback(|_frame| {}),
        )
        .expect("construction failed");
        assert!(controller.is_capturing_sample_buffers());
        assert!(controller.has_frame_callback());
    }
}
