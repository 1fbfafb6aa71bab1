//! Capture session lifecycle: state machine, configuration
//! transactions, and the capture thread that fans frames out to the
//! preview layer, the frame tap, and the file output.

use crate::device::DeviceSelector;
use crate::errors::CameraError;
use crate::permissions::PermissionStatus;
use crate::platform::{CameraBackend, CaptureSource, RawFrame};
use crate::preview::PreviewLayer;
#[cfg(feature = "recording")]
use crate::recording::{FileOutput, RecordingConfig};
use crate::tap::FrameTap;
use crate::types::{
    CameraDeviceInfo, CameraFormat, CameraPosition, CaptureStats, CapturePreset, FrameMetadata,
    FrameResult, OutputOrientation, VideoGravity,
};
use bytes::Bytes;
#[cfg(feature = "recording")]
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Session lifecycle. `Stopped` is terminal; the state machine is
/// Configured -> Running <-> Paused -> Stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Configured,
    Running,
    Paused,
    Stopped,
}

/// State the capture thread reads on every frame.
struct Shared {
    source: Mutex<Option<Box<dyn CaptureSource>>>,
    device: Mutex<CameraDeviceInfo>,
    active_format: Mutex<CameraFormat>,
    default_format: Mutex<CameraFormat>,
    zoom: Mutex<f32>,
    orientation: Mutex<OutputOrientation>,
    /// Cleared for the duration of a configuration transaction; frames
    /// polled while clear are dropped, never queued.
    delivering: AtomicBool,
    stop_flag: AtomicBool,
    sequence: AtomicU64,
    frames_delivered: AtomicU64,
    frames_dropped: AtomicU64,
    /// Frames discarded right after stream start while the sensor
    /// settles exposure and focus.
    warmup_remaining: AtomicU32,
    layer: Arc<PreviewLayer>,
    tap: Arc<FrameTap>,
    #[cfg(feature = "recording")]
    file_output: Option<Arc<FileOutput>>,
}

impl Shared {
    fn make_frame(&self, raw: RawFrame) -> FrameResult {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let metadata = FrameMetadata {
            sequence,
            timestamp: chrono::Utc::now(),
            orientation: *self.orientation.lock().expect("lock poisoned"),
            zoom: *self.zoom.lock().expect("lock poisoned"),
            device_id: self.device.lock().expect("lock poisoned").id.clone(),
        };
        FrameResult {
            width: raw.width,
            height: raw.height,
            data: Bytes::from(raw.data),
            metadata,
            error: raw.decode_error,
        }
    }
}

struct ConfigSnapshot {
    device: CameraDeviceInfo,
    active_format: CameraFormat,
    default_format: CameraFormat,
    zoom: f32,
    orientation: OutputOrientation,
    gravity: VideoGravity,
}

/// Owns the single capture session of a controller.
pub struct SessionManager {
    backend: Box<dyn CameraBackend>,
    selector: DeviceSelector,
    preset: CapturePreset,
    warmup_frames: u32,
    shared: Arc<Shared>,
    state: Mutex<SessionState>,
    /// Serializes configuration transactions and start/stop against
    /// each other. A second transaction queues behind the first.
    txn_lock: Mutex<()>,
    capture_thread: Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl SessionManager {
    /// Bind the session: authorize, enumerate, select the back camera,
    /// resolve the preset, and open the stream. Any failure here is
    /// fatal; the caller gets no session.
    pub fn bind(
        backend: Box<dyn CameraBackend>,
        preset: CapturePreset,
        warmup_frames: u32,
        layer: Arc<PreviewLayer>,
        tap: Arc<FrameTap>,
        #[cfg(feature = "recording")] file_output: Option<Arc<FileOutput>>,
    ) -> Result<Self, CameraError> {
        match backend.authorization() {
            PermissionStatus::Granted => {}
            status => {
                return Err(CameraError::AccessDenied(format!(
                    "camera authorization is {}",
                    status
                )))
            }
        }

        let selector = DeviceSelector::new(backend.list_devices()?);
        let device = selector.select(CameraPosition::Back)?.clone();
        let format = selector.default_format(&device, preset)?;
        let source = backend.open(&device, &format)?;

        log::info!(
            "session configured: {} at {}x{} @ {} fps",
            device.name,
            format.width,
            format.height,
            format.fps
        );

        Ok(Self {
            backend,
            selector,
            preset,
            warmup_frames,
            shared: Arc::new(Shared {
                source: Mutex::new(Some(source)),
                device: Mutex::new(device),
                active_format: Mutex::new(format.clone()),
                default_format: Mutex::new(format),
                zoom: Mutex::new(1.0),
                orientation: Mutex::new(OutputOrientation::default()),
                delivering: AtomicBool::new(true),
                stop_flag: AtomicBool::new(false),
                sequence: AtomicU64::new(0),
                frames_delivered: AtomicU64::new(0),
                frames_dropped: AtomicU64::new(0),
                warmup_remaining: AtomicU32::new(0),
                layer,
                tap,
                #[cfg(feature = "recording")]
                file_output,
            }),
            state: Mutex::new(SessionState::Configured),
            txn_lock: Mutex::new(()),
            capture_thread: Mutex::new(None),
        })
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().expect("lock poisoned")
    }

    /// Start (or resume) frame delivery. No-op while already running.
    pub fn start_capture(&self) -> Result<(), CameraError> {
        let _serialized = self.txn_lock.lock().expect("lock poisoned");
        let mut state = self.state.lock().expect("lock poisoned");
        match *state {
            SessionState::Running => return Ok(()),
            SessionState::Stopped => {
                return Err(CameraError::StreamError(
                    "session has been torn down".to_string(),
                ))
            }
            SessionState::Configured | SessionState::Paused => {}
        }

        {
            let mut source = self.shared.source.lock().expect("lock poisoned");
            match source.as_mut() {
                Some(source) => source.start_stream()?,
                None => {
                    return Err(CameraError::StreamError(
                        "capture source is gone".to_string(),
                    ))
                }
            }
        }

        self.shared.stop_flag.store(false, Ordering::Release);
        self.shared
            .warmup_remaining
            .store(self.warmup_frames, Ordering::Release);

        let shared = self.shared.clone();
        let handle = std::thread::Builder::new()
            .name("viewfinder-capture".to_string())
            .spawn(move || capture_loop(shared))
            .map_err(|e| CameraError::StreamError(format!("spawn failed: {}", e)))?;

        *self.capture_thread.lock().expect("lock poisoned") = Some(handle);
        *state = SessionState::Running;
        log::info!("capture started");
        Ok(())
    }

    /// Pause frame delivery and release the hardware stream, keeping
    /// the configuration. No-op unless running. Safe to call while a
    /// recording finalizes; the writer thread is untouched.
    pub fn stop_capture(&self) -> Result<(), CameraError> {
        let _serialized = self.txn_lock.lock().expect("lock poisoned");
        let mut state = self.state.lock().expect("lock poisoned");
        if *state != SessionState::Running {
            return Ok(());
        }

        self.shared.stop_flag.store(true, Ordering::Release);
        let handle = self.capture_thread.lock().expect("lock poisoned").take();
        if let Some(handle) = handle {
            let start = Instant::now();
            let mut handle = Some(handle);
            loop {
                if handle.as_ref().is_some_and(|h| h.is_finished()) {
                    let _ = handle.take().expect("handle checked above").join();
                    break;
                }
                if start.elapsed() >= Duration::from_secs(5) {
                    // Do not hang forever; keep the handle so a later
                    // stop can retry the join.
                    *self.capture_thread.lock().expect("lock poisoned") = handle.take();
                    return Err(CameraError::StreamError(
                        "capture thread did not stop in time".to_string(),
                    ));
                }
                std::thread::sleep(Duration::from_millis(5));
            }
        }

        if let Some(source) = self.shared.source.lock().expect("lock poisoned").as_mut() {
            source.stop_stream()?;
        }

        *state = SessionState::Paused;
        log::info!("capture stopped");
        Ok(())
    }

    /// Swap to the opposite camera inside a configuration transaction.
    /// Silent no-op when no camera exists at the other position.
    pub fn rotate_camera(&self) -> Result<(), CameraError> {
        let target = self
            .shared
            .device
            .lock()
            .expect("lock poisoned")
            .position
            .toggled();
        if !self.selector.has_position(target) {
            log::info!("rotation skipped: no {} camera present", target);
            return Ok(());
        }
        let target_device = self.selector.select(target)?.clone();

        self.with_transaction("rotate", |session| {
            let format = session
                .selector
                .default_format(&target_device, session.preset)
                .map_err(|e| CameraError::ConfigurationFailed(e.to_string()))?;
            let mut new_source = session
                .backend
                .open(&target_device, &format)
                .map_err(|e| CameraError::ConfigurationFailed(e.to_string()))?;
            if session.state() == SessionState::Running {
                new_source
                    .start_stream()
                    .map_err(|e| CameraError::ConfigurationFailed(e.to_string()))?;
            }

            // Commit point. Everything fallible happened above, so the
            // swap itself cannot leave the session half-configured.
            let old = session
                .shared
                .source
                .lock()
                .expect("lock poisoned")
                .replace(new_source);
            if let Some(mut old) = old {
                let _ = old.stop_stream();
            }
            *session.shared.device.lock().expect("lock poisoned") = target_device.clone();
            *session.shared.active_format.lock().expect("lock poisoned") = format.clone();
            *session.shared.default_format.lock().expect("lock poisoned") = format.clone();
            let mut zoom = session.shared.zoom.lock().expect("lock poisoned");
            *zoom = format.clamp_zoom(*zoom);
            log::info!("rotated to {} camera", target_device.position);
            Ok(())
        })
    }

    /// Switch the delivery frame rate. Out-of-range requests fail with
    /// `UnsupportedFrameRate` and leave the active format untouched.
    pub fn switch_fps(&self, fps: f32) -> Result<(), CameraError> {
        let active = self
            .shared
            .active_format
            .lock()
            .expect("lock poisoned")
            .clone();
        DeviceSelector::validate_fps(&active, fps)?;

        self.with_transaction("switch-fps", |session| {
            {
                let mut source = session.shared.source.lock().expect("lock poisoned");
                if let Some(source) = source.as_mut() {
                    source
                        .apply_frame_rate(fps)
                        .map_err(|e| CameraError::ConfigurationFailed(e.to_string()))?;
                }
            }
            session
                .shared
                .active_format
                .lock()
                .expect("lock poisoned")
                .fps = fps;
            log::info!("frame rate switched to {} fps", fps);
            Ok(())
        })
    }

    /// Restore the format the preset originally resolved to, undoing a
    /// prior `switch_fps`.
    pub fn reset_to_default_format(&self) -> Result<(), CameraError> {
        let default = self
            .shared
            .default_format
            .lock()
            .expect("lock poisoned")
            .clone();
        self.with_transaction("reset-format", |session| {
            {
                let mut source = session.shared.source.lock().expect("lock poisoned");
                if let Some(source) = source.as_mut() {
                    source
                        .apply_frame_rate(default.fps)
                        .map_err(|e| CameraError::ConfigurationFailed(e.to_string()))?;
                }
            }
            *session
                .shared
                .active_format
                .lock()
                .expect("lock poisoned") = default.clone();
            Ok(())
        })
    }

    /// Apply a zoom request, clamped into the active format's range.
    /// Never fails; returns the factor actually applied.
    pub fn set_zoom(&self, zoom: f32) -> f32 {
        let applied = self
            .shared
            .active_format
            .lock()
            .expect("lock poisoned")
            .clamp_zoom(zoom);
        *self.shared.zoom.lock().expect("lock poisoned") = applied;
        if let Some(source) = self.shared.source.lock().expect("lock poisoned").as_mut() {
            if let Err(e) = source.apply_zoom(applied) {
                log::warn!("zoom not applied by source: {}", e);
            }
        }
        applied
    }

    pub fn zoom(&self) -> f32 {
        *self.shared.zoom.lock().expect("lock poisoned")
    }

    pub fn set_orientation(&self, orientation: OutputOrientation) {
        *self.shared.orientation.lock().expect("lock poisoned") = orientation;
    }

    pub fn orientation(&self) -> OutputOrientation {
        *self.shared.orientation.lock().expect("lock poisoned")
    }

    /// Reconfigure the preview layer inside a transaction and invoke
    /// `completion` exactly once, after the commit succeeded.
    pub fn apply_layer_config(
        &self,
        gravity: Option<VideoGravity>,
        orientation: Option<OutputOrientation>,
        completion: Box<dyn FnOnce() + Send>,
    ) -> Result<(), CameraError> {
        self.with_transaction("layer-config", |session| {
            if let Some(gravity) = gravity {
                session.shared.layer.set_gravity(gravity);
            }
            if let Some(orientation) = orientation {
                *session.shared.orientation.lock().expect("lock poisoned") = orientation;
            }
            Ok(())
        })?;
        completion();
        Ok(())
    }

    #[cfg(feature = "recording")]
    pub fn start_recording(&self, path: PathBuf) -> Result<(), CameraError> {
        let output = self.shared.file_output.as_ref().ok_or_else(|| {
            CameraError::RecordingFailed("file output was not configured at construction".into())
        })?;
        let format = self
            .shared
            .active_format
            .lock()
            .expect("lock poisoned")
            .clone();
        let config = RecordingConfig::new(format.width, format.height, format.fps as f64);
        output.start(path, config)
    }

    /// Finalize the active recording, if any. Returns whether one was
    /// stopped; the delegate has fired by the time this returns.
    #[cfg(feature = "recording")]
    pub fn stop_recording(&self) -> bool {
        match self.shared.file_output.as_ref() {
            Some(output) => output.stop(),
            None => false,
        }
    }

    #[cfg(feature = "recording")]
    pub fn is_recording(&self) -> bool {
        self.shared
            .file_output
            .as_ref()
            .is_some_and(|output| output.is_recording())
    }

    pub fn device(&self) -> CameraDeviceInfo {
        self.shared.device.lock().expect("lock poisoned").clone()
    }

    pub fn active_format(&self) -> CameraFormat {
        self.shared
            .active_format
            .lock()
            .expect("lock poisoned")
            .clone()
    }

    pub fn default_format(&self) -> CameraFormat {
        self.shared
            .default_format
            .lock()
            .expect("lock poisoned")
            .clone()
    }

    pub fn stats(&self) -> CaptureStats {
        CaptureStats {
            frames_delivered: self.shared.frames_delivered.load(Ordering::Relaxed),
            frames_dropped: self.shared.frames_dropped.load(Ordering::Relaxed),
        }
    }

    /// Tear the session down. Terminal: stops capture, finalizes any
    /// in-flight recording, and retires the tap workers.
    pub fn shutdown(&self) {
        {
            let state = self.state.lock().expect("lock poisoned");
            if *state == SessionState::Stopped {
                return;
            }
        }
        if let Err(e) = self.stop_capture() {
            log::warn!("error stopping capture during shutdown: {}", e);
        }
        #[cfg(feature = "recording")]
        if let Some(output) = self.shared.file_output.as_ref() {
            output.stop();
        }
        self.shared.tap.shutdown();
        *self.state.lock().expect("lock poisoned") = SessionState::Stopped;
        log::info!("session stopped");
    }

    /// Run one configuration transaction: serialize against other
    /// transactions and start/stop, suspend delivery, mutate, and roll
    /// back the committed configuration on failure.
    fn with_transaction<T>(
        &self,
        label: &str,
        f: impl FnOnce(&Self) -> Result<T, CameraError>,
    ) -> Result<T, CameraError> {
        let _txn = self.txn_lock.lock().expect("lock poisoned");
        self.shared.delivering.store(false, Ordering::Release);

        let snapshot = self.snapshot();
        let result = f(self);
        if let Err(e) = &result {
            self.restore(snapshot);
            log::warn!("{} transaction rolled back: {}", label, e);
        }

        self.shared.delivering.store(true, Ordering::Release);
        result
    }

    fn snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot {
            device: self.shared.device.lock().expect("lock poisoned").clone(),
            active_format: self
                .shared
                .active_format
                .lock()
                .expect("lock poisoned")
                .clone(),
            default_format: self
                .shared
                .default_format
                .lock()
                .expect("lock poisoned")
                .clone(),
            zoom: *self.shared.zoom.lock().expect("lock poisoned"),
            orientation: *self.shared.orientation.lock().expect("lock poisoned"),
            gravity: self.shared.layer.gravity(),
        }
    }

    fn restore(&self, snapshot: ConfigSnapshot) {
        *self.shared.device.lock().expect("lock poisoned") = snapshot.device;
        *self.shared.active_format.lock().expect("lock poisoned") = snapshot.active_format;
        *self.shared.default_format.lock().expect("lock poisoned") = snapshot.default_format;
        *self.shared.zoom.lock().expect("lock poisoned") = snapshot.zoom;
        *self.shared.orientation.lock().expect("lock poisoned") = snapshot.orientation;
        self.shared.layer.set_gravity(snapshot.gravity);
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn capture_loop(shared: Arc<Shared>) {
    log::debug!("capture loop started");
    loop {
        if shared.stop_flag.load(Ordering::Acquire) {
            break;
        }

        let polled = {
            let mut guard = shared.source.lock().expect("lock poisoned");
            match guard.as_mut() {
                Some(source) => source.capture_frame(),
                None => break,
            }
        };

        match polled {
            Ok(raw) => {
                if !shared.delivering.load(Ordering::Acquire) {
                    // Transaction window: dropped, never queued, no
                    // consumer sees it.
                    shared.frames_dropped.fetch_add(1, Ordering::Relaxed);
                    continue;
                }
                if shared.warmup_remaining.load(Ordering::Acquire) > 0 {
                    shared.warmup_remaining.fetch_sub(1, Ordering::AcqRel);
                    shared.frames_dropped.fetch_add(1, Ordering::Relaxed);
                    continue;
                }

                let frame = shared.make_frame(raw);
                shared.frames_delivered.fetch_add(1, Ordering::Relaxed);
                shared.layer.submit(frame.clone());
                #[cfg(feature = "recording")]
                if let Some(output) = &shared.file_output {
                    output.submit(frame.clone());
                }
                shared.tap.dispatch(frame);
            }
            Err(e) => {
                log::warn!("frame capture failed: {}", e);
                std::thread::sleep(Duration::from_millis(10));
            }
        }
    }
    log::debug!("capture loop exited");
}
