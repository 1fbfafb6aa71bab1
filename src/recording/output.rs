//! Session-facing recording output: state machine, writer thread, and
//! the finish delegate.

use super::config::{RecordingConfig, RecordingStats};
use super::recorder::Recorder;
use crate::errors::CameraError;
use crate::types::FrameResult;
use crossbeam_channel::{unbounded, Sender};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

/// Receives the outcome of every recording, exactly once per
/// start/stop pair: the stats on success, or the error that ended the
/// recording (write failure, finalization failure).
pub trait RecordingDelegate: Send + Sync {
    fn on_recording_finished(&self, path: &Path, result: Result<RecordingStats, CameraError>);
}

/// Observable recording state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordingState {
    Idle,
    Recording(PathBuf),
}

struct ActiveRecording {
    tx: Sender<FrameResult>,
    worker: Option<JoinHandle<()>>,
    path: PathBuf,
}

/// The file output attached to a session. Frames flow in from the
/// capture thread via [`FileOutput::submit`]; a dedicated writer thread
/// encodes and muxes them so disk and encoder latency never touch the
/// capture path.
#[derive(Default)]
pub struct FileOutput {
    active: Mutex<Option<ActiveRecording>>,
    delegate: Mutex<Option<Arc<dyn RecordingDelegate>>>,
}

impl FileOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the recording delegate. The delegate in place when a
    /// recording starts is the one notified for that recording.
    pub fn set_delegate(&self, delegate: Arc<dyn RecordingDelegate>) {
        *self.delegate.lock().expect("lock poisoned") = Some(delegate);
    }

    pub fn is_recording(&self) -> bool {
        self.active.lock().expect("lock poisoned").is_some()
    }

    pub fn state(&self) -> RecordingState {
        match self.active.lock().expect("lock poisoned").as_ref() {
            Some(active) => RecordingState::Recording(active.path.clone()),
            None => RecordingState::Idle,
        }
    }

    /// Begin writing to `path`. Fails with `AlreadyRecording` when a
    /// recording is in progress; the original recording is unaffected.
    pub fn start(&self, path: PathBuf, config: RecordingConfig) -> Result<(), CameraError> {
        let mut active = self.active.lock().expect("lock poisoned");
        if let Some(current) = active.as_ref() {
            return Err(CameraError::AlreadyRecording(format!(
                "already writing to {}",
                current.path.display()
            )));
        }

        let recorder = Recorder::new(&path, config)?;
        let delegate = self.delegate.lock().expect("lock poisoned").clone();
        let (tx, rx) = unbounded::<FrameResult>();
        let worker_path = path.clone();

        let worker = std::thread::Builder::new()
            .name("viewfinder-recording".to_string())
            .spawn(move || {
                let mut recorder = recorder;
                let mut failure: Option<CameraError> = None;
                for frame in rx {
                    // Decode-error frames carry no pixels; skip them.
                    if !frame.is_ok() {
                        continue;
                    }
                    if let Err(e) = recorder.write_frame(&frame) {
                        log::error!("recording write failed: {}", e);
                        failure = Some(e);
                        break;
                    }
                }
                let result = match failure {
                    Some(e) => Err(e),
                    None => recorder.finish(),
                };
                match (&result, &delegate) {
                    (Ok(stats), _) => log::info!(
                        "recording finalized: {} frames, {:.2}s, {} bytes",
                        stats.video_frames,
                        stats.duration_secs,
                        stats.bytes_written
                    ),
                    (Err(e), _) => log::error!("recording ended with error: {}", e),
                }
                if let Some(delegate) = delegate {
                    delegate.on_recording_finished(&worker_path, result);
                }
            })
            .map_err(|e| CameraError::RecordingFailed(format!("spawn failed: {}", e)))?;

        log::info!("recording started: {}", path.display());
        *active = Some(ActiveRecording {
            tx,
            worker: Some(worker),
            path,
        });
        Ok(())
    }

    /// Finalize the current recording. No-op when idle. Joins the
    /// writer thread, so the delegate has fired by the time this
    /// returns. Returns whether a recording was stopped.
    pub fn stop(&self) -> bool {
        let active = self.active.lock().expect("lock poisoned").take();
        match active {
            Some(mut active) => {
                drop(active.tx);
                if let Some(worker) = active.worker.take() {
                    let _ = worker.join();
                }
                log::info!("recording stopped: {}", active.path.display());
                true
            }
            None => false,
        }
    }

    /// Offer one frame to the writer. No-op when idle; a frame arriving
    /// after a write failure is silently discarded.
    pub fn submit(&self, frame: FrameResult) {
        if let Some(active) = self.active.lock().expect("lock poisoned").as_ref() {
            let _ = active.tx.send(frame);
        }
    }
}

impl Drop for FileOutput {
    fn drop(&mut self) {
        // An in-flight finalization completes rather than leaving a
        // truncated file behind.
        self.stop();
    }
}
