//! Frame tap: fans every captured frame out to registered preview
//! consumers and to the single frame-callback subscriber.
//!
//! Each consumer gets its own unbounded FIFO queue drained by a
//! dedicated worker thread, so delivery order per consumer is capture
//! order and a slow consumer never holds up the capture thread or its
//! peers. Unregistration acquires the consumer's delivery gate, so once
//! it returns no further `render` call can happen.

use crate::errors::CameraError;
use crate::preview::PreviewConsumer;
use crate::types::FrameResult;
use crossbeam_channel::{unbounded, Sender};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use uuid::Uuid;

/// Handle identifying one registered preview consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub struct PreviewId(Uuid);

/// Single-subscriber sink invoked once per dispatched frame.
pub type FrameCallback = Box<dyn Fn(FrameResult) + Send + Sync>;

struct DeliveryGate {
    active: AtomicBool,
    /// Held by the worker around each invocation. Unregistration locks
    /// it to wait out an in-flight delivery before flipping `active`.
    invoking: Mutex<()>,
}

struct DeliveryWorker {
    tx: Sender<FrameResult>,
    gate: Arc<DeliveryGate>,
    handle: Option<JoinHandle<()>>,
}

impl DeliveryWorker {
    fn spawn<F>(name: String, deliver: F) -> Result<Self, CameraError>
    where
        F: Fn(&FrameResult) + Send + 'static,
    {
        let (tx, rx) = unbounded::<FrameResult>();
        let gate = Arc::new(DeliveryGate {
            active: AtomicBool::new(true),
            invoking: Mutex::new(()),
        });
        let worker_gate = gate.clone();

        let handle = std::thread::Builder::new()
            .name(name)
            .spawn(move || {
                while let Ok(frame) = rx.recv() {
                    let _inflight = worker_gate.invoking.lock().expect("lock poisoned");
                    if !worker_gate.active.load(Ordering::Acquire) {
                        break;
                    }
                    // A panicking consumer loses this frame, nothing else.
                    if catch_unwind(AssertUnwindSafe(|| deliver(&frame))).is_err() {
                        log::warn!(
                            "frame consumer panicked on frame {}",
                            frame.metadata.sequence
                        );
                    }
                }
            })
            .map_err(|e| CameraError::StreamError(format!("spawn failed: {}", e)))?;

        Ok(Self {
            tx,
            gate,
            handle: Some(handle),
        })
    }

    fn submit(&self, frame: FrameResult) {
        // Unbounded channel: never blocks the capture thread.
        let _ = self.tx.send(frame);
    }

    /// Stop delivery. Any in-flight invocation completes first; queued
    /// frames are discarded; the worker thread is joined.
    fn retire(mut self) {
        {
            let _inflight = self.gate.invoking.lock().expect("lock poisoned");
            self.gate.active.store(false, Ordering::Release);
        }
        let handle = self.handle.take();
        drop(self);
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}

#[derive(Default)]
pub struct FrameTap {
    enabled: AtomicBool,
    consumers: Mutex<HashMap<PreviewId, DeliveryWorker>>,
    callback: Mutex<Option<DeliveryWorker>>,
}

impl FrameTap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gate for the whole tap, independent of session Running/Paused.
    /// While disabled, `dispatch` is a no-op and buffers pass through
    /// to the preview layer untouched.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Register a preview consumer. Never blocks frame delivery or
    /// restarts the session.
    pub fn add_consumer(
        &self,
        consumer: Arc<dyn PreviewConsumer>,
    ) -> Result<PreviewId, CameraError> {
        let id = PreviewId(Uuid::new_v4());
        let worker = DeliveryWorker::spawn(format!("viewfinder-preview-{}", id.0), move |frame| {
            consumer.render(frame)
        })?;
        self.consumers
            .lock()
            .expect("lock poisoned")
            .insert(id, worker);
        log::debug!("preview consumer {} registered", id.0);
        Ok(id)
    }

    /// Unregister a consumer. When this returns, no further frame will
    /// be delivered to it. Returns false if the id was not registered.
    pub fn remove_consumer(&self, id: PreviewId) -> bool {
        let worker = self.consumers.lock().expect("lock poisoned").remove(&id);
        match worker {
            Some(worker) => {
                worker.retire();
                log::debug!("preview consumer {} unregistered", id.0);
                true
            }
            None => false,
        }
    }

    pub fn consumer_count(&self) -> usize {
        self.consumers.lock().expect("lock poisoned").len()
    }

    /// Replace the single frame-callback subscriber. The previous
    /// subscriber is retired before the new one can observe a frame.
    pub fn set_frame_callback<F>(&self, callback: F) -> Result<(), CameraError>
    where
        F: Fn(FrameResult) + Send + Sync + 'static,
    {
        let worker = DeliveryWorker::spawn("viewfinder-frame-callback".to_string(), move |frame| {
            callback(frame.clone())
        })?;
        let previous = self
            .callback
            .lock()
            .expect("lock poisoned")
            .replace(worker);
        if let Some(previous) = previous {
            previous.retire();
        }
        Ok(())
    }

    /// Remove the frame callback. Returns whether one was set.
    pub fn clear_frame_callback(&self) -> bool {
        let previous = self.callback.lock().expect("lock poisoned").take();
        match previous {
            Some(previous) => {
                previous.retire();
                true
            }
            None => false,
        }
    }

    /// Whether a frame callback is currently subscribed. Callers use
    /// this before enabling paths that assume delivery.
    pub fn has_frame_callback(&self) -> bool {
        self.callback.lock().expect("lock poisoned").is_some()
    }

    /// Offer one frame to every active consumer and the callback.
    /// Non-blocking: each hand-off is a queue push.
    pub fn dispatch(&self, frame: FrameResult) {
        if !self.is_enabled() {
            return;
        }
        let consumers = self.consumers.lock().expect("lock poisoned");
        let callback = self.callback.lock().expect("lock poisoned");
        if consumers.is_empty() && callback.is_none() {
            return;
        }
        for worker in consumers.values() {
            worker.submit(frame.clone());
        }
        if let Some(worker) = callback.as_ref() {
            worker.submit(frame);
        }
    }

    /// Retire every worker. Used at controller teardown.
    pub fn shutdown(&self) {
        let workers: Vec<DeliveryWorker> = {
            let mut consumers = self.consumers.lock().expect("lock poisoned");
            consumers.drain().map(|(_, w)| w).collect()
        };
        for worker in workers {
            worker.retire();
        }
        if let Some(worker) = self.callback.lock().expect("lock poisoned").take() {
            worker.retire();
        }
    }
}

impl Drop for FrameTap {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::synthetic_frame;
    use std::sync::atomic::AtomicUsize;
    use std::time::{Duration, Instant};

    struct CountingSink {
        count: AtomicUsize,
        sequences: Mutex<Vec<u64>>,
    }

    impl CountingSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                count: AtomicUsize::new(0),
                sequences: Mutex::new(Vec::new()),
            })
        }

        fn count(&self) -> usize {
            self.count.load(Ordering::SeqCst)
        }
    }

    impl PreviewConsumer for CountingSink {
        fn render(&self, frame: &FrameResult) {
            self.sequences
                .lock()
                .expect("lock poisoned")
                .push(frame.metadata.sequence);
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn wait_for<F: Fn() -> bool>(cond: F) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() {
            assert!(Instant::now() < deadline, "timed out waiting for condition");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn disabled_tap_delivers_nothing() {
        let tap = FrameTap::new();
        let sink = CountingSink::new();
        tap.add_consumer(sink.clone()).unwrap();
        tap.dispatch(synthetic_frame(1, 8, 8, "cam"));
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(sink.count(), 0);
    }

    #[test]
    fn consumers_see_frames_in_capture_order() {
        let tap = FrameTap::new();
        tap.set_enabled(true);
        let sink = CountingSink::new();
        tap.add_consumer(sink.clone()).unwrap();

        for seq in 1..=20 {
            tap.dispatch(synthetic_frame(seq, 8, 8, "cam"));
        }
        wait_for(|| sink.count() == 20);
        let sequences = sink.sequences.lock().expect("lock poisoned").clone();
        assert_eq!(sequences, (1..=20).collect::<Vec<u64>>());
    }

    #[test]
    fn unregister_freezes_delivery_immediately() {
        let tap = FrameTap::new();
        tap.set_enabled(true);
        let sink = CountingSink::new();
        let id = tap.add_consumer(sink.clone()).unwrap();

        for seq in 1..=10 {
            tap.dispatch(synthetic_frame(seq, 8, 8, "cam"));
        }
        assert!(tap.remove_consumer(id));
        let frozen = sink.count();

        for seq in 11..=20 {
            tap.dispatch(synthetic_frame(seq, 8, 8, "cam"));
        }
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(sink.count(), frozen);
        assert!(!tap.remove_consumer(id));
    }

    #[test]
    fn panicking_callback_does_not_stall_the_tap() {
        let tap = FrameTap::new();
        tap.set_enabled(true);
        let sink = CountingSink::new();
        tap.add_consumer(sink.clone()).unwrap();
        tap.set_frame_callback(|_frame| panic!("consumer bug")).unwrap();

        for seq in 1..=5 {
            tap.dispatch(synthetic_frame(seq, 8, 8, "cam"));
        }
        wait_for(|| sink.count() == 5);
        assert!(tap.has_frame_callback());
    }

    #[test]
    fn callback_replacement_is_single_subscriber() {
        let tap = FrameTap::new();
        tap.set_enabled(true);
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let counter = first.clone();
        tap.set_frame_callback(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        let counter = second.clone();
        tap.set_frame_callback(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        for seq in 1..=8 {
            tap.dispatch(synthetic_frame(seq, 8, 8, "cam"));
        }
        wait_for(|| second.load(Ordering::SeqCst) == 8);
        assert_eq!(first.load(Ordering::SeqCst), 0);

        assert!(tap.clear_frame_callback());
        assert!(!tap.has_frame_callback());
        assert!(!tap.clear_frame_callback());
    }
}
