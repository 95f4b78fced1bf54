//! Simulated frame source
//!
//! A deterministic in-process stand-in for the UVC host driver: a fixed
//! pool of frame buffers, a producer task emitting synthetic JPEG payloads
//! at the configured rate, and a control handle for scripting attach,
//! detach and driver events. Demos run against it on machines without a
//! camera; tests use it to exercise the supervisor and the ownership
//! protocol.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::camera::StreamConfig;
use crate::frame::{Frame, FrameBuf, FramePool};
use crate::router::FrameRouter;
use crate::stats::PipelineStats;

use super::{FrameSource, SourceError, SourceEvent, StreamHandle};

/// Fixed-size counting buffer pool.
///
/// Tracks checkouts and releases so tests can assert frame conservation:
/// every checked-out buffer comes back exactly once. Releases arriving
/// after [`SimPool::close`] are counted but otherwise ignored.
#[derive(Debug)]
pub struct SimPool {
    free: Mutex<Vec<usize>>,
    slots: AtomicUsize,
    closed: AtomicBool,
    checked_out: AtomicU64,
    released: AtomicU64,
    late_releases: AtomicU64,
}

impl SimPool {
    fn new(slots: usize) -> Self {
        Self {
            free: Mutex::new((0..slots).collect()),
            slots: AtomicUsize::new(slots),
            closed: AtomicBool::new(false),
            checked_out: AtomicU64::new(0),
            released: AtomicU64::new(0),
            late_releases: AtomicU64::new(0),
        }
    }

    fn reset(&self, slots: usize) {
        *self.free.lock().unwrap() = (0..slots).collect();
        self.slots.store(slots, Ordering::SeqCst);
        self.closed.store(false, Ordering::SeqCst);
    }

    fn checkout(&self) -> Option<usize> {
        let slot = self.free.lock().unwrap().pop()?;
        self.checked_out.fetch_add(1, Ordering::SeqCst);
        Some(slot)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Buffers currently checked out
    pub fn outstanding(&self) -> usize {
        self.slots.load(Ordering::SeqCst) - self.free.lock().unwrap().len()
    }

    /// Total checkouts so far
    pub fn checked_out(&self) -> u64 {
        self.checked_out.load(Ordering::SeqCst)
    }

    /// Total releases so far (including late ones)
    pub fn released(&self) -> u64 {
        self.released.load(Ordering::SeqCst)
    }

    /// Releases that arrived after the pool was closed
    pub fn late_releases(&self) -> u64 {
        self.late_releases.load(Ordering::SeqCst)
    }
}

impl FramePool for SimPool {
    fn release(&self, buf: FrameBuf) {
        self.released.fetch_add(1, Ordering::SeqCst);
        if self.closed.load(Ordering::SeqCst) {
            // Device handle already closed; tolerate and ignore.
            self.late_releases.fetch_add(1, Ordering::SeqCst);
            return;
        }
        self.free.lock().unwrap().push(buf.slot);
    }
}

struct SimShared {
    attached: watch::Sender<bool>,
    pool: Arc<SimPool>,
    events: Mutex<Option<mpsc::Sender<SourceEvent>>>,
    seq: AtomicU64,
    open_attempts: AtomicU64,
}

impl SimShared {
    fn send_event(&self, event: SourceEvent) {
        if let Some(tx) = self.events.lock().unwrap().as_ref() {
            let _ = tx.try_send(event);
        }
    }
}

/// Script handle for a [`SimSource`]: attach/detach the fake device and
/// inject driver events while a stream is open.
#[derive(Clone)]
pub struct SimControl {
    shared: Arc<SimShared>,
}

impl SimControl {
    /// Make the fake device discoverable.
    pub fn attach(&self) {
        self.shared.attached.send_replace(true);
    }

    /// Detach the fake device: stops the producer and reports
    /// `Disconnected` on the open stream's event channel.
    pub async fn detach(&self) {
        self.shared.attached.send_replace(false);
        let tx = self.shared.events.lock().unwrap().clone();
        if let Some(tx) = tx {
            let _ = tx.send(SourceEvent::Disconnected).await;
        }
    }

    /// Inject a driver event into the open stream.
    pub fn inject(&self, event: SourceEvent) {
        self.shared.send_event(event);
    }

    /// Handle to the counting buffer pool.
    pub fn pool(&self) -> Arc<SimPool> {
        self.shared.pool.clone()
    }

    /// Number of times `open` has been attempted on this source.
    pub fn open_attempts(&self) -> u64 {
        self.shared.open_attempts.load(Ordering::SeqCst)
    }
}

/// Simulated camera source dispatching frames into a [`FrameRouter`].
pub struct SimSource {
    router: Arc<FrameRouter>,
    shared: Arc<SimShared>,
    stats: Option<Arc<PipelineStats>>,
    interval: Option<Duration>,
    payload_len: usize,
}

impl SimSource {
    /// Create a source that starts attached, producing into `router`.
    pub fn new(router: Arc<FrameRouter>) -> Self {
        let (attached, _) = watch::channel(true);
        Self {
            router,
            shared: Arc::new(SimShared {
                attached,
                pool: Arc::new(SimPool::new(0)),
                events: Mutex::new(None),
                seq: AtomicU64::new(0),
                open_attempts: AtomicU64::new(0),
            }),
            stats: None,
            interval: None,
            payload_len: 1024,
        }
    }

    /// Start with no device attached; discovery fails until
    /// [`SimControl::attach`] is called.
    pub fn detached(self) -> Self {
        self.shared.attached.send_replace(false);
        self
    }

    /// Record captured frames into the pipeline counters.
    pub fn stats(mut self, stats: Arc<PipelineStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Override the frame interval derived from the stream config.
    pub fn frame_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    /// Size of the synthetic JPEG payloads.
    pub fn payload_len(mut self, len: usize) -> Self {
        self.payload_len = len;
        self
    }

    /// Script handle for this source.
    pub fn control(&self) -> SimControl {
        SimControl {
            shared: self.shared.clone(),
        }
    }
}

impl FrameSource for SimSource {
    type Handle = SimHandle;

    async fn open(
        &mut self,
        config: &StreamConfig,
        timeout: Duration,
    ) -> Result<(Self::Handle, mpsc::Receiver<SourceEvent>), SourceError> {
        self.shared.open_attempts.fetch_add(1, Ordering::SeqCst);
        let mut attached = self.shared.attached.subscribe();
        let result = match tokio::time::timeout(timeout, attached.wait_for(|a| *a)).await {
            Err(_) => Err(SourceError::OpenTimeout),
            Ok(Err(_)) => Err(SourceError::Device("sim control closed".into())),
            Ok(Ok(_)) => {
                self.shared.pool.reset(config.frame_buffers);
                let (tx, rx) = mpsc::channel(8);
                *self.shared.events.lock().unwrap() = Some(tx);

                Ok((
                    SimHandle {
                        shared: self.shared.clone(),
                        router: self.router.clone(),
                        stats: self.stats.clone(),
                        interval: self.interval.unwrap_or_else(|| config.frame_interval()),
                        frame_size: config.frame_size,
                        payload_len: self.payload_len,
                        task: None,
                    },
                    rx,
                ))
            }
        };
        result
    }
}

/// Open stream handle for the simulated source.
pub struct SimHandle {
    shared: Arc<SimShared>,
    router: Arc<FrameRouter>,
    stats: Option<Arc<PipelineStats>>,
    interval: Duration,
    frame_size: usize,
    payload_len: usize,
    task: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for SimHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimHandle")
            .field("interval", &self.interval)
            .field("frame_size", &self.frame_size)
            .field("payload_len", &self.payload_len)
            .finish_non_exhaustive()
    }
}

impl SimHandle {
    fn spawn_producer(&self) -> JoinHandle<()> {
        let shared = self.shared.clone();
        let router = self.router.clone();
        let stats = self.stats.clone();
        let interval = self.interval;
        let frame_size = self.frame_size;
        let payload_len = self.payload_len;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            let mut attached = shared.attached.subscribe();

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        produce_one(&shared, &router, stats.as_deref(), frame_size, payload_len);
                    }
                    res = attached.wait_for(|a| !*a) => {
                        let _ = res;
                        break;
                    }
                }
            }
        })
    }
}

fn produce_one(
    shared: &Arc<SimShared>,
    router: &FrameRouter,
    stats: Option<&PipelineStats>,
    frame_size: usize,
    payload_len: usize,
) {
    let seq = shared.seq.fetch_add(1, Ordering::Relaxed);
    let payload = synth_jpeg(seq, payload_len);

    if payload.len() > frame_size {
        // Frame larger than the allocated buffer; driver discards it.
        shared.send_event(SourceEvent::BufferOverflow);
        return;
    }

    let Some(slot) = shared.pool.checkout() else {
        // All buffers in flight; driver discards the capture.
        shared.send_event(SourceEvent::BufferUnderflow);
        return;
    };

    if let Some(stats) = stats {
        stats.record_frame_captured();
    }

    let pool: Arc<dyn FramePool> = shared.pool.clone();
    let frame = Frame::pooled(seq, FrameBuf { data: payload, slot }, pool);
    let outcome = router.dispatch(&frame);
    tracing::trace!(
        seq = seq,
        len = frame.len(),
        handed_off = outcome.handed_off(),
        "Sim frame produced"
    );
    // Dropping `frame` here: if no subscriber accepted it, this is the last
    // reference and the buffer goes straight back to the pool.
}

/// Synthetic JPEG-shaped payload: SOI marker, big-endian sequence number,
/// zero padding, EOI marker.
fn synth_jpeg(seq: u64, len: usize) -> Bytes {
    let len = len.max(12);
    let mut data = vec![0u8; len];
    data[0] = 0xFF;
    data[1] = 0xD8;
    data[2..10].copy_from_slice(&seq.to_be_bytes());
    data[len - 2] = 0xFF;
    data[len - 1] = 0xD9;
    Bytes::from(data)
}

impl StreamHandle for SimHandle {
    async fn start(&mut self) -> Result<(), SourceError> {
        if self.task.is_none() {
            self.task = Some(self.spawn_producer());
        }
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), SourceError> {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        Ok(())
    }

    async fn close(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        *self.shared.events.lock().unwrap() = None;
        self.shared.pool.close();
    }
}
