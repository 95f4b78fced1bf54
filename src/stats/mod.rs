//! Pipeline-wide counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Shared counters for the whole pipeline.
///
/// Updated from the producer context and from consumer tasks, so every
/// field is atomic. Wrap in `Arc` and hand clones to each component.
#[derive(Debug, Default)]
pub struct PipelineStats {
    /// Frames delivered by the driver to the router
    frames_captured: AtomicU64,
    /// Frames accepted by at least one subscriber
    frames_routed: AtomicU64,
    /// Per-subscriber drops due to a full queue
    frames_dropped: AtomicU64,
    /// Driver-reported transfer errors
    transfer_errors: AtomicU64,
    /// Streaming client sessions opened
    sessions_opened: AtomicU64,
    /// Streaming client sessions closed
    sessions_closed: AtomicU64,
    /// Payload bytes written to streaming clients
    bytes_sent: AtomicU64,
}

/// Point-in-time copy of [`PipelineStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub frames_captured: u64,
    pub frames_routed: u64,
    pub frames_dropped: u64,
    pub transfer_errors: u64,
    pub sessions_opened: u64,
    pub sessions_closed: u64,
    pub bytes_sent: u64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_frame_captured(&self) {
        self.frames_captured.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame_routed(&self) {
        self.frames_routed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transfer_error(&self) {
        self.transfer_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_opened(&self) {
        self.sessions_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_closed(&self) {
        self.sessions_closed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bytes_sent(&self, bytes: u64) {
        self.bytes_sent.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            frames_routed: self.frames_routed.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            transfer_errors: self.transfer_errors.load(Ordering::Relaxed),
            sessions_opened: self.sessions_opened.load(Ordering::Relaxed),
            sessions_closed: self.sessions_closed.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
        }
    }
}
