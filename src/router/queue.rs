//! Bounded per-subscriber frame queues
//!
//! Each consumer owns one queue. The producer side never blocks: a full
//! queue drops the offered frame for that subscriber only. Capacity is
//! fixed at subscription time (3-6 slots is typical for camera pipelines).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::frame::FrameRef;

/// Result of offering a frame to a queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Frame enqueued; the subscriber now co-owns the frame reference
    Queued,
    /// Queue full; frame dropped for this subscriber only
    Dropped,
    /// Subscriber went away; queue should be pruned
    Closed,
}

/// Result of a timed receive on a queue
#[derive(Debug)]
pub enum RecvOutcome {
    /// A frame was dequeued
    Frame(FrameRef),
    /// No frame arrived within the timeout
    TimedOut,
    /// The producer side is gone
    Closed,
}

/// Delivery counters for one subscriber.
///
/// For every frame offered, exactly one of `delivered` or `dropped` is
/// incremented, so `delivered + dropped` equals the number of frames the
/// router offered to this subscriber.
#[derive(Debug, Default)]
pub struct SubscriberStats {
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl SubscriberStats {
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Producer side of a subscriber queue. Held by the router.
pub struct FrameQueue {
    tx: mpsc::Sender<FrameRef>,
    capacity: usize,
    stats: Arc<SubscriberStats>,
}

/// Consumer side of a subscriber queue.
pub struct FrameReceiver {
    rx: mpsc::Receiver<FrameRef>,
    stats: Arc<SubscriberStats>,
}

/// Create a bounded queue pair with the given capacity.
pub fn bounded(capacity: usize) -> (FrameQueue, FrameReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    let stats = Arc::new(SubscriberStats::default());
    (
        FrameQueue {
            tx,
            capacity,
            stats: stats.clone(),
        },
        FrameReceiver { rx, stats },
    )
}

impl FrameQueue {
    /// Offer a frame without blocking.
    ///
    /// Runs in the producer's time-critical context: no allocation, no
    /// waiting. A full queue loses this frame for this subscriber.
    pub fn push(&self, frame: FrameRef) -> PushOutcome {
        match self.tx.try_send(frame) {
            Ok(()) => {
                self.stats.delivered.fetch_add(1, Ordering::Relaxed);
                PushOutcome::Queued
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                PushOutcome::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(_)) => PushOutcome::Closed,
        }
    }

    /// Configured capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of frames currently queued
    pub fn len(&self) -> usize {
        self.capacity - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub fn stats(&self) -> Arc<SubscriberStats> {
        self.stats.clone()
    }
}

impl FrameReceiver {
    /// Receive the next frame, waiting at most `timeout`.
    pub async fn recv_timeout(&mut self, timeout: Duration) -> RecvOutcome {
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Ok(Some(frame)) => RecvOutcome::Frame(frame),
            Ok(None) => RecvOutcome::Closed,
            Err(_) => RecvOutcome::TimedOut,
        }
    }

    /// Receive the next frame, waiting indefinitely.
    pub async fn recv(&mut self) -> Option<FrameRef> {
        self.rx.recv().await
    }

    pub fn stats(&self) -> Arc<SubscriberStats> {
        self.stats.clone()
    }
}
