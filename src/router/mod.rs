//! Frame fan-out from the capture callback to subscriber queues
//!
//! The router runs in the producer's context: the driver invokes
//! [`FrameRouter::dispatch`] once per captured frame, and the call must
//! complete in bounded time. Dispatch is O(subscriber count), performs no
//! allocation and never blocks; a subscriber whose queue is full simply
//! misses this frame, without affecting delivery to the others.
//!
//! # Architecture
//!
//! ```text
//!     driver capture callback
//!             │
//!             ▼
//!     FrameRouter::dispatch(FrameRef)     clone = refcount bump, not a copy
//!             │
//!     ┌───────┼───────────────┐
//!     ▼       ▼               ▼
//!  [local]  [client #1]    [client #2]    bounded queues, try_send only
//!     │       │               │
//!     ▼       ▼               ▼
//!  handler  MJPEG writer   MJPEG writer   each drop decrements the refcount;
//!                                         pool release happens at zero
//! ```

pub mod queue;

use std::sync::RwLock;

use crate::frame::FrameRef;
use crate::stats::PipelineStats;
use std::sync::Arc;

pub use queue::{FrameQueue, FrameReceiver, PushOutcome, RecvOutcome, SubscriberStats};

/// Result of dispatching one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// At least one subscriber queue accepted the frame reference
    Delivered(usize),
    /// No live subscriber accepted it; the caller's reference is the last
    /// one and dropping it releases the buffer immediately
    NotDelivered,
}

impl DispatchOutcome {
    /// Whether the frame was handed off to at least one subscriber.
    ///
    /// Maps onto the driver callback's return contract: `false` tells the
    /// source it can recycle the buffer right away.
    pub fn handed_off(&self) -> bool {
        matches!(self, DispatchOutcome::Delivered(_))
    }
}

/// Fan-out point between the frame source and all consumers.
pub struct FrameRouter {
    subscribers: RwLock<Vec<FrameQueue>>,
    stats: Arc<PipelineStats>,
}

impl FrameRouter {
    pub fn new(stats: Arc<PipelineStats>) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            stats,
        }
    }

    /// Register a new subscriber with a bounded queue of `capacity` slots.
    ///
    /// The subscription ends when the returned receiver is dropped; the
    /// router prunes the dead queue on the next dispatch.
    pub fn subscribe(&self, capacity: usize) -> FrameReceiver {
        let (q, rx) = queue::bounded(capacity);
        let mut subs = self.subscribers.write().unwrap();
        subs.push(q);
        tracing::debug!(
            capacity = capacity,
            subscribers = subs.len(),
            "Subscriber added"
        );
        rx
    }

    /// Offer a captured frame to every live subscriber.
    ///
    /// Non-blocking and allocation-free: each successful enqueue clones the
    /// `FrameRef` (a refcount increment). Queues found closed are removed
    /// here, so the producer stops targeting torn-down sessions.
    pub fn dispatch(&self, frame: &FrameRef) -> DispatchOutcome {
        let mut accepted = 0usize;
        let mut stale = false;

        {
            let subs = self.subscribers.read().unwrap();
            for q in subs.iter() {
                match q.push(frame.clone()) {
                    PushOutcome::Queued => accepted += 1,
                    PushOutcome::Dropped => {
                        self.stats.record_frame_dropped();
                        tracing::trace!(seq = frame.seq(), "Queue full, losing frame");
                    }
                    PushOutcome::Closed => stale = true,
                }
            }
        }

        if stale {
            self.prune();
        }

        if accepted > 0 {
            self.stats.record_frame_routed();
            DispatchOutcome::Delivered(accepted)
        } else {
            DispatchOutcome::NotDelivered
        }
    }

    /// Remove queues whose receivers have been dropped.
    fn prune(&self) {
        let mut subs = self.subscribers.write().unwrap();
        let before = subs.len();
        subs.retain(|q| !q.is_closed());
        if subs.len() != before {
            tracing::debug!(
                removed = before - subs.len(),
                subscribers = subs.len(),
                "Pruned closed subscriber queues"
            );
        }
    }

    /// Number of currently registered subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().unwrap().len()
    }
}
