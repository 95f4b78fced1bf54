//! Local frame consumer
//!
//! Drains one subscriber queue on its own task and hands each frame to a
//! user-supplied handler: `(payload, sequence id)`. At most one handler is
//! active; registering again replaces the previous one. The frame is
//! released (reference dropped) as soon as the handler returns.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::camera::StateView;
use crate::router::{FrameRouter, RecvOutcome};

/// User callback invoked once per drained frame.
pub type FrameHandler = Box<dyn FnMut(&[u8], u64) + Send>;

const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Handle to the local consumer task.
pub struct LocalConsumer {
    handler: Arc<Mutex<Option<FrameHandler>>>,
}

impl LocalConsumer {
    /// Subscribe to the router and spawn the drain task.
    pub fn spawn(router: &FrameRouter, capacity: usize, state: StateView) -> Self {
        let handler: Arc<Mutex<Option<FrameHandler>>> = Arc::new(Mutex::new(None));
        let mut rx = router.subscribe(capacity);
        let task_handler = handler.clone();
        let mut state = state;

        tokio::spawn(async move {
            loop {
                if !state.is_streaming() {
                    // Camera offline: park until the next streaming period.
                    if !state.wait_for_streaming().await {
                        break;
                    }
                    continue;
                }

                match rx.recv_timeout(DRAIN_TIMEOUT).await {
                    RecvOutcome::Frame(frame) => {
                        if !state.is_streaming() {
                            // Stream ended while this frame sat in the
                            // queue; release it without processing.
                            drop(frame);
                            continue;
                        }
                        if let Some(cb) = task_handler.lock().unwrap().as_mut() {
                            cb(frame.data(), frame.seq());
                        }
                    }
                    RecvOutcome::TimedOut => continue,
                    RecvOutcome::Closed => break,
                }
            }
            tracing::debug!("Local consumer task exiting");
        });

        Self { handler }
    }

    /// Install the frame handler, replacing any previous registration.
    pub fn register<F>(&self, handler: F)
    where
        F: FnMut(&[u8], u64) + Send + 'static,
    {
        let replaced = self
            .handler
            .lock()
            .unwrap()
            .replace(Box::new(handler))
            .is_some();
        if replaced {
            tracing::info!("Frame handler replaced");
        } else {
            tracing::info!("Frame handler registered");
        }
    }

    /// Remove the active handler; frames are drained and released unseen.
    pub fn unregister(&self) {
        self.handler.lock().unwrap().take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{ConnectionState, StateCell};
    use crate::frame::Frame;
    use crate::stats::PipelineStats;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn streaming_state() -> (StateCell, StateView) {
        let cell = StateCell::new();
        cell.set(ConnectionState::Connected).unwrap();
        cell.set(ConnectionState::Streaming).unwrap();
        let view = cell.view();
        (cell, view)
    }

    #[tokio::test]
    async fn handler_sees_frames_in_order() {
        let router = Arc::new(FrameRouter::new(Arc::new(PipelineStats::default())));
        let (_cell, view) = streaming_state();
        let consumer = LocalConsumer::spawn(&router, 4, view);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_cb = seen.clone();
        consumer.register(move |data, seq| {
            seen_cb.lock().unwrap().push((seq, data.len()));
        });

        for seq in 0..3u64 {
            router.dispatch(&Frame::from_bytes(seq, Bytes::from_static(b"abcd")));
        }

        tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                if seen.lock().unwrap().len() == 3 {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("handler did not run");

        assert_eq!(*seen.lock().unwrap(), vec![(0, 4), (1, 4), (2, 4)]);
    }

    #[tokio::test]
    async fn reregistration_replaces_previous_handler() {
        let router = Arc::new(FrameRouter::new(Arc::new(PipelineStats::default())));
        let (_cell, view) = streaming_state();
        let consumer = LocalConsumer::spawn(&router, 4, view);

        let first = Arc::new(AtomicU64::new(0));
        let second = Arc::new(AtomicU64::new(0));

        let c = first.clone();
        consumer.register(move |_, _| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        let c = second.clone();
        consumer.register(move |_, _| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        router.dispatch(&Frame::from_bytes(0, Bytes::from_static(b"x")));

        tokio::time::timeout(Duration::from_secs(1), async {
            while second.load(Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("replacement handler did not run");

        assert_eq!(first.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn frames_released_even_without_handler() {
        let router = Arc::new(FrameRouter::new(Arc::new(PipelineStats::default())));
        let (_cell, view) = streaming_state();
        let _consumer = LocalConsumer::spawn(&router, 4, view);

        let frame = Frame::from_bytes(9, Bytes::from_static(b"x"));
        router.dispatch(&frame);
        let weak = Arc::downgrade(&frame);
        drop(frame);

        // The drain task drops the only remaining reference.
        tokio::time::timeout(Duration::from_secs(1), async {
            while weak.upgrade().is_some() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("frame was not released");
    }
}
