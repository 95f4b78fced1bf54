//! Camera connection supervisor
//!
//! One task owns the camera lifecycle: discover the device with a bounded
//! open timeout, start the stream, watch driver events while streaming,
//! and tear down cleanly on disconnect before searching again. Per-frame
//! driver events (overflow, underflow, transfer errors) are logged and do
//! not change state; only a disconnect ends the streaming period.

use std::sync::Arc;

use crate::camera::state::{ConnectionState, StateCell};
use crate::camera::{CameraConfig, StreamConfig};
use crate::source::{FrameSource, SourceEvent, StreamHandle};
use crate::stats::PipelineStats;

/// Drives the `Searching -> Connected -> Streaming -> Disconnecting`
/// loop for one camera device.
pub struct CameraSupervisor<S: FrameSource> {
    source: S,
    stream_config: StreamConfig,
    config: CameraConfig,
    state: StateCell,
    stats: Arc<PipelineStats>,
}

impl<S: FrameSource> CameraSupervisor<S> {
    pub fn new(
        source: S,
        stream_config: StreamConfig,
        config: CameraConfig,
        state: StateCell,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            source,
            stream_config,
            config,
            state,
            stats,
        }
    }

    /// Run the supervision loop. Never returns; abort the task (or drop
    /// the future) to shut down.
    pub async fn run(mut self) {
        loop {
            // Searching: bounded discovery attempt, fixed backoff on failure.
            tracing::info!("Looking for camera");
            let (mut handle, mut events) = match self
                .source
                .open(&self.stream_config, self.config.open_timeout)
                .await
            {
                Ok(opened) => opened,
                Err(e) => {
                    tracing::info!(
                        error = %e,
                        backoff_ms = self.config.retry_backoff.as_millis() as u64,
                        "Failed to open camera, retrying"
                    );
                    tokio::time::sleep(self.config.retry_backoff).await;
                    continue;
                }
            };

            self.transition(ConnectionState::Connected);
            tracing::info!("Camera connected, starting stream");
            tokio::time::sleep(self.config.settle_delay).await;

            if let Err(e) = handle.start().await {
                tracing::error!(error = %e, "Failed to start stream");
                handle.close().await;
                self.transition(ConnectionState::Searching);
                continue;
            }
            self.transition(ConnectionState::Streaming);

            // Streaming: supervise driver events until disconnect.
            loop {
                match events.recv().await {
                    Some(SourceEvent::TransferError(code)) => {
                        self.stats.record_transfer_error();
                        tracing::error!(code = code, "USB transfer error");
                    }
                    Some(SourceEvent::BufferOverflow) => {
                        tracing::warn!("Frame buffer overflow");
                    }
                    Some(SourceEvent::BufferUnderflow) => {
                        tracing::warn!("Frame buffer underflow");
                    }
                    Some(SourceEvent::Disconnected) => {
                        tracing::info!("Device disconnected");
                        break;
                    }
                    None => {
                        // Event channel gone without a disconnect event;
                        // treat it the same way.
                        tracing::warn!("Source event channel closed");
                        break;
                    }
                }
            }

            self.transition(ConnectionState::Disconnecting);
            if let Err(e) = handle.stop().await {
                tracing::warn!(error = %e, "Stream stop failed");
            }
            handle.close().await;
            self.transition(ConnectionState::Searching);
        }
    }

    fn transition(&self, next: ConnectionState) {
        // The loop only requests legal edges; a rejection here is a bug.
        if let Err(e) = self.state.set(next) {
            tracing::error!(error = %e, "State transition rejected");
        }
    }
}
