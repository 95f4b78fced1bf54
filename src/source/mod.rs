//! Frame source adapter seam
//!
//! The USB host stack and UVC negotiation live behind these traits. The
//! pipeline consumes a source only through open/start/stop/close plus an
//! event channel. Captured frames do not pass through the trait at all:
//! the source adapter is constructed with the router and dispatches each
//! capture into it directly, mirroring the driver's frame callback.

pub mod sim;

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::camera::StreamConfig;

pub use sim::{SimControl, SimPool, SimSource};

/// Asynchronous events reported by the driver while a stream is open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEvent {
    /// Transfer-level USB error; the stream keeps running
    TransferError(i32),
    /// Device detached; the stream is dead
    Disconnected,
    /// A frame exceeded the allocated buffer size and was discarded
    BufferOverflow,
    /// No free buffer was available; a frame was discarded
    BufferUnderflow,
}

/// Errors from source open/start/stop operations
#[derive(Debug, Clone)]
pub enum SourceError {
    /// No device appeared within the open timeout
    OpenTimeout,
    /// Driver-level failure
    Device(String),
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::OpenTimeout => write!(f, "no device found within timeout"),
            SourceError::Device(msg) => write!(f, "device error: {}", msg),
        }
    }
}

impl std::error::Error for SourceError {}

/// A camera device that can be discovered and opened.
///
/// `open` blocks up to `timeout` waiting for a device that matches the
/// stream configuration. On success it yields a running-stream handle and
/// the event channel for that stream's lifetime.
pub trait FrameSource: Send + 'static {
    type Handle: StreamHandle;

    fn open(
        &mut self,
        config: &StreamConfig,
        timeout: Duration,
    ) -> impl Future<Output = Result<(Self::Handle, mpsc::Receiver<SourceEvent>), SourceError>> + Send;
}

/// An opened camera stream.
pub trait StreamHandle: Send + 'static {
    /// Begin frame capture; the source starts dispatching into the router.
    fn start(&mut self) -> impl Future<Output = Result<(), SourceError>> + Send;

    /// Stop frame capture.
    fn stop(&mut self) -> impl Future<Output = Result<(), SourceError>> + Send;

    /// Close the device handle. Frames still held by consumers may be
    /// released after this; the pool must ignore those late releases.
    fn close(self) -> impl Future<Output = ()> + Send;
}
