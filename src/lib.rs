//! USB camera frame pipeline with MJPEG streaming server
//!
//! This crate acquires frames from a USB (UVC) camera through a driver
//! callback and distributes them to local and network consumers under the
//! constraints of a small embedded host: bounded queues everywhere, a
//! producer context that never blocks, and tolerance for the camera
//! attaching and detaching at any moment.
//!
//! # Architecture
//!
//! ```text
//!   UVC driver (external)          CameraSupervisor
//!        │  capture callback        Searching → Connected → Streaming
//!        ▼                               │            └── Disconnecting ─┐
//!   FrameRouter::dispatch ◄── gated by ──┘                              │
//!        │                                    (loops back to Searching) ┘
//!   ┌────┴─────────────┬──────────────────┐
//!   ▼                  ▼                  ▼
//!  LocalConsumer   ClientSession #1   ClientSession #2
//!  user handler    MJPEG multipart    MJPEG multipart
//! ```
//!
//! Frames are driver-owned buffers checked out once per capture. The
//! router shares a refcounted [`frame::FrameRef`] across subscriber
//! queues; the buffer returns to the driver pool exactly once, when the
//! last consumer drops its reference.
//!
//! # Example
//!
//! ```no_run
//! use uvc_mjpeg_rs::net::StaticConnectivity;
//! use uvc_mjpeg_rs::pipeline::{Pipeline, PipelineConfig};
//! use uvc_mjpeg_rs::source::SimSource;
//!
//! #[tokio::main]
//! async fn main() -> uvc_mjpeg_rs::Result<()> {
//!     let pipeline = Pipeline::new(PipelineConfig::default());
//!     pipeline.local().register(|data, seq| {
//!         tracing::debug!(seq = seq, len = data.len(), "frame");
//!     });
//!
//!     let source = SimSource::new(pipeline.router());
//!     pipeline.run(source, StaticConnectivity::loopback()).await
//! }
//! ```

pub mod camera;
pub mod error;
pub mod frame;
pub mod local;
pub mod net;
pub mod pipeline;
pub mod router;
pub mod server;
pub mod source;
pub mod stats;

pub use camera::{CameraConfig, ConnectionState, StreamConfig};
pub use error::{Error, Result};
pub use frame::{Frame, FrameRef};
pub use pipeline::{Pipeline, PipelineConfig};
pub use router::FrameRouter;
pub use server::{ServerConfig, StreamServer};
