//! MJPEG streaming consumer
//!
//! A small HTTP server whose only job is turning queued camera frames
//! into live `multipart/x-mixed-replace` feeds. `GET /stream` and `GET /`
//! both produce the stream; there are no other routes.

pub mod client;
pub mod config;
pub mod http;
pub mod listener;
pub mod mjpeg;

pub use client::ClientSession;
pub use config::ServerConfig;
pub use listener::StreamServer;
