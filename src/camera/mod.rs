//! Camera lifecycle management
//!
//! Configuration for the requested video stream, the connection state
//! machine, and the supervisor task that owns every state transition.

pub mod config;
pub mod state;
pub mod supervisor;

pub use config::{CameraConfig, PixelFormat, StreamConfig};
pub use state::{ConnectionState, StateCell, StateView};
pub use supervisor::CameraSupervisor;
