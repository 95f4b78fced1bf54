//! Pipeline composition
//!
//! Wires the router, the camera supervisor, the local consumer and the
//! streaming server together from one explicit configuration value. This
//! is the only place where the pieces meet; none of them reach for global
//! state.

use std::sync::Arc;
use std::time::Duration;

use crate::camera::{CameraConfig, CameraSupervisor, StateCell, StateView, StreamConfig};
use crate::error::Result;
use crate::local::LocalConsumer;
use crate::net::Connectivity;
use crate::router::FrameRouter;
use crate::server::{ServerConfig, StreamServer};
use crate::source::FrameSource;
use crate::stats::PipelineStats;

/// Interval between stream URL advertisements in the log
const ADVERTISE_INTERVAL: Duration = Duration::from_secs(10);

/// Aggregate configuration for one pipeline instance
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// Requested video stream parameters
    pub stream: StreamConfig,
    /// Connection supervisor timings
    pub camera: CameraConfig,
    /// Streaming server options
    pub server: ServerConfig,
}

impl PipelineConfig {
    pub fn stream(mut self, stream: StreamConfig) -> Self {
        self.stream = stream;
        self
    }

    pub fn camera(mut self, camera: CameraConfig) -> Self {
        self.camera = camera;
        self
    }

    pub fn server(mut self, server: ServerConfig) -> Self {
        self.server = server;
        self
    }
}

/// The assembled frame pipeline.
pub struct Pipeline {
    config: PipelineConfig,
    router: Arc<FrameRouter>,
    stats: Arc<PipelineStats>,
    state_cell: StateCell,
    local: LocalConsumer,
}

impl Pipeline {
    /// Build the pipeline and spawn the local consumer task.
    ///
    /// Must run inside a tokio runtime.
    pub fn new(config: PipelineConfig) -> Self {
        let stats = Arc::new(PipelineStats::new());
        let router = Arc::new(FrameRouter::new(stats.clone()));
        let state_cell = StateCell::new();
        let local = LocalConsumer::spawn(
            &router,
            config.stream.frame_buffers,
            state_cell.view(),
        );

        Self {
            config,
            router,
            stats,
            state_cell,
            local,
        }
    }

    /// Router handle for constructing a frame source.
    pub fn router(&self) -> Arc<FrameRouter> {
        self.router.clone()
    }

    /// Read-only connection state.
    pub fn state(&self) -> StateView {
        self.state_cell.view()
    }

    /// Shared pipeline counters.
    pub fn stats(&self) -> Arc<PipelineStats> {
        self.stats.clone()
    }

    /// Local consumer handle for registering a frame handler.
    pub fn local(&self) -> &LocalConsumer {
        &self.local
    }

    /// Run the pipeline: camera supervision plus the streaming server.
    ///
    /// Returns only if the server fails; the camera side retries forever.
    pub async fn run<S, C>(self, source: S, connectivity: C) -> Result<()>
    where
        S: FrameSource,
        C: Connectivity,
    {
        let server = StreamServer::bind(
            self.config.server.clone(),
            self.router.clone(),
            self.state_cell.view(),
            self.stats.clone(),
        )
        .await?;
        let port = server.local_addr().port();

        let supervisor = CameraSupervisor::new(
            source,
            self.config.stream.clone(),
            self.config.camera.clone(),
            self.state_cell,
            self.stats.clone(),
        );

        tokio::select! {
            result = server.run() => result,
            _ = supervisor.run() => Ok(()),
            _ = advertise_loop(connectivity, port) => Ok(()),
        }
    }
}

/// Periodically log where the stream can be reached.
async fn advertise_loop<C: Connectivity>(connectivity: C, port: u16) {
    loop {
        match connectivity.address() {
            Some(addr) if connectivity.is_connected() => {
                tracing::info!("Stream available at http://{}:{}/stream", addr, port);
            }
            _ => {
                tracing::info!("Network not connected, waiting");
            }
        }
        tokio::time::sleep(ADVERTISE_INTERVAL).await;
    }
}
