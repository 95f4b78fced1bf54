//! MJPEG streaming server
//!
//! Handles the TCP accept loop and spawns one session task per client.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

use crate::camera::StateView;
use crate::error::Result;
use crate::router::FrameRouter;
use crate::server::client::ClientSession;
use crate::server::config::ServerConfig;
use crate::stats::PipelineStats;

/// MJPEG-over-HTTP streaming server
pub struct StreamServer {
    config: ServerConfig,
    listener: TcpListener,
    local_addr: SocketAddr,
    router: Arc<FrameRouter>,
    state: StateView,
    stats: Arc<PipelineStats>,
    next_session_id: AtomicU64,
    client_semaphore: Option<Arc<Semaphore>>,
}

impl StreamServer {
    /// Bind the listening socket.
    ///
    /// Failure here is fatal to startup; there is no retry loop for the
    /// server socket.
    pub async fn bind(
        config: ServerConfig,
        router: Arc<FrameRouter>,
        state: StateView,
        stats: Arc<PipelineStats>,
    ) -> Result<Self> {
        let listener = TcpListener::bind(config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(addr = %local_addr, "MJPEG server listening");

        let client_semaphore = if config.max_clients > 0 {
            Some(Arc::new(Semaphore::new(config.max_clients)))
        } else {
            None
        };

        Ok(Self {
            config,
            listener,
            local_addr,
            router,
            state,
            stats,
            next_session_id: AtomicU64::new(1),
            client_semaphore,
        })
    }

    /// Address the server actually bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Run the accept loop.
    ///
    /// This method blocks until the server is shut down.
    pub async fn run(&self) -> Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    /// Run the accept loop with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.run() => result,
        }
    }

    async fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        // Check client limit
        let permit = if let Some(ref sem) = self.client_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: client limit reached");
                    return;
                }
            }
        } else {
            None
        };

        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(session_id = session_id, peer = %peer_addr, "New connection");

        if self.config.tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::debug!(session_id = session_id, error = %e, "Failed to set TCP_NODELAY");
            }
        }

        let session = ClientSession::new(
            session_id,
            socket,
            peer_addr,
            self.config.clone(),
            Arc::clone(&self.router),
            self.state.clone(),
            Arc::clone(&self.stats),
        );

        tokio::spawn(async move {
            session.run().await;
            // Permit released when the session ends.
            drop(permit);
            tracing::debug!(session_id = session_id, "Connection closed");
        });
    }
}
