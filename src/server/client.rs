//! Per-client streaming session
//!
//! Each accepted connection gets its own task, subscriber queue and
//! session id. The session validates the request, sends the multipart
//! preamble, then drains its queue into the socket until the client goes
//! away. A failing client only ever tears down its own session; every
//! frame it dequeues is released (dropped) whether or not the write
//! succeeded.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::camera::StateView;
use crate::router::{FrameRouter, RecvOutcome};
use crate::server::config::ServerConfig;
use crate::server::{http, mjpeg};
use crate::stats::PipelineStats;

/// One connected streaming client.
pub struct ClientSession {
    id: u64,
    socket: TcpStream,
    peer_addr: SocketAddr,
    config: ServerConfig,
    router: Arc<FrameRouter>,
    state: StateView,
    stats: Arc<PipelineStats>,
}

impl ClientSession {
    pub fn new(
        id: u64,
        socket: TcpStream,
        peer_addr: SocketAddr,
        config: ServerConfig,
        router: Arc<FrameRouter>,
        state: StateView,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            id,
            socket,
            peer_addr,
            config,
            router,
            state,
            stats,
        }
    }

    /// Serve the session to completion.
    pub async fn run(mut self) {
        let request = match http::read_request(&mut self.socket, self.config.max_request_size).await
        {
            Ok(req) => req,
            Err(e) => {
                tracing::debug!(session_id = self.id, error = %e, "Failed to read request");
                return;
            }
        };

        if request.method != "GET" {
            let _ = self.socket.write_all(http::METHOD_NOT_ALLOWED).await;
            return;
        }
        // Root serves the same stream for convenience.
        if request.path != "/stream" && request.path != "/" {
            tracing::debug!(session_id = self.id, path = %request.path, "Unknown path");
            let _ = self.socket.write_all(http::NOT_FOUND).await;
            return;
        }

        tracing::info!(
            session_id = self.id,
            peer = %self.peer_addr,
            path = %request.path,
            "Stream client connected"
        );
        self.stats.record_session_opened();

        if let Err(e) = self.socket.write_all(mjpeg::RESPONSE_PREAMBLE).await {
            tracing::debug!(session_id = self.id, error = %e, "Failed to send preamble");
            self.stats.record_session_closed();
            return;
        }

        // Subscribe only after the response has started, so frames do not
        // pile up during request handling.
        let mut rx = self.router.subscribe(self.config.client_queue_capacity);

        loop {
            if !self.state.is_streaming() {
                // Camera offline; keep the connection alive and keep
                // probing for a client-side disconnect while we wait.
                let mut state = self.state.clone();
                tokio::select! {
                    alive = state.wait_for_streaming() => {
                        if !alive {
                            break;
                        }
                    }
                    _ = tokio::time::sleep(self.config.frame_wait_timeout) => {
                        if !self.probe_alive() {
                            tracing::info!(session_id = self.id, "Client disconnected");
                            break;
                        }
                    }
                }
                continue;
            }

            match rx.recv_timeout(self.config.frame_wait_timeout).await {
                RecvOutcome::Frame(frame) => {
                    if !self.state.is_streaming() {
                        // Stream ended while the frame was queued; release
                        // it and go wait for the next streaming period.
                        drop(frame);
                        continue;
                    }

                    let len = frame.len();
                    let result = mjpeg::write_part(&mut self.socket, frame.data()).await;
                    // Release the frame regardless of the write outcome.
                    drop(frame);

                    match result {
                        Ok(()) => self.stats.record_bytes_sent(len as u64),
                        Err(e) => {
                            tracing::info!(
                                session_id = self.id,
                                error = %e,
                                "Client write failed, closing session"
                            );
                            break;
                        }
                    }
                }
                RecvOutcome::TimedOut => {
                    if !self.probe_alive() {
                        tracing::info!(session_id = self.id, "Client disconnected");
                        break;
                    }
                }
                RecvOutcome::Closed => break,
            }
        }

        // Dropping `rx` closes the subscriber queue; the router stops
        // targeting this session on its next dispatch.
        self.stats.record_session_closed();
        tracing::info!(session_id = self.id, "Stream client session closed");
    }

    /// Cheap liveness check while no frames are flowing.
    ///
    /// A streaming GET client sends nothing after its request, so a
    /// would-block read means the peer is still there; a zero-byte read
    /// means it hung up. Any payload it does send is drained and ignored.
    fn probe_alive(&self) -> bool {
        let mut buf = [0u8; 64];
        match self.socket.try_read(&mut buf) {
            Ok(0) => false,
            Ok(_) => true,
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => true,
            Err(_) => false,
        }
    }
}
