//! Streaming server configuration

use std::net::SocketAddr;
use std::time::Duration;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent streaming clients (0 = unlimited)
    pub max_clients: usize,

    /// Subscriber queue capacity per client
    pub client_queue_capacity: usize,

    /// How long a session waits for a frame before probing the connection
    pub frame_wait_timeout: Duration,

    /// Maximum accepted size of a client's HTTP request
    pub max_request_size: usize,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".parse().unwrap(),
            max_clients: 3,
            client_queue_capacity: 3,
            frame_wait_timeout: Duration::from_secs(1),
            max_request_size: 4 * 1024,
            tcp_nodelay: true, // Important for low latency
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the maximum concurrent clients
    pub fn max_clients(mut self, max: usize) -> Self {
        self.max_clients = max;
        self
    }

    /// Set the per-client queue capacity
    pub fn client_queue_capacity(mut self, capacity: usize) -> Self {
        self.client_queue_capacity = capacity;
        self
    }

    /// Set the frame wait timeout
    pub fn frame_wait_timeout(mut self, timeout: Duration) -> Self {
        self.frame_wait_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.max_clients, 3);
        assert_eq!(config.client_queue_capacity, 3);
        assert_eq!(config.frame_wait_timeout, Duration::from_secs(1));
        assert!(config.tcp_nodelay);
    }

    #[test]
    fn test_with_addr() {
        let addr: SocketAddr = "127.0.0.1:9090".parse().unwrap();
        let config = ServerConfig::with_addr(addr);

        assert_eq!(config.bind_addr.port(), 9090);
    }

    #[test]
    fn test_builder_chaining() {
        let addr: SocketAddr = "127.0.0.1:8081".parse().unwrap();
        let config = ServerConfig::default()
            .bind(addr)
            .max_clients(10)
            .client_queue_capacity(6)
            .frame_wait_timeout(Duration::from_millis(250));

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.max_clients, 10);
        assert_eq!(config.client_queue_capacity, 6);
        assert_eq!(config.frame_wait_timeout, Duration::from_millis(250));
    }
}
