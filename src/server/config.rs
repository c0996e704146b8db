//! Server configuration

use std::net::SocketAddr;
use std::time::Duration;

use crate::archive::EncoderConfig;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,

    /// Liveness ping interval per connection
    pub ping_interval: Duration,

    /// Delay between a policy failure and the connection close
    ///
    /// Gives queued outbound data a chance to flush before teardown.
    pub close_grace: Duration,

    /// Archive rotation period
    pub rotation_interval: Duration,

    /// External encoder invoked on rotated archives
    pub encoder: EncoderConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8090".parse().unwrap(),
            max_connections: 0, // Unlimited
            tcp_nodelay: true,  // Frames are small and latency matters
            ping_interval: Duration::from_secs(30),
            close_grace: Duration::from_millis(1280),
            rotation_interval: Duration::from_secs(60 * 60),
            encoder: EncoderConfig::default(),
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

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the liveness ping interval
    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// Set the delayed-close grace period
    pub fn close_grace(mut self, grace: Duration) -> Self {
        self.close_grace = grace;
        self
    }

    /// Set the archive rotation period
    pub fn rotation_interval(mut self, interval: Duration) -> Self {
        self.rotation_interval = interval;
        self
    }

    /// Set the external encoder invocation
    pub fn encoder(mut self, encoder: EncoderConfig) -> Self {
        self.encoder = encoder;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.bind_addr.port(), 8090);
        assert_eq!(config.max_connections, 0);
        assert!(config.tcp_nodelay);
        assert_eq!(config.close_grace, Duration::from_millis(1280));
        assert_eq!(config.rotation_interval, Duration::from_secs(3600));
        assert_eq!(config.encoder.program, "flac");
    }

    #[test]
    fn test_with_addr() {
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        let config = ServerConfig::with_addr(addr);

        assert_eq!(config.bind_addr.port(), 9000);
    }

    #[test]
    fn test_builder_chaining() {
        let addr: SocketAddr = "127.0.0.1:8090".parse().unwrap();
        let config = ServerConfig::default()
            .bind(addr)
            .max_connections(50)
            .ping_interval(Duration::from_secs(5))
            .close_grace(Duration::from_millis(100))
            .rotation_interval(Duration::from_secs(60))
            .encoder(EncoderConfig {
                program: "opusenc".into(),
                args: vec![],
            });

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.max_connections, 50);
        assert_eq!(config.ping_interval, Duration::from_secs(5));
        assert_eq!(config.close_grace, Duration::from_millis(100));
        assert_eq!(config.rotation_interval, Duration::from_secs(60));
        assert_eq!(config.encoder.program, "opusenc");
    }
}
