//! TCP listener
//!
//! Handles the accept loop, spawns one [`Connection`] task per client, and
//! owns the background rotation/compression machinery for the server's
//! lifetime.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

use crate::archive::{spawn_rotation_task, spawn_worker};
use crate::auth::AccessTable;
use crate::error::Result;
use crate::registry::{RegistryConfig, StreamRegistry};
use crate::server::config::ServerConfig;
use crate::server::connection::Connection;
use crate::session::SessionRegistry;

/// Sample streaming hub server
pub struct Server {
    config: ServerConfig,
    sessions: Arc<SessionRegistry>,
    registry: Arc<StreamRegistry>,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl Server {
    /// Create a server with the default registry configuration
    pub fn new(config: ServerConfig, access: AccessTable) -> Self {
        Self::with_registry_config(config, access, RegistryConfig::default())
    }

    /// Create a server with custom registry configuration
    pub fn with_registry_config(
        config: ServerConfig,
        access: AccessTable,
        registry_config: RegistryConfig,
    ) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        let sessions = Arc::new(SessionRegistry::new());
        let registry = Arc::new(StreamRegistry::new(
            Arc::clone(&sessions),
            access,
            registry_config,
        ));

        Self {
            config,
            sessions,
            registry,
            connection_semaphore,
        }
    }

    /// Get a reference to the stream registry
    pub fn registry(&self) -> &Arc<StreamRegistry> {
        &self.registry
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// Run the server
    ///
    /// This method blocks until the server is shut down.
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.run_with_listener(listener).await
    }

    /// Run the server on an already-bound listener
    ///
    /// Useful when the caller binds port 0 and needs the actual address.
    pub async fn run_with_listener(&self, listener: TcpListener) -> Result<()> {
        tracing::info!(addr = %self.config.bind_addr, "Sample hub listening");

        let (queue, _compress) = spawn_worker(self.config.encoder.clone());
        let _rotation = spawn_rotation_task(
            Arc::clone(&self.registry),
            queue,
            self.config.rotation_interval,
        );

        self.accept_loop(&listener).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "Sample hub listening");

        let (queue, _compress) = spawn_worker(self.config.encoder.clone());
        let rotation = spawn_rotation_task(
            Arc::clone(&self.registry),
            queue,
            self.config.rotation_interval,
        );

        let result = tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.accept_loop(&listener) => result,
        };

        // Stop rotating; the compression worker drains its queue and exits
        // once the rotation task's queue handle is dropped.
        rotation.abort();

        result
    }

    async fn accept_loop(&self, listener: &TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    async fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        // Check connection limit
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        if self.config.tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::warn!(peer = %peer_addr, error = %e, "Failed to set TCP_NODELAY");
            }
        }

        let connection = Connection::new(
            socket,
            peer_addr,
            self.config.clone(),
            Arc::clone(&self.sessions),
            Arc::clone(&self.registry),
        );

        tokio::spawn(async move {
            // Hold the limit permit for the connection's whole lifetime
            let _permit = permit;

            if let Err(e) = connection.run().await {
                tracing::debug!(peer = %peer_addr, error = %e, "Connection error");
            }
        });
    }
}
