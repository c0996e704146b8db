//! TCP server: accept loop, per-connection lifecycle, configuration

pub mod config;
pub mod connection;
pub mod listener;

pub use config::ServerConfig;
pub use connection::Connection;
pub use listener::Server;
