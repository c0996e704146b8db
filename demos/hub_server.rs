//! Sample hub server - archives and fans out sensor streams
//!
//! Run with: cargo run --example hub_server -- [access_rights.json] [storage_dir]
//!
//! This example demonstrates:
//! - Loading the stream access table from JSON
//! - Running the hub with archive rotation and background compression
//! - Graceful shutdown on Ctrl+C

use std::path::PathBuf;

use samplecast::registry::RegistryConfig;
use samplecast::{AccessTable, Server, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("samplecast=info".parse()?)
                .add_directive("hub_server=info".parse()?),
        )
        .init();

    let access_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "access_rights.json".to_owned());
    let storage_dir = std::env::args()
        .nth(2)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("archive"));

    let access = AccessTable::from_path(&access_path)?;
    let config = ServerConfig::default();
    let registry_config = RegistryConfig::default().storage_dir(&storage_dir);

    println!("Sample Hub Server");
    println!("=================");
    println!("Listening on: {}", config.bind_addr);
    println!("Access table: {} ({} streams)", access_path, access.len());
    println!("Storage dir:  {}", storage_dir.display());
    println!("Encoder:      {}", config.encoder.program);
    println!();
    println!("Press Ctrl+C to stop the server...");
    println!();

    let server = Server::with_registry_config(config, access, registry_config);

    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
            println!("\nShutting down...");
        })
        .await?;

    Ok(())
}
