//! Serve command - run the memory manager.

use anyhow::{Context, Result};
use rmem_server::{MemoryServer, ServerConfig};
use std::path::PathBuf;

/// Run the serve command.
///
/// Startup failures (invalid sizes, an unusable dump directory, a port
/// that cannot be bound, a pool that cannot be allocated) are returned so
/// the process exits non-zero.
pub async fn run(host: &str, port: u16, memsize_mb: u64, dump_dir: PathBuf) -> Result<()> {
    let memsize_mb = usize::try_from(memsize_mb).context("Pool size does not fit in memory")?;
    let config = ServerConfig::new(port, memsize_mb)
        .with_host(host)
        .with_dump_dir(&dump_dir);

    let server = MemoryServer::bind(config)
        .await
        .with_context(|| format!("Failed to start memory server on {}:{}", host, port))?;
    let addr = server.local_addr()?;

    println!("rmem memory manager");
    println!();
    println!("Listening:  {}", addr);
    println!("Pool size:  {} MB", memsize_mb);
    println!("Dumps:      {}", dump_dir.display());
    println!();
    println!("Press Ctrl+C to stop.");

    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Shutdown signal received");
                shutdown.shutdown();
            }
            Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C"),
        }
    });

    server.run().await?;
    println!("Shut down.");
    Ok(())
}
