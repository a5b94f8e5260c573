//! rmem Server
//!
//! The memory manager process: a TCP server that owns the byte pool, runs
//! each client's requests against it, and sweeps released blocks in the
//! background.
//!
//! # Example
//!
//! ```no_run
//! use rmem_server::{MemoryServer, ServerConfig};
//!
//! # async fn example() -> rmem_core::Result<()> {
//! let config = ServerConfig::new(9000, 16).with_dump_dir("/tmp/rmem-dumps");
//! let server = MemoryServer::bind(config).await?;
//!
//! let shutdown = server.shutdown_handle();
//! tokio::spawn(async move {
//!     let _ = tokio::signal::ctrl_c().await;
//!     shutdown.shutdown();
//! });
//!
//! server.run().await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod dispatch;
pub mod gc;
pub mod observability;
pub mod server;

pub use config::{GcConfig, ServerConfig};
pub use dispatch::process_request;
pub use gc::{GarbageCollector, GcStats};
pub use server::{MemoryServer, ShutdownHandle};
