//! Logging setup for the rmem server.
//!
//! Output format is controlled via `RMEM_LOG_FORMAT`:
//! - `json` - one JSON object per event
//! - `pretty` - multi-line human-readable output
//! - `compact` - single-line output (default)
//!
//! The filter comes from `RMEM_LOG_LEVEL`, falling back to `RUST_LOG`.
//!
//! ```ignore
//! use rmem_server::observability::{TracingConfig, init_tracing};
//!
//! let _guard = init_tracing(TracingConfig::from_env())?;
//! ```

mod config;
mod tracing_setup;

pub use config::{LogFormat, TracingConfig};
pub use tracing_setup::{TracingGuard, init_tracing};
