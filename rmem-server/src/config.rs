//! Server configuration.

use rmem_core::error::{MemError, Result};
use std::path::PathBuf;
use std::time::Duration;

const MB: usize = 1024 * 1024;

/// Garbage collector timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GcConfig {
    /// Pause between sweep cycles.
    pub interval: Duration,
    /// Compact the pool on every Nth cycle.
    pub compact_every: u32,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
            compact_every: 10,
        }
    }
}

impl GcConfig {
    /// Set the sweep interval.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set how many cycles pass between compactions.
    #[must_use]
    pub fn with_compact_every(mut self, cycles: u32) -> Self {
        self.compact_every = cycles;
        self
    }
}

/// Configuration for the memory server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to listen on. Zero picks an ephemeral port.
    pub port: u16,
    /// Pool capacity in bytes.
    pub pool_size: usize,
    /// Directory for diagnostic dumps. No dumps are written when unset.
    pub dump_dir: Option<PathBuf>,
    /// How long a connection may sit idle between requests.
    pub idle_timeout: Duration,
    /// Deadline for reading the rest of a frame and writing the reply.
    pub io_timeout: Duration,
    /// Garbage collector timing.
    pub gc: GcConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            pool_size: 10 * MB,
            dump_dir: None,
            idle_timeout: Duration::from_secs(300),
            io_timeout: Duration::from_secs(30),
            gc: GcConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Create a configuration for `port` with a pool of `pool_size_mb` megabytes.
    pub fn new(port: u16, pool_size_mb: usize) -> Self {
        Self {
            port,
            pool_size: pool_size_mb.saturating_mul(MB),
            ..Self::default()
        }
    }

    /// Set the bind host.
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the pool capacity in bytes.
    #[must_use]
    pub fn with_pool_size_bytes(mut self, bytes: usize) -> Self {
        self.pool_size = bytes;
        self
    }

    /// Write diagnostic dumps into `dir`.
    #[must_use]
    pub fn with_dump_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dump_dir = Some(dir.into());
        self
    }

    /// Set the idle timeout between requests.
    #[must_use]
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Set the per-frame I/O deadline.
    #[must_use]
    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Set the garbage collector timing.
    #[must_use]
    pub fn with_gc(mut self, gc: GcConfig) -> Self {
        self.gc = gc;
        self
    }

    /// Address string passed to the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check every value that would make the server unusable.
    pub fn validate(&self) -> Result<()> {
        if self.pool_size == 0 {
            return Err(invalid("pool_size", "must be positive"));
        }
        if self.gc.interval.is_zero() {
            return Err(invalid("gc.interval", "must be positive"));
        }
        if self.gc.compact_every == 0 {
            return Err(invalid("gc.compact_every", "must be positive"));
        }
        if self.idle_timeout.is_zero() || self.io_timeout.is_zero() {
            return Err(invalid("timeout", "must be positive"));
        }
        if self.dump_dir.as_ref().is_some_and(|d| d.as_os_str().is_empty()) {
            return Err(invalid("dump_dir", "must not be empty"));
        }
        Ok(())
    }

    /// Create the dump directory if one is configured.
    pub fn prepare_dump_dir(&self) -> Result<()> {
        if let Some(dir) = &self.dump_dir {
            std::fs::create_dir_all(dir).map_err(|e| MemError::Io {
                path: dir.clone(),
                cause: e.to_string(),
            })?;
        }
        Ok(())
    }
}

fn invalid(field: &str, cause: &str) -> MemError {
    MemError::ConfigValue {
        field: field.to_string(),
        cause: cause.to_string(),
    }
}
