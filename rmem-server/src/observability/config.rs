//! Logging configuration.

use std::env;
use std::str::FromStr;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per event.
    Json,
    /// Multi-line human-readable output.
    Pretty,
    /// Single-line output.
    #[default]
    Compact,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

/// Configuration for the tracing subscriber.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    log_format: LogFormat,
    /// Filter directives, e.g. `info` or `info,rmem_server=debug`.
    log_filter: String,
    include_location: bool,
    include_thread_names: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::default(),
            log_filter: "info".to_string(),
            include_location: false,
            include_thread_names: true,
        }
    }
}

impl TracingConfig {
    /// Read the configuration from the environment.
    ///
    /// - `RMEM_LOG_FORMAT`: `json`, `pretty` or `compact`
    /// - `RMEM_LOG_LEVEL` or `RUST_LOG`: filter directives
    /// - `RMEM_LOG_LOCATION`: `true` or `1` to include file and line
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let log_format = env::var("RMEM_LOG_FORMAT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.log_format);

        let log_filter = env::var("RMEM_LOG_LEVEL")
            .or_else(|_| env::var("RUST_LOG"))
            .unwrap_or(defaults.log_filter);

        let include_location = env::var("RMEM_LOG_LOCATION")
            .map(|s| s == "true" || s == "1")
            .unwrap_or(defaults.include_location);

        Self {
            log_format,
            log_filter,
            include_location,
            ..defaults
        }
    }

    /// Set the log format.
    #[must_use]
    pub fn with_log_format(mut self, format: LogFormat) -> Self {
        self.log_format = format;
        self
    }

    /// Set the filter directives.
    #[must_use]
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    /// Include source file and line in each event.
    #[must_use]
    pub fn with_location(mut self, include: bool) -> Self {
        self.include_location = include;
        self
    }

    /// Include the thread name in each event.
    #[must_use]
    pub fn with_thread_names(mut self, include: bool) -> Self {
        self.include_thread_names = include;
        self
    }

    /// Get the log format.
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Get the filter directives.
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Check if source location should be included.
    pub fn include_location(&self) -> bool {
        self.include_location
    }

    /// Check if thread names should be included.
    pub fn include_thread_names(&self) -> bool {
        self.include_thread_names
    }
}
