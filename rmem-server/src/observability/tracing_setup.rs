//! Tracing subscriber installation.

use super::{LogFormat, TracingConfig};
use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Keeps logging alive for the lifetime of the process.
///
/// Hold it in `main` until shutdown.
#[must_use = "logging stops being configured once the guard is dropped"]
pub struct TracingGuard {
    _private: (),
}

/// Install the global subscriber.
///
/// Fails if a subscriber was already installed.
pub fn init_tracing(config: TracingConfig) -> Result<TracingGuard> {
    let filter = EnvFilter::try_new(config.log_filter()).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(format_layer(&config).with_filter(filter))
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    Ok(TracingGuard { _private: () })
}

fn format_layer(config: &TracingConfig) -> Box<dyn Layer<Registry> + Send + Sync> {
    let layer = fmt::layer()
        .with_file(config.include_location())
        .with_line_number(config.include_location())
        .with_thread_names(config.include_thread_names());

    match config.log_format() {
        LogFormat::Json => layer.json().flatten_event(true).boxed(),
        LogFormat::Pretty => layer.pretty().boxed(),
        LogFormat::Compact => layer.compact().boxed(),
    }
}
