//! rmem CLI - run the memory manager or poke at a running one.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::block::{ServerArgs, ValueFormat};
use rmem_server::observability::{LogFormat, TracingConfig, TracingGuard, init_tracing};
use std::path::PathBuf;

/// rmem - remote reference-counted memory.
#[derive(Parser)]
#[command(name = "rmem")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the memory manager
    Serve {
        /// Host to bind to
        #[arg(short = 'H', long, default_value = "0.0.0.0")]
        host: String,

        /// Port to listen on
        #[arg(short, long, env = "RMEM_PORT", value_parser = clap::value_parser!(u16).range(1..))]
        port: u16,

        /// Pool size in megabytes
        #[arg(short, long, env = "RMEM_MEMSIZE", value_parser = clap::value_parser!(u64).range(1..))]
        memsize: u64,

        /// Directory for diagnostic dumps (created if missing)
        #[arg(short, long, env = "RMEM_DUMP_DIR")]
        dump_dir: PathBuf,
    },

    /// Allocate a block and print its id
    Alloc {
        #[command(flatten)]
        server: ServerArgs,

        /// Block size in bytes
        #[arg(short, long)]
        size: u64,

        /// Type tag recorded with the block
        #[arg(short = 't', long = "type", default_value = "bytes")]
        type_tag: String,
    },

    /// Read a block
    Read {
        #[command(flatten)]
        server: ServerArgs,

        /// Block id
        id: i32,

        /// How to print the contents
        #[arg(short, long, value_enum, default_value_t = ValueFormat::Hex)]
        format: ValueFormat,
    },

    /// Write a value into a block
    Write {
        #[command(flatten)]
        server: ServerArgs,

        /// Block id
        id: i32,

        /// Value to store, interpreted according to --format
        value: String,

        /// How to encode the value
        #[arg(short, long, value_enum, default_value_t = ValueFormat::Hex)]
        format: ValueFormat,
    },

    /// Add a reference to a block
    Incref {
        #[command(flatten)]
        server: ServerArgs,

        /// Block id
        id: i32,
    },

    /// Drop a reference from a block
    Decref {
        #[command(flatten)]
        server: ServerArgs,

        /// Block id
        id: i32,
    },

    /// Show version information
    Version,
}

fn setup_logging(verbosity: u8) -> Result<TracingGuard> {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let env = TracingConfig::from_env();
    let log_format = std::env::var("RMEM_LOG_FORMAT")
        .ok()
        .and_then(|s| s.parse::<LogFormat>().ok())
        .unwrap_or_else(|| {
            if std::io::IsTerminal::is_terminal(&std::io::stderr()) {
                LogFormat::Pretty
            } else {
                LogFormat::Compact
            }
        });

    // An explicit filter in the environment wins over -v.
    let explicit = std::env::var("RMEM_LOG_LEVEL").is_ok() || std::env::var("RUST_LOG").is_ok();
    let log_filter = if explicit { env.log_filter().to_string() } else { filter.to_string() };

    init_tracing(env.with_log_format(log_format).with_log_filter(log_filter))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _tracing_guard = setup_logging(cli.verbose)?;

    match cli.command {
        Commands::Serve {
            host,
            port,
            memsize,
            dump_dir,
        } => commands::serve::run(&host, port, memsize, dump_dir).await,
        Commands::Alloc {
            server,
            size,
            type_tag,
        } => commands::block::blocking(move || commands::block::alloc(&server, size, &type_tag)).await,
        Commands::Read { server, id, format } => {
            commands::block::blocking(move || commands::block::read(&server, id, format)).await
        }
        Commands::Write {
            server,
            id,
            value,
            format,
        } => commands::block::blocking(move || commands::block::write(&server, id, &value, format)).await,
        Commands::Incref { server, id } => {
            commands::block::blocking(move || commands::block::incref(&server, id)).await
        }
        Commands::Decref { server, id } => {
            commands::block::blocking(move || commands::block::decref(&server, id)).await
        }
        Commands::Version => commands::version::run(),
    }
}
