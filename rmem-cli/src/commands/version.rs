//! Version command - show version information.

use anyhow::Result;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Run the version command.
pub fn run() -> Result<()> {
    println!("rmem - remote reference-counted memory");
    println!();
    println!("Version:     {}", VERSION);
    println!("Platform:    {} / {}", std::env::consts::OS, std::env::consts::ARCH);
    println!();
    println!("Components:");
    println!("  rmem-core    Block table, allocator, wire protocol, dumps");
    println!("  rmem-server  Connection server and garbage collector");
    println!("  rmem-client  Reconnecting client and remote pointers");
    println!("  rmem-cli     Command-line interface");

    Ok(())
}
