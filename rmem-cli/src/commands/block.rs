//! One-shot client commands against a running server.

use anyhow::{Context, Result, bail};
use clap::{Args, ValueEnum};
use rmem_client::{BlockId, ClientConfig, RemoteValue, RpcClient};

/// Where to find the server.
#[derive(Args, Debug, Clone)]
pub struct ServerArgs {
    /// Server host
    #[arg(short = 'H', long, env = "RMEM_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Server port
    #[arg(short, long, env = "RMEM_PORT")]
    pub port: u16,
}

impl ServerArgs {
    fn connect(&self) -> Result<RpcClient> {
        RpcClient::connect_with(ClientConfig::new(&self.host, self.port))
            .with_context(|| format!("Failed to connect to {}:{}", self.host, self.port))
    }
}

/// Encoding used to read and write block contents.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueFormat {
    /// Raw bytes as hex
    Hex,
    /// Signed 32-bit integer
    I32,
    /// Signed 64-bit integer
    I64,
    /// Unsigned byte
    U8,
    /// 64-bit float
    F64,
}

/// Run a blocking command off the async runtime.
pub async fn blocking<F>(command: F) -> Result<()>
where
    F: FnOnce() -> Result<()> + Send + 'static,
{
    tokio::task::spawn_blocking(command).await?
}

/// Allocate a block and print its id.
pub fn alloc(server: &ServerArgs, size: u64, type_tag: &str) -> Result<()> {
    let id = server.connect()?.create_block(size, type_tag)?;
    println!("{}", id.as_i32());
    Ok(())
}

/// Print a block's contents.
pub fn read(server: &ServerArgs, id: i32, format: ValueFormat) -> Result<()> {
    let bytes = server.connect()?.get_block(BlockId::new(id), 0)?;
    println!("{}", decode(&bytes, format)?);
    Ok(())
}

/// Store a value at the start of a block.
pub fn write(server: &ServerArgs, id: i32, value: &str, format: ValueFormat) -> Result<()> {
    let bytes = encode(value, format)?;
    server.connect()?.set_block(BlockId::new(id), &bytes)?;
    println!("Wrote {} bytes to block {}", bytes.len(), id);
    Ok(())
}

/// Add a reference to a block.
pub fn incref(server: &ServerArgs, id: i32) -> Result<()> {
    server.connect()?.increase_ref(BlockId::new(id))?;
    println!("Added a reference to block {}", id);
    Ok(())
}

/// Drop a reference from a block.
pub fn decref(server: &ServerArgs, id: i32) -> Result<()> {
    server.connect()?.decrease_ref(BlockId::new(id))?;
    println!("Dropped a reference from block {}", id);
    Ok(())
}

fn encode(value: &str, format: ValueFormat) -> Result<Vec<u8>> {
    let value = value.trim();
    let bytes = match format {
        ValueFormat::Hex => parse_hex(value)?,
        ValueFormat::I32 => value.parse::<i32>().context("Invalid i32")?.encode(),
        ValueFormat::I64 => value.parse::<i64>().context("Invalid i64")?.encode(),
        ValueFormat::U8 => value.parse::<u8>().context("Invalid u8")?.encode(),
        ValueFormat::F64 => value.parse::<f64>().context("Invalid f64")?.encode(),
    };
    Ok(bytes)
}

fn decode(bytes: &[u8], format: ValueFormat) -> Result<String> {
    let text = match format {
        ValueFormat::Hex => bytes.iter().map(|b| format!("{:02x}", b)).collect::<Vec<_>>().join(" "),
        ValueFormat::I32 => i32::decode(bytes)?.to_string(),
        ValueFormat::I64 => i64::decode(bytes)?.to_string(),
        ValueFormat::U8 => u8::decode(bytes)?.to_string(),
        ValueFormat::F64 => f64::decode(bytes)?.to_string(),
    };
    Ok(text)
}

fn parse_hex(value: &str) -> Result<Vec<u8>> {
    let digits: String = value
        .trim_start_matches("0x")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    if digits.is_empty() || digits.len() % 2 != 0 {
        bail!("Hex value needs an even, non-zero number of digits");
    }
    if let Some(bad) = digits.chars().find(|c| !c.is_ascii_hexdigit()) {
        bail!("Invalid hex digit '{}'", bad);
    }

    (0..digits.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&digits[i..i + 2], 16).context("Invalid hex byte"))
        .collect()
}
