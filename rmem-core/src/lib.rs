//! rmem Core Library
//!
//! This crate provides the pieces of the rmem memory manager that are shared
//! by the server and its clients.
//!
//! # Overview
//!
//! rmem (remote memory) lets clients allocate, read, write and
//! reference-count fixed-size blocks inside a single byte pool owned by a
//! server process. Blocks are identified by opaque integer handles rather
//! than addresses, and every operation is a request/response exchange.
//!
//! # Key Components
//!
//! - **Pool**: The byte pool, its block table, first-fit allocation and compaction
//! - **Protocol**: Request/response messages and their length-prefixed framing
//! - **Dump**: Human-readable diagnostic snapshots of the pool
//! - **Types**: Strongly-typed block ids and pool offsets
//!
//! # Example
//!
//! ```
//! use rmem_core::MemoryPool;
//!
//! let pool = MemoryPool::new(1024)?;
//! let id = pool.create(4, "i32")?;
//! pool.set(id, &42i32.to_le_bytes())?;
//!
//! let bytes = pool.get(id, 4)?;
//! assert_eq!(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]), 42);
//! # Ok::<(), rmem_core::MemError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dump;
pub mod error;
pub mod pool;
pub mod protocol;
pub mod types;

pub use dump::DumpWriter;
pub use error::{MemError, Result};
pub use pool::{Block, CompactionResult, MemoryPool, PoolStats};
pub use protocol::{Message, MessageKind};
pub use types::{BlockId, PoolOffset};
