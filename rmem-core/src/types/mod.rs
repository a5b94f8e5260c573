//! Core types for rmem.
//!
//! - `BlockId`: Opaque handle naming a block across the network boundary
//! - `PoolOffset`: Byte offset into the server's pool

mod ids;
mod offset;

pub use ids::BlockId;
pub use offset::PoolOffset;
