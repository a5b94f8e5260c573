//! CLI command implementations.

pub mod block;
pub mod serve;
pub mod version;
