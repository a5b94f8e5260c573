//! Client library for the rmem memory manager.
//!
//! [`RpcClient`] sends protocol requests over one TCP connection and
//! reconnects when the server goes away. [`RemotePtr`] builds pointer-like
//! ownership on top of it: the remote reference count follows the
//! pointer's construction, cloning, reassignment and drop.
//!
//! # Example
//!
//! ```no_run
//! use rmem_client::{RemotePtr, RpcClient};
//! use std::sync::Arc;
//!
//! # fn example() -> Result<(), rmem_client::ClientError> {
//! let client = Arc::new(RpcClient::connect("127.0.0.1", 9000)?);
//!
//! let ptr = RemotePtr::<i32>::new(Arc::clone(&client), &42)?;
//! let copy = ptr.try_clone()?;
//! assert_eq!(copy.read_value()?, 42);
//!
//! copy.proxy()?.write(&7)?;
//! assert_eq!(ptr.read_value()?, 7);
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! Requests the server refuses come back as [`ClientError::Rejected`];
//! an unreachable server surfaces as [`ClientError::Connect`] once the
//! reconnect budget is spent. Dropping a pointer never fails: a release
//! that cannot be delivered is logged.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod client;
mod error;
mod pointer;
mod value;

pub use client::{ClientConfig, RpcClient};
pub use error::{ClientError, Result};
pub use pointer::{Proxy, RemotePtr};
pub use value::RemoteValue;

pub use rmem_core::BlockId;
