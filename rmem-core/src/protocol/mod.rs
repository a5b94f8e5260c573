//! Binary wire protocol shared by the server and its clients.
//!
//! Requests and responses use a single message shape. Every message on the
//! wire is preceded by a 4-byte length prefix so it can be framed over a
//! byte stream.
//!
//! # Layout
//!
//! All integers are little-endian.
//!
//! ```text
//! ┌──────────────┬──────────┬────────┬──────────┬──────────┬─────────┬─────────┬──────────┬─────────┐
//! │ frame length │ kind     │ id     │ size     │ tag len  │ tag     │ success │ data len │ data    │
//! │ u32          │ u32      │ i32    │ u64      │ u32      │ N bytes │ u8      │ u32      │ M bytes │
//! └──────────────┴──────────┴────────┴──────────┴──────────┴─────────┴─────────┴──────────┴─────────┘
//!                 └──────────────────────── frame body (length = frame length) ─────────────────────┘
//! ```

mod frame;
mod message;

pub use frame::{MAX_FRAME_SIZE, check_frame_len, read_frame, write_frame};
pub use message::{MIN_MESSAGE_SIZE, Message, MessageKind};
