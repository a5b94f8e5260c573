//! Length-prefixed framing over a byte stream.
//!
//! Each frame is a little-endian `u32` body length followed by the body.
//! The blocking helpers here are used by the client; the server frames
//! asynchronously with the same limits via [`check_frame_len`].

use super::message::MIN_MESSAGE_SIZE;
use crate::error::{MemError, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

/// Largest frame body accepted from the wire (64 MiB).
pub const MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;

/// Validate a frame length prefix before any body bytes are buffered.
pub fn check_frame_len(len: u32) -> Result<usize> {
    let len = len as usize;

    if len > MAX_FRAME_SIZE {
        return Err(MemError::FrameTooLarge {
            len,
            max: MAX_FRAME_SIZE,
        });
    }

    if len < MIN_MESSAGE_SIZE {
        return Err(MemError::FrameTooShort {
            len,
            min: MIN_MESSAGE_SIZE,
        });
    }

    Ok(len)
}

/// Read one frame body from a blocking stream.
///
/// Returns `UnexpectedEof` if the peer closes mid-frame and `InvalidData`
/// if the length prefix is out of range.
pub fn read_frame<R: Read>(reader: &mut R) -> io::Result<Vec<u8>> {
    let len = reader.read_u32::<LittleEndian>()?;
    let len = check_frame_len(len).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body)?;
    Ok(body)
}

/// Write one frame (prefix and body) and flush.
pub fn write_frame<W: Write>(writer: &mut W, body: &[u8]) -> io::Result<()> {
    if body.len() > MAX_FRAME_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            MemError::FrameTooLarge {
                len: body.len(),
                max: MAX_FRAME_SIZE,
            },
        ));
    }

    writer.write_u32::<LittleEndian>(body.len() as u32)?;
    writer.write_all(body)?;
    writer.flush()
}
