//! Protocol message types and serialization.

use crate::error::{MemError, Result};
use crate::types::BlockId;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

/// Minimum message size (fixed header with empty tag and empty data).
pub const MIN_MESSAGE_SIZE: usize = 4 + 4 + 8 + 4 + 1 + 4; // 25 bytes

/// Kind of protocol message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum MessageKind {
    /// Allocate a block of `size` bytes tagged with a type name.
    Create = 0,
    /// Overwrite the start of a block with the payload.
    Set = 1,
    /// Read the full contents of a block.
    Get = 2,
    /// Add one reference to a block.
    IncreaseRef = 3,
    /// Drop one reference from a block.
    DecreaseRef = 4,
    /// Server reply to any request.
    Response = 5,
}

impl TryFrom<u32> for MessageKind {
    type Error = MemError;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            0 => Ok(Self::Create),
            1 => Ok(Self::Set),
            2 => Ok(Self::Get),
            3 => Ok(Self::IncreaseRef),
            4 => Ok(Self::DecreaseRef),
            5 => Ok(Self::Response),
            kind => Err(MemError::UnknownMessageKind { kind }),
        }
    }
}

/// A single protocol message.
///
/// Fields that a given kind does not use are left at their neutral values
/// (`BlockId::NONE`, zero size, empty tag, `success = false`, empty data).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Kind of this message.
    pub kind: MessageKind,
    /// Target block (requests) or `BlockId::NONE`.
    pub id: BlockId,
    /// Requested size for `Create`; maximum read length for `Get`.
    pub size: u64,
    /// Type tag recorded on `Create`.
    pub type_tag: String,
    /// Outcome flag of a `Response`.
    pub success: bool,
    /// Payload bytes: the value for `Set`, the result for `Response`.
    pub data: Vec<u8>,
}

impl Message {
    fn new(kind: MessageKind, id: BlockId) -> Self {
        Self {
            kind,
            id,
            size: 0,
            type_tag: String::new(),
            success: false,
            data: Vec::new(),
        }
    }

    /// Create an allocation request.
    pub fn create(size: u64, type_tag: impl Into<String>) -> Self {
        Self {
            size,
            type_tag: type_tag.into(),
            ..Self::new(MessageKind::Create, BlockId::NONE)
        }
    }

    /// Create a write request.
    pub fn set(id: BlockId, data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            ..Self::new(MessageKind::Set, id)
        }
    }

    /// Create a read request.
    ///
    /// A `max_len` of zero asks for the whole block.
    pub fn get(id: BlockId, max_len: u64) -> Self {
        Self {
            size: max_len,
            ..Self::new(MessageKind::Get, id)
        }
    }

    /// Create a reference count increment request.
    pub fn increase_ref(id: BlockId) -> Self {
        Self::new(MessageKind::IncreaseRef, id)
    }

    /// Create a reference count decrement request.
    pub fn decrease_ref(id: BlockId) -> Self {
        Self::new(MessageKind::DecreaseRef, id)
    }

    /// Create a response.
    pub fn response(success: bool, data: impl Into<Vec<u8>>) -> Self {
        Self {
            success,
            data: data.into(),
            ..Self::new(MessageKind::Response, BlockId::NONE)
        }
    }

    /// Create a failed response with no payload.
    pub fn failure() -> Self {
        Self::response(false, Vec::new())
    }

    /// Check whether this message is a request (anything but a response).
    #[must_use]
    pub fn is_request(&self) -> bool {
        self.kind != MessageKind::Response
    }

    /// Serialize the message body (without the frame length prefix).
    pub fn to_bytes(&self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.serialized_size());
        self.write_to(&mut buf)?;
        Ok(buf)
    }

    fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let tag = self.type_tag.as_bytes();

        out.write_u32::<LittleEndian>(self.kind as u32)?;
        out.write_i32::<LittleEndian>(self.id.as_i32())?;
        out.write_u64::<LittleEndian>(self.size)?;
        out.write_u32::<LittleEndian>(length_field(tag.len())?)?;
        out.write_all(tag)?;
        out.write_u8(u8::from(self.success))?;
        out.write_u32::<LittleEndian>(length_field(self.data.len())?)?;
        out.write_all(&self.data)?;

        Ok(())
    }

    /// Deserialize a message body.
    ///
    /// The fixed header size is validated before any field is read, and
    /// every variable-length field is checked against the bytes remaining.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < MIN_MESSAGE_SIZE {
            return Err(MemError::FrameTooShort {
                len: bytes.len(),
                min: MIN_MESSAGE_SIZE,
            });
        }

        let mut cursor = io::Cursor::new(bytes);

        let kind = MessageKind::try_from(cursor.read_u32::<LittleEndian>().map_err(truncated)?)?;
        let id = BlockId::new(cursor.read_i32::<LittleEndian>().map_err(truncated)?);
        let size = cursor.read_u64::<LittleEndian>().map_err(truncated)?;

        let tag_len = cursor.read_u32::<LittleEndian>().map_err(truncated)? as usize;
        let tag = read_field(&mut cursor, "type tag", tag_len)?;
        let type_tag = String::from_utf8_lossy(&tag).into_owned();

        let success = cursor.read_u8().map_err(truncated)? != 0;

        let data_len = cursor.read_u32::<LittleEndian>().map_err(truncated)? as usize;
        let data = read_field(&mut cursor, "data", data_len)?;

        Ok(Self {
            kind,
            id,
            size,
            type_tag,
            success,
            data,
        })
    }

    /// Get the total serialized size of this message body.
    pub fn serialized_size(&self) -> usize {
        MIN_MESSAGE_SIZE + self.type_tag.len() + self.data.len()
    }
}

/// Read a length-delimited field, checking the length against what is left.
fn read_field(cursor: &mut io::Cursor<&[u8]>, field: &'static str, len: usize) -> Result<Vec<u8>> {
    let remaining = cursor.get_ref().len() - cursor.position() as usize;
    // Every field except the payload is followed by at least the success
    // flag and the data length.
    let trailer = if field == "data" { 0 } else { 1 + 4 };

    if len + trailer > remaining {
        return Err(MemError::TruncatedField {
            field,
            needed: len + trailer,
            remaining,
        });
    }

    let mut buf = vec![0u8; len];
    cursor.read_exact(&mut buf).map_err(truncated)?;
    Ok(buf)
}

fn length_field(len: usize) -> io::Result<u32> {
    u32::try_from(len).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("Field of {} bytes does not fit a u32 length", len),
        )
    })
}

/// Fixed-width reads only fail if the header checks above were bypassed.
fn truncated(_: io::Error) -> MemError {
    MemError::TruncatedField {
        field: "header",
        needed: MIN_MESSAGE_SIZE,
        remaining: 0,
    }
}
