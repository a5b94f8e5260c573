//! Fixed-size values stored in remote blocks.

use crate::error::{ClientError, Result};
use byteorder::{ByteOrder, LittleEndian};
use rmem_core::BlockId;

/// A value with a fixed little-endian encoding that fits in one block.
pub trait RemoteValue: Sized {
    /// Encoded size in bytes. Blocks for this type are allocated this large.
    const SIZE: usize;

    /// Type tag recorded on the server when a block is allocated.
    fn type_tag() -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Encode into exactly [`Self::SIZE`] bytes.
    fn encode(&self) -> Vec<u8>;

    /// Decode from the first [`Self::SIZE`] bytes of `bytes`.
    fn decode(bytes: &[u8]) -> Result<Self>;
}

fn check_len<T: RemoteValue>(bytes: &[u8]) -> Result<&[u8]> {
    bytes.get(..T::SIZE).ok_or_else(|| ClientError::ValueSize {
        type_name: T::type_tag(),
        expected: T::SIZE,
        actual: bytes.len(),
    })
}

macro_rules! impl_remote_value {
    ($($ty:ty => $size:expr, $read:ident, $write:ident;)*) => {
        $(
            impl RemoteValue for $ty {
                const SIZE: usize = $size;

                fn encode(&self) -> Vec<u8> {
                    let mut buf = vec![0u8; $size];
                    LittleEndian::$write(&mut buf, *self);
                    buf
                }

                fn decode(bytes: &[u8]) -> Result<Self> {
                    Ok(LittleEndian::$read(check_len::<Self>(bytes)?))
                }
            }
        )*
    };
}

impl_remote_value! {
    i16 => 2, read_i16, write_i16;
    u16 => 2, read_u16, write_u16;
    i32 => 4, read_i32, write_i32;
    u32 => 4, read_u32, write_u32;
    i64 => 8, read_i64, write_i64;
    u64 => 8, read_u64, write_u64;
    f32 => 4, read_f32, write_f32;
    f64 => 8, read_f64, write_f64;
}

impl RemoteValue for u8 {
    const SIZE: usize = 1;

    fn encode(&self) -> Vec<u8> {
        vec![*self]
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(check_len::<Self>(bytes)?[0])
    }
}

impl RemoteValue for i8 {
    const SIZE: usize = 1;

    fn encode(&self) -> Vec<u8> {
        self.to_le_bytes().to_vec()
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(i8::from_le_bytes([check_len::<Self>(bytes)?[0]]))
    }
}

impl RemoteValue for bool {
    const SIZE: usize = 1;

    fn encode(&self) -> Vec<u8> {
        vec![u8::from(*self)]
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(check_len::<Self>(bytes)?[0] != 0)
    }
}

/// Block ids can be stored remotely to link blocks together.
impl RemoteValue for BlockId {
    const SIZE: usize = 4;

    fn type_tag() -> &'static str {
        "BlockId"
    }

    fn encode(&self) -> Vec<u8> {
        self.as_i32().encode()
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        i32::decode(bytes).map(BlockId::new)
    }
}
