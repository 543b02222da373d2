//! Little-endian, bounds-checked reading and writing of primitive fields.
//!
//! Native automation structures are little-endian on every platform that hosts them. The
//! fixed-layout encoders of this crate (the `DECIMAL` overlay of a wire value in particular)
//! go through these helpers instead of reinterpreting memory field by field.
//!
//! # Key Components
//!
//! - [`WireIO`] - Trait implemented for the primitive field types
//! - [`read_le_at`] / [`write_le_at`] - Offset based access that advances the offset
//!
//! # Examples
//!
//! ```rust,ignore
//! use dispbind::wire::io::{read_le_at, write_le_at};
//!
//! let mut buffer = [0u8; 6];
//! let mut offset = 0;
//! write_le_at(&mut buffer, &mut offset, 0x1234u16)?;
//! write_le_at(&mut buffer, &mut offset, 7u32)?;
//!
//! let mut offset = 0;
//! assert_eq!(read_le_at::<u16>(&buffer, &mut offset)?, 0x1234);
//! assert_eq!(read_le_at::<u32>(&buffer, &mut offset)?, 7);
//! # Ok::<(), dispbind::Error>(())
//! ```

use crate::Result;

/// Primitive field types with a fixed little-endian byte representation.
pub trait WireIO: Sized {
    /// The byte array holding one encoded value
    type Bytes: AsRef<[u8]> + for<'a> TryFrom<&'a [u8]>;

    /// Decodes a value from its little-endian bytes
    fn from_le_bytes(bytes: Self::Bytes) -> Self;

    /// Encodes a value into its little-endian bytes
    fn to_le_bytes(self) -> Self::Bytes;
}

macro_rules! impl_wire_io {
    ($($ty:ty),*) => {
        $(
            impl WireIO for $ty {
                type Bytes = [u8; std::mem::size_of::<$ty>()];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(bytes)
                }

                fn to_le_bytes(self) -> Self::Bytes {
                    <$ty>::to_le_bytes(self)
                }
            }
        )*
    };
}

impl_wire_io!(u8, u16, u32, u64, i8, i16, i32, i64, f32, f64);

/// Reads a value in little-endian byte order at `offset` and advances the offset.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if the buffer is too short.
pub fn read_le_at<T: WireIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    let end = offset
        .checked_add(type_len)
        .ok_or_else(|| malformed_error!("Offset overflow reading {} bytes", type_len))?;
    if end > data.len() {
        return Err(malformed_error!(
            "Reading {} bytes at {} exceeds buffer of {} bytes",
            type_len,
            offset,
            data.len()
        ));
    }

    let Ok(read) = <T::Bytes>::try_from(&data[*offset..end]) else {
        return Err(malformed_error!("Invalid field width {}", type_len));
    };

    *offset = end;
    Ok(T::from_le_bytes(read))
}

/// Reads a value in little-endian byte order from the start of the buffer.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if the buffer is too short.
pub fn read_le<T: WireIO>(data: &[u8]) -> Result<T> {
    let mut offset = 0;
    read_le_at(data, &mut offset)
}

/// Writes a value in little-endian byte order at `offset` and advances the offset.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if the buffer is too short.
pub fn write_le_at<T: WireIO>(data: &mut [u8], offset: &mut usize, value: T) -> Result<()> {
    let bytes = value.to_le_bytes();
    let bytes = bytes.as_ref();
    let end = offset
        .checked_add(bytes.len())
        .ok_or_else(|| malformed_error!("Offset overflow writing {} bytes", bytes.len()))?;
    if end > data.len() {
        return Err(malformed_error!(
            "Writing {} bytes at {} exceeds buffer of {} bytes",
            bytes.len(),
            offset,
            data.len()
        ));
    }

    data[*offset..end].copy_from_slice(bytes);
    *offset = end;
    Ok(())
}
