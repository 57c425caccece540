use crate::elf::ident::ElfEndian;
use crate::{Error, Result};

impl ElfEndian {
    /// Reads a fixed-width integer from the slice with this endianness. When an offset cursor is
    /// supplied it is advanced past the bytes that were consumed.
    #[inline]
    pub fn read<T: EndianRead>(&self, slice: &[u8], offset: Option<&mut usize>) -> Result<T> {
        T::read_with_endian(slice, *self, offset)
    }
}

/// Fixed-width integers that can be decoded from either byte order. A read past the end of the
/// slice is an error, never a panic, so truncated files surface as a parse failure.
pub trait EndianRead {
    fn read_with_endian(slice: &[u8], endian: ElfEndian, offset: Option<&mut usize>) -> Result<Self>
    where
        Self: Sized;
}

macro_rules! impl_endian_read {
    ($ty: ty) => {
        impl EndianRead for $ty {
            fn read_with_endian(
                slice: &[u8],
                endian: ElfEndian,
                offset: Option<&mut usize>,
            ) -> Result<Self> {
                const SELF_SIZE: usize = core::mem::size_of::<$ty>();

                let start = offset.as_ref().map(|value| **value).unwrap_or(0);
                let bytes: [u8; SELF_SIZE] = slice
                    .get(start..(start + SELF_SIZE))
                    .and_then(|window| window.try_into().ok())
                    .ok_or_else(|| {
                        Error::ParseFailure(format!(
                            "truncated read of {} bytes at offset {}",
                            SELF_SIZE, start
                        ))
                    })?;
                if let Some(offset) = offset {
                    *offset += SELF_SIZE;
                }

                match endian {
                    ElfEndian::Little => Ok(Self::from_le_bytes(bytes)),
                    ElfEndian::Big => Ok(Self::from_be_bytes(bytes)),
                    ElfEndian::Invalid => {
                        Err(Error::ParseFailure("invalid ELF data encoding".into()))
                    }
                }
            }
        }
    };
}

impl_endian_read!(u16);
impl_endian_read!(u32);
impl_endian_read!(u64);
