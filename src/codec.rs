//! Little-endian packing of the fixed-width vectors that make up a representation blob, plus the
//! content hash that keys the catalog.

use sha2::{Digest, Sha256};

use crate::{Error, Result};

macro_rules! impl_packing {
    ($pack: ident, $unpack: ident, $ty: ty) => {
        /// Packs each value as its little-endian byte representation, in input order.
        pub fn $pack(values: &[$ty]) -> Vec<u8> {
            const WIDTH: usize = core::mem::size_of::<$ty>();

            let mut bytes = Vec::with_capacity(values.len() * WIDTH);
            for value in values {
                bytes.extend_from_slice(&value.to_le_bytes());
            }
            bytes
        }

        /// Unpacks a blob written by the matching pack function. The byte length must be an exact
        /// multiple of the element width.
        ///
        /// Here is a list with all errors, which can occur while this operation:
        /// - [Error::InvalidEncoding] - The blob length is not a multiple of the element width
        pub fn $unpack(bytes: &[u8]) -> Result<Vec<$ty>> {
            const WIDTH: usize = core::mem::size_of::<$ty>();

            if bytes.len() % WIDTH != 0 {
                return Err(Error::InvalidEncoding(format!(
                    "blob length {} is not a multiple of {}",
                    bytes.len(),
                    WIDTH
                )));
            }

            Ok(bytes
                .chunks_exact(WIDTH)
                .map(|chunk| {
                    let mut buffer = [0; WIDTH];
                    buffer.copy_from_slice(chunk);
                    <$ty>::from_le_bytes(buffer)
                })
                .collect())
        }
    };
}

impl_packing!(pack_doubles, unpack_doubles, f64);
impl_packing!(pack_i32s, unpack_i32s, i32);

/// Computes the SHA-256 digest of the raw bytes and returns it as 64 lowercase hexadecimal
/// characters. This is the content hash every catalog row is keyed by.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
