use bincode::config;
use serde::{de::DeserializeOwned, Serialize};

use crate::fs::{Result, SfsError};

/// Trait for fixed-size records stored at a fixed position inside a block
/// # Note
/// Records are encoded with bincode's legacy configuration:
/// fixed-width little-endian integers and no length prefix for arrays,
/// so every value of a record type encodes to exactly [OnDiskRecord::SIZE] bytes.
pub trait OnDiskRecord: Serialize + DeserializeOwned {
    /// encoded size in bytes
    const SIZE: usize;

    /// serialize into a [Vec](std::vec::Vec) of exactly [OnDiskRecord::SIZE] bytes
    fn encode_record(&self) -> Result<Vec<u8>> {
        let buf = bincode::serde::encode_to_vec(self, config::legacy())
            .map_err(|e| SfsError::Codec(e.to_string()))?;
        if buf.len() != Self::SIZE {
            return Err(SfsError::Codec(format!(
                "encoded record is {} bytes, expected {}",
                buf.len(),
                Self::SIZE
            )));
        }
        Ok(buf)
    }

    /// deserialize from the first [OnDiskRecord::SIZE] bytes of `buf`
    fn decode_record(buf: &[u8]) -> Result<Self> {
        let raw = buf.get(..Self::SIZE).ok_or_else(|| {
            SfsError::Codec(format!(
                "need {} bytes to decode a record, got {}",
                Self::SIZE,
                buf.len()
            ))
        })?;
        let (object, _bytes_read): (Self, usize) =
            bincode::serde::decode_from_slice(raw, config::legacy())
                .map_err(|e| SfsError::Codec(e.to_string()))?;
        Ok(object)
    }
}
