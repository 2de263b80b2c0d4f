use bitvec::prelude::*;

use super::{Result, SfsError};

/// A one-block allocation bitmap.
/// Bit `i` set means resource `i` is in use; bits are LSB-first within each byte.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Bitmap {
    bits: BitVec<u8, Lsb0>,
    /// only bits below `limit` are handed out by [Bitmap::first_free]
    limit: usize,
}

impl Bitmap {
    /// load a bitmap from a raw block.
    /// `limit` caps allocation when fewer resources exist than the block can track
    pub fn from_block(block: &[u8], limit: usize) -> Self {
        let bits = BitVec::<u8, Lsb0>::from_slice(block);
        let limit = limit.min(bits.len());
        Bitmap { bits, limit }
    }

    pub fn as_raw_slice(&self) -> &[u8] {
        self.bits.as_raw_slice()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// index of the first unset bit, byte by byte and bit 0 to 7 within a byte
    pub fn first_free(&self) -> Option<usize> {
        self.bits[..self.limit].first_zero()
    }

    /// free bits below the allocation limit
    pub fn count_free(&self) -> usize {
        self.bits[..self.limit].count_zeros()
    }

    pub fn test(&self, index: usize) -> Result<bool> {
        self.check(index)?;
        Ok(self.bits[index])
    }

    /// set a bit, returns whether it was previously unset
    pub fn set(&mut self, index: usize) -> Result<bool> {
        self.check(index)?;
        Ok(!self.bits.replace(index, true))
    }

    /// clear a bit, returns whether it was previously set
    pub fn clear(&mut self, index: usize) -> Result<bool> {
        self.check(index)?;
        Ok(self.bits.replace(index, false))
    }

    fn check(&self, index: usize) -> Result<()> {
        if index >= self.bits.len() {
            return Err(SfsError::OutOfRange {
                index: index as u64,
                capacity: self.bits.len() as u64,
            });
        }
        Ok(())
    }
}
