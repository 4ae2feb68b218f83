use crate::error::{Result, TsError};
use bitvec::prelude::*;
use bytes::Bytes;

/// Byte order used when composing integers that span whole bytes.
///
/// Bit order inside a byte is always MSB first; the mode only changes how
/// 16/24/32/.../64-bit values are assembled from consecutive bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endian {
    #[default]
    Big,
    Little,
}

/// A growable bit buffer with a read/write position.
///
/// Every transport stream structure in this crate is decoded from and encoded
/// into a `BitCursor`. Reads past the end fail with [`TsError::Bounds`];
/// writes at or past the end grow the buffer, writes inside it overwrite in
/// place.
///
/// Example:
/// ```
/// use tsmarker::utils::BitCursor;
///
/// let mut cursor = BitCursor::from_bytes(vec![0b1011_0011]);
///
/// assert_eq!(cursor.read_bool().unwrap(), true);    // 1
/// assert_eq!(cursor.read_uint(3).unwrap(), 0b011);  // 011
/// assert_eq!(cursor.position(), 4);
/// ```
#[derive(Debug, Clone, Default)]
pub struct BitCursor {
    bits: BitVec<u8, Msb0>,
    position: usize,
    endian: Endian,
}

impl BitCursor {
    /// Creates an empty cursor, ready for writing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps existing bytes; the position starts at bit 0.
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        Self {
            bits: BitVec::from_vec(data.into()),
            position: 0,
            endian: Endian::Big,
        }
    }

    /// Switches the integer composition mode.
    pub fn with_endian(mut self, endian: Endian) -> Self {
        self.endian = endian;
        self
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// Length in bits.
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Current position in bits from the start of the buffer.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Moves to an absolute bit position, which may equal the length.
    pub fn set_position(&mut self, position: usize) -> Result<()> {
        if position > self.bits.len() {
            return Err(TsError::Bounds {
                position,
                bits: 0,
                length: self.bits.len(),
            });
        }
        self.position = position;
        Ok(())
    }

    /// Bits left between the position and the end.
    pub fn remaining(&self) -> usize {
        self.bits.len() - self.position
    }

    fn check(&self, offset: usize, bits: usize) -> Result<()> {
        match offset.checked_add(bits) {
            Some(end) if end <= self.bits.len() => Ok(()),
            _ => Err(TsError::Bounds {
                position: offset,
                bits,
                length: self.bits.len(),
            }),
        }
    }

    fn swap_order(&self, value: u64, bits: usize) -> u64 {
        if self.endian == Endian::Little && bits > 8 && bits % 8 == 0 {
            value.swap_bytes() >> (64 - bits)
        } else {
            value
        }
    }

    /// Reads one bit without moving the cursor.
    pub fn read_bool_at(&self, offset: usize) -> Result<bool> {
        self.check(offset, 1)?;
        Ok(self.bits[offset])
    }

    /// Reads an unsigned integer of up to 64 bits without moving the cursor.
    pub fn read_uint_at(&self, offset: usize, bits: usize) -> Result<u64> {
        if bits > 64 {
            return Err(TsError::TooWide { bits });
        }
        self.check(offset, bits)?;
        if bits == 0 {
            return Ok(0);
        }
        let value = self.bits[offset..offset + bits].load_be::<u64>();
        Ok(self.swap_order(value, bits))
    }

    /// Reads `bits` bits as bytes without moving the cursor. A trailing
    /// partial byte is right aligned.
    pub fn read_bytes_at(&self, offset: usize, bits: usize) -> Result<Vec<u8>> {
        self.check(offset, bits)?;
        Ok(self.bits[offset..offset + bits]
            .chunks(8)
            .map(|chunk| chunk.load_be::<u8>())
            .collect())
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        let bit = self.read_bool_at(self.position)?;
        self.position += 1;
        Ok(bit)
    }

    /// Reads `bits` bits (at most 64) as an unsigned integer.
    pub fn read_uint(&mut self, bits: usize) -> Result<u64> {
        let value = self.read_uint_at(self.position, bits)?;
        self.position += bits;
        Ok(value)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_uint(8)? as u8)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(self.read_uint(16)? as u16)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(self.read_uint(32)? as u32)
    }

    /// Reads `bits` bits as bytes and advances past them.
    pub fn read_bytes(&mut self, bits: usize) -> Result<Vec<u8>> {
        let data = self.read_bytes_at(self.position, bits)?;
        self.position += bits;
        Ok(data)
    }

    fn reserve(&mut self, offset: usize, bits: usize) {
        let end = offset + bits;
        if end > self.bits.len() {
            self.bits.resize(end, false);
        }
    }

    /// Writes one bit at an absolute offset, growing the buffer if needed.
    pub fn write_bool_at(&mut self, offset: usize, value: bool) {
        self.reserve(offset, 1);
        self.bits.set(offset, value);
    }

    /// Writes the low `bits` bits of `value` at an absolute offset.
    pub fn write_uint_at(&mut self, offset: usize, value: u64, bits: usize) -> Result<()> {
        if bits > 64 {
            return Err(TsError::TooWide { bits });
        }
        if bits == 0 {
            return Ok(());
        }
        let value = if bits == 64 {
            value
        } else {
            value & ((1u64 << bits) - 1)
        };
        let value = self.swap_order(value, bits);
        self.reserve(offset, bits);
        self.bits[offset..offset + bits].store_be::<u64>(value);
        Ok(())
    }

    /// Writes whole bytes at an absolute offset.
    pub fn write_bytes_at(&mut self, offset: usize, data: &[u8]) {
        self.reserve(offset, data.len() * 8);
        for (i, byte) in data.iter().enumerate() {
            let start = offset + i * 8;
            self.bits[start..start + 8].store_be::<u8>(*byte);
        }
    }

    pub fn write_bool(&mut self, value: bool) {
        self.write_bool_at(self.position, value);
        self.position += 1;
    }

    pub fn write_uint(&mut self, value: u64, bits: usize) -> Result<()> {
        self.write_uint_at(self.position, value, bits)?;
        self.position += bits;
        Ok(())
    }

    pub fn write_bytes(&mut self, data: &[u8]) {
        self.write_bytes_at(self.position, data);
        self.position += data.len() * 8;
    }

    /// Advances the position by `bits`; the target must lie inside the buffer.
    pub fn skip(&mut self, bits: usize) -> Result<()> {
        self.check(self.position, bits)?;
        self.position += bits;
        Ok(())
    }

    /// Moves the position back by `bits`.
    pub fn rewind(&mut self, bits: usize) -> Result<()> {
        if bits > self.position {
            return Err(TsError::Rewind {
                position: self.position,
                bits,
            });
        }
        self.position -= bits;
        Ok(())
    }

    /// Signed form of [`skip`](Self::skip) and [`rewind`](Self::rewind).
    pub fn seek(&mut self, delta: isize) -> Result<()> {
        if delta < 0 {
            self.rewind(delta.unsigned_abs())
        } else {
            self.skip(delta as usize)
        }
    }

    pub fn is_byte_aligned(&self) -> bool {
        self.position % 8 == 0
    }

    /// Moves forward to the next byte boundary.
    pub fn align_byte(&mut self) -> Result<()> {
        let rest = (8 - self.position % 8) % 8;
        self.skip(rest)
    }

    /// Underlying bytes; a trailing partial byte is zero padded.
    pub fn into_bytes(mut self) -> Vec<u8> {
        self.bits.set_uninitialized(false);
        self.bits.into_vec()
    }

    pub fn to_bytes(&self) -> Bytes {
        Bytes::from(self.clone().into_bytes())
    }
}

impl From<Vec<u8>> for BitCursor {
    fn from(data: Vec<u8>) -> Self {
        Self::from_bytes(data)
    }
}

impl From<&[u8]> for BitCursor {
    fn from(data: &[u8]) -> Self {
        Self::from_bytes(data.to_vec())
    }
}
