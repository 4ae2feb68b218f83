use super::types::pts_to_time;
use crate::error::{Result, TsError};
use crate::utils::BitCursor;
use std::time::Duration;

/// Reads a 33-bit value split as 3 bits, marker, 15 bits, marker, 15 bits, marker.
///
/// Returns the value and whether all three markers were set.
pub(crate) fn read_marked_33(cursor: &mut BitCursor) -> Result<(u64, bool)> {
    let high = cursor.read_uint(3)?;
    let m1 = cursor.read_bool()?;
    let mid = cursor.read_uint(15)?;
    let m2 = cursor.read_bool()?;
    let low = cursor.read_uint(15)?;
    let m3 = cursor.read_bool()?;
    Ok(((high << 30) | (mid << 15) | low, m1 && m2 && m3))
}

pub(crate) fn write_marked_33(cursor: &mut BitCursor, value: u64) -> Result<()> {
    cursor.write_uint(value >> 30, 3)?;
    cursor.write_bool(true);
    cursor.write_uint(value >> 15, 15)?;
    cursor.write_bool(true);
    cursor.write_uint(value, 15)?;
    cursor.write_bool(true);
    Ok(())
}

/// A 40-bit PES timestamp field: 4-bit tag followed by a marked 33-bit value.
///
/// The same layout carries `DTS_next_AU` in the adaptation field extension,
/// where the tag holds the splice type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    pub tag: u8,
    pub value: u64,
    pub markers_valid: bool,
}

impl Timestamp {
    pub const TAG_PTS: u8 = 0b0010;
    pub const TAG_DTS: u8 = 0b0011;
    pub const TAG_DTS_BOTH: u8 = 0b0001;

    pub fn new(tag: u8, value: u64) -> Self {
        Self {
            tag: tag & 0x0F,
            value: value & 0x1_FFFF_FFFF,
            markers_valid: true,
        }
    }

    pub fn decode(cursor: &mut BitCursor) -> Result<Self> {
        let tag = cursor.read_uint(4)? as u8;
        let (value, markers_valid) = read_marked_33(cursor)?;
        Ok(Self {
            tag,
            value,
            markers_valid,
        })
    }

    pub fn encode(&self, cursor: &mut BitCursor) -> Result<()> {
        cursor.write_uint(self.tag as u64, 4)?;
        write_marked_33(cursor, self.value)
    }

    /// The value, or [`TsError::TimestampMarker`] when a marker bit was cleared.
    pub fn checked(&self, field: &'static str) -> Result<u64> {
        if self.markers_valid {
            Ok(self.value)
        } else {
            Err(TsError::TimestampMarker { field })
        }
    }

    pub fn as_duration(&self) -> Duration {
        pts_to_time(self.value)
    }
}
