use crate::error::Result;
use crate::utils::BitCursor;
use bytes::Bytes;

/// Opaque section body for private and unrecognized tables.
///
/// With the syntax indicator set the body excludes the 5-byte syntax region
/// and the CRC; without it the body is the whole `section_length`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrivateTable {
    pub data: Bytes,
}

impl PrivateTable {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    pub(crate) fn decode(cursor: &mut BitCursor) -> Result<Self> {
        let bits = cursor.remaining();
        Ok(Self::new(cursor.read_bytes(bits)?))
    }

    pub(crate) fn encode(&self, cursor: &mut BitCursor) {
        cursor.write_bytes(&self.data);
    }
}
