use super::descriptor::{decode_descriptors, encode_descriptors, CaDescriptor, Descriptor};
use crate::error::{Result, Warning};
use crate::utils::BitCursor;

/// Conditional access table body (PID 0x0001).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cat {
    pub descriptors: Vec<Descriptor>,
}

impl Cat {
    pub fn new() -> Self {
        Self::default()
    }

    /// CA descriptors in table order; other tags are skipped.
    pub fn ca_descriptors(&self) -> Vec<CaDescriptor> {
        self.descriptors.iter().filter_map(Descriptor::as_ca).collect()
    }

    pub(crate) fn decode(cursor: &mut BitCursor, warnings: &mut Vec<Warning>) -> Result<Self> {
        let length = cursor.remaining() / 8;
        Ok(Self {
            descriptors: decode_descriptors(cursor, length, warnings)?,
        })
    }

    pub(crate) fn encode(&self, cursor: &mut BitCursor) -> Result<()> {
        encode_descriptors(cursor, &self.descriptors)
    }
}

/// Transport stream description table body (PID 0x0002).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescriptionTable {
    pub descriptors: Vec<Descriptor>,
}

impl DescriptionTable {
    pub(crate) fn decode(cursor: &mut BitCursor, warnings: &mut Vec<Warning>) -> Result<Self> {
        let length = cursor.remaining() / 8;
        Ok(Self {
            descriptors: decode_descriptors(cursor, length, warnings)?,
        })
    }

    pub(crate) fn encode(&self, cursor: &mut BitCursor) -> Result<()> {
        encode_descriptors(cursor, &self.descriptors)
    }
}
