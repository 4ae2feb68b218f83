use crate::error::{Result, TsError, Warning};
use crate::format::ts::types::{descriptor_tag_name, DESCRIPTOR_TAG_CA};
use crate::utils::BitCursor;
use bytes::Bytes;

/// A tag/length/value descriptor as found in PMT, CAT and TSDT loops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub tag: u8,
    pub data: Bytes,
}

impl Descriptor {
    pub fn new(tag: u8, data: impl Into<Bytes>) -> Self {
        Self {
            tag,
            data: data.into(),
        }
    }

    pub fn name(&self) -> &'static str {
        descriptor_tag_name(self.tag)
    }

    /// Encoded size including tag and length bytes.
    pub fn encoded_len(&self) -> usize {
        2 + self.data.len()
    }

    pub fn encode(&self, cursor: &mut BitCursor) -> Result<()> {
        if self.data.len() > u8::MAX as usize {
            return Err(TsError::InvalidData(format!(
                "descriptor {:#04x} carries {} bytes, at most 255 fit",
                self.tag,
                self.data.len()
            )));
        }
        cursor.write_uint(self.tag as u64, 8)?;
        cursor.write_uint(self.data.len() as u64, 8)?;
        cursor.write_bytes(&self.data);
        Ok(())
    }

    /// The conditional access view, for tag 0x09 descriptors of at least 4 bytes.
    pub fn as_ca(&self) -> Option<CaDescriptor> {
        if self.tag != DESCRIPTOR_TAG_CA || self.data.len() < 4 {
            return None;
        }
        Some(CaDescriptor {
            ca_system_id: u16::from_be_bytes([self.data[0], self.data[1]]),
            ca_pid: u16::from_be_bytes([self.data[2], self.data[3]]) & 0x1FFF,
            private_data: self.data.slice(4..),
        })
    }
}

/// Conditional access descriptor: CA system plus the PID carrying its ECM/EMM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaDescriptor {
    pub ca_system_id: u16,
    pub ca_pid: u16,
    pub private_data: Bytes,
}

impl From<&CaDescriptor> for Descriptor {
    fn from(ca: &CaDescriptor) -> Self {
        let mut data = Vec::with_capacity(4 + ca.private_data.len());
        data.extend_from_slice(&ca.ca_system_id.to_be_bytes());
        data.extend_from_slice(&(0xE000 | (ca.ca_pid & 0x1FFF)).to_be_bytes());
        data.extend_from_slice(&ca.private_data);
        Descriptor::new(DESCRIPTOR_TAG_CA, data)
    }
}

/// Total encoded size of a descriptor loop.
pub fn descriptors_len(descriptors: &[Descriptor]) -> usize {
    descriptors.iter().map(Descriptor::encoded_len).sum()
}

/// Decodes a descriptor loop of `length` bytes.
///
/// A descriptor that would run past the loop (or past the buffer) ends the
/// loop with a warning; the cursor is always left at the end of the loop.
pub(crate) fn decode_descriptors(
    cursor: &mut BitCursor,
    length: usize,
    warnings: &mut Vec<Warning>,
) -> Result<Vec<Descriptor>> {
    let available = cursor.remaining() / 8;
    let length = if length > available {
        warnings.push(Warning::MalformedSection {
            field: "descriptor_loop",
            declared: length,
            available,
        });
        available
    } else {
        length
    };

    let end = cursor.position() + length * 8;
    let mut descriptors = Vec::new();
    while cursor.position() < end {
        let left = (end - cursor.position()) / 8;
        if left < 2 {
            warnings.push(Warning::MalformedSection {
                field: "descriptor",
                declared: 2,
                available: left,
            });
            break;
        }
        let tag = cursor.read_u8()?;
        let size = cursor.read_u8()? as usize;
        if size > left - 2 {
            warnings.push(Warning::MalformedSection {
                field: "descriptor",
                declared: size,
                available: left - 2,
            });
            break;
        }
        descriptors.push(Descriptor::new(tag, cursor.read_bytes(size * 8)?));
    }
    cursor.set_position(end)?;
    Ok(descriptors)
}

pub(crate) fn encode_descriptors(cursor: &mut BitCursor, descriptors: &[Descriptor]) -> Result<()> {
    for descriptor in descriptors {
        descriptor.encode(cursor)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_decode_loop() {
        let data = vec![
            0x0A, 0x04, b'e', b'n', b'g', 0x00, // ISO 639 language
            0x52, 0x01, 0x10, // Stream identifier
        ];
        let mut warnings = Vec::new();
        let mut cursor = BitCursor::from_bytes(data);
        let descriptors = decode_descriptors(&mut cursor, 9, &mut warnings).unwrap();

        assert_eq!(
            descriptors,
            vec![
                Descriptor::new(0x0A, vec![b'e', b'n', b'g', 0x00]),
                Descriptor::new(0x52, vec![0x10]),
            ]
        );
        assert_eq!(descriptors[0].name(), "ISO 639 language");
        assert!(warnings.is_empty());
        assert_eq!(cursor.position(), 72);
    }

    #[test]
    fn test_truncated_descriptor() {
        let data = vec![0x05, 0x08, 0x01, 0x02, 0xFF];
        let mut warnings = Vec::new();
        let mut cursor = BitCursor::from_bytes(data);
        let descriptors = decode_descriptors(&mut cursor, 4, &mut warnings).unwrap();

        assert!(descriptors.is_empty());
        assert_eq!(warnings.len(), 1);
        assert_eq!(cursor.position(), 32);
    }

    #[test]
    fn test_ca_view() {
        let ca = CaDescriptor {
            ca_system_id: 0x0B00,
            ca_pid: 0x0065,
            private_data: Bytes::from_static(&[0x01, 0x02]),
        };
        let descriptor = Descriptor::from(&ca);
        assert_eq!(descriptor.data.as_ref(), &[0x0B, 0x00, 0xE0, 0x65, 0x01, 0x02]);
        assert_eq!(descriptor.as_ca(), Some(ca));
        assert_eq!(Descriptor::new(0x09, vec![0x00]).as_ca(), None);
    }
}
