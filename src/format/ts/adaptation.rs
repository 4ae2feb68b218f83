use super::timestamp::{read_marked_33, write_marked_33};
use super::types::{PCR_HZ, TS_PAYLOAD_SIZE};
use crate::error::{Result, TsError, Warning};
use crate::utils::BitCursor;
use bytes::Bytes;
use log::warn;

/// Program clock reference: 33-bit base at 90 kHz plus a 9-bit 27 MHz extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pcr {
    pub base: u64,
    pub reserved: u8,
    pub extension: u16,
}

impl Pcr {
    pub fn new(base: u64, extension: u16) -> Self {
        Self {
            base: base & 0x1_FFFF_FFFF,
            reserved: 0x3F,
            extension: extension & 0x1FF,
        }
    }

    /// Full 27 MHz value, `base * 300 + extension`.
    pub fn value(&self) -> u64 {
        self.base * 300 + self.extension as u64
    }

    pub fn as_seconds(&self) -> f64 {
        self.value() as f64 / PCR_HZ as f64
    }

    pub fn decode(cursor: &mut BitCursor) -> Result<Self> {
        Ok(Self {
            base: cursor.read_uint(33)?,
            reserved: cursor.read_uint(6)? as u8,
            extension: cursor.read_uint(9)? as u16,
        })
    }

    pub fn encode(&self, cursor: &mut BitCursor) -> Result<()> {
        cursor.write_uint(self.base, 33)?;
        cursor.write_uint(self.reserved as u64, 6)?;
        cursor.write_uint(self.extension as u64, 9)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegalTimeWindow {
    pub valid: bool,
    pub offset: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeamlessSplice {
    pub splice_type: u8,
    pub dts_next_access_unit: u64,
    pub markers_valid: bool,
}

/// The optional adaptation field extension.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdaptationExtension {
    pub legal_time_window: Option<LegalTimeWindow>,
    pub piecewise_rate: Option<u32>,
    pub seamless_splice: Option<SeamlessSplice>,
}

impl AdaptationExtension {
    /// Bytes following the extension length byte.
    pub fn content_length(&self) -> usize {
        1 + self.legal_time_window.map_or(0, |_| 2)
            + self.piecewise_rate.map_or(0, |_| 3)
            + self.seamless_splice.map_or(0, |_| 5)
    }

    fn decode(cursor: &mut BitCursor, warnings: &mut Vec<Warning>) -> Result<Self> {
        let length = cursor.read_u8()? as usize;
        let start = cursor.position();
        let mut ext = Self::default();
        if length == 0 {
            return Ok(ext);
        }

        let available = cursor.remaining() / 8;
        if length > available {
            warnings.push(Warning::MalformedSection {
                field: "adaptation_field_extension",
                declared: length,
                available,
            });
            return Ok(ext);
        }

        let ltw = cursor.read_bool()?;
        let piecewise = cursor.read_bool()?;
        let seamless = cursor.read_bool()?;
        cursor.skip(5)?;

        if ltw {
            ext.legal_time_window = Some(LegalTimeWindow {
                valid: cursor.read_bool()?,
                offset: cursor.read_uint(15)? as u16,
            });
        }
        if piecewise {
            cursor.skip(2)?;
            ext.piecewise_rate = Some(cursor.read_uint(22)? as u32);
        }
        if seamless {
            let splice_type = cursor.read_uint(4)? as u8;
            let (dts_next_access_unit, markers_valid) = read_marked_33(cursor)?;
            if !markers_valid {
                warnings.push(Warning::TimestampMarker {
                    field: "DTS_next_AU",
                });
            }
            ext.seamless_splice = Some(SeamlessSplice {
                splice_type,
                dts_next_access_unit,
                markers_valid,
            });
        }

        let end = start + length * 8;
        if cursor.position() > end {
            warnings.push(Warning::MalformedSection {
                field: "adaptation_field_extension",
                declared: length,
                available: (cursor.position() - start) / 8,
            });
        }
        cursor.set_position(end)?;
        Ok(ext)
    }

    fn encode(&self, cursor: &mut BitCursor) -> Result<()> {
        cursor.write_uint(self.content_length() as u64, 8)?;
        cursor.write_bool(self.legal_time_window.is_some());
        cursor.write_bool(self.piecewise_rate.is_some());
        cursor.write_bool(self.seamless_splice.is_some());
        cursor.write_uint(0x1F, 5)?;

        if let Some(ltw) = self.legal_time_window {
            cursor.write_bool(ltw.valid);
            cursor.write_uint(ltw.offset as u64, 15)?;
        }
        if let Some(rate) = self.piecewise_rate {
            cursor.write_uint(0b11, 2)?;
            cursor.write_uint(rate as u64, 22)?;
        }
        if let Some(splice) = self.seamless_splice {
            cursor.write_uint(splice.splice_type as u64, 4)?;
            write_marked_33(cursor, splice.dts_next_access_unit)?;
        }
        Ok(())
    }
}

/// The variable-length adaptation field that may follow the frame header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdaptationField {
    /// Declared length in bytes, not counting the length byte itself.
    pub length: u8,
    pub discontinuity: bool,
    pub random_access: bool,
    pub es_priority: bool,
    pub pcr: Option<Pcr>,
    pub opcr: Option<Pcr>,
    pub splice_countdown: Option<i8>,
    pub private_data: Option<Bytes>,
    pub extension: Option<AdaptationExtension>,
    /// Trailing 0xFF bytes after the last present field.
    pub stuffing: usize,
    pub warnings: Vec<Warning>,
}

impl AdaptationField {
    /// Decodes the field starting at its length byte. On return the cursor
    /// sits exactly after the declared length.
    pub fn decode(cursor: &mut BitCursor) -> Result<Self> {
        let mut field = Self {
            length: cursor.read_u8()?,
            ..Self::default()
        };
        if field.length == 0 {
            return Ok(field);
        }

        let start = cursor.position();
        let available = cursor.remaining() / 8;
        let mut declared = field.length as usize;
        if declared > available {
            warn!(
                "adaptation field declares {} bytes, only {} available",
                declared, available
            );
            field.warnings.push(Warning::MalformedSection {
                field: "adaptation_field",
                declared,
                available,
            });
            declared = available;
            if declared == 0 {
                return Ok(field);
            }
        }
        let end = start + declared * 8;

        field.discontinuity = cursor.read_bool()?;
        field.random_access = cursor.read_bool()?;
        field.es_priority = cursor.read_bool()?;
        let pcr_flag = cursor.read_bool()?;
        let opcr_flag = cursor.read_bool()?;
        let splicing_point_flag = cursor.read_bool()?;
        let private_data_flag = cursor.read_bool()?;
        let extension_flag = cursor.read_bool()?;

        if pcr_flag {
            field.pcr = Some(Pcr::decode(cursor)?);
        }
        if opcr_flag {
            field.opcr = Some(Pcr::decode(cursor)?);
        }
        if splicing_point_flag {
            field.splice_countdown = Some(cursor.read_u8()? as i8);
        }

        let mut aligned = true;
        if private_data_flag {
            let length = cursor.read_u8()? as usize;
            let available = cursor.remaining() / 8;
            if length > TS_PAYLOAD_SIZE || length > available {
                warn!("adaptation private data length {} is too long", length);
                field.warnings.push(Warning::MalformedSection {
                    field: "transport_private_data",
                    declared: length,
                    available: available.min(TS_PAYLOAD_SIZE),
                });
                aligned = false;
            } else {
                field.private_data = Some(Bytes::from(cursor.read_bytes(length * 8)?));
            }
        }

        if extension_flag && aligned {
            field.extension = Some(AdaptationExtension::decode(cursor, &mut field.warnings)?);
        }

        let position = cursor.position();
        if position > end {
            field.warnings.push(Warning::MalformedSection {
                field: "adaptation_field",
                declared,
                available: (position - start) / 8,
            });
        } else if aligned {
            field.stuffing = (end - position) / 8;
        }
        cursor.set_position(end)?;
        Ok(field)
    }

    /// Bytes the present fields need after the length byte, without stuffing.
    pub fn content_length(&self) -> usize {
        let empty = !self.discontinuity
            && !self.random_access
            && !self.es_priority
            && self.pcr.is_none()
            && self.opcr.is_none()
            && self.splice_countdown.is_none()
            && self.private_data.is_none()
            && self.extension.is_none();
        if empty && self.length == 0 {
            return 0;
        }

        1 + self.pcr.map_or(0, |_| 6)
            + self.opcr.map_or(0, |_| 6)
            + self.splice_countdown.map_or(0, |_| 1)
            + self.private_data.as_ref().map_or(0, |d| 1 + d.len())
            + self.extension.as_ref().map_or(0, |e| 1 + e.content_length())
    }

    /// Writes the field, padding with 0xFF up to the declared length when the
    /// declared length is larger than the content.
    pub fn encode(&self, cursor: &mut BitCursor) -> Result<()> {
        let content = self.content_length();
        let length = content.max(self.length as usize);
        if length > TS_PAYLOAD_SIZE - 1 {
            return Err(TsError::InvalidData(format!(
                "adaptation field of {} bytes does not fit a frame",
                length
            )));
        }
        cursor.write_uint(length as u64, 8)?;
        if content == 0 {
            for _ in 0..length {
                cursor.write_uint(0xFF, 8)?;
            }
            return Ok(());
        }

        cursor.write_bool(self.discontinuity);
        cursor.write_bool(self.random_access);
        cursor.write_bool(self.es_priority);
        cursor.write_bool(self.pcr.is_some());
        cursor.write_bool(self.opcr.is_some());
        cursor.write_bool(self.splice_countdown.is_some());
        cursor.write_bool(self.private_data.is_some());
        cursor.write_bool(self.extension.is_some());

        if let Some(pcr) = &self.pcr {
            pcr.encode(cursor)?;
        }
        if let Some(opcr) = &self.opcr {
            opcr.encode(cursor)?;
        }
        if let Some(countdown) = self.splice_countdown {
            cursor.write_uint(countdown as u8 as u64, 8)?;
        }
        if let Some(data) = &self.private_data {
            cursor.write_uint(data.len() as u64, 8)?;
            cursor.write_bytes(data);
        }
        if let Some(ext) = &self.extension {
            ext.encode(cursor)?;
        }
        for _ in content..length {
            cursor.write_uint(0xFF, 8)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_pcr_composition() {
        let pcr = Pcr::new(1_000_000, 128);
        assert_eq!(pcr.value(), 300_000_128);

        let mut cursor = BitCursor::new();
        pcr.encode(&mut cursor).unwrap();
        cursor.set_position(0).unwrap();
        assert_eq!(Pcr::decode(&mut cursor).unwrap(), pcr);
        assert_eq!(cursor.position(), 48);
    }

    #[test]
    fn test_pcr_parse_bytes() {
        // base 90000, extension 0: one second
        let mut cursor = BitCursor::from_bytes(vec![0x00, 0x00, 0xAF, 0xC8, 0x7E, 0x00]);
        let pcr = Pcr::decode(&mut cursor).unwrap();
        assert_eq!(pcr.base, 90_000);
        assert_eq!(pcr.extension, 0);
        assert_eq!(pcr.value(), PCR_HZ);
        assert!((pcr.as_seconds() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_field() {
        let mut cursor = BitCursor::from_bytes(vec![0x00, 0xAB]);
        let field = AdaptationField::decode(&mut cursor).unwrap();
        assert_eq!(field.length, 0);
        assert_eq!(field.pcr, None);
        assert_eq!(cursor.position(), 8);
    }

    #[test]
    fn test_pcr_and_stuffing() {
        let data = vec![
            0x0A, // Length 10
            0x50, // Random access + PCR flag
            0x00, 0x00, 0xAF, 0xC8, 0x7E, 0x00, // PCR base 90000
            0xFF, 0xFF, 0xFF, // Stuffing
            0x12, // First payload byte
        ];
        let mut cursor = BitCursor::from_bytes(data);
        let field = AdaptationField::decode(&mut cursor).unwrap();

        assert!(field.random_access);
        assert!(!field.discontinuity);
        assert_eq!(field.pcr.map(|p| p.base), Some(90_000));
        assert_eq!(field.stuffing, 3);
        assert!(field.warnings.is_empty());
        assert_eq!(cursor.read_u8().unwrap(), 0x12);
    }

    #[test]
    fn test_oversized_private_data_is_skipped() {
        let mut data = vec![
            0x05, // Length 5
            0x02, // Private data flag
            0xC8, // Private data length 200
        ];
        data.resize(200, 0xFF);
        let mut cursor = BitCursor::from_bytes(data);
        let field = AdaptationField::decode(&mut cursor).unwrap();

        assert_eq!(field.private_data, None);
        assert!(matches!(
            field.warnings.as_slice(),
            [Warning::MalformedSection {
                field: "transport_private_data",
                declared: 200,
                ..
            }]
        ));
        // Still lands after the declared length
        assert_eq!(cursor.position(), 6 * 8);
    }

    #[test]
    fn test_extension_round_trip() {
        let field = AdaptationField {
            length: 0,
            discontinuity: true,
            splice_countdown: Some(-2),
            private_data: Some(Bytes::from_static(&[0xDE, 0xAD])),
            extension: Some(AdaptationExtension {
                legal_time_window: Some(LegalTimeWindow {
                    valid: true,
                    offset: 0x1234,
                }),
                piecewise_rate: Some(0x2A_AAAA),
                seamless_splice: Some(SeamlessSplice {
                    splice_type: 0x3,
                    dts_next_access_unit: 0x1_0000_0001,
                    markers_valid: true,
                }),
            }),
            ..AdaptationField::default()
        };
        // flags + countdown + private(1+2) + extension(1 + 1 + 2 + 3 + 5)
        assert_eq!(field.content_length(), 1 + 1 + 3 + 12);

        let mut cursor = BitCursor::new();
        field.encode(&mut cursor).unwrap();
        cursor.set_position(0).unwrap();
        let decoded = AdaptationField::decode(&mut cursor).unwrap();

        assert_eq!(decoded.length as usize, field.content_length());
        assert_eq!(decoded.discontinuity, field.discontinuity);
        assert_eq!(decoded.splice_countdown, field.splice_countdown);
        assert_eq!(decoded.private_data, field.private_data);
        assert_eq!(decoded.extension, field.extension);
        assert!(decoded.warnings.is_empty());
    }

    #[test]
    fn test_declared_length_past_end() {
        let mut cursor = BitCursor::from_bytes(vec![0x10, 0x00, 0xFF]);
        let field = AdaptationField::decode(&mut cursor).unwrap();
        assert_eq!(field.warnings.len(), 1);
        assert_eq!(cursor.remaining(), 0);
    }
}
