use super::timestamp::{read_marked_33, Timestamp};
use super::types::*;
use crate::error::{Result, TsError, Warning};
use crate::utils::BitCursor;
use bytes::Bytes;
use log::warn;

/// How a stream id lays out the bytes after `PES_packet_length`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderLayout {
    /// Optional PES header with flags and header data.
    Optional,
    /// Payload bytes follow directly.
    Raw,
    /// Padding stream, contents ignored.
    Padding,
}

impl HeaderLayout {
    pub fn of(stream_id: u8) -> Self {
        match stream_id {
            STREAM_ID_PADDING => HeaderLayout::Padding,
            STREAM_ID_PROGRAM_STREAM_MAP
            | STREAM_ID_PRIVATE_STREAM_2
            | STREAM_ID_ECM
            | STREAM_ID_EMM
            | STREAM_ID_PROGRAM_STREAM_DIRECTORY
            | STREAM_ID_DSMCC
            | STREAM_ID_H222_1_TYPE_E => HeaderLayout::Raw,
            _ => HeaderLayout::Optional,
        }
    }
}

/// The 2-bit `PTS_DTS_flags` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PtsDtsIndicator {
    None,
    Forbidden,
    PtsOnly,
    Both,
}

impl From<u8> for PtsDtsIndicator {
    fn from(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => PtsDtsIndicator::None,
            0b01 => PtsDtsIndicator::Forbidden,
            0b10 => PtsDtsIndicator::PtsOnly,
            _ => PtsDtsIndicator::Both,
        }
    }
}

/// Elementary stream clock reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Escr {
    pub base: u64,
    pub extension: u16,
    pub markers_valid: bool,
}

impl Escr {
    pub fn value(&self) -> u64 {
        self.base * 300 + self.extension as u64
    }
}

/// DSM trick mode control and its mode specific fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrickMode {
    FastForward {
        field_id: u8,
        intra_slice_refresh: bool,
        frequency_truncation: u8,
    },
    SlowMotion {
        rep_cntrl: u8,
    },
    FreezeFrame {
        field_id: u8,
    },
    FastReverse {
        field_id: u8,
        intra_slice_refresh: bool,
        frequency_truncation: u8,
    },
    SlowReverse {
        rep_cntrl: u8,
    },
    Reserved {
        control: u8,
    },
}

impl TrickMode {
    fn decode(cursor: &mut BitCursor) -> Result<Self> {
        let control = cursor.read_uint(3)? as u8;
        let mode = match control {
            0b000 | 0b011 => {
                let field_id = cursor.read_uint(2)? as u8;
                let intra_slice_refresh = cursor.read_bool()?;
                let frequency_truncation = cursor.read_uint(2)? as u8;
                if control == 0b000 {
                    TrickMode::FastForward {
                        field_id,
                        intra_slice_refresh,
                        frequency_truncation,
                    }
                } else {
                    TrickMode::FastReverse {
                        field_id,
                        intra_slice_refresh,
                        frequency_truncation,
                    }
                }
            }
            0b001 => TrickMode::SlowMotion {
                rep_cntrl: cursor.read_uint(5)? as u8,
            },
            0b100 => TrickMode::SlowReverse {
                rep_cntrl: cursor.read_uint(5)? as u8,
            },
            0b010 => {
                let field_id = cursor.read_uint(2)? as u8;
                cursor.skip(3)?;
                TrickMode::FreezeFrame { field_id }
            }
            _ => {
                cursor.skip(5)?;
                TrickMode::Reserved { control }
            }
        };
        Ok(mode)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceCounter {
    pub counter: u8,
    pub mpeg1_mpeg2_identifier: bool,
    pub original_stuff_length: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PStdBuffer {
    pub scale: bool,
    pub size: u16,
}

impl PStdBuffer {
    /// Buffer size in bytes; the scale selects 1024 or 128 byte units.
    pub fn size_bytes(&self) -> u32 {
        self.size as u32 * if self.scale { 1024 } else { 128 }
    }
}

/// PES extension fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PesExtension {
    pub private_data: Option<Bytes>,
    pub pack_header: Option<Bytes>,
    pub sequence_counter: Option<SequenceCounter>,
    pub p_std_buffer: Option<PStdBuffer>,
    pub extension2: Option<Bytes>,
}

impl PesExtension {
    fn decode(cursor: &mut BitCursor) -> Result<Self> {
        let private_data_flag = cursor.read_bool()?;
        let pack_header_flag = cursor.read_bool()?;
        let sequence_counter_flag = cursor.read_bool()?;
        let p_std_flag = cursor.read_bool()?;
        cursor.skip(3)?;
        let extension2_flag = cursor.read_bool()?;

        let mut ext = Self::default();
        if private_data_flag {
            ext.private_data = Some(Bytes::from(cursor.read_bytes(128)?));
        }
        if pack_header_flag {
            let length = cursor.read_u8()? as usize;
            ext.pack_header = Some(Bytes::from(cursor.read_bytes(length * 8)?));
        }
        if sequence_counter_flag {
            cursor.skip(1)?;
            let counter = cursor.read_uint(7)? as u8;
            cursor.skip(1)?;
            ext.sequence_counter = Some(SequenceCounter {
                counter,
                mpeg1_mpeg2_identifier: cursor.read_bool()?,
                original_stuff_length: cursor.read_uint(6)? as u8,
            });
        }
        if p_std_flag {
            cursor.skip(2)?;
            ext.p_std_buffer = Some(PStdBuffer {
                scale: cursor.read_bool()?,
                size: cursor.read_uint(13)? as u16,
            });
        }
        if extension2_flag {
            cursor.skip(1)?;
            let length = cursor.read_uint(7)? as usize;
            ext.extension2 = Some(Bytes::from(cursor.read_bytes(length * 8)?));
        }
        Ok(ext)
    }
}

/// The optional PES header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PesHeader {
    pub scrambling: Scrambling,
    pub priority: bool,
    pub data_alignment: bool,
    pub copyright: bool,
    pub original: bool,
    pub pts_dts: PtsDtsIndicator,
    pub header_data_length: u8,
    pub pts: Option<Timestamp>,
    pub dts: Option<Timestamp>,
    pub escr: Option<Escr>,
    pub es_rate: Option<u32>,
    pub trick_mode: Option<TrickMode>,
    pub additional_copy_info: Option<u8>,
    pub previous_crc: Option<u16>,
    pub extension: Option<PesExtension>,
}

impl PesHeader {
    fn decode(cursor: &mut BitCursor, warnings: &mut Vec<Warning>) -> Result<Self> {
        let marker = cursor.read_uint(2)? as u8;
        if marker != 0b10 {
            warnings.push(Warning::UnexpectedTag {
                field: "PES header marker",
                tag: marker,
            });
        }
        let scrambling = Scrambling::from(cursor.read_uint(2)? as u8);
        let priority = cursor.read_bool()?;
        let data_alignment = cursor.read_bool()?;
        let copyright = cursor.read_bool()?;
        let original = cursor.read_bool()?;
        let pts_dts = PtsDtsIndicator::from(cursor.read_uint(2)? as u8);
        let escr_flag = cursor.read_bool()?;
        let es_rate_flag = cursor.read_bool()?;
        let trick_mode_flag = cursor.read_bool()?;
        let additional_copy_info_flag = cursor.read_bool()?;
        let crc_flag = cursor.read_bool()?;
        let extension_flag = cursor.read_bool()?;
        let header_data_length = cursor.read_u8()?;

        let start = cursor.position();
        let mut header = Self {
            scrambling,
            priority,
            data_alignment,
            copyright,
            original,
            pts_dts,
            header_data_length,
            pts: None,
            dts: None,
            escr: None,
            es_rate: None,
            trick_mode: None,
            additional_copy_info: None,
            previous_crc: None,
            extension: None,
        };

        match pts_dts {
            PtsDtsIndicator::None => {}
            PtsDtsIndicator::Forbidden => warnings.push(Warning::UnexpectedTag {
                field: "PTS_DTS_flags",
                tag: 0b01,
            }),
            PtsDtsIndicator::PtsOnly => {
                let ts = Timestamp::decode(cursor)?;
                header.assign_timestamp(ts, warnings);
            }
            PtsDtsIndicator::Both => {
                for _ in 0..2 {
                    let ts = Timestamp::decode(cursor)?;
                    header.assign_timestamp(ts, warnings);
                }
            }
        }

        if escr_flag {
            cursor.skip(2)?;
            let (base, base_markers) = read_marked_33(cursor)?;
            let extension = cursor.read_uint(9)? as u16;
            let last_marker = cursor.read_bool()?;
            let markers_valid = base_markers && last_marker;
            if !markers_valid {
                warnings.push(Warning::TimestampMarker { field: "ESCR" });
            }
            header.escr = Some(Escr {
                base,
                extension,
                markers_valid,
            });
        }
        if es_rate_flag {
            cursor.skip(1)?;
            header.es_rate = Some(cursor.read_uint(22)? as u32);
            cursor.skip(1)?;
        }
        if trick_mode_flag {
            header.trick_mode = Some(TrickMode::decode(cursor)?);
        }
        if additional_copy_info_flag {
            cursor.skip(1)?;
            header.additional_copy_info = Some(cursor.read_uint(7)? as u8);
        }
        if crc_flag {
            header.previous_crc = Some(cursor.read_u16()?);
        }
        if extension_flag {
            header.extension = Some(PesExtension::decode(cursor)?);
        }

        // Whatever is left of header_data_length is stuffing
        let end = start + header_data_length as usize * 8;
        let position = cursor.position();
        if position > end {
            warnings.push(Warning::MalformedSection {
                field: "PES_header_data_length",
                declared: header_data_length as usize,
                available: (position - start) / 8,
            });
        } else {
            let end = end.min(cursor.len() - cursor.len() % 8);
            let mut offset = position;
            while offset + 8 <= end {
                let byte = cursor.read_uint_at(offset, 8)? as u8;
                if byte != 0xFF {
                    warnings.push(Warning::UnexpectedTag {
                        field: "PES stuffing byte",
                        tag: byte,
                    });
                    break;
                }
                offset += 8;
            }
            cursor.set_position(end.max(position))?;
        }
        Ok(header)
    }

    fn assign_timestamp(&mut self, ts: Timestamp, warnings: &mut Vec<Warning>) {
        let field = match ts.tag {
            Timestamp::TAG_PTS => "PTS",
            Timestamp::TAG_DTS | Timestamp::TAG_DTS_BOTH => "DTS",
            tag => {
                warnings.push(Warning::UnexpectedTag {
                    field: "timestamp",
                    tag,
                });
                return;
            }
        };
        if !ts.markers_valid {
            warnings.push(Warning::TimestampMarker { field });
        }
        if field == "PTS" {
            self.pts = Some(ts);
        } else {
            self.dts = Some(ts);
        }
    }
}

/// Returns true when `data` begins with the PES start code prefix.
pub fn has_start_code(data: &[u8]) -> bool {
    data.len() >= 3 && data[..3] == [0x00, 0x00, 0x01]
}

/// A PES packet, or the part of it carried by one transport stream payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PesPacket {
    pub stream_id: u8,
    pub packet_length: u16,
    pub header: Option<PesHeader>,
    pub payload: Bytes,
    pub warnings: Vec<Warning>,
}

impl PesPacket {
    /// Decodes a PES packet from the start of `data`.
    ///
    /// The payload is bounded by the declared length and by the bytes
    /// available; a zero `PES_packet_length` reads to the end of `data`.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if !has_start_code(data) {
            return Err(TsError::InvalidData("missing PES start code prefix".into()));
        }
        let mut cursor = BitCursor::from(data);
        cursor.skip(24)?;
        let stream_id = cursor.read_u8()?;
        let packet_length = cursor.read_u16()?;
        let mut warnings = Vec::new();

        let (header, payload_length) = match HeaderLayout::of(stream_id) {
            HeaderLayout::Padding => {
                return Ok(Self {
                    stream_id,
                    packet_length,
                    header: None,
                    payload: Bytes::new(),
                    warnings,
                })
            }
            HeaderLayout::Raw => (None, packet_length as usize),
            HeaderLayout::Optional => {
                let header = PesHeader::decode(&mut cursor, &mut warnings)?;
                let consumed = 3 + header.header_data_length as usize;
                (Some(header), (packet_length as usize).saturating_sub(consumed))
            }
        };

        let available = cursor.remaining() / 8;
        let length = if packet_length == 0 {
            available
        } else {
            payload_length.min(available)
        };
        let payload = Bytes::from(cursor.read_bytes(length * 8)?);

        for warning in &warnings {
            warn!("PES stream {:#04x}: {}", stream_id, warning);
        }
        Ok(Self {
            stream_id,
            packet_length,
            header,
            payload,
            warnings,
        })
    }

    pub fn pts(&self) -> Option<Timestamp> {
        self.header.as_ref().and_then(|h| h.pts)
    }

    pub fn dts(&self) -> Option<Timestamp> {
        self.header.as_ref().and_then(|h| h.dts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn timestamp_bytes(tag: u8, value: u64) -> Vec<u8> {
        let mut cursor = BitCursor::new();
        Timestamp::new(tag, value).encode(&mut cursor).unwrap();
        cursor.into_bytes()
    }

    fn make_pes(stream_id: u8, flags: u8, header_data: &[u8], payload: &[u8]) -> Vec<u8> {
        let length = 3 + header_data.len() + payload.len();
        let mut data = vec![0x00, 0x00, 0x01, stream_id];
        data.extend_from_slice(&(length as u16).to_be_bytes());
        data.push(0x80); // Marker '10', no scrambling, no flags
        data.push(flags);
        data.push(header_data.len() as u8);
        data.extend_from_slice(header_data);
        data.extend_from_slice(payload);
        data
    }

    #[test]
    fn test_pts_only() {
        let data = make_pes(0xE0, 0x80, &timestamp_bytes(0b0010, 900_000), &[0xAB; 10]);
        let pes = PesPacket::decode(&data).unwrap();

        assert_eq!(pes.stream_id, 0xE0);
        assert_eq!(pes.pts().map(|t| t.value), Some(900_000));
        assert_eq!(pes.dts(), None);
        assert_eq!(pes.payload.as_ref(), &[0xAB; 10]);
        assert!(pes.warnings.is_empty());
    }

    #[test]
    fn test_pts_and_dts_by_tag() {
        let mut header = timestamp_bytes(0b0011, 3_000);
        header.extend(timestamp_bytes(0b0010, 6_000));
        let data = make_pes(0xE0, 0xC0, &header, &[0x00; 4]);
        let pes = PesPacket::decode(&data).unwrap();

        assert_eq!(pes.pts().map(|t| t.value), Some(6_000));
        assert_eq!(pes.dts().map(|t| t.value), Some(3_000));
    }

    #[test]
    fn test_corrupted_pts_marker() {
        let mut ts = timestamp_bytes(0b0010, 12_345);
        ts[4] &= 0xFE; // Last marker
        let data = make_pes(0xC0, 0x80, &ts, &[]);
        let pes = PesPacket::decode(&data).unwrap();

        let pts = pes.pts().unwrap();
        assert_eq!(pts.value, 12_345);
        assert!(matches!(
            pts.checked("PTS"),
            Err(TsError::TimestampMarker { field: "PTS" })
        ));
        assert_eq!(pes.warnings, vec![Warning::TimestampMarker { field: "PTS" }]);
    }

    #[test]
    fn test_stuffing_bounded_by_header_length() {
        let mut header = timestamp_bytes(0b0010, 1);
        header.extend_from_slice(&[0xFF; 6]);
        let data = make_pes(0xE0, 0x80, &header, &[0x01, 0x02]);
        let pes = PesPacket::decode(&data).unwrap();

        assert_eq!(pes.payload.as_ref(), &[0x01, 0x02]);
        assert!(pes.warnings.is_empty());
    }

    #[test]
    fn test_optional_fields() {
        let mut header = Vec::new();
        // ESCR: base 2, extension 1
        let mut cursor = BitCursor::new();
        cursor.write_uint(0b11, 2).unwrap();
        crate::format::ts::timestamp::write_marked_33(&mut cursor, 2).unwrap();
        cursor.write_uint(1, 9).unwrap();
        cursor.write_bool(true);
        // ES rate
        cursor.write_bool(true);
        cursor.write_uint(50_000, 22).unwrap();
        cursor.write_bool(true);
        // Trick mode: slow motion, rep_cntrl 3
        cursor.write_uint(0b001, 3).unwrap();
        cursor.write_uint(3, 5).unwrap();
        // Additional copy info
        cursor.write_bool(true);
        cursor.write_uint(0x55, 7).unwrap();
        // Previous PES CRC
        cursor.write_uint(0xBEEF, 16).unwrap();
        header.extend(cursor.into_bytes());

        let data = make_pes(0xE0, 0x3E, &header, &[0x09]);
        let pes = PesPacket::decode(&data).unwrap();
        let h = pes.header.as_ref().unwrap();

        assert_eq!(
            h.escr,
            Some(Escr {
                base: 2,
                extension: 1,
                markers_valid: true
            })
        );
        assert_eq!(h.escr.unwrap().value(), 601);
        assert_eq!(h.es_rate, Some(50_000));
        assert_eq!(h.trick_mode, Some(TrickMode::SlowMotion { rep_cntrl: 3 }));
        assert_eq!(h.additional_copy_info, Some(0x55));
        assert_eq!(h.previous_crc, Some(0xBEEF));
        assert_eq!(pes.payload.as_ref(), &[0x09]);
    }

    #[test]
    fn test_extension_fields() {
        let header = vec![
            0x31, // Sequence counter + P-STD + extension 2 flags
            0x85, // Marker + counter 5
            0xC3, // Marker, MPEG-1 flag, stuff length 3
            0x60, 0x10, // '01', scale 1, size 16
            0x82, 0xAA, 0xBB, // Marker, length 2, data
        ];
        let data = make_pes(0xE0, 0x01, &header, &[]);
        let pes = PesPacket::decode(&data).unwrap();
        let ext = pes.header.unwrap().extension.unwrap();

        assert_eq!(
            ext.sequence_counter,
            Some(SequenceCounter {
                counter: 5,
                mpeg1_mpeg2_identifier: true,
                original_stuff_length: 3
            })
        );
        assert_eq!(ext.p_std_buffer.map(|b| b.size_bytes()), Some(16 * 1024));
        assert_eq!(ext.extension2.as_deref(), Some(&[0xAA, 0xBB][..]));
        assert_eq!(ext.private_data, None);
    }

    #[test]
    fn test_trick_mode_shapes() {
        let cases = [
            (
                0x15, // '000' fast forward, field 2, intra refresh, truncation 1
                TrickMode::FastForward {
                    field_id: 2,
                    intra_slice_refresh: true,
                    frequency_truncation: 1,
                },
            ),
            (
                0x5F, // '010' freeze frame, field 3, reserved '111'
                TrickMode::FreezeFrame { field_id: 3 },
            ),
            (
                0x6B, // '011' fast reverse, field 1, no refresh, truncation 3
                TrickMode::FastReverse {
                    field_id: 1,
                    intra_slice_refresh: false,
                    frequency_truncation: 3,
                },
            ),
            (
                0x96, // '100' slow reverse, rep_cntrl 22
                TrickMode::SlowReverse { rep_cntrl: 22 },
            ),
            (0xBF, TrickMode::Reserved { control: 0b101 }),
            (0xE0, TrickMode::Reserved { control: 0b111 }),
        ];

        for (byte, expected) in cases {
            let mut cursor = BitCursor::from(vec![byte, 0xA5]);
            assert_eq!(TrickMode::decode(&mut cursor).unwrap(), expected);
            assert_eq!(cursor.position(), 8);
            assert_eq!(cursor.read_u8().unwrap(), 0xA5);
        }
    }

    #[test]
    fn test_trick_mode_in_header() {
        // Fast reverse followed by additional copy info
        let data = make_pes(0xE0, 0x0C, &[0x6B, 0xAA], &[0x01, 0x02]);
        let pes = PesPacket::decode(&data).unwrap();
        let h = pes.header.as_ref().unwrap();

        assert_eq!(
            h.trick_mode,
            Some(TrickMode::FastReverse {
                field_id: 1,
                intra_slice_refresh: false,
                frequency_truncation: 3,
            })
        );
        assert_eq!(h.additional_copy_info, Some(0x2A));
        assert_eq!(pes.payload.as_ref(), &[0x01, 0x02]);
        assert!(pes.warnings.is_empty());
    }

    #[test]
    fn test_extension_private_data_and_pack_header() {
        let mut header = vec![0xCE]; // Private data + pack header flags, reserved '111'
        header.extend(0x10..0x20u8); // 16 bytes of private data
        header.extend([0x02, 0xDE, 0xAD]); // Pack header length 2, data
        let data = make_pes(0xE0, 0x01, &header, &[0x77]);
        let pes = PesPacket::decode(&data).unwrap();
        let ext = pes.header.as_ref().unwrap().extension.clone().unwrap();

        let private: Vec<u8> = (0x10..0x20u8).collect();
        assert_eq!(ext.private_data.as_deref(), Some(&private[..]));
        assert_eq!(ext.pack_header.as_deref(), Some(&[0xDE, 0xAD][..]));
        assert_eq!(ext.sequence_counter, None);
        assert_eq!(ext.p_std_buffer, None);
        assert_eq!(ext.extension2, None);
        assert_eq!(pes.payload.as_ref(), &[0x77]);
        assert!(pes.warnings.is_empty());
    }

    #[test]
    fn test_raw_and_padding_streams() {
        let mut data = vec![0x00, 0x00, 0x01, STREAM_ID_PRIVATE_STREAM_2, 0x00, 0x03];
        data.extend_from_slice(&[0x80, 0x81, 0x82, 0x83]);
        let pes = PesPacket::decode(&data).unwrap();
        assert_eq!(pes.header, None);
        assert_eq!(pes.payload.as_ref(), &[0x80, 0x81, 0x82]);

        data[3] = STREAM_ID_PADDING;
        let pes = PesPacket::decode(&data).unwrap();
        assert!(pes.payload.is_empty());
        assert_eq!(HeaderLayout::of(STREAM_ID_ECM), HeaderLayout::Raw);
    }

    #[test]
    fn test_unbounded_length_reads_to_end() {
        let mut data = make_pes(0xE0, 0x00, &[], &[0x11; 20]);
        data[4] = 0;
        data[5] = 0;
        let pes = PesPacket::decode(&data).unwrap();
        assert_eq!(pes.packet_length, 0);
        assert_eq!(pes.payload.len(), 20);
    }

    #[test]
    fn test_missing_start_code() {
        assert!(matches!(
            PesPacket::decode(&[0x00, 0x00, 0x02, 0xE0]),
            Err(TsError::InvalidData(_))
        ));
    }
}
