use super::descriptor::{decode_descriptors, descriptors_len, encode_descriptors, Descriptor};
use crate::error::{Result, Warning};
use crate::format::ts::types::stream_type_name;
use crate::utils::BitCursor;

/// One elementary stream announced by a PMT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementaryStream {
    pub stream_type: u8,
    pub pid: u16,
    pub descriptors: Vec<Descriptor>,
}

impl ElementaryStream {
    pub fn stream_type_name(&self) -> &'static str {
        stream_type_name(self.stream_type)
    }
}

/// Program map table body.
///
/// `program_number` mirrors the table id extension of the carrying section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pmt {
    pub program_number: u16,
    pub pcr_pid: u16,
    pub program_info: Vec<Descriptor>,
    pub streams: Vec<ElementaryStream>,
}

impl Pmt {
    pub fn new(program_number: u16, pcr_pid: u16) -> Self {
        Self {
            program_number,
            pcr_pid,
            ..Self::default()
        }
    }

    pub fn elementary_pids(&self) -> impl Iterator<Item = u16> + '_ {
        self.streams.iter().map(|s| s.pid)
    }

    /// Body size in bytes.
    pub fn len(&self) -> usize {
        4 + descriptors_len(&self.program_info)
            + self
                .streams
                .iter()
                .map(|s| 5 + descriptors_len(&s.descriptors))
                .sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty() && self.program_info.is_empty()
    }

    pub(crate) fn decode(
        cursor: &mut BitCursor,
        program_number: u16,
        warnings: &mut Vec<Warning>,
    ) -> Result<Self> {
        cursor.skip(3)?;
        let pcr_pid = cursor.read_uint(13)? as u16;
        cursor.skip(4)?;
        // Top two bits of the length are always zero
        cursor.skip(2)?;
        let program_info_length = cursor.read_uint(10)? as usize;
        let program_info = decode_descriptors(cursor, program_info_length, warnings)?;

        let mut streams = Vec::new();
        while cursor.remaining() > 0 {
            let left = cursor.remaining() / 8;
            if left < 5 {
                warnings.push(Warning::MalformedSection {
                    field: "elementary_stream",
                    declared: 5,
                    available: left,
                });
                break;
            }
            let stream_type = cursor.read_u8()?;
            cursor.skip(3)?;
            let pid = cursor.read_uint(13)? as u16;
            cursor.skip(4)?;
            let es_info_length = cursor.read_uint(12)? as usize;
            let descriptors = decode_descriptors(cursor, es_info_length, warnings)?;
            streams.push(ElementaryStream {
                stream_type,
                pid,
                descriptors,
            });
        }

        Ok(Self {
            program_number,
            pcr_pid,
            program_info,
            streams,
        })
    }

    pub(crate) fn encode(&self, cursor: &mut BitCursor) -> Result<()> {
        cursor.write_uint(0b111, 3)?;
        cursor.write_uint(self.pcr_pid as u64, 13)?;
        cursor.write_uint(0b1111, 4)?;
        cursor.write_uint(descriptors_len(&self.program_info) as u64, 12)?;
        encode_descriptors(cursor, &self.program_info)?;

        for stream in &self.streams {
            cursor.write_uint(stream.stream_type as u64, 8)?;
            cursor.write_uint(0b111, 3)?;
            cursor.write_uint(stream.pid as u64, 13)?;
            cursor.write_uint(0b1111, 4)?;
            cursor.write_uint(descriptors_len(&stream.descriptors) as u64, 12)?;
            encode_descriptors(cursor, &stream.descriptors)?;
        }
        Ok(())
    }
}
