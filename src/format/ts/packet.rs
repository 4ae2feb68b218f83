use super::adaptation::AdaptationField;
use super::types::*;
use crate::error::{Result, TsError, Warning};
use crate::utils::BitCursor;
use bytes::Bytes;

/// The fixed 4-byte transport stream header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TsHeader {
    pub transport_error: bool,
    pub payload_unit_start: bool,
    pub transport_priority: bool,
    pub pid: u16,
    pub scrambling: Scrambling,
    pub adaptation_field_control: AdaptationFieldControl,
    pub continuity_counter: u8,
}

impl Default for TsHeader {
    fn default() -> Self {
        Self {
            transport_error: false,
            payload_unit_start: false,
            transport_priority: false,
            pid: PID_NULL,
            scrambling: Scrambling::NotScrambled,
            adaptation_field_control: AdaptationFieldControl::PayloadOnly,
            continuity_counter: 0,
        }
    }
}

impl TsHeader {
    /// Decodes the header including the sync byte.
    pub fn decode(cursor: &mut BitCursor) -> Result<Self> {
        let sync = cursor.read_u8()?;
        if sync != SYNC_BYTE {
            return Err(TsError::Frame(format!("invalid sync byte {:#04x}", sync)));
        }

        Ok(Self {
            transport_error: cursor.read_bool()?,
            payload_unit_start: cursor.read_bool()?,
            transport_priority: cursor.read_bool()?,
            pid: cursor.read_uint(13)? as u16,
            scrambling: Scrambling::from(cursor.read_uint(2)? as u8),
            adaptation_field_control: AdaptationFieldControl::from(cursor.read_uint(2)? as u8),
            continuity_counter: cursor.read_uint(4)? as u8,
        })
    }

    pub fn encode(&self, cursor: &mut BitCursor) -> Result<()> {
        cursor.write_uint(SYNC_BYTE as u64, 8)?;
        cursor.write_bool(self.transport_error);
        cursor.write_bool(self.payload_unit_start);
        cursor.write_bool(self.transport_priority);
        cursor.write_uint(self.pid as u64, 13)?;
        cursor.write_uint(u8::from(self.scrambling) as u64, 2)?;
        cursor.write_uint(u8::from(self.adaptation_field_control) as u64, 2)?;
        cursor.write_uint(self.continuity_counter as u64, 4)
    }
}

/// One decoded 188-byte frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TsPacket {
    pub header: TsHeader,
    pub adaptation_field: Option<AdaptationField>,
    pub payload: Option<Bytes>,
}

impl TsPacket {
    /// Decodes a frame. `frame` must hold at least 188 bytes starting with
    /// the sync byte; bytes past 188 are ignored.
    ///
    /// A reserved adaptation-field-control value yields a packet with
    /// neither adaptation field nor payload.
    pub fn parse(frame: &[u8]) -> Result<Self> {
        if frame.len() < TS_PACKET_SIZE {
            return Err(TsError::Frame(format!(
                "frame holds {} of {} bytes",
                frame.len(),
                TS_PACKET_SIZE
            )));
        }

        let mut cursor = BitCursor::from(&frame[..TS_PACKET_SIZE]);
        let header = TsHeader::decode(&mut cursor)?;
        let header_end = cursor.position();

        let adaptation_field = if header.adaptation_field_control.has_adaptation_field() {
            Some(AdaptationField::decode(&mut cursor)?)
        } else {
            None
        };

        let payload = if header.adaptation_field_control.has_payload() {
            let consumed = cursor.position() - header_end;
            let bits = (TS_PAYLOAD_SIZE * 8).saturating_sub(consumed);
            Some(Bytes::from(cursor.read_bytes(bits)?))
        } else {
            None
        };

        Ok(Self {
            header,
            adaptation_field,
            payload,
        })
    }

    pub fn pid(&self) -> u16 {
        self.header.pid
    }

    pub fn payload(&self) -> Option<&[u8]> {
        self.payload.as_deref()
    }

    /// True when the frame carries at least one payload byte.
    pub fn has_payload(&self) -> bool {
        self.payload.as_ref().is_some_and(|p| !p.is_empty())
    }

    pub fn discontinuity_indicator(&self) -> bool {
        self.adaptation_field
            .as_ref()
            .is_some_and(|af| af.discontinuity)
    }

    pub fn warnings(&self) -> &[Warning] {
        self.adaptation_field
            .as_ref()
            .map_or(&[], |af| af.warnings.as_slice())
    }

    /// Serializes the packet into a full frame, filling any space left after
    /// the payload with 0xFF.
    pub fn to_frame(&self) -> Result<Bytes> {
        let mut cursor = BitCursor::new();
        self.header.encode(&mut cursor)?;
        if let Some(af) = &self.adaptation_field {
            af.encode(&mut cursor)?;
        }
        if let Some(payload) = &self.payload {
            cursor.write_bytes(payload);
        }

        let mut frame = cursor.into_bytes();
        if frame.len() > TS_PACKET_SIZE {
            return Err(TsError::InvalidData(format!(
                "packet needs {} bytes, a frame holds {}",
                frame.len(),
                TS_PACKET_SIZE
            )));
        }
        frame.resize(TS_PACKET_SIZE, 0xFF);
        Ok(Bytes::from(frame))
    }
}
