use std::fmt;
use std::time::Duration;

// Frame layout
pub const TS_PACKET_SIZE: usize = 188;
pub const TS_HEADER_SIZE: usize = 4;
pub const TS_PAYLOAD_SIZE: usize = TS_PACKET_SIZE - TS_HEADER_SIZE;
pub const SYNC_BYTE: u8 = 0x47;

// Well known PIDs
pub const PID_PAT: u16 = 0x0000;
pub const PID_CAT: u16 = 0x0001;
pub const PID_TSDT: u16 = 0x0002;
pub const PID_IPMP: u16 = 0x0003;
pub const PID_NULL: u16 = 0x1FFF;

// Table IDs
pub const TABLE_ID_PAT: u8 = 0x00;
pub const TABLE_ID_CAT: u8 = 0x01;
pub const TABLE_ID_PMT: u8 = 0x02;
pub const TABLE_ID_TSDT: u8 = 0x03;

// PES stream IDs with special header handling
pub const STREAM_ID_PROGRAM_STREAM_MAP: u8 = 0xBC;
pub const STREAM_ID_PRIVATE_STREAM_1: u8 = 0xBD;
pub const STREAM_ID_PADDING: u8 = 0xBE;
pub const STREAM_ID_PRIVATE_STREAM_2: u8 = 0xBF;
pub const STREAM_ID_ECM: u8 = 0xF0;
pub const STREAM_ID_EMM: u8 = 0xF1;
pub const STREAM_ID_DSMCC: u8 = 0xF2;
pub const STREAM_ID_H222_1_TYPE_E: u8 = 0xF8;
pub const STREAM_ID_PROGRAM_STREAM_DIRECTORY: u8 = 0xFF;

// Descriptor tags
pub const DESCRIPTOR_TAG_CA: u8 = 0x09;

// Clocks
pub const PTS_HZ: u64 = 90_000;
pub const PCR_HZ: u64 = 27_000_000;

/// Transport scrambling control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scrambling {
    NotScrambled,
    Reserved,
    EvenKey,
    OddKey,
}

impl From<u8> for Scrambling {
    fn from(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => Scrambling::NotScrambled,
            0b01 => Scrambling::Reserved,
            0b10 => Scrambling::EvenKey,
            _ => Scrambling::OddKey,
        }
    }
}

impl From<Scrambling> for u8 {
    fn from(value: Scrambling) -> Self {
        match value {
            Scrambling::NotScrambled => 0b00,
            Scrambling::Reserved => 0b01,
            Scrambling::EvenKey => 0b10,
            Scrambling::OddKey => 0b11,
        }
    }
}

/// What follows the 4-byte frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdaptationFieldControl {
    Reserved,
    PayloadOnly,
    AdaptationOnly,
    AdaptationWithPayload,
}

impl AdaptationFieldControl {
    pub fn has_adaptation_field(self) -> bool {
        matches!(
            self,
            AdaptationFieldControl::AdaptationOnly | AdaptationFieldControl::AdaptationWithPayload
        )
    }

    pub fn has_payload(self) -> bool {
        matches!(
            self,
            AdaptationFieldControl::PayloadOnly | AdaptationFieldControl::AdaptationWithPayload
        )
    }
}

impl From<u8> for AdaptationFieldControl {
    fn from(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => AdaptationFieldControl::Reserved,
            0b01 => AdaptationFieldControl::PayloadOnly,
            0b10 => AdaptationFieldControl::AdaptationOnly,
            _ => AdaptationFieldControl::AdaptationWithPayload,
        }
    }
}

impl From<AdaptationFieldControl> for u8 {
    fn from(value: AdaptationFieldControl) -> Self {
        match value {
            AdaptationFieldControl::Reserved => 0b00,
            AdaptationFieldControl::PayloadOnly => 0b01,
            AdaptationFieldControl::AdaptationOnly => 0b10,
            AdaptationFieldControl::AdaptationWithPayload => 0b11,
        }
    }
}

/// Human readable name of the PID ranges fixed by ISO/IEC 13818-1, DVB and ATSC.
pub fn pid_description(pid: u16) -> &'static str {
    match pid {
        PID_PAT => "Program Association Table",
        PID_CAT => "Conditional Access Table",
        PID_TSDT => "Transport Stream Description Table",
        PID_IPMP => "IPMP Control Information Table",
        0x0004..=0x000F => "Reserved",
        0x0010..=0x001F => "DVB metadata",
        0x1FFB => "DigiCipher 2/ATSC MGT metadata",
        0x0020..=0x1FFE => "Program Map Table, elementary stream or other",
        PID_NULL => "Null packet",
        _ => "Unknown packet",
    }
}

/// Name of a PMT stream_type value.
pub fn stream_type_name(stream_type: u8) -> &'static str {
    match stream_type {
        0x01 => "MPEG-1 video",
        0x02 => "MPEG-2 video",
        0x03 => "MPEG-1 audio",
        0x04 => "MPEG-2 audio",
        0x05 => "private sections",
        0x06 => "PES private data",
        0x0B => "DSM-CC U-N messages",
        0x0D => "DSM-CC sections",
        0x0F => "AAC audio (ADTS)",
        0x11 => "AAC audio (LATM)",
        0x15 => "metadata in PES",
        0x1B => "H.264 video",
        0x24 => "H.265 video",
        0x81 => "AC-3 audio",
        0x86 => "SCTE-35 splice info",
        0x87 => "E-AC-3 audio",
        0x80..=0xFF => "user private",
        _ => "reserved",
    }
}

/// Name of a descriptor tag.
pub fn descriptor_tag_name(tag: u8) -> &'static str {
    match tag {
        0x02 => "video stream",
        0x03 => "audio stream",
        0x05 => "registration",
        0x06 => "data stream alignment",
        DESCRIPTOR_TAG_CA => "conditional access",
        0x0A => "ISO 639 language",
        0x0E => "maximum bitrate",
        0x28 => "AVC video",
        0x40..=0xFF => "user private",
        _ => "reserved",
    }
}

/// 27 MHz clock ticks to wall time.
pub fn pcr_to_time(pcr: u64) -> Duration {
    Duration::from_nanos(pcr.saturating_mul(1_000) / (PCR_HZ / 1_000_000))
}

/// 90 kHz clock ticks to wall time.
pub fn pts_to_time(pts: u64) -> Duration {
    Duration::from_nanos(pts.saturating_mul(1_000_000_000) / PTS_HZ)
}

/// A PID formatted the way reports print it, `0x0100 (256)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pid(pub u16);

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x} ({})", self.0, self.0)
    }
}
