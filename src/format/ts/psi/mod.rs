//! Program specific information sections.
//!
//! Every section shares one header layout (table id, syntax indicator,
//! section length) and an optional syntax region (table id extension,
//! version, section numbers) with a trailing CRC32. The body between them is
//! decoded eagerly into one [`PsiTable`] variant chosen by the caller, usually
//! the [`DemuxRouter`](super::demuxer::DemuxRouter) from the PID the section
//! arrived on.
//!
//! ```rust
//! use tsmarker::format::ts::psi::{Pat, PatEntry, PsiSection, TableKind};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut pat = Pat::new();
//! pat.programs.push(PatEntry { program_number: 1, pid: 0x100 });
//!
//! let bytes = PsiSection::from_pat(1, pat.clone()).encode()?;
//! let section = PsiSection::decode(&bytes, true, TableKind::Pat)?;
//!
//! assert_eq!(section.as_pat(), Some(&pat));
//! assert_eq!(section.crc_valid(), Some(true));
//! # Ok(())
//! # }
//! ```

pub mod cat;
pub mod descriptor;
pub mod pat;
pub mod pmt;
pub mod private;

pub use cat::{Cat, DescriptionTable};
pub use descriptor::{CaDescriptor, Descriptor};
pub use pat::{Pat, PatEntry};
pub use pmt::{ElementaryStream, Pmt};
pub use private::PrivateTable;

use super::types::{TABLE_ID_CAT, TABLE_ID_PAT, TABLE_ID_PMT, TABLE_ID_TSDT};
use crate::error::{Result, TsError, Warning};
use crate::utils::{BitCursor, Crc32Mpeg2};
use bytes::Bytes;
use log::debug;

/// Largest legal `section_length`.
pub const MAX_SECTION_LENGTH: u16 = 0x3FD;

/// Bytes counted by `section_length` besides the body when the syntax
/// indicator is set: 5 for the syntax region, 4 for the CRC.
const SYNTAX_OVERHEAD: usize = 9;

/// Which body layout to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    Pat,
    Pmt,
    Cat,
    Description,
    Private,
    Generic,
}

impl TableKind {
    fn expected_table_id(self) -> Option<u8> {
        match self {
            TableKind::Pat => Some(TABLE_ID_PAT),
            TableKind::Cat => Some(TABLE_ID_CAT),
            TableKind::Pmt => Some(TABLE_ID_PMT),
            TableKind::Description => Some(TABLE_ID_TSDT),
            TableKind::Private | TableKind::Generic => None,
        }
    }
}

/// Long-form section fields present when the syntax indicator is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyntaxSection {
    pub table_id_extension: u16,
    pub reserved: u8,
    pub version: u8,
    pub current_next: bool,
    pub section_number: u8,
    pub last_section_number: u8,
}

impl SyntaxSection {
    pub fn new(table_id_extension: u16) -> Self {
        Self {
            table_id_extension,
            reserved: 0b11,
            version: 0,
            current_next: true,
            section_number: 0,
            last_section_number: 0,
        }
    }

    fn decode(cursor: &mut BitCursor) -> Result<Self> {
        Ok(Self {
            table_id_extension: cursor.read_u16()?,
            reserved: cursor.read_uint(2)? as u8,
            version: cursor.read_uint(5)? as u8,
            current_next: cursor.read_bool()?,
            section_number: cursor.read_u8()?,
            last_section_number: cursor.read_u8()?,
        })
    }

    fn encode(&self, cursor: &mut BitCursor) -> Result<()> {
        cursor.write_uint(self.table_id_extension as u64, 16)?;
        cursor.write_uint(self.reserved as u64, 2)?;
        cursor.write_uint(self.version as u64, 5)?;
        cursor.write_bool(self.current_next);
        cursor.write_uint(self.section_number as u64, 8)?;
        cursor.write_uint(self.last_section_number as u64, 8)
    }
}

/// Decoded section body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PsiTable {
    Pat(Pat),
    Pmt(Pmt),
    Cat(Cat),
    Description(DescriptionTable),
    Private(PrivateTable),
    Generic(PrivateTable),
}

impl PsiTable {
    pub fn kind(&self) -> TableKind {
        match self {
            PsiTable::Pat(_) => TableKind::Pat,
            PsiTable::Pmt(_) => TableKind::Pmt,
            PsiTable::Cat(_) => TableKind::Cat,
            PsiTable::Description(_) => TableKind::Description,
            PsiTable::Private(_) => TableKind::Private,
            PsiTable::Generic(_) => TableKind::Generic,
        }
    }

    fn encode(&self, cursor: &mut BitCursor) -> Result<()> {
        match self {
            PsiTable::Pat(pat) => pat.encode(cursor),
            PsiTable::Pmt(pmt) => pmt.encode(cursor),
            PsiTable::Cat(cat) => cat.encode(cursor),
            PsiTable::Description(table) => table.encode(cursor),
            PsiTable::Private(table) | PsiTable::Generic(table) => {
                table.encode(cursor);
                Ok(())
            }
        }
    }
}

/// A single PSI section as carried in one payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PsiSection {
    pub pointer_field: Option<u8>,
    pub table_id: u8,
    pub private_indicator: bool,
    pub reserved: u8,
    /// Declared length; recomputed from the body on encode.
    pub section_length: u16,
    pub syntax: Option<SyntaxSection>,
    pub table: PsiTable,
    pub crc32: Option<u32>,
    pub warnings: Vec<Warning>,
    raw: Bytes,
}

impl PsiSection {
    /// A section ready for encoding. The CRC is computed on encode.
    pub fn new(table_id: u8, syntax: Option<SyntaxSection>, table: PsiTable) -> Self {
        Self {
            pointer_field: Some(0),
            table_id,
            private_indicator: false,
            reserved: 0b11,
            section_length: 0,
            syntax,
            table,
            crc32: None,
            warnings: Vec::new(),
            raw: Bytes::new(),
        }
    }

    pub fn from_pat(transport_stream_id: u16, pat: Pat) -> Self {
        Self::new(
            TABLE_ID_PAT,
            Some(SyntaxSection::new(transport_stream_id)),
            PsiTable::Pat(pat),
        )
    }

    pub fn from_pmt(pmt: Pmt) -> Self {
        Self::new(
            TABLE_ID_PMT,
            Some(SyntaxSection::new(pmt.program_number)),
            PsiTable::Pmt(pmt),
        )
    }

    pub fn from_cat(cat: Cat) -> Self {
        Self::new(
            TABLE_ID_CAT,
            Some(SyntaxSection::new(0xFFFF)),
            PsiTable::Cat(cat),
        )
    }

    /// Decodes the section at the start of `payload`.
    ///
    /// `has_pointer` must be the payload-unit-start flag of the carrying
    /// frame. A section running past the end of `payload` is truncated with
    /// a warning and has no CRC.
    pub fn decode(payload: &[u8], has_pointer: bool, kind: TableKind) -> Result<Self> {
        let mut cursor = BitCursor::from(payload);
        let mut warnings = Vec::new();

        let pointer_field = if has_pointer {
            let pointer = cursor.read_u8()?;
            cursor.skip(pointer as usize * 8)?;
            Some(pointer)
        } else {
            None
        };

        let start = cursor.position();
        let table_id = cursor.read_u8()?;
        if table_id == 0xFF {
            return Err(TsError::InvalidData(
                "only stuffing where a section should start".into(),
            ));
        }
        let syntax_indicator = cursor.read_bool()?;
        let private_indicator = cursor.read_bool()?;
        let reserved = cursor.read_uint(2)? as u8;
        let section_length = cursor.read_uint(12)? as u16;
        if section_length > MAX_SECTION_LENGTH {
            warnings.push(Warning::MalformedSection {
                field: "section_length",
                declared: section_length as usize,
                available: MAX_SECTION_LENGTH as usize,
            });
        }

        let header_end = cursor.position();
        let declared_end = header_end + section_length as usize * 8;
        let complete = declared_end <= cursor.len();
        if !complete {
            warnings.push(Warning::MalformedSection {
                field: "section",
                declared: section_length as usize,
                available: (cursor.len() - header_end) / 8,
            });
        }
        let section_end = declared_end.min(cursor.len());

        let syntax = if syntax_indicator {
            if (section_length as usize) < SYNTAX_OVERHEAD {
                return Err(TsError::InvalidData(format!(
                    "section_length {} is too short for the syntax region",
                    section_length
                )));
            }
            Some(SyntaxSection::decode(&mut cursor)?)
        } else {
            None
        };

        let (body_end, crc32) = match syntax {
            Some(_) if complete => {
                let crc_position = declared_end - 32;
                (crc_position, Some(cursor.read_uint_at(crc_position, 32)? as u32))
            }
            _ => (section_end, None),
        };
        let body_start = cursor.position();
        let body = cursor.read_bytes_at(body_start, body_end.saturating_sub(body_start))?;
        let mut body = BitCursor::from_bytes(body);

        let kind = match kind.expected_table_id() {
            Some(expected) if expected != table_id => {
                debug!(
                    "table id {:#04x} where {:?} expects {:#04x}, keeping body opaque",
                    table_id, kind, expected
                );
                TableKind::Generic
            }
            _ => kind,
        };
        let table_id_extension = syntax.map_or(0, |s| s.table_id_extension);
        let table = match kind {
            TableKind::Pat => PsiTable::Pat(Pat::decode(&mut body, &mut warnings)?),
            TableKind::Pmt => {
                PsiTable::Pmt(Pmt::decode(&mut body, table_id_extension, &mut warnings)?)
            }
            TableKind::Cat => PsiTable::Cat(Cat::decode(&mut body, &mut warnings)?),
            TableKind::Description => {
                PsiTable::Description(DescriptionTable::decode(&mut body, &mut warnings)?)
            }
            TableKind::Private => PsiTable::Private(PrivateTable::decode(&mut body)?),
            TableKind::Generic => PsiTable::Generic(PrivateTable::decode(&mut body)?),
        };

        Ok(Self {
            pointer_field,
            table_id,
            private_indicator,
            reserved,
            section_length,
            syntax,
            table,
            crc32,
            warnings,
            raw: Bytes::copy_from_slice(&payload[start / 8..section_end / 8]),
        })
    }

    /// Serializes pointer field, header, syntax region, body and CRC.
    ///
    /// A CRC carried over from decoding is written back unchanged; sections
    /// built in memory get a freshly computed one.
    pub fn encode(&self) -> Result<Bytes> {
        let mut body = BitCursor::new();
        self.table.encode(&mut body)?;
        let body = body.into_bytes();

        let overhead = if self.syntax.is_some() { SYNTAX_OVERHEAD } else { 0 };
        let section_length = body.len() + overhead;
        if section_length > MAX_SECTION_LENGTH as usize {
            return Err(TsError::InvalidData(format!(
                "section body of {} bytes exceeds the maximum section length",
                body.len()
            )));
        }

        let mut cursor = BitCursor::new();
        if let Some(pointer) = self.pointer_field {
            cursor.write_uint(pointer as u64, 8)?;
            for _ in 0..pointer {
                cursor.write_uint(0xFF, 8)?;
            }
        }
        let start = cursor.position();
        cursor.write_uint(self.table_id as u64, 8)?;
        cursor.write_bool(self.syntax.is_some());
        cursor.write_bool(self.private_indicator);
        cursor.write_uint(self.reserved as u64, 2)?;
        cursor.write_uint(section_length as u64, 12)?;
        if let Some(syntax) = &self.syntax {
            syntax.encode(&mut cursor)?;
        }
        cursor.write_bytes(&body);

        if self.syntax.is_some() {
            let crc = match self.crc32 {
                Some(crc) => crc,
                None => {
                    let covered = cursor.read_bytes_at(start, cursor.position() - start)?;
                    Crc32Mpeg2::new().calculate(&covered)
                }
            };
            cursor.write_uint(crc as u64, 32)?;
        }
        Ok(cursor.to_bytes())
    }

    pub fn kind(&self) -> TableKind {
        self.table.kind()
    }

    pub fn syntax_indicator(&self) -> bool {
        self.syntax.is_some()
    }

    pub fn table_id_extension(&self) -> Option<u16> {
        self.syntax.map(|s| s.table_id_extension)
    }

    pub fn version(&self) -> Option<u8> {
        self.syntax.map(|s| s.version)
    }

    /// Section bytes from the table id on, as decoded.
    pub fn raw(&self) -> &Bytes {
        &self.raw
    }

    /// Checks the stored CRC against the decoded bytes. `None` when the
    /// section has no CRC or was not decoded from bytes.
    pub fn crc_valid(&self) -> Option<bool> {
        self.crc32?;
        if self.raw.is_empty() {
            return None;
        }
        Some(Crc32Mpeg2::new().verify(&self.raw))
    }

    pub fn as_pat(&self) -> Option<&Pat> {
        match &self.table {
            PsiTable::Pat(pat) => Some(pat),
            _ => None,
        }
    }

    pub fn as_pmt(&self) -> Option<&Pmt> {
        match &self.table {
            PsiTable::Pmt(pmt) => Some(pmt),
            _ => None,
        }
    }

    pub fn as_cat(&self) -> Option<&Cat> {
        match &self.table {
            PsiTable::Cat(cat) => Some(cat),
            _ => None,
        }
    }

    pub fn as_description(&self) -> Option<&DescriptionTable> {
        match &self.table {
            PsiTable::Description(table) => Some(table),
            _ => None,
        }
    }

    /// Opaque body of private and generic sections.
    pub fn private_data(&self) -> Option<&Bytes> {
        match &self.table {
            PsiTable::Private(table) | PsiTable::Generic(table) => Some(&table.data),
            _ => None,
        }
    }
}
