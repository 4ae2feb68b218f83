use crate::error::{Result, Warning};
use crate::utils::BitCursor;

/// One program of the program association table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatEntry {
    pub program_number: u16,
    pub pid: u16,
}

impl PatEntry {
    /// Program number 0 announces the network information PID instead of a PMT.
    pub fn is_network(&self) -> bool {
        self.program_number == 0
    }
}

/// Program association table body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pat {
    pub programs: Vec<PatEntry>,
}

impl Pat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn network_pids(&self) -> impl Iterator<Item = u16> + '_ {
        self.programs.iter().filter(|e| e.is_network()).map(|e| e.pid)
    }

    pub fn program_map_pids(&self) -> impl Iterator<Item = u16> + '_ {
        self.programs.iter().filter(|e| !e.is_network()).map(|e| e.pid)
    }

    /// Body size in bytes, four per entry.
    pub fn len(&self) -> usize {
        self.programs.len() * 4
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    pub(crate) fn decode(cursor: &mut BitCursor, warnings: &mut Vec<Warning>) -> Result<Self> {
        let body = cursor.remaining() / 8;
        if body % 4 != 0 {
            warnings.push(Warning::MalformedSection {
                field: "program_association_section",
                declared: body,
                available: body - body % 4,
            });
        }

        let mut pat = Self::new();
        for _ in 0..body / 4 {
            let program_number = cursor.read_u16()?;
            cursor.skip(3)?;
            let pid = cursor.read_uint(13)? as u16;
            pat.programs.push(PatEntry {
                program_number,
                pid,
            });
        }
        Ok(pat)
    }

    pub(crate) fn encode(&self, cursor: &mut BitCursor) -> Result<()> {
        for entry in &self.programs {
            cursor.write_uint(entry.program_number as u64, 16)?;
            cursor.write_uint(0b111, 3)?;
            cursor.write_uint(entry.pid as u64, 13)?;
        }
        Ok(())
    }
}
