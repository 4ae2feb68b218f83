use super::packet::{TsHeader, TsPacket};
use super::pes::{has_start_code, PesPacket};
use super::psi::{PsiSection, PsiTable, TableKind};
use super::types::*;
use crate::error::{Result, TsError};
use log::{debug, trace};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// What the router currently knows about a PID.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PidRole {
    Pat,
    Cat,
    Description,
    ProgramMap,
    Network,
    Elementary { program_map_pid: u16 },
    Reserved,
    Null,
    #[default]
    Unclassified,
}

impl PidRole {
    /// Section layout used for units on this PID, `None` for PES or
    /// never-decoded PIDs.
    pub fn table_kind(self) -> Option<TableKind> {
        match self {
            PidRole::Pat => Some(TableKind::Pat),
            PidRole::Cat => Some(TableKind::Cat),
            PidRole::Description => Some(TableKind::Description),
            PidRole::ProgramMap => Some(TableKind::Pmt),
            PidRole::Network => Some(TableKind::Private),
            PidRole::Unclassified => Some(TableKind::Generic),
            PidRole::Elementary { .. } | PidRole::Reserved | PidRole::Null => None,
        }
    }
}

/// Per-PID counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PidStats {
    pub packets: u64,
    pub discontinuities: u64,
    pub duplicates: u64,
    pub errors: u64,
    pub last_counter: Option<u8>,
    /// Role at the most recent frame.
    pub role: PidRole,
}

/// Result of the continuity check for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuity {
    /// First payload frame seen on the PID.
    Initial,
    Ok,
    /// Same counter as the previous payload frame.
    Duplicate,
    Discontinuity { expected: u8, actual: u8 },
    /// Not checked: no payload, null PID, or signalled discontinuity.
    Skipped,
}

/// Where a frame belongs in per-program output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// PAT frames go to every known program.
    Broadcast,
    /// The program whose PMT is carried on this PID.
    Program(u16),
    Drop,
}

/// A PSI section or PES packet decoded from a unit start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedUnit {
    Section(PsiSection),
    Pes(PesPacket),
}

#[derive(Debug)]
pub struct Routed {
    pub route: Route,
    pub continuity: Continuity,
    /// Present when the frame starts a unit on a decodable PID.
    pub unit: Option<Result<DecodedUnit>>,
}

/// Single-pass demultiplexing state: per-PID statistics and the PID
/// classification learned from PAT and PMT sections.
///
/// Classification only grows. Once a PID is known as a program-map or
/// elementary PID it keeps that role for the rest of the scan.
#[derive(Debug, Default)]
pub struct DemuxRouter {
    stats: BTreeMap<u16, PidStats>,
    network_pids: BTreeSet<u16>,
    program_map_pids: BTreeSet<u16>,
    elementary_pids: HashMap<u16, u16>,
}

impl DemuxRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn role(&self, pid: u16) -> PidRole {
        match pid {
            PID_PAT => PidRole::Pat,
            PID_CAT => PidRole::Cat,
            PID_TSDT => PidRole::Description,
            PID_NULL => PidRole::Null,
            _ if self.program_map_pids.contains(&pid) => PidRole::ProgramMap,
            _ if self.network_pids.contains(&pid) => PidRole::Network,
            _ => match self.elementary_pids.get(&pid) {
                Some(&program_map_pid) => PidRole::Elementary { program_map_pid },
                None if (PID_IPMP..=0x000F).contains(&pid) => PidRole::Reserved,
                None => PidRole::Unclassified,
            },
        }
    }

    pub fn route(&self, pid: u16) -> Route {
        match self.role(pid) {
            PidRole::Pat => Route::Broadcast,
            PidRole::ProgramMap => Route::Program(pid),
            PidRole::Elementary { program_map_pid } => Route::Program(program_map_pid),
            _ => Route::Drop,
        }
    }

    pub fn stats(&self) -> &BTreeMap<u16, PidStats> {
        &self.stats
    }

    pub fn into_stats(self) -> BTreeMap<u16, PidStats> {
        self.stats
    }

    pub fn network_pids(&self) -> &BTreeSet<u16> {
        &self.network_pids
    }

    pub fn program_map_pids(&self) -> &BTreeSet<u16> {
        &self.program_map_pids
    }

    /// Elementary PID to owning program-map PID.
    pub fn elementary_pids(&self) -> &HashMap<u16, u16> {
        &self.elementary_pids
    }

    /// Updates the counters of `header.pid` and checks continuity.
    ///
    /// The counter only advances on frames with payload; a repeated counter
    /// is a tolerated duplicate, not a discontinuity.
    pub fn record(
        &mut self,
        header: &TsHeader,
        has_payload: bool,
        discontinuity_indicator: bool,
    ) -> Continuity {
        let role = self.role(header.pid);
        let stats = self.stats.entry(header.pid).or_default();
        stats.role = role;
        stats.packets += 1;
        if header.transport_error {
            stats.errors += 1;
        }

        let counter = header.continuity_counter;
        if !has_payload || header.pid == PID_NULL {
            return Continuity::Skipped;
        }
        let previous = stats.last_counter.replace(counter);
        if discontinuity_indicator {
            return Continuity::Skipped;
        }

        match previous {
            None => Continuity::Initial,
            Some(last) if last == counter => {
                stats.duplicates += 1;
                Continuity::Duplicate
            }
            Some(last) => {
                let expected = (last + 1) % 16;
                if expected == counter {
                    Continuity::Ok
                } else {
                    stats.discontinuities += 1;
                    Continuity::Discontinuity {
                        expected,
                        actual: counter,
                    }
                }
            }
        }
    }

    /// Counts a frame whose body could not be decoded.
    pub fn record_damaged(&mut self, header: &TsHeader) {
        let role = self.role(header.pid);
        let stats = self.stats.entry(header.pid).or_default();
        stats.role = role;
        stats.packets += 1;
        stats.errors += 1;
    }

    /// Runs the counters, decodes the unit the frame starts (if any),
    /// learns classification from it and resolves the output route.
    pub fn process(&mut self, packet: &TsPacket) -> Routed {
        let header = &packet.header;
        let continuity = self.record(
            header,
            packet.has_payload(),
            packet.discontinuity_indicator(),
        );
        if let Continuity::Discontinuity { expected, actual } = continuity {
            debug!(
                "continuity jump on {}: expected {}, got {}",
                Pid(header.pid),
                expected,
                actual
            );
        }

        let unit = match packet.payload() {
            Some(payload)
                if header.payload_unit_start && !header.transport_error && !payload.is_empty() =>
            {
                self.decode_unit(header, payload)
            }
            _ => None,
        };

        if let Some(Ok(DecodedUnit::Section(section))) = &unit {
            self.learn(header.pid, section);
        }

        trace!("frame on {} routed as {:?}", Pid(header.pid), self.route(header.pid));
        Routed {
            route: self.route(header.pid),
            continuity,
            unit,
        }
    }

    fn decode_unit(&self, header: &TsHeader, payload: &[u8]) -> Option<Result<DecodedUnit>> {
        match self.role(header.pid) {
            PidRole::Elementary { .. } => {
                if header.scrambling != Scrambling::NotScrambled {
                    return None;
                }
                if !has_start_code(payload) {
                    return Some(Err(TsError::InvalidData(format!(
                        "unit start on {} without PES start code",
                        Pid(header.pid)
                    ))));
                }
                Some(PesPacket::decode(payload).map(DecodedUnit::Pes))
            }
            role => {
                let kind = role.table_kind()?;
                Some(PsiSection::decode(payload, true, kind).map(DecodedUnit::Section))
            }
        }
    }

    fn learn(&mut self, pid: u16, section: &PsiSection) {
        match &section.table {
            PsiTable::Pat(pat) => {
                for entry in &pat.programs {
                    if self.elementary_pids.contains_key(&entry.pid)
                        || self.program_map_pids.contains(&entry.pid)
                    {
                        continue;
                    }
                    if entry.is_network() {
                        if self.network_pids.insert(entry.pid) {
                            debug!("{} carries network information", Pid(entry.pid));
                        }
                    } else if self.program_map_pids.insert(entry.pid) {
                        debug!(
                            "{} carries the PMT of program {}",
                            Pid(entry.pid),
                            entry.program_number
                        );
                    }
                }
            }
            PsiTable::Pmt(pmt) => {
                for stream in &pmt.streams {
                    if self.program_map_pids.contains(&stream.pid)
                        || self.elementary_pids.contains_key(&stream.pid)
                    {
                        continue;
                    }
                    debug!(
                        "{} is {} of program {} (PMT on {})",
                        Pid(stream.pid),
                        stream.stream_type_name(),
                        pmt.program_number,
                        Pid(pid)
                    );
                    self.elementary_pids.insert(stream.pid, pid);
                }
            }
            _ => {}
        }
    }
}
