//! # MPEG Transport Stream (TS) Demultiplexing
//!
//! Single-pass inspection of 188-byte transport stream frames:
//!
//! - Frame header and adaptation field decoding (PCR, splice, extensions)
//! - PSI sections: PAT, PMT, CAT, TSDT and private tables
//! - PES headers with PTS/DTS, ESCR, trick mode and extension fields
//! - Per-PID continuity statistics and per-program splitting
//!
//! ## Example Usage
//!
//! ### Decoding a single frame
//!
//! ```rust
//! use tsmarker::format::ts::{TsPacket, TS_PACKET_SIZE};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut frame = vec![0xFFu8; TS_PACKET_SIZE];
//! frame[..4].copy_from_slice(&[0x47, 0x41, 0x00, 0x10]);
//!
//! let packet = TsPacket::parse(&frame)?;
//! assert_eq!(packet.pid(), 0x100);
//! assert!(packet.header.payload_unit_start);
//! # Ok(())
//! # }
//! ```
//!
//! ### Scanning a stream
//!
//! ```rust
//! use tsmarker::format::ts::{MemorySink, ScanOutcome, Scanner, TS_PACKET_SIZE};
//! use std::io::Cursor;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut null = vec![0xFFu8; TS_PACKET_SIZE];
//! null[..4].copy_from_slice(&[0x47, 0x1F, 0xFF, 0x10]);
//!
//! let sink = MemorySink::new();
//! let report = Scanner::new(Cursor::new(null))
//!     .with_sink(Box::new(sink.clone()))
//!     .run()?;
//! assert_eq!(report.frames, 1);
//! assert_eq!(report.outcome, ScanOutcome::Completed);
//! assert!(sink.program_map_pids().is_empty());
//! # Ok(())
//! # }
//! ```

/// Adaptation field, PCR and adaptation extension
pub mod adaptation;

/// PID classification, continuity checking and routing
pub mod demuxer;

/// Frame header and whole-frame decoding
pub mod packet;

/// PES packet header decoding
pub mod pes;

/// Program Specific Information sections and tables
pub mod psi;

/// Frame reader, scan driver and report
pub mod scanner;

/// Per-program frame sinks
pub mod sink;

/// 33-bit marker-delimited timestamps
pub mod timestamp;

/// Core TS types and constants
pub mod types;

#[cfg(test)]
mod tests;

pub use adaptation::{AdaptationField, Pcr};
pub use demuxer::{Continuity, DecodedUnit, DemuxRouter, PidRole, PidStats, Route, Routed};
pub use packet::{TsHeader, TsPacket};
pub use pes::{PesHeader, PesPacket};
pub use psi::{PsiSection, PsiTable, TableKind};
pub use scanner::{spawn_scan, FrameReader, LogObserver, ScanOutcome, ScanReport, Scanner};
pub use sink::{DirectorySink, MemorySink};
pub use timestamp::Timestamp;
pub use types::{
    Pid,
    PID_CAT,
    PID_NULL,
    PID_PAT,
    PID_TSDT,
    SYNC_BYTE,
    TS_PACKET_SIZE,
    TS_PAYLOAD_SIZE,
};
