use crate::error::{TsError, Warning};
use crate::Result;

pub mod ts;

use ts::adaptation::AdaptationField;
use ts::pes::PesPacket;
use ts::psi::PsiSection;

/// Per-frame progress handed to a [`ScanObserver`].
#[derive(Debug, Clone, Copy)]
pub struct FrameProgress<'a> {
    /// Zero-based frame index.
    pub index: u64,
    /// Frame count of the source when known.
    pub total: Option<u64>,
    pub pid: u16,
    pub adaptation: Option<&'a AdaptationField>,
    /// Transport error indicator set, or the frame failed to decode.
    pub error: bool,
}

/// Observes a scan. Purely informational: nothing an observer does feeds
/// back into demultiplexing.
pub trait ScanObserver: Send {
    fn on_frame(&mut self, progress: &FrameProgress<'_>);

    fn on_section(&mut self, _pid: u16, _section: &PsiSection) {}

    fn on_pes(&mut self, _pid: u16, _pes: &PesPacket) {}

    fn on_warning(&mut self, _pid: u16, _warning: &Warning) {}

    fn on_unit_error(&mut self, _pid: u16, _error: &TsError) {}
}

/// An observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl ScanObserver for NullObserver {
    fn on_frame(&mut self, _progress: &FrameProgress<'_>) {}
}

/// Append-only per-program output. Frames arrive verbatim, one call per
/// frame, keyed by the program-map PID that owns them.
pub trait FrameSink: Send {
    fn write_frame(&mut self, program_map_pid: u16, frame: &[u8]) -> Result<()>;

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}
