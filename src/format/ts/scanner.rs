use super::demuxer::{DecodedUnit, DemuxRouter, PidStats, Route};
use super::packet::{TsHeader, TsPacket};
use super::sink::DirectorySink;
use super::types::*;
use crate::config::ScanConfig;
use crate::error::{Result, TsError, Warning};
use crate::format::{FrameProgress, FrameSink, NullObserver, ScanObserver};
use crate::utils::BitCursor;
use chrono::{DateTime, Utc};
use log::{info, warn};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Pulls 188-byte frames out of a byte stream, hunting byte by byte for the
/// sync byte between frames.
#[derive(Debug)]
pub struct FrameReader<R> {
    inner: R,
    skipped_bytes: u64,
}

impl<R: Read> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            skipped_bytes: 0,
        }
    }

    /// Bytes discarded while looking for sync.
    pub fn skipped_bytes(&self) -> u64 {
        self.skipped_bytes
    }

    fn read_byte(&mut self) -> Result<Option<u8>> {
        let mut byte = [0u8; 1];
        loop {
            match self.inner.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(byte[0])),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn fill(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled)
    }

    /// The next frame, `None` at a clean end of stream.
    ///
    /// Fails with [`TsError::Frame`] when the stream ends inside a frame or
    /// after garbage with no sync byte.
    pub fn next_frame(&mut self) -> Result<Option<[u8; TS_PACKET_SIZE]>> {
        let mut skipped = 0u64;
        loop {
            match self.read_byte()? {
                Some(SYNC_BYTE) => break,
                Some(_) => skipped += 1,
                None if skipped == 0 => return Ok(None),
                None => {
                    self.skipped_bytes += skipped;
                    return Err(TsError::Frame(format!(
                        "no sync byte in the last {} bytes",
                        skipped
                    )));
                }
            }
        }
        if skipped > 0 {
            warn!("lost sync, skipped {} bytes", skipped);
            self.skipped_bytes += skipped;
        }

        let mut frame = [0u8; TS_PACKET_SIZE];
        frame[0] = SYNC_BYTE;
        let filled = self.fill(&mut frame[1..])?;
        if filled < TS_PACKET_SIZE - 1 {
            return Err(TsError::Frame(format!(
                "truncated frame: {} of {} bytes",
                filled + 1,
                TS_PACKET_SIZE
            )));
        }
        Ok(Some(frame))
    }
}

/// How a scan ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    Completed,
    /// The stream ended inside a frame or lost sync for good.
    Truncated(String),
    Cancelled,
}

/// Final per-PID report of a scan.
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub frames: u64,
    pub pids: BTreeMap<u16, PidStats>,
    pub skipped_bytes: u64,
    pub unit_errors: u64,
    pub warnings: u64,
    pub crc_errors: u64,
    /// Frames on PIDs not yet tied to any program.
    pub dropped_frames: u64,
    pub outcome: ScanOutcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ScanReport {
    pub fn total_errors(&self) -> u64 {
        self.pids.values().map(|s| s.errors).sum()
    }

    pub fn total_discontinuities(&self) -> u64 {
        self.pids.values().map(|s| s.discontinuities).sum()
    }
}

impl fmt::Display for ScanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (pid, stats) in &self.pids {
            writeln!(
                f,
                "PID {} {} [{:?}]:",
                Pid(*pid),
                pid_description(*pid),
                stats.role
            )?;
            writeln!(f, "    Total packet count : {}", stats.packets)?;
            writeln!(f, "     Packet loss count : {}", stats.discontinuities)?;
            writeln!(f, "       Duplicate count : {}", stats.duplicates)?;
            writeln!(f, "    Packet error count : {}", stats.errors)?;
            writeln!(f, "-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-")?;
        }
        writeln!(
            f,
            "{} frames, {} skipped bytes, {} unit errors, {} warnings, {} CRC errors",
            self.frames, self.skipped_bytes, self.unit_errors, self.warnings, self.crc_errors
        )?;
        let elapsed = self.finished_at - self.started_at;
        write!(
            f,
            "{:?} after {} ms",
            self.outcome,
            elapsed.num_milliseconds()
        )
    }
}

/// Logs progress every `interval` frames plus every warning and unit error.
#[derive(Debug, Clone, Copy)]
pub struct LogObserver {
    interval: u64,
}

impl LogObserver {
    pub fn new(interval: u64) -> Self {
        Self { interval }
    }
}

impl ScanObserver for LogObserver {
    fn on_frame(&mut self, progress: &FrameProgress<'_>) {
        if self.interval == 0 || progress.index % self.interval != 0 {
            return;
        }
        match progress.total {
            Some(total) => info!("[{} / {}] {}", progress.index, total, Pid(progress.pid)),
            None => info!("[{}] {}", progress.index, Pid(progress.pid)),
        }
    }

    fn on_warning(&mut self, pid: u16, warning: &Warning) {
        warn!("{}: {}", Pid(pid), warning);
    }

    fn on_unit_error(&mut self, pid: u16, error: &TsError) {
        warn!("{}: {}", Pid(pid), error);
    }
}

/// Drives a [`DemuxRouter`] over a byte stream, one frame at a time.
pub struct Scanner<R> {
    reader: FrameReader<R>,
    router: DemuxRouter,
    sink: Option<Box<dyn FrameSink>>,
    observer: Box<dyn ScanObserver>,
    cancel: Option<CancellationToken>,
    total_frames: Option<u64>,
    verify_crc: bool,
}

impl Scanner<BufReader<File>> {
    /// Opens a file and derives the frame total from its size.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let total = file.metadata()?.len() / TS_PACKET_SIZE as u64;
        Ok(Self::new(BufReader::new(file)).with_total_frames(total))
    }

    /// Opens a file and applies `config`.
    pub fn from_config(path: impl AsRef<Path>, config: &ScanConfig) -> Result<Self> {
        let mut scanner = Self::open(path.as_ref())?
            .with_observer(Box::new(LogObserver::new(config.progress_interval)))
            .with_crc_verification(config.verify_crc);
        if config.split {
            let dir = config.output_dir_for(path.as_ref());
            scanner = scanner.with_sink(Box::new(DirectorySink::create(dir)?));
        }
        Ok(scanner)
    }
}

impl<R: Read> Scanner<R> {
    pub fn new(inner: R) -> Self {
        Self {
            reader: FrameReader::new(inner),
            router: DemuxRouter::new(),
            sink: None,
            observer: Box::new(NullObserver),
            cancel: None,
            total_frames: None,
            verify_crc: false,
        }
    }

    pub fn with_sink(mut self, sink: Box<dyn FrameSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_observer(mut self, observer: Box<dyn ScanObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Checked once per frame; a cancelled token ends the scan with
    /// [`ScanOutcome::Cancelled`].
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_total_frames(mut self, total: u64) -> Self {
        self.total_frames = Some(total);
        self
    }

    pub fn with_crc_verification(mut self, verify: bool) -> Self {
        self.verify_crc = verify;
        self
    }

    /// Scans to the end of the stream. I/O and sink failures abort with an
    /// error; everything else is counted in the report.
    pub fn run(mut self) -> Result<ScanReport> {
        let started_at = Utc::now();
        info!("scan started");
        let mut frames = 0u64;
        let mut unit_errors = 0u64;
        let mut warnings = 0u64;
        let mut crc_errors = 0u64;
        let mut dropped_frames = 0u64;

        let outcome = loop {
            if self.cancel.as_ref().is_some_and(|t| t.is_cancelled()) {
                info!("scan cancelled after {} frames", frames);
                break ScanOutcome::Cancelled;
            }

            let frame = match self.reader.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break ScanOutcome::Completed,
                Err(TsError::Frame(reason)) => {
                    warn!("scan stopped: {}", reason);
                    break ScanOutcome::Truncated(reason);
                }
                Err(e) => return Err(e),
            };
            let index = frames;
            frames += 1;

            let packet = match TsPacket::parse(&frame) {
                Ok(packet) => packet,
                Err(error) => {
                    let header = TsHeader::decode(&mut BitCursor::from(&frame[..4]))?;
                    self.router.record_damaged(&header);
                    unit_errors += 1;
                    self.observer.on_unit_error(header.pid, &error);
                    self.observer.on_frame(&FrameProgress {
                        index,
                        total: self.total_frames,
                        pid: header.pid,
                        adaptation: None,
                        error: true,
                    });
                    continue;
                }
            };
            let pid = packet.pid();

            let routed = self.router.process(&packet);
            for warning in packet.warnings() {
                warnings += 1;
                self.observer.on_warning(pid, warning);
            }
            match &routed.unit {
                Some(Ok(DecodedUnit::Section(section))) => {
                    for warning in &section.warnings {
                        warnings += 1;
                        self.observer.on_warning(pid, warning);
                    }
                    if self.verify_crc && section.crc_valid() == Some(false) {
                        crc_errors += 1;
                        warn!("{}: CRC mismatch in table {:#04x}", Pid(pid), section.table_id);
                    }
                    self.observer.on_section(pid, section);
                }
                Some(Ok(DecodedUnit::Pes(pes))) => {
                    warnings += pes.warnings.len() as u64;
                    for warning in &pes.warnings {
                        self.observer.on_warning(pid, warning);
                    }
                    self.observer.on_pes(pid, pes);
                }
                Some(Err(error)) => {
                    unit_errors += 1;
                    self.observer.on_unit_error(pid, error);
                }
                None => {}
            }

            match routed.route {
                Route::Drop => dropped_frames += 1,
                Route::Program(program_map_pid) => {
                    if let Some(sink) = self.sink.as_mut() {
                        sink.write_frame(program_map_pid, &frame)?;
                    }
                }
                Route::Broadcast => {
                    if let Some(sink) = self.sink.as_mut() {
                        for &program_map_pid in self.router.program_map_pids() {
                            sink.write_frame(program_map_pid, &frame)?;
                        }
                    }
                }
            }

            self.observer.on_frame(&FrameProgress {
                index,
                total: self.total_frames,
                pid,
                adaptation: packet.adaptation_field.as_ref(),
                error: packet.header.transport_error,
            });
        };

        if let Some(sink) = self.sink.as_mut() {
            sink.flush()?;
        }
        info!("scan finished after {} frames", frames);

        Ok(ScanReport {
            frames,
            skipped_bytes: self.reader.skipped_bytes(),
            pids: self.router.into_stats(),
            unit_errors,
            warnings,
            crc_errors,
            dropped_frames,
            outcome,
            started_at,
            finished_at: Utc::now(),
        })
    }
}

/// Runs `scanner` on tokio's blocking pool so the caller is not held up by
/// file I/O.
///
/// # Panics
///
/// Panics when called outside the context of a Tokio runtime.
pub fn spawn_scan<R>(scanner: Scanner<R>) -> JoinHandle<Result<ScanReport>>
where
    R: Read + Send + 'static,
{
    tokio::task::spawn_blocking(move || scanner.run())
}
