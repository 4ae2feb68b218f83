use crate::error::Result;
use crate::format::FrameSink;
use log::info;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Collects frames in memory. Clones share the same buffers, so a caller can
/// keep one handle while the scan owns another.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    programs: Arc<Mutex<BTreeMap<u16, Vec<u8>>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes written so far for one program.
    pub fn program(&self, program_map_pid: u16) -> Option<Vec<u8>> {
        self.programs.lock().get(&program_map_pid).cloned()
    }

    pub fn program_map_pids(&self) -> Vec<u16> {
        self.programs.lock().keys().copied().collect()
    }
}

impl FrameSink for MemorySink {
    fn write_frame(&mut self, program_map_pid: u16, frame: &[u8]) -> Result<()> {
        self.programs
            .lock()
            .entry(program_map_pid)
            .or_default()
            .extend_from_slice(frame);
        Ok(())
    }
}

/// Writes every program to `<dir>/<program_map_pid>.m2ts`, opening files on
/// first use.
#[derive(Debug)]
pub struct DirectorySink {
    dir: PathBuf,
    files: HashMap<u16, BufWriter<File>>,
}

impl DirectorySink {
    /// Creates `dir` if needed.
    pub fn create(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            files: HashMap::new(),
        })
    }

    pub fn path_for(&self, program_map_pid: u16) -> PathBuf {
        self.dir.join(format!("{}.m2ts", program_map_pid))
    }
}

impl FrameSink for DirectorySink {
    fn write_frame(&mut self, program_map_pid: u16, frame: &[u8]) -> Result<()> {
        if !self.files.contains_key(&program_map_pid) {
            let path = self.path_for(program_map_pid);
            info!("writing program {} to {}", program_map_pid, path.display());
            let file = File::create(&path)?;
            self.files.insert(program_map_pid, BufWriter::new(file));
        }
        if let Some(writer) = self.files.get_mut(&program_map_pid) {
            writer.write_all(frame)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        for writer in self.files.values_mut() {
            writer.flush()?;
        }
        Ok(())
    }
}
