//! Per-process execution log.
//!
//! Each process owns one append-only text file. The file gets a
//! two-line header when the process is created and one line per
//! executed instruction afterwards. Lines are never rewritten. I/O
//! failures are warned about and otherwise ignored: logging must not
//! disturb execution.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Append-only log sink for a single process.
#[derive(Debug, Clone)]
pub struct ProcessLog {
    path: PathBuf,
}

impl ProcessLog {
    /// Create the log file at `dir/<name>.txt`, truncating any previous
    /// run and writing the header.
    pub fn create(dir: &Path, name: &str) -> Self {
        let path = dir.join(format!("{}.txt", name));
        if let Err(e) = fs::create_dir_all(dir) {
            log::warn!("could not create log directory {}: {}", dir.display(), e);
        }
        match File::create(&path) {
            Ok(mut file) => {
                if let Err(e) = write!(file, "Process: {}\nLogs:\n", name) {
                    log::warn!("could not write log header {}: {}", path.display(), e);
                }
            }
            Err(e) => log::warn!("could not create log file {}: {}", path.display(), e),
        }
        Self { path }
    }

    /// Append one execution line: `(timestamp) Core:<id> "<message>"`.
    pub fn append(&self, timestamp: &str, core_id: u32, message: &str) {
        let result = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .and_then(|mut file| {
                writeln!(file, "({}) Core:{} \"{}\"", timestamp, core_id, message)
            });
        if let Err(e) = result {
            log::warn!("could not append to {}: {}", self.path.display(), e);
        }
    }

    /// Path of the underlying file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the full log contents, empty string when unreadable.
    pub fn contents(&self) -> String {
        fs::read_to_string(&self.path).unwrap_or_default()
    }
}
