//! Backing-store journal.
//!
//! An append-only text file recording frame evictions when a process's
//! memory is released. The file is truncated and given a three-line
//! header when the manager is constructed; afterwards one `FRAME` line
//! is appended per evicted frame. Journal I/O failures are warned about
//! and never abort deallocation.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Local;

use super::types::MemoryFrame;

/// Append-only journal of frame evictions.
#[derive(Debug)]
pub struct BackingStore {
    path: PathBuf,
}

impl BackingStore {
    /// Truncate the journal and write its header.
    pub fn create(path: impl Into<PathBuf>, frame_kib: u64, total_kib: u64) -> Self {
        let path = path.into();
        if let Err(e) = Self::write_header(&path, frame_kib, total_kib) {
            log::warn!(
                "could not initialize backing store {}: {}",
                path.display(),
                e
            );
        }
        Self { path }
    }

    fn write_header(path: &Path, frame_kib: u64, total_kib: u64) -> io::Result<()> {
        let mut file = File::create(path)?;
        write!(
            file,
            "CSOPESY Backing Store\nFrameSizeKB {}\nMaxMemoryKB {}\n\n",
            frame_kib, total_kib
        )
    }

    /// Append one eviction record for an occupied frame.
    ///
    /// Returns whether the line made it to disk; the in-memory state of
    /// the caller must not depend on the answer.
    pub fn append_eviction(&self, frame: &MemoryFrame) -> bool {
        let stamp = Local::now().format("%a %b %e %H:%M:%S %Y");
        let result = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .and_then(|mut file| {
                writeln!(
                    file,
                    "FRAME {} PID {} NAME {} SIZEKB {} TIME {}",
                    frame.number, frame.owner_id, frame.owner_name, frame.size_kib, stamp
                )
            });
        match result {
            Ok(()) => true,
            Err(e) => {
                log::warn!(
                    "could not append to backing store {}: {}",
                    self.path.display(),
                    e
                );
                false
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn occupied_frame() -> MemoryFrame {
        let mut frame = MemoryFrame::new(4);
        frame.free = false;
        frame.owner_id = 12;
        frame.owner_name = "p12".to_string();
        frame.size_kib = 16;
        frame
    }

    #[test]
    fn test_create_writes_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.txt");
        BackingStore::create(&path, 16, 1024);
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents,
            "CSOPESY Backing Store\nFrameSizeKB 16\nMaxMemoryKB 1024\n\n"
        );
    }

    #[test]
    fn test_append_eviction_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.txt");
        let store = BackingStore::create(&path, 16, 1024);
        assert!(store.append_eviction(&occupied_frame()));
        let contents = std::fs::read_to_string(&path).unwrap();
        let line = contents.lines().last().unwrap();
        assert!(line.starts_with("FRAME 4 PID 12 NAME p12 SIZEKB 16 TIME "));
    }

    #[test]
    fn test_append_to_missing_file_is_nonfatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.txt");
        let store = BackingStore::create(&path, 16, 1024);
        std::fs::remove_file(&path).unwrap();
        assert!(!store.append_eviction(&occupied_frame()));
    }

    #[test]
    fn test_create_truncates_previous_journal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.txt");
        let store = BackingStore::create(&path, 16, 1024);
        store.append_eviction(&occupied_frame());
        BackingStore::create(&path, 16, 1024);
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(!contents.contains("FRAME"));
    }
}
