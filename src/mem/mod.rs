//! Physical-memory manager.
//!
//! Hands out memory to processes in one of two modes: **paged** (a pool
//! of fixed-size frames) or **contiguous** (a sorted, gap-free block
//! list over `[0, total)`). Placement in contiguous mode follows a
//! first/best/worst-fit policy. Every mutation and every by-value query
//! goes through one manager-wide mutex.
//!
//! Allocation failures are reported as booleans and counted; nothing in
//! here panics or unwinds. When a process's memory is released in paged
//! mode, each owned frame is journaled to the backing store before the
//! frame is cleared.

pub mod backing;
pub mod types;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::config::SimConfig;
use crate::process::wall_clock_string;
use self::backing::BackingStore;
use self::types::{AllocationMode, MemoryBlock, MemoryFrame, PlacementPolicy, ProcessMemoryRecord};

/// Point-in-time statistics snapshot, taken under the manager mutex.
#[derive(Debug, Clone)]
pub struct MemoryStats {
    pub mode: AllocationMode,
    pub policy: PlacementPolicy,
    pub total_kib: u64,
    pub used_kib: u64,
    pub free_kib: u64,
    /// Fraction of total memory in use, in `[0, 1]`.
    pub utilization: f64,
    pub active_processes: usize,
    pub allocation_failures: u64,
    pub frame_kib: u64,
    pub frame_count: usize,
    pub used_frames: usize,
    pub free_frames: usize,
    pub pages_in: u64,
    pub pages_out: u64,
    /// Sum of (allocated - required) over live records; paged mode only.
    pub internal_fragmentation_kib: u64,
    /// Free memory unusable by the largest request; contiguous only.
    pub external_fragmentation_kib: u64,
    pub block_count: usize,
}

#[derive(Debug)]
struct MemState {
    frames: Vec<MemoryFrame>,
    blocks: Vec<MemoryBlock>,
    records: HashMap<i32, ProcessMemoryRecord>,
    used_kib: u64,
    free_kib: u64,
    allocation_failures: u64,
    pages_in: u64,
    pages_out: u64,
}

/// The memory manager. Cheap to share behind an `Arc`; all methods take
/// `&self`.
#[derive(Debug)]
pub struct MemoryManager {
    total_kib: u64,
    frame_kib: u64,
    min_per_proc_kib: u64,
    max_per_proc_kib: u64,
    mode: AllocationMode,
    policy: PlacementPolicy,
    state: Mutex<MemState>,
    backing: BackingStore,
}

impl MemoryManager {
    /// Build a manager from the simulator configuration. The backing
    /// store at `backing_path` is truncated and given its header.
    pub fn new(
        config: &SimConfig,
        mode: AllocationMode,
        policy: PlacementPolicy,
        backing_path: impl Into<PathBuf>,
    ) -> Self {
        let total_kib = config.max_overall_mem;
        let frame_kib = config.mem_per_frame;

        let frames = match mode {
            AllocationMode::Paged => (0..(total_kib / frame_kib) as usize)
                .map(MemoryFrame::new)
                .collect(),
            AllocationMode::Contiguous => Vec::new(),
        };
        let blocks = match mode {
            AllocationMode::Paged => Vec::new(),
            AllocationMode::Contiguous => vec![MemoryBlock::free_block(0, total_kib)],
        };

        Self {
            total_kib,
            frame_kib,
            min_per_proc_kib: config.min_mem_per_proc,
            max_per_proc_kib: config.max_mem_per_proc,
            mode,
            policy,
            state: Mutex::new(MemState {
                frames,
                blocks,
                records: HashMap::new(),
                used_kib: 0,
                free_kib: total_kib,
                allocation_failures: 0,
                pages_in: 0,
                pages_out: 0,
            }),
            backing: BackingStore::create(backing_path, frame_kib, total_kib),
        }
    }

    /// Reserve memory for a process.
    ///
    /// The request is clamped to the configured per-process range. A
    /// process that already owns memory, or a pool without room, yields
    /// `false`; failures are counted.
    pub fn allocate(&self, pid: i32, name: &str, requested_kib: u64) -> bool {
        let mut state = self.state.lock().unwrap();

        if state.records.contains_key(&pid) {
            return false;
        }

        let requested = requested_kib.clamp(self.min_per_proc_kib, self.max_per_proc_kib);
        let mut record = ProcessMemoryRecord {
            process_id: pid,
            process_name: name.to_string(),
            required_kib: requested,
            allocated_at: wall_clock_string(),
            ..Default::default()
        };

        match self.mode {
            AllocationMode::Paged => {
                let pages = requested.div_ceil(self.frame_kib) as usize;
                let chosen: Vec<usize> = state
                    .frames
                    .iter()
                    .filter(|f| f.free)
                    .map(|f| f.number)
                    .take(pages)
                    .collect();
                if chosen.len() < pages {
                    state.allocation_failures += 1;
                    return false;
                }

                for (i, &number) in chosen.iter().enumerate() {
                    let frame = &mut state.frames[number];
                    frame.free = false;
                    frame.owner_id = pid;
                    frame.owner_name = name.to_string();
                    frame.size_kib = if i == pages - 1 {
                        requested - (pages as u64 - 1) * self.frame_kib
                    } else {
                        self.frame_kib
                    };
                    frame.allocated_at = wall_clock_string();
                }

                record.allocated_kib = pages as u64 * self.frame_kib;
                record.page_count = pages;
                record.frames = chosen;
            }
            AllocationMode::Contiguous => {
                let Some(index) = self.pick_block(&state.blocks, requested) else {
                    state.allocation_failures += 1;
                    return false;
                };

                if state.blocks[index].size_kib > requested {
                    let tail = MemoryBlock::free_block(
                        state.blocks[index].start + requested,
                        state.blocks[index].size_kib - requested,
                    );
                    state.blocks.insert(index + 1, tail);
                }
                let block = &mut state.blocks[index];
                block.size_kib = requested;
                block.free = false;
                block.owner_id = pid;
                block.owner_name = name.to_string();
                block.allocated_at = wall_clock_string();

                record.allocated_kib = requested;
                record.start = block.start;
            }
        }

        state.used_kib += record.allocated_kib;
        state.free_kib -= record.allocated_kib;
        state.records.insert(pid, record);
        true
    }

    /// Release a process's memory. `false` when the process owns none.
    ///
    /// Paged mode journals every owned frame to the backing store
    /// first; contiguous mode coalesces adjacent free blocks until
    /// stable. In-memory state is updated even when journaling fails.
    pub fn deallocate(&self, pid: i32) -> bool {
        let mut state = self.state.lock().unwrap();

        let Some(record) = state.records.remove(&pid) else {
            return false;
        };

        match self.mode {
            AllocationMode::Paged => {
                for &number in &record.frames {
                    if self.backing.append_eviction(&state.frames[number]) {
                        state.pages_out += 1;
                    }
                    state.frames[number].clear();
                }
            }
            AllocationMode::Contiguous => {
                if let Some(block) = state.blocks.iter_mut().find(|b| b.owner_id == pid) {
                    block.free = true;
                    block.owner_id = -1;
                    block.owner_name.clear();
                    block.allocated_at.clear();
                }
                coalesce(&mut state.blocks);
            }
        }

        state.used_kib -= record.allocated_kib;
        state.free_kib += record.allocated_kib;
        true
    }

    /// Scan the block list for a free block of at least `size_kib`,
    /// according to the placement policy. Ties go to the lowest index.
    fn pick_block(&self, blocks: &[MemoryBlock], size_kib: u64) -> Option<usize> {
        let mut chosen: Option<(usize, u64)> = None;
        for (i, block) in blocks.iter().enumerate() {
            if !block.free || block.size_kib < size_kib {
                continue;
            }
            match self.policy {
                PlacementPolicy::FirstFit => return Some(i),
                PlacementPolicy::BestFit => {
                    if chosen.map_or(true, |(_, s)| block.size_kib < s) {
                        chosen = Some((i, block.size_kib));
                    }
                }
                PlacementPolicy::WorstFit => {
                    if chosen.map_or(true, |(_, s)| block.size_kib > s) {
                        chosen = Some((i, block.size_kib));
                    }
                }
            }
        }
        chosen.map(|(i, _)| i)
    }

    /// Whether a process currently owns memory.
    pub fn is_allocated(&self, pid: i32) -> bool {
        self.state.lock().unwrap().records.contains_key(&pid)
    }

    /// Copy of a process's allocation record.
    pub fn record(&self, pid: i32) -> Option<ProcessMemoryRecord> {
        self.state.lock().unwrap().records.get(&pid).cloned()
    }

    pub fn mode(&self) -> AllocationMode {
        self.mode
    }

    pub fn policy(&self) -> PlacementPolicy {
        self.policy
    }

    pub fn total_kib(&self) -> u64 {
        self.total_kib
    }

    pub fn frame_kib(&self) -> u64 {
        self.frame_kib
    }

    pub fn min_per_proc_kib(&self) -> u64 {
        self.min_per_proc_kib
    }

    pub fn max_per_proc_kib(&self) -> u64 {
        self.max_per_proc_kib
    }

    pub fn backing_path(&self) -> &Path {
        self.backing.path()
    }

    /// Take a consistent statistics snapshot.
    pub fn stats(&self) -> MemoryStats {
        let state = self.state.lock().unwrap();

        let free_frames = state.frames.iter().filter(|f| f.free).count();
        let internal = state
            .records
            .values()
            .map(|r| r.allocated_kib.saturating_sub(r.required_kib))
            .sum();
        let external = match self.mode {
            AllocationMode::Paged => 0,
            AllocationMode::Contiguous => {
                let free_total: u64 =
                    state.blocks.iter().filter(|b| b.free).map(|b| b.size_kib).sum();
                let largest = state
                    .blocks
                    .iter()
                    .filter(|b| b.free)
                    .map(|b| b.size_kib)
                    .max()
                    .unwrap_or(0);
                free_total.saturating_sub(largest)
            }
        };

        MemoryStats {
            mode: self.mode,
            policy: self.policy,
            total_kib: self.total_kib,
            used_kib: state.used_kib,
            free_kib: state.free_kib,
            utilization: if self.total_kib == 0 {
                0.0
            } else {
                state.used_kib as f64 / self.total_kib as f64
            },
            active_processes: state.records.len(),
            allocation_failures: state.allocation_failures,
            frame_kib: self.frame_kib,
            frame_count: state.frames.len(),
            used_frames: state.frames.len() - free_frames,
            free_frames,
            pages_in: state.pages_in,
            pages_out: state.pages_out,
            internal_fragmentation_kib: internal,
            external_fragmentation_kib: external,
            block_count: state.blocks.len(),
        }
    }

    /// Copy of the frame table (paged mode; empty otherwise).
    pub fn frames_snapshot(&self) -> Vec<MemoryFrame> {
        self.state.lock().unwrap().frames.clone()
    }

    /// Copy of the block list (contiguous mode; empty otherwise).
    pub fn blocks_snapshot(&self) -> Vec<MemoryBlock> {
        self.state.lock().unwrap().blocks.clone()
    }

    /// Copies of all live allocation records.
    pub fn records_snapshot(&self) -> Vec<ProcessMemoryRecord> {
        let mut records: Vec<_> = self.state.lock().unwrap().records.values().cloned().collect();
        records.sort_by_key(|r| r.process_id);
        records
    }
}

/// Merge every adjacent pair of free blocks until none remain.
fn coalesce(blocks: &mut Vec<MemoryBlock>) {
    let mut i = 0;
    while i + 1 < blocks.len() {
        if blocks[i].free && blocks[i + 1].free {
            blocks[i].size_kib += blocks[i + 1].size_kib;
            blocks.remove(i + 1);
        } else {
            i += 1;
        }
    }
}
