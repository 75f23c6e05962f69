//! Memory-manager data types.

/// How physical memory is organized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationMode {
    /// Fixed-size frames, one process spans several.
    Paged,
    /// Variable-size blocks forming a partition of the address space.
    Contiguous,
}

/// Placement policy for contiguous allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementPolicy {
    /// Lowest-index free block of sufficient size.
    FirstFit,
    /// Smallest sufficient free block.
    BestFit,
    /// Largest sufficient free block.
    WorstFit,
}

impl PlacementPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlacementPolicy::FirstFit => "First-Fit",
            PlacementPolicy::BestFit => "Best-Fit",
            PlacementPolicy::WorstFit => "Worst-Fit",
        }
    }
}

/// One physical frame in paged mode.
#[derive(Debug, Clone)]
pub struct MemoryFrame {
    pub number: usize,
    pub free: bool,
    /// Owning process id, -1 when free.
    pub owner_id: i32,
    pub owner_name: String,
    /// KiB actually occupied; the last frame of an allocation holds the
    /// remainder, every other frame is full.
    pub size_kib: u64,
    /// Allocation stamp, empty when free.
    pub allocated_at: String,
}

impl MemoryFrame {
    pub fn new(number: usize) -> Self {
        Self {
            number,
            free: true,
            owner_id: -1,
            owner_name: String::new(),
            size_kib: 0,
            allocated_at: String::new(),
        }
    }

    /// Return the frame to the free pool.
    pub fn clear(&mut self) {
        self.free = true;
        self.owner_id = -1;
        self.owner_name.clear();
        self.size_kib = 0;
        self.allocated_at.clear();
    }
}

/// One block in contiguous mode. The block list is kept sorted by start
/// address and always partitions the whole address space.
#[derive(Debug, Clone)]
pub struct MemoryBlock {
    pub start: u64,
    pub size_kib: u64,
    pub free: bool,
    pub owner_id: i32,
    pub owner_name: String,
    pub allocated_at: String,
}

impl MemoryBlock {
    pub fn free_block(start: u64, size_kib: u64) -> Self {
        Self {
            start,
            size_kib,
            free: true,
            owner_id: -1,
            owner_name: String::new(),
            allocated_at: String::new(),
        }
    }
}

/// Per-process allocation metadata.
#[derive(Debug, Clone, Default)]
pub struct ProcessMemoryRecord {
    pub process_id: i32,
    pub process_name: String,
    /// KiB the process asked for (after clamping).
    pub required_kib: u64,
    /// KiB actually reserved (whole frames in paged mode).
    pub allocated_kib: u64,
    /// Frames owned in paged mode.
    pub frames: Vec<usize>,
    /// Start address in contiguous mode.
    pub start: u64,
    pub page_count: usize,
    pub allocated_at: String,
}
