//! Report and snapshot rendering.
//!
//! Every report is derived from mutex-protected shallow snapshots taken
//! by the scheduler and the memory manager; rendering works on copies
//! and holds no locks of its own. Renderers return `String` so they can
//! be unit-tested; the command façade prints them, and the utilization
//! report is additionally persisted to `csopesy-log.txt`.

use std::fs;
use std::io;
use std::path::Path;

use crate::mem::types::AllocationMode;
use crate::mem::MemoryManager;
use crate::sched::Scheduler;

/// How many finished processes `screen-ls` shows.
const FINISHED_TAIL: usize = 10;

/// Process listing: running processes in compact form, ready-queue size
/// (the queue itself stays opaque), and the last few finished.
pub fn screen_ls(scheduler: &Scheduler) -> String {
    let counts = scheduler.counts();
    let mut out = String::new();

    out.push_str("========== PROCESS STATUS ==========\n\n");

    out.push_str("Running Processes:\n");
    let running = scheduler.snapshot_running();
    if running.is_empty() {
        out.push_str("  (None)\n");
    } else {
        for process in &running {
            out.push_str("  ");
            out.push_str(&process.lock().unwrap().compact_line());
            out.push('\n');
        }
    }
    out.push('\n');

    out.push_str(&format!("Ready Queue (Size: {}):\n", counts.ready));
    if counts.ready == 0 {
        out.push_str("  (Empty)\n");
    } else {
        out.push_str(&format!("  {} processes waiting\n", counts.ready));
    }
    out.push('\n');

    let finished = scheduler.snapshot_finished();
    out.push_str(&format!("Finished Processes (Total: {}):\n", finished.len()));
    if finished.is_empty() {
        out.push_str("  (None)\n");
    } else {
        let skip = finished.len().saturating_sub(FINISHED_TAIL);
        for process in &finished[skip..] {
            out.push_str("  ");
            out.push_str(&process.lock().unwrap().compact_line());
            out.push('\n');
        }
        if finished.len() > FINISHED_TAIL {
            out.push_str(&format!("  ... (showing last {})\n", FINISHED_TAIL));
        }
    }

    out.push_str("\n====================================\n");
    out
}

/// Memory statistics in the style of `vmstat`.
pub fn vmstat(memory: &MemoryManager) -> String {
    let stats = memory.stats();
    let mut out = String::new();

    out.push_str("========================================\n");
    out.push_str("VM STATISTICS\n");
    out.push_str("========================================\n\n");

    out.push_str("Memory Overview:\n");
    out.push_str(&format!("Total Memory: {} KiB\n", stats.total_kib));
    out.push_str(&format!("Used Memory: {} KiB\n", stats.used_kib));
    out.push_str(&format!("Free Memory: {} KiB\n", stats.free_kib));
    out.push_str(&format!("Utilization: {:.2}%\n\n", stats.utilization * 100.0));

    out.push_str("Process Statistics:\n");
    out.push_str(&format!("Active Processes: {}\n", stats.active_processes));
    out.push_str(&format!(
        "Allocation Failures: {}\n\n",
        stats.allocation_failures
    ));

    match stats.mode {
        AllocationMode::Paged => {
            out.push_str("Paging Information:\n");
            out.push_str(&format!("Total Frames: {}\n", stats.frame_count));
            out.push_str(&format!("Used Frames: {}\n", stats.used_frames));
            out.push_str(&format!("Free Frames: {}\n", stats.free_frames));
            out.push_str(&format!("Frame Size: {} KiB\n", stats.frame_kib));
            out.push_str(&format!("Pages Paged In: {}\n", stats.pages_in));
            out.push_str(&format!("Pages Paged Out: {}\n", stats.pages_out));
            out.push_str(&format!(
                "Internal Fragmentation: {} KiB\n\n",
                stats.internal_fragmentation_kib
            ));

            let records = memory.records_snapshot();
            if records.is_empty() {
                out.push_str("No processes currently allocated in memory.\n");
            } else {
                out.push_str("Memory Allocations:\n");
                out.push_str("PID\tProcess Name\t\tFrames\tMemory (KiB)\n");
                out.push_str("---\t------------\t\t------\t------------\n");
                for record in records {
                    out.push_str(&format!(
                        "{}\t{:<20}\t{}\t{}\n",
                        record.process_id,
                        truncate_name(&record.process_name),
                        record.frames.len(),
                        record.required_kib
                    ));
                }
            }
        }
        AllocationMode::Contiguous => {
            out.push_str(&format!("Memory Blocks: {}\n", stats.block_count));
            out.push_str(&format!(
                "External Fragmentation: {} KiB\n",
                stats.external_fragmentation_kib
            ));
        }
    }

    out.push_str("\n========================================\n");
    out
}

/// Frame-table or block-list dump (first 20 frames in paged mode).
pub fn memory_map(memory: &MemoryManager) -> String {
    let mut out = String::new();
    out.push_str("========== MEMORY MAP ==========\n");

    match memory.mode() {
        AllocationMode::Paged => {
            let frames = memory.frames_snapshot();
            let free = frames.iter().filter(|f| f.free).count();
            out.push_str("Allocation Type: Paging\n");
            out.push_str(&format!("Frame Size: {} KiB\n", memory.frame_kib()));
            out.push_str(&format!("Total Frames: {}\n", frames.len()));
            out.push_str(&format!("Used Frames: {}\n", frames.len() - free));
            out.push_str(&format!("Free Frames: {}\n\n", free));

            for frame in frames.iter().take(20) {
                if frame.free {
                    out.push_str(&format!("Frame {:>3}: [FREE]\n", frame.number));
                } else {
                    out.push_str(&format!(
                        "Frame {:>3}: [{} (PID:{})]\n",
                        frame.number, frame.owner_name, frame.owner_id
                    ));
                }
            }
            if frames.len() > 20 {
                out.push_str(&format!(
                    "... (showing first 20 of {} frames)\n",
                    frames.len()
                ));
            }
        }
        AllocationMode::Contiguous => {
            out.push_str("Allocation Type: Contiguous\n");
            out.push_str(&format!("Strategy: {}\n\n", memory.policy().as_str()));
            out.push_str("Memory Blocks:\n");
            for block in memory.blocks_snapshot() {
                let span = format!(
                    "Address {:>6} - {:>6} ({:>5} KiB)",
                    block.start,
                    block.start + block.size_kib - 1,
                    block.size_kib
                );
                if block.free {
                    out.push_str(&format!("{}: [FREE]\n", span));
                } else {
                    out.push_str(&format!(
                        "{}: [{} (PID:{})]\n",
                        span, block.owner_name, block.owner_id
                    ));
                }
            }
        }
    }

    out.push_str("================================\n");
    out
}

/// Short memory block appended to the utilization report.
pub fn memory_snapshot(memory: &MemoryManager) -> String {
    let stats = memory.stats();
    let mut out = String::new();
    out.push_str("Memory Statistics:\n");
    out.push_str(&format!("Total Memory: {} KiB\n", stats.total_kib));
    out.push_str(&format!("Used Memory: {} KiB\n", stats.used_kib));
    out.push_str(&format!("Free Memory: {} KiB\n", stats.free_kib));
    out.push_str(&format!("Utilization: {:.2}%\n", stats.utilization * 100.0));
    out.push_str(&format!("Active Processes: {}\n", stats.active_processes));
    if stats.mode == AllocationMode::Paged {
        out.push_str(&format!(
            "Frames Used: {}/{}\n",
            stats.used_frames, stats.frame_count
        ));
        out.push_str(&format!("Pages Paged Out: {}\n", stats.pages_out));
        out.push_str(&format!("Pages Paged In: {}\n", stats.pages_in));
    }
    out
}

/// Full utilization report: CPU usage, core breakdown, process rosters
/// and the memory snapshot.
pub fn utilization_report(scheduler: &Scheduler, memory: &MemoryManager) -> String {
    let counts = scheduler.counts();
    let mut out = String::new();

    out.push_str("========== UTILIZATION REPORT ==========\n");
    out.push_str(&format!(
        "CPU Utilization: {:.2}%\n",
        scheduler.cpu_utilization() * 100.0
    ));
    out.push_str(&format!(
        "Cores Used: {}/{}\n",
        scheduler.active_cores(),
        scheduler.core_count()
    ));
    if let Some(elapsed) = scheduler.elapsed() {
        out.push_str(&format!("Running Time: {} seconds\n", elapsed.as_secs()));
    }
    out.push_str(&format!("Current Cycle: {}\n\n", counts.cycle));

    out.push_str("Core Usage:\n");
    for core in scheduler.core_states() {
        match core.process_name {
            Some(name) => out.push_str(&format!("  Core {}: {}\n", core.id, name)),
            None => out.push_str(&format!("  Core {}: (idle)\n", core.id)),
        }
    }
    out.push('\n');

    out.push_str("Process Statistics:\n");
    out.push_str(&format!("  Total Created: {}\n", counts.created));
    out.push_str(&format!("  Currently Running: {}\n", counts.running));
    out.push_str(&format!("  In Ready Queue: {}\n", counts.ready));
    out.push_str(&format!("  Finished: {}\n\n", counts.finished));

    out.push_str("Running Processes:\n");
    let running = scheduler.snapshot_running();
    if running.is_empty() {
        out.push_str("  (None)\n");
    } else {
        for process in &running {
            out.push_str("  ");
            out.push_str(&process.lock().unwrap().compact_line());
            out.push('\n');
        }
    }
    out.push('\n');

    out.push_str("Finished Processes:\n");
    let finished = scheduler.snapshot_finished();
    if finished.is_empty() {
        out.push_str("  (None)\n");
    } else {
        for process in &finished {
            out.push_str("  ");
            out.push_str(&process.lock().unwrap().compact_line());
            out.push('\n');
        }
    }
    out.push('\n');

    out.push_str(&memory_snapshot(memory));
    out.push_str("========================================\n");
    out
}

/// Persist the utilization report to `path`.
pub fn write_utilization_report(
    path: &Path,
    scheduler: &Scheduler,
    memory: &MemoryManager,
) -> io::Result<()> {
    fs::write(path, utilization_report(scheduler, memory))
}

/// Global system overview: CPU and memory headline plus per-process
/// memory usage.
pub fn process_smi(scheduler: &Scheduler, memory: &MemoryManager) -> String {
    let stats = memory.stats();
    let counts = scheduler.counts();
    let mut out = String::new();

    out.push_str("========== PROCESS-SMI ==========\n");
    out.push_str(&format!(
        "CPU Utilization: {:.2}%\n",
        scheduler.cpu_utilization() * 100.0
    ));
    out.push_str(&format!(
        "Memory Usage: {} KiB / {} KiB ({:.2}%)\n",
        stats.used_kib,
        stats.total_kib,
        stats.utilization * 100.0
    ));
    out.push_str(&format!(
        "Processes: {} running, {} ready, {} finished\n\n",
        counts.running, counts.ready, counts.finished
    ));

    let records = memory.records_snapshot();
    if records.is_empty() {
        out.push_str("No processes currently allocated in memory.\n");
    } else {
        out.push_str("Memory per Process:\n");
        for record in records {
            out.push_str(&format!(
                "  {} (PID:{}) {} KiB\n",
                truncate_name(&record.process_name),
                record.process_id,
                record.required_kib
            ));
        }
    }

    out.push_str("=================================\n");
    out
}

/// Per-process overview for `process-smi <name>`; `None` when the name
/// is unknown.
pub fn process_smi_for(scheduler: &Scheduler, name: &str) -> Option<String> {
    let process = scheduler.find(name)?;
    let p = process.lock().unwrap();
    let mut out = p.info_block();
    if !p.pages().is_empty() {
        out.push_str("Pages:\n");
        for page in p.pages() {
            match (page.in_memory, page.frame) {
                (true, Some(frame)) => {
                    out.push_str(&format!("  page {} -> frame {}\n", page.page, frame))
                }
                (true, None) => out.push_str(&format!("  page {} -> resident\n", page.page)),
                _ => out.push_str(&format!("  page {} -> paged out\n", page.page)),
            }
        }
    }
    Some(out)
}

fn truncate_name(name: &str) -> String {
    if name.len() > 20 {
        format!("{}...", &name[..17])
    } else {
        name.to_string()
    }
}
