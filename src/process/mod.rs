//! Process model and one-step interpreter.
//!
//! A [`Process`] is the unit of work: an instruction vector parsed at
//! construction, a register/variable state, a memory-residency record
//! and an append-only log. The scheduler advances it one instruction at
//! a time through [`Process::step`].
//!
//! Processes are shared between the ready queue, the owning core and
//! the finished list as [`SharedProcess`] handles; hand-offs happen
//! under the owning list's mutex and the process mutex is always the
//! innermost lock.

pub mod autogen;
pub mod instruction;
pub mod logfile;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Local;

use self::instruction::{expand_print, Instruction, Operand, ProgramLine};
use self::logfile::ProcessLog;

/// Shared handle to a process. The ready queue, a core and the finished
/// list each hold one of these; lookup returns a cheap clone.
pub type SharedProcess = Arc<Mutex<Process>>;

/// Execution state of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Waiting in the ready queue.
    Ready,
    /// Currently assigned to a core.
    Running,
    /// Blocked (kept for parity with the state set; unused by the
    /// current dispatch path).
    Waiting,
    /// Completed execution.
    Finished,
}

impl ProcessState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessState::Ready => "Ready",
            ProcessState::Running => "Running",
            ProcessState::Waiting => "Waiting",
            ProcessState::Finished => "Finished",
        }
    }
}

/// Residency of one virtual page of a process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageResidency {
    /// Page number within the process, starting at 0.
    pub page: usize,
    /// Whether the page is currently backed by a physical frame.
    pub in_memory: bool,
    /// Backing frame number, when resident.
    pub frame: Option<usize>,
}

/// A single simulated process.
#[derive(Debug)]
pub struct Process {
    id: i32,
    name: String,
    state: ProcessState,

    program: Vec<ProgramLine>,
    /// Originally authored instruction count; FOR expansion may grow the
    /// program past this but never grows `remaining` past it.
    total: usize,
    executed: usize,
    remaining: usize,
    pc: usize,

    /// Accumulator register used by auto-generated programs.
    reg_x: i32,
    vars: HashMap<String, u16>,
    memory: HashMap<String, u16>,

    /// Cycles left to sleep before the next instruction may execute.
    pub sleep_cycles: u32,

    /// Total memory requirement in KiB, 0 until bound.
    mem_required_kib: u64,
    page_count: usize,
    pages: Vec<PageResidency>,

    arrival_time: String,
    start_time: String,
    finish_time: String,

    assigned_core: i32,

    log: Option<ProcessLog>,
}

impl Process {
    /// Create a process from an already-parsed program. Arrival time is
    /// stamped immediately.
    pub fn new(id: i32, name: impl Into<String>, program: Vec<ProgramLine>) -> Self {
        let total = program.len();
        Self {
            id,
            name: name.into(),
            state: ProcessState::Ready,
            program,
            total,
            executed: 0,
            remaining: total,
            pc: 0,
            reg_x: 0,
            vars: HashMap::new(),
            memory: HashMap::new(),
            sleep_cycles: 0,
            mem_required_kib: 0,
            page_count: 0,
            pages: Vec::new(),
            arrival_time: wall_clock_string(),
            start_time: String::new(),
            finish_time: String::new(),
            assigned_core: -1,
            log: None,
        }
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub fn set_state(&mut self, state: ProcessState) {
        self.state = state;
    }

    pub fn total_instructions(&self) -> usize {
        self.total
    }

    pub fn executed(&self) -> usize {
        self.executed
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }

    pub fn program_len(&self) -> usize {
        self.program.len()
    }

    pub fn register_x(&self) -> i32 {
        self.reg_x
    }

    pub fn variable(&self, name: &str) -> Option<u16> {
        self.vars.get(name).copied()
    }

    pub fn arrival_time(&self) -> &str {
        &self.arrival_time
    }

    pub fn start_time(&self) -> &str {
        &self.start_time
    }

    pub fn finish_time(&self) -> &str {
        &self.finish_time
    }

    /// Stamp the first-dispatch time once; later dispatches keep it.
    pub fn stamp_start_time(&mut self) {
        if self.start_time.is_empty() {
            self.start_time = wall_clock_string();
        }
    }

    pub fn stamp_finish_time(&mut self) {
        self.finish_time = wall_clock_string();
    }

    pub fn assigned_core(&self) -> i32 {
        self.assigned_core
    }

    pub fn set_assigned_core(&mut self, core: i32) {
        self.assigned_core = core;
    }

    /// A process is finished when it has no work left.
    pub fn is_finished(&self) -> bool {
        self.remaining == 0 || self.executed >= self.program.len()
    }

    /// Completion percentage, 100 for an empty program.
    pub fn progress(&self) -> f32 {
        if self.total == 0 {
            return 100.0;
        }
        self.executed as f32 / self.total as f32 * 100.0
    }

    /// Record a successful memory allocation: total requirement, page
    /// count derived from the frame size, and per-page residency. Paged
    /// allocations pass their frame list; contiguous allocations pass an
    /// empty slice and pages stay frameless.
    pub fn bind_memory(&mut self, required_kib: u64, frame_kib: u64, frames: &[usize]) {
        self.mem_required_kib = required_kib;
        self.page_count = required_kib.div_ceil(frame_kib) as usize;
        self.pages = (0..self.page_count)
            .map(|page| PageResidency {
                page,
                in_memory: true,
                frame: frames.get(page).copied(),
            })
            .collect();
    }

    pub fn mem_required_kib(&self) -> u64 {
        self.mem_required_kib
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn pages(&self) -> &[PageResidency] {
        &self.pages
    }

    /// Mark every page as paged out; called when the process's memory
    /// is released after retirement.
    pub fn evict_pages(&mut self) {
        for page in &mut self.pages {
            page.in_memory = false;
            page.frame = None;
        }
    }

    /// Attach the append-only log sink.
    pub fn attach_log(&mut self, log: ProcessLog) {
        self.log = Some(log);
    }

    pub fn log(&self) -> Option<&ProcessLog> {
        self.log.as_ref()
    }

    /// Append one execution line to the process log, if attached.
    pub fn log_line(&self, timestamp: &str, core_id: u32, message: &str) {
        if let Some(log) = &self.log {
            log.append(timestamp, core_id, message);
        }
    }

    /// Resolve an operand; unknown variables bind to 0.
    fn val(&mut self, operand: &Operand) -> u16 {
        match operand {
            Operand::Literal(v) => *v,
            Operand::Var(name) => *self.vars.entry(name.clone()).or_insert(0),
        }
    }

    /// Execute the current instruction and advance by one.
    ///
    /// Returns the message to log, or `None` when there was nothing
    /// left to execute. FOR lines expand the program in place before
    /// the counters settle, so `executed + remaining == program length`
    /// holds on return.
    pub fn step(&mut self) -> Option<String> {
        if self.is_finished() || self.pc >= self.program.len() {
            return None;
        }

        let line = self.program[self.pc].clone();
        self.executed += 1;
        self.remaining -= 1;

        let message = match &line.op {
            Instruction::SetX { value } => {
                self.reg_x = *value;
                format!("{} | X = {}", line.text, self.reg_x)
            }
            Instruction::AddX { amount } => {
                self.reg_x = self.reg_x.wrapping_add(*amount);
                format!("{} | X = {}", line.text, self.reg_x)
            }
            Instruction::Declare { var, value } => {
                self.vars.insert(var.clone(), *value);
                line.text.clone()
            }
            Instruction::Add { dst, a, b } => {
                let result = self.val(a).wrapping_add(self.val(b));
                self.vars.insert(dst.clone(), result);
                format!("{} | X = {}", line.text, self.reg_x)
            }
            Instruction::Subtract { dst, a, b } => {
                let result = self.val(a).saturating_sub(self.val(b));
                self.vars.insert(dst.clone(), result);
                line.text.clone()
            }
            Instruction::Sleep { cycles } => {
                self.sleep_cycles = (*cycles).max(1);
                line.text.clone()
            }
            Instruction::Write { addr, var } => {
                let value = self.val(&Operand::Var(var.clone()));
                self.memory.insert(addr.clone(), value);
                line.text.clone()
            }
            Instruction::Read { var, addr } => {
                let value = self.memory.get(addr).copied().unwrap_or(0);
                self.vars.insert(var.clone(), value);
                line.text.clone()
            }
            Instruction::Print { text } => expand_print(text, &self.vars),
            Instruction::For { prints } => {
                self.expand_for(*prints);
                line.text.clone()
            }
        };

        self.pc += 1;
        Some(message)
    }

    /// Expand a FOR line: insert up to `prints` PRINT lines right after
    /// the current position, clamped so `remaining` never exceeds the
    /// originally authored total.
    fn expand_for(&mut self, prints: u8) {
        let allowed = self.total.saturating_sub(self.remaining);
        let count = (prints as usize).min(allowed);
        let payload = format!("\"Value from {}!\"", self.name);
        let text = format!("PRINT {}", payload);
        for offset in 0..count {
            self.program.insert(
                self.pc + 1 + offset,
                ProgramLine::new(text.clone(), Instruction::Print { text: payload.clone() }),
            );
        }
        self.remaining += count;
    }

    /// One-line summary used by process listings.
    pub fn compact_line(&self) -> String {
        let core = if self.assigned_core >= 0 {
            self.assigned_core.to_string()
        } else {
            "N/A".to_string()
        };
        format!(
            "{} | Core: {} | {}/{} | {}",
            self.name,
            core,
            self.executed,
            self.total,
            self.state.as_str()
        )
    }

    /// Multi-line detail block used by `screen -r` and `process-smi`.
    pub fn info_block(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("Process: {}\n", self.name));
        out.push_str(&format!("ID: {}\n", self.id));
        out.push_str(&format!("State: {}\n", self.state.as_str()));
        out.push_str(&format!("Instructions: {}/{}\n", self.executed, self.total));
        out.push_str(&format!("Progress: {:.2}%\n", self.progress()));
        if self.mem_required_kib > 0 {
            out.push_str(&format!(
                "Memory: {} KiB ({} pages)\n",
                self.mem_required_kib, self.page_count
            ));
        }
        if !self.arrival_time.is_empty() {
            out.push_str(&format!("Arrival Time: {}\n", self.arrival_time));
        }
        if !self.start_time.is_empty() {
            out.push_str(&format!("Start Time: {}\n", self.start_time));
        }
        if !self.finish_time.is_empty() {
            out.push_str(&format!("Finish Time: {}\n", self.finish_time));
        }
        if self.assigned_core >= 0 {
            out.push_str(&format!("Core: {}\n", self.assigned_core));
        }
        out
    }
}

/// Wall-clock stamp in ctime style, e.g. `Mon Aug  3 09:15:00 2026`.
pub fn wall_clock_string() -> String {
    Local::now().format("%a %b %e %H:%M:%S %Y").to_string()
}

/// Wall-clock stamp used by log lines: `MM/DD/YYYY, HH:MM:SS AM/PM`.
pub fn log_timestamp() -> String {
    Local::now().format("%m/%d/%Y, %I:%M:%S %p").to_string()
}
