//! A single simulated CPU core.
//!
//! The core is a resource holder: at most one process at a time, plus
//! the two per-dispatch counters the scheduler needs (instructions
//! executed in the current quantum, busy-wait cycles remaining). It
//! never looks at the scheduling policy; preemption and retirement are
//! decided by the scheduler.

use crate::process::{ProcessState, SharedProcess};

/// What happened on one core during one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreTick {
    /// No process assigned.
    Idle,
    /// Process held the core but no instruction advanced (busy-wait
    /// and/or process sleep). No log line is emitted.
    Waited,
    /// One instruction executed and was logged.
    Executed,
}

/// One CPU core.
#[derive(Debug)]
pub struct CpuCore {
    id: u32,
    process: Option<SharedProcess>,
    /// Instructions actually executed on the current dispatch. Busy-wait
    /// cycles do not count; Round-Robin quantum is measured against this.
    executed_in_quantum: u32,
    /// Busy-wait cycles left before the next instruction may execute.
    delay_remaining: u32,
}

impl CpuCore {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            process: None,
            executed_in_quantum: 0,
            delay_remaining: 0,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn is_idle(&self) -> bool {
        self.process.is_none()
    }

    pub fn process(&self) -> Option<&SharedProcess> {
        self.process.as_ref()
    }

    pub fn executed_in_quantum(&self) -> u32 {
        self.executed_in_quantum
    }

    pub fn delay_remaining(&self) -> u32 {
        self.delay_remaining
    }

    /// Give the core a process: marks it Running, records the core id
    /// on it and zeroes both per-dispatch counters.
    pub fn assign(&mut self, process: SharedProcess) {
        {
            let mut p = process.lock().unwrap();
            p.set_state(ProcessState::Running);
            p.set_assigned_core(self.id as i32);
        }
        self.process = Some(process);
        self.executed_in_quantum = 0;
        self.delay_remaining = 0;
    }

    /// Detach the current process, clearing its core assignment and the
    /// per-dispatch counters. Returns the handle for the scheduler to
    /// requeue or retire.
    pub fn release(&mut self) -> Option<SharedProcess> {
        let process = self.process.take();
        if let Some(p) = &process {
            p.lock().unwrap().set_assigned_core(-1);
        }
        self.executed_in_quantum = 0;
        self.delay_remaining = 0;
        process
    }

    /// Run one cycle on this core.
    ///
    /// The process sleep counter and the core busy-wait counter tick
    /// down together; an instruction advances only when both were
    /// already clear. After an instruction executes, the busy-wait
    /// counter is re-armed with `delay_per_exec` if work remains.
    pub fn tick(&mut self, delay_per_exec: u32, timestamp: &str) -> CoreTick {
        let Some(process) = &self.process else {
            return CoreTick::Idle;
        };
        let mut p = process.lock().unwrap();

        let sleeping = p.sleep_cycles > 0;
        if sleeping {
            p.sleep_cycles -= 1;
        }
        let busy = self.delay_remaining > 0;
        if busy {
            self.delay_remaining -= 1;
        }
        if sleeping || busy {
            return CoreTick::Waited;
        }

        match p.step() {
            Some(message) => {
                self.executed_in_quantum += 1;
                if !p.is_finished() && delay_per_exec > 0 {
                    self.delay_remaining = delay_per_exec;
                }
                p.log_line(timestamp, self.id, &message);
                CoreTick::Executed
            }
            // Nothing left to execute (e.g. an empty program); the
            // scheduler will retire the process this same cycle.
            None => CoreTick::Waited,
        }
    }

    /// Whether the assigned process has finished.
    pub fn process_finished(&self) -> bool {
        self.process
            .as_ref()
            .map(|p| p.lock().unwrap().is_finished())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::instruction::{parse_program, Instruction, ProgramLine};
    use crate::process::Process;
    use std::sync::{Arc, Mutex};

    fn shared(program: Vec<ProgramLine>) -> SharedProcess {
        Arc::new(Mutex::new(Process::new(1, "p1", program)))
    }

    fn add_program(n: usize) -> Vec<ProgramLine> {
        (0..n)
            .map(|_| ProgramLine::new("ADD 1", Instruction::AddX { amount: 1 }))
            .collect()
    }

    #[test]
    fn test_idle_core() {
        let mut core = CpuCore::new(0);
        assert!(core.is_idle());
        assert_eq!(core.tick(0, "ts"), CoreTick::Idle);
    }

    #[test]
    fn test_assign_marks_running() {
        let mut core = CpuCore::new(2);
        let p = shared(add_program(1));
        core.assign(p.clone());
        assert!(!core.is_idle());
        assert_eq!(p.lock().unwrap().state(), ProcessState::Running);
        assert_eq!(p.lock().unwrap().assigned_core(), 2);
    }

    #[test]
    fn test_release_clears_assignment() {
        let mut core = CpuCore::new(2);
        let p = shared(add_program(1));
        core.assign(p.clone());
        let released = core.release().unwrap();
        assert!(core.is_idle());
        assert_eq!(released.lock().unwrap().assigned_core(), -1);
        assert_eq!(core.executed_in_quantum(), 0);
    }

    #[test]
    fn test_tick_executes_one_instruction_per_cycle() {
        let mut core = CpuCore::new(0);
        let p = shared(add_program(3));
        core.assign(p.clone());

        for expected in 1..=3u32 {
            assert_eq!(core.tick(0, "ts"), CoreTick::Executed);
            assert_eq!(core.executed_in_quantum(), expected);
        }
        assert!(core.process_finished());
    }

    #[test]
    fn test_busy_wait_spaces_instructions() {
        // delay 2 => one instruction every 3 cycles.
        let mut core = CpuCore::new(0);
        let p = shared(add_program(2));
        core.assign(p.clone());

        assert_eq!(core.tick(2, "ts"), CoreTick::Executed);
        assert_eq!(core.tick(2, "ts"), CoreTick::Waited);
        assert_eq!(core.tick(2, "ts"), CoreTick::Waited);
        assert_eq!(core.tick(2, "ts"), CoreTick::Executed);
        assert!(core.process_finished());
        // Quantum counted instructions, not cycles.
        assert_eq!(core.executed_in_quantum(), 2);
    }

    #[test]
    fn test_no_busy_wait_after_last_instruction() {
        let mut core = CpuCore::new(0);
        let p = shared(add_program(1));
        core.assign(p);
        assert_eq!(core.tick(5, "ts"), CoreTick::Executed);
        assert_eq!(core.delay_remaining(), 0);
    }

    #[test]
    fn test_sleep_blocks_execution() {
        let mut core = CpuCore::new(0);
        let p = shared(parse_program("SLEEP 2; PRINT done"));
        core.assign(p.clone());

        assert_eq!(core.tick(0, "ts"), CoreTick::Executed); // SLEEP 2
        assert_eq!(core.tick(0, "ts"), CoreTick::Waited);
        assert_eq!(core.tick(0, "ts"), CoreTick::Waited);
        assert_eq!(core.tick(0, "ts"), CoreTick::Executed); // PRINT
        assert!(core.process_finished());
    }

    #[test]
    fn test_sleep_and_busy_wait_tick_down_together() {
        // SLEEP 1 with delay 1: both counters drain on the same cycle,
        // so only one cycle separates the instructions.
        let mut core = CpuCore::new(0);
        let p = shared(parse_program("SLEEP 1; PRINT done"));
        core.assign(p.clone());

        assert_eq!(core.tick(1, "ts"), CoreTick::Executed); // SLEEP, arms both
        assert_eq!(core.tick(1, "ts"), CoreTick::Waited); // sleep 1->0, delay 1->0
        assert_eq!(core.tick(1, "ts"), CoreTick::Executed); // PRINT
    }

    #[test]
    fn test_empty_program_waits_for_retirement() {
        let mut core = CpuCore::new(0);
        let p = shared(Vec::new());
        core.assign(p);
        assert_eq!(core.tick(0, "ts"), CoreTick::Waited);
        assert!(core.process_finished());
    }
}
