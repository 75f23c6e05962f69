//! Multi-core process scheduler.
//!
//! The scheduler owns the CPU cores and the three process collections
//! (ready queue, running list, finished list), each behind its own
//! mutex. One virtual cycle is one call to [`Scheduler::tick`]:
//!
//! 1. admit: fill idle cores from the ready queue
//! 2. execute: run one cycle on every busy core
//! 3. retire: move finished processes to the finished list
//! 4. preempt: Round-Robin only, at quantum expiry
//!
//! `start()` spawns a worker that calls `tick()` every 100 ms of wall
//! time; tests call `tick()` directly and never sleep. A second worker
//! mints synthetic processes while generation is enabled.
//!
//! Lock discipline: the scheduler never holds two of its list mutexes
//! at once, and always takes them in queue → running → finished order.
//! A process mutex is only ever the innermost lock.

use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use rand::Rng;

use super::core::CpuCore;
use crate::config::{SchedulerPolicy, SimConfig};
use crate::mem::MemoryManager;
use crate::process::autogen;
use crate::process::logfile::ProcessLog;
use crate::process::{log_timestamp, Process, ProcessState, SharedProcess};

/// Wall-clock duration of one virtual cycle.
pub const CYCLE_PERIOD: Duration = Duration::from_millis(100);

/// Counters snapshot for listings and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerCounts {
    pub ready: usize,
    pub running: usize,
    pub finished: usize,
    /// Total processes ever created (generator + façade).
    pub created: u32,
    pub cycle: u64,
}

/// State of one core, for utilization breakdowns.
#[derive(Debug, Clone)]
pub struct CoreState {
    pub id: u32,
    pub busy: bool,
    pub process_name: Option<String>,
}

struct Inner {
    config: SimConfig,
    memory: Arc<MemoryManager>,
    log_dir: PathBuf,

    cores: Mutex<Vec<CpuCore>>,
    ready: Mutex<VecDeque<SharedProcess>>,
    running: Mutex<Vec<SharedProcess>>,
    finished: Mutex<Vec<SharedProcess>>,

    alive: AtomicBool,
    generating: AtomicBool,
    cycle: AtomicU64,
    next_pid: AtomicI32,

    /// Process ids whose memory has already been released.
    swept: Mutex<HashSet<i32>>,
    started_at: Mutex<Option<Instant>>,
}

/// The scheduler. Clones share the same state, so one handle can drive
/// the cycle worker while another serves the command façade.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    /// Build a scheduler with `config.num_cpu` cores. Process logs are
    /// created under `log_dir`.
    pub fn new(
        config: SimConfig,
        memory: Arc<MemoryManager>,
        log_dir: impl Into<PathBuf>,
    ) -> Self {
        let cores = (0..config.num_cpu).map(CpuCore::new).collect();
        Self {
            inner: Arc::new(Inner {
                config,
                memory,
                log_dir: log_dir.into(),
                cores: Mutex::new(cores),
                ready: Mutex::new(VecDeque::new()),
                running: Mutex::new(Vec::new()),
                finished: Mutex::new(Vec::new()),
                alive: AtomicBool::new(false),
                generating: AtomicBool::new(false),
                cycle: AtomicU64::new(0),
                next_pid: AtomicI32::new(0),
                swept: Mutex::new(HashSet::new()),
                started_at: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.inner.config
    }

    pub fn memory(&self) -> &Arc<MemoryManager> {
        &self.inner.memory
    }

    /// Claim the next process id.
    pub fn allocate_pid(&self) -> i32 {
        self.inner.next_pid.fetch_add(1, Ordering::Relaxed)
    }

    /// Directory where process logs are written.
    pub fn log_dir(&self) -> &std::path::Path {
        &self.inner.log_dir
    }

    /// Enqueue an already-memory-bound process. Duplicate names are
    /// permitted; lookup resolves them most-recent-first.
    pub fn submit(&self, process: SharedProcess) {
        self.inner.ready.lock().unwrap().push_back(process);
    }

    /// Begin the cycle loop on a background worker. Idempotent.
    pub fn start(&self) {
        if self.inner.alive.swap(true, Ordering::SeqCst) {
            return;
        }
        *self.inner.started_at.lock().unwrap() = Some(Instant::now());

        let scheduler = self.clone();
        thread::spawn(move || {
            while scheduler.inner.alive.load(Ordering::SeqCst) {
                scheduler.tick();
                thread::sleep(CYCLE_PERIOD);
            }
        });
    }

    /// Signal the cycle and generator workers to exit. Cooperative: the
    /// cycle worker stops at most one sleep interval later, without
    /// flushing in-flight dispatches. Idempotent.
    pub fn stop(&self) {
        self.inner.alive.store(false, Ordering::SeqCst);
        self.inner.generating.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.inner.alive.load(Ordering::SeqCst)
    }

    /// Enable the background process generator. Idempotent.
    pub fn start_generation(&self) {
        if self.inner.generating.swap(true, Ordering::SeqCst) {
            return;
        }
        let scheduler = self.clone();
        thread::spawn(move || {
            let period = Duration::from_secs(scheduler.inner.config.batch_process_freq);
            loop {
                thread::sleep(period);
                if !scheduler.inner.generating.load(Ordering::SeqCst) {
                    break;
                }
                scheduler.generate_one();
            }
        });
    }

    /// Disable the background generator. Idempotent.
    pub fn stop_generation(&self) {
        self.inner.generating.store(false, Ordering::SeqCst);
    }

    pub fn is_generating(&self) -> bool {
        self.inner.generating.load(Ordering::SeqCst)
    }

    /// Mint one synthetic process: random length in the configured
    /// range, auto-generated program, memory allocated up front, log
    /// initialized, then submitted. Returns `None` when memory is
    /// exhausted (the process is dropped and the failure counted by the
    /// memory manager).
    pub fn generate_one(&self) -> Option<SharedProcess> {
        let config = &self.inner.config;
        let pid = self.allocate_pid();
        let name = format!("Process_{}", pid);

        let mut rng = rand::thread_rng();
        let count = rng.gen_range(config.min_ins..=config.max_ins) as usize;
        let program = autogen::auto_program(&name, count, &mut rng);
        let mem_kib = rng.gen_range(config.min_mem_per_proc..=config.max_mem_per_proc);

        if !self.inner.memory.allocate(pid, &name, mem_kib) {
            log::warn!(
                "dropping generated process {}: memory allocation of {} KiB failed",
                name,
                mem_kib
            );
            return None;
        }
        let record = self.inner.memory.record(pid)?;

        let mut process = Process::new(pid, &name, program);
        process.bind_memory(
            record.required_kib,
            self.inner.memory.frame_kib(),
            &record.frames,
        );
        process.attach_log(ProcessLog::create(&self.inner.log_dir, &name));

        let shared = Arc::new(Mutex::new(process));
        self.submit(shared.clone());
        log::debug!("generated {} ({} instructions)", name, count);
        Some(shared)
    }

    /// Advance the simulation by one virtual cycle.
    ///
    /// This is the loop body of the cycle worker; tests call it
    /// directly to drive virtual time without wall-clock sleeps.
    pub fn tick(&self) {
        let inner = &self.inner;
        inner.cycle.fetch_add(1, Ordering::Relaxed);

        let mut cores = inner.cores.lock().unwrap();

        // Admit: fill idle cores from the queue head.
        for core in cores.iter_mut().filter(|c| c.is_idle()) {
            let next = inner.ready.lock().unwrap().pop_front();
            let Some(process) = next else { break };
            process.lock().unwrap().stamp_start_time();
            core.assign(process.clone());
            inner.running.lock().unwrap().push(process);
        }

        // Execute, then retire or preempt, core by core in id order.
        let timestamp = log_timestamp();
        let policy = inner.config.policy();
        for core in cores.iter_mut() {
            if core.is_idle() {
                continue;
            }
            core.tick(inner.config.delay_per_exec, &timestamp);

            if core.process_finished() {
                if let Some(process) = core.release() {
                    {
                        let mut p = process.lock().unwrap();
                        p.set_state(ProcessState::Finished);
                        p.stamp_finish_time();
                    }
                    remove_handle(&inner.running, &process);
                    inner.finished.lock().unwrap().push(process);
                }
            } else if policy == SchedulerPolicy::RoundRobin
                && core.executed_in_quantum() >= inner.config.quantum_cycles
                && !inner.ready.lock().unwrap().is_empty()
            {
                if let Some(process) = core.release() {
                    process.lock().unwrap().set_state(ProcessState::Ready);
                    remove_handle(&inner.running, &process);
                    inner.ready.lock().unwrap().push_back(process);
                }
            }
        }
    }

    /// Look a process up by name: running list first, then finished,
    /// most recent match wins. The ready queue is not searchable.
    pub fn find(&self, name: &str) -> Option<SharedProcess> {
        let running = self.inner.running.lock().unwrap();
        if let Some(p) = running
            .iter()
            .rev()
            .find(|p| p.lock().unwrap().name() == name)
        {
            return Some(p.clone());
        }
        drop(running);

        let finished = self.inner.finished.lock().unwrap();
        finished
            .iter()
            .rev()
            .find(|p| p.lock().unwrap().name() == name)
            .cloned()
    }

    /// Shallow copy of the running list, safe to iterate lock-free.
    pub fn snapshot_running(&self) -> Vec<SharedProcess> {
        self.inner.running.lock().unwrap().clone()
    }

    /// Shallow copy of the finished list.
    pub fn snapshot_finished(&self) -> Vec<SharedProcess> {
        self.inner.finished.lock().unwrap().clone()
    }

    /// Consistent-enough counters for listings; each list is locked in
    /// queue → running → finished order, one at a time.
    pub fn counts(&self) -> SchedulerCounts {
        let ready = self.inner.ready.lock().unwrap().len();
        let running = self.inner.running.lock().unwrap().len();
        let finished = self.inner.finished.lock().unwrap().len();
        SchedulerCounts {
            ready,
            running,
            finished,
            created: self.inner.next_pid.load(Ordering::Relaxed) as u32,
            cycle: self.inner.cycle.load(Ordering::Relaxed),
        }
    }

    pub fn current_cycle(&self) -> u64 {
        self.inner.cycle.load(Ordering::Relaxed)
    }

    /// Wall-clock time since `start()`, if started.
    pub fn elapsed(&self) -> Option<Duration> {
        self.inner.started_at.lock().unwrap().map(|t| t.elapsed())
    }

    /// Fraction of cores currently busy, in `[0, 1]`.
    pub fn cpu_utilization(&self) -> f64 {
        let cores = self.inner.cores.lock().unwrap();
        if cores.is_empty() {
            return 0.0;
        }
        let busy = cores.iter().filter(|c| !c.is_idle()).count();
        busy as f64 / cores.len() as f64
    }

    pub fn core_count(&self) -> usize {
        self.inner.cores.lock().unwrap().len()
    }

    pub fn active_cores(&self) -> usize {
        self.inner
            .cores
            .lock()
            .unwrap()
            .iter()
            .filter(|c| !c.is_idle())
            .count()
    }

    /// Per-core states for the utilization report.
    pub fn core_states(&self) -> Vec<CoreState> {
        self.inner
            .cores
            .lock()
            .unwrap()
            .iter()
            .map(|core| CoreState {
                id: core.id(),
                busy: !core.is_idle(),
                process_name: core
                    .process()
                    .map(|p| p.lock().unwrap().name().to_string()),
            })
            .collect()
    }

    /// Release memory of every finished process not yet swept, and mark
    /// their pages evicted. Idempotent per process id.
    pub fn sweep_finished(&self) -> usize {
        let finished = self.snapshot_finished();
        let mut swept = self.inner.swept.lock().unwrap();
        let mut released = 0;
        for process in finished {
            let pid = process.lock().unwrap().id();
            if swept.insert(pid) {
                self.inner.memory.deallocate(pid);
                process.lock().unwrap().evict_pages();
                released += 1;
            }
        }
        released
    }
}

/// Drop one handle from the running list by identity.
fn remove_handle(list: &Mutex<Vec<SharedProcess>>, target: &SharedProcess) {
    list.lock()
        .unwrap()
        .retain(|p| !Arc::ptr_eq(p, target));
}
