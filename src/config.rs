//! Simulator configuration.
//!
//! Configuration lives in a plain key/value text file (one `key value`
//! pair per line, `#` starts a comment). Both kebab-case and snake_case
//! key spellings are accepted; unknown keys are ignored; missing keys
//! keep their defaults. A missing file is not an error: the defaults
//! are used and a warning is logged.
//!
//! # File Format
//!
//! ```text
//! # config.txt
//! num-cpu 4
//! scheduler rr
//! quantum-cycles 5
//! batch-process-freq 3
//! min-ins 100
//! max-ins 1000
//! delay-per-exec 0
//! max-overall-mem 1024
//! mem-per-frame 16
//! min-mem-per-proc 16
//! max-mem-per-proc 128
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use thiserror::Error;

/// Scheduling policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPolicy {
    /// First come, first served; never preempts.
    Fcfs,
    /// Round-Robin with a per-dispatch instruction quantum.
    RoundRobin,
}

impl FromStr for SchedulerPolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fcfs" => Ok(SchedulerPolicy::Fcfs),
            "rr" => Ok(SchedulerPolicy::RoundRobin),
            _ => Err(()),
        }
    }
}

impl fmt::Display for SchedulerPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerPolicy::Fcfs => write!(f, "fcfs"),
            SchedulerPolicy::RoundRobin => write!(f, "rr"),
        }
    }
}

/// A single configuration constraint violation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid scheduler type '{0}' (must be 'fcfs' or 'rr')")]
    BadScheduler(String),

    #[error("invalid number of CPUs ({0}): must be between 1 and 128")]
    BadCpuCount(u32),

    #[error("invalid quantum cycles ({0}): must be at least 1 for Round-Robin")]
    BadQuantum(u32),

    #[error("invalid batch process frequency ({0}): must be at least 1 second")]
    BadBatchFreq(u64),

    #[error("invalid instruction range (min {min}, max {max})")]
    BadInstructionRange { min: u32, max: u32 },

    #[error("invalid total memory ({0} KiB): must be at least 1")]
    BadTotalMemory(u64),

    #[error("invalid frame size ({frame} KiB): must be between 1 and total memory ({total} KiB)")]
    BadFrameSize { frame: u64, total: u64 },

    #[error("invalid per-process memory range (min {min}, max {max}, total {total})")]
    BadProcessMemoryRange { min: u64, max: u64, total: u64 },
}

/// Full simulator configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimConfig {
    /// Number of simulated CPU cores.
    pub num_cpu: u32,
    /// Scheduler selector as read from the file, lowercased.
    pub scheduler: String,
    /// Round-Robin quantum, in executed instructions per dispatch.
    pub quantum_cycles: u32,
    /// Seconds between generated processes.
    pub batch_process_freq: u64,
    /// Instruction-count range for generated programs.
    pub min_ins: u32,
    pub max_ins: u32,
    /// Busy-wait cycles between consecutive instructions.
    pub delay_per_exec: u32,
    /// Total physical memory in KiB.
    pub max_overall_mem: u64,
    /// Frame size in KiB (paged mode).
    pub mem_per_frame: u64,
    /// Per-process memory clamp range in KiB.
    pub min_mem_per_proc: u64,
    pub max_mem_per_proc: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            num_cpu: 4,
            scheduler: "fcfs".to_string(),
            quantum_cycles: 5,
            batch_process_freq: 3,
            min_ins: 100,
            max_ins: 1000,
            delay_per_exec: 0,
            max_overall_mem: 1024,
            mem_per_frame: 16,
            min_mem_per_proc: 16,
            max_mem_per_proc: 128,
        }
    }
}

impl SimConfig {
    /// Load configuration from `path`, falling back to defaults for a
    /// missing or unreadable file.
    pub fn load(path: &Path) -> Self {
        let mut config = Self::default();

        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                log::warn!(
                    "could not open config file {}: {}; using defaults",
                    path.display(),
                    e
                );
                return config;
            }
        };

        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut parts = line.split_whitespace();
            let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
                continue;
            };
            config.apply(key, value);
        }

        config
    }

    /// Apply one key/value pair. Kebab and snake spellings are both
    /// accepted; unknown keys and unparsable values are ignored.
    fn apply(&mut self, key: &str, value: &str) {
        let key = key.replace('_', "-");
        match key.as_str() {
            "num-cpu" => parse_into(&mut self.num_cpu, &key, value),
            "scheduler" | "scheduler-type" => {
                self.scheduler = value.to_ascii_lowercase();
            }
            "quantum-cycles" => parse_into(&mut self.quantum_cycles, &key, value),
            "batch-process-freq" => parse_into(&mut self.batch_process_freq, &key, value),
            "min-ins" | "min-instructions" => parse_into(&mut self.min_ins, &key, value),
            "max-ins" | "max-instructions" => parse_into(&mut self.max_ins, &key, value),
            "delay-per-exec" => parse_into(&mut self.delay_per_exec, &key, value),
            "max-overall-mem" => parse_into(&mut self.max_overall_mem, &key, value),
            "mem-per-frame" => parse_into(&mut self.mem_per_frame, &key, value),
            "min-mem-per-proc" => parse_into(&mut self.min_mem_per_proc, &key, value),
            "max-mem-per-proc" => parse_into(&mut self.max_mem_per_proc, &key, value),
            _ => log::debug!("ignoring unknown config key '{}'", key),
        }
    }

    /// The parsed scheduling policy; falls back to FCFS for an invalid
    /// selector (validation reports the problem separately).
    pub fn policy(&self) -> SchedulerPolicy {
        self.scheduler.parse().unwrap_or(SchedulerPolicy::Fcfs)
    }

    /// Check every constraint, collecting all violations so the caller
    /// can print a complete diagnosis at once.
    pub fn validate(&self) -> Result<(), Vec<ConfigError>> {
        let mut errors = Vec::new();

        let policy = self.scheduler.parse::<SchedulerPolicy>();
        if policy.is_err() {
            errors.push(ConfigError::BadScheduler(self.scheduler.clone()));
        }
        if self.num_cpu < 1 || self.num_cpu > 128 {
            errors.push(ConfigError::BadCpuCount(self.num_cpu));
        }
        if policy == Ok(SchedulerPolicy::RoundRobin) && self.quantum_cycles < 1 {
            errors.push(ConfigError::BadQuantum(self.quantum_cycles));
        }
        if self.batch_process_freq < 1 {
            errors.push(ConfigError::BadBatchFreq(self.batch_process_freq));
        }
        if self.min_ins < 1 || self.max_ins < self.min_ins {
            errors.push(ConfigError::BadInstructionRange {
                min: self.min_ins,
                max: self.max_ins,
            });
        }
        if self.max_overall_mem < 1 {
            errors.push(ConfigError::BadTotalMemory(self.max_overall_mem));
        }
        if self.mem_per_frame < 1 || self.mem_per_frame > self.max_overall_mem {
            errors.push(ConfigError::BadFrameSize {
                frame: self.mem_per_frame,
                total: self.max_overall_mem,
            });
        }
        if self.min_mem_per_proc < 1
            || self.max_mem_per_proc < self.min_mem_per_proc
            || self.max_mem_per_proc > self.max_overall_mem
        {
            errors.push(ConfigError::BadProcessMemoryRange {
                min: self.min_mem_per_proc,
                max: self.max_mem_per_proc,
                total: self.max_overall_mem,
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Human-readable summary printed after `initialize`.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        out.push_str("=== System Configuration ===\n");
        out.push_str(&format!("Number of CPUs: {}\n", self.num_cpu));
        out.push_str("CPU Cycle Time: 100 ms (fixed)\n");
        out.push_str(&format!("Scheduler Type: {}\n", self.scheduler));
        out.push_str(&format!("Quantum Cycles: {}\n", self.quantum_cycles));
        out.push_str(&format!(
            "Batch Process Frequency: {} s\n",
            self.batch_process_freq
        ));
        out.push_str(&format!(
            "Instructions per Process: {}..{}\n",
            self.min_ins, self.max_ins
        ));
        match self.delay_per_exec {
            0 => out.push_str("Delay per Exec: 0 cycles (1 instruction per cycle)\n"),
            d => out.push_str(&format!(
                "Delay per Exec: {} cycles (busy-wait between instructions)\n",
                d
            )),
        }
        out.push_str(&format!("Total Memory: {} KiB\n", self.max_overall_mem));
        out.push_str(&format!("Frame Size: {} KiB\n", self.mem_per_frame));
        out.push_str(&format!(
            "Memory per Process: {}..{} KiB\n",
            self.min_mem_per_proc, self.max_mem_per_proc
        ));
        out.push_str("============================\n");
        out
    }
}

/// Parse `value` into `slot`, logging and keeping the old value on
/// failure.
fn parse_into<T: FromStr + fmt::Display>(slot: &mut T, key: &str, value: &str) {
    match value.parse::<T>() {
        Ok(parsed) => *slot = parsed,
        Err(_) => log::warn!(
            "ignoring bad value '{}' for config key '{}' (keeping {})",
            value,
            key,
            slot
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.txt");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        (dir, path)
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = SimConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.policy(), SchedulerPolicy::Fcfs);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = SimConfig::load(&dir.path().join("nope.txt"));
        assert_eq!(config, SimConfig::default());
    }

    #[test]
    fn test_load_kebab_and_snake_keys() {
        let (_dir, path) = write_config(
            "num-cpu 8\nscheduler RR\nquantum_cycles 2\nmax_overall_mem 2048\n# comment\n",
        );
        let config = SimConfig::load(&path);
        assert_eq!(config.num_cpu, 8);
        assert_eq!(config.scheduler, "rr");
        assert_eq!(config.policy(), SchedulerPolicy::RoundRobin);
        assert_eq!(config.quantum_cycles, 2);
        assert_eq!(config.max_overall_mem, 2048);
        // Untouched keys keep defaults.
        assert_eq!(config.min_ins, 100);
    }

    #[test]
    fn test_load_ignores_unknown_keys_and_bad_values() {
        let (_dir, path) = write_config("warp-speed 9\nnum-cpu lots\n");
        let config = SimConfig::load(&path);
        assert_eq!(config, SimConfig::default());
    }

    #[test]
    fn test_validate_rejects_bad_scheduler() {
        let config = SimConfig {
            scheduler: "sjf".to_string(),
            ..Default::default()
        };
        let errors = config.validate().unwrap_err();
        assert!(errors.contains(&ConfigError::BadScheduler("sjf".to_string())));
    }

    #[test]
    fn test_validate_rejects_cpu_out_of_range() {
        let config = SimConfig {
            num_cpu: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        let config = SimConfig {
            num_cpu: 129,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_quantum_only_matters_for_rr() {
        let fcfs = SimConfig {
            quantum_cycles: 0,
            ..Default::default()
        };
        assert!(fcfs.validate().is_ok());

        let rr = SimConfig {
            scheduler: "rr".to_string(),
            quantum_cycles: 0,
            ..Default::default()
        };
        assert!(rr.validate().is_err());
    }

    #[test]
    fn test_validate_instruction_range() {
        let config = SimConfig {
            min_ins: 50,
            max_ins: 10,
            ..Default::default()
        };
        let errors = config.validate().unwrap_err();
        assert!(errors.contains(&ConfigError::BadInstructionRange { min: 50, max: 10 }));
    }

    #[test]
    fn test_validate_memory_constraints() {
        let config = SimConfig {
            mem_per_frame: 4096,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = SimConfig {
            min_mem_per_proc: 64,
            max_mem_per_proc: 32,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_collects_every_violation() {
        let config = SimConfig {
            num_cpu: 0,
            scheduler: "lottery".to_string(),
            min_ins: 9,
            max_ins: 1,
            ..Default::default()
        };
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_policy_is_case_insensitive() {
        assert_eq!("FCFS".parse::<SchedulerPolicy>(), Ok(SchedulerPolicy::Fcfs));
        assert_eq!("Rr".parse::<SchedulerPolicy>(), Ok(SchedulerPolicy::RoundRobin));
        assert!("mlfq".parse::<SchedulerPolicy>().is_err());
    }
}
