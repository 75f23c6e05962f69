//! Command façade.
//!
//! One text line in, one action out. The shell owns the scheduler and
//! the memory manager once `initialize` has run; every other
//! system-touching command is refused until then. Unknown commands and
//! bad arguments print a hint and never abort the loop.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use rand::Rng;

use crate::config::SimConfig;
use crate::mem::types::{AllocationMode, PlacementPolicy};
use crate::mem::MemoryManager;
use crate::process::autogen;
use crate::process::instruction::parse_program;
use crate::process::logfile::ProcessLog;
use crate::process::Process;
use crate::report;
use crate::sched::Scheduler;

/// What the caller should do after one dispatched line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellOutcome {
    Continue,
    Exit,
}

/// A parsed `screen` subcommand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScreenCommand {
    /// `screen -s <name> <size>`: auto-generated program.
    Start { name: String, size_kib: u64 },
    /// `screen -c <name> <size> "<instr;…>"`: user-authored program.
    Custom {
        name: String,
        size_kib: u64,
        source: String,
    },
    /// `screen -r <name>`: dump process info and log.
    Attach { name: String },
}

/// The initialized core: scheduler plus memory manager.
pub struct System {
    pub scheduler: Scheduler,
    pub memory: Arc<MemoryManager>,
}

/// Interactive command dispatcher.
pub struct Shell {
    config_path: PathBuf,
    backing_path: PathBuf,
    log_dir: PathBuf,
    report_path: PathBuf,
    system: Option<System>,
}

impl Shell {
    /// Shell with the standard artifact paths in the working directory.
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self::with_paths(
            config_path,
            "csopesy-backing-store.txt",
            "logs",
            "csopesy-log.txt",
        )
    }

    /// Shell with explicit artifact paths (tests point these at a
    /// scratch directory).
    pub fn with_paths(
        config_path: impl Into<PathBuf>,
        backing_path: impl Into<PathBuf>,
        log_dir: impl Into<PathBuf>,
        report_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            config_path: config_path.into(),
            backing_path: backing_path.into(),
            log_dir: log_dir.into(),
            report_path: report_path.into(),
            system: None,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.system.is_some()
    }

    pub fn system(&self) -> Option<&System> {
        self.system.as_ref()
    }

    /// Read commands from stdin until `exit`.
    pub fn run(&mut self) -> anyhow::Result<()> {
        let stdin = io::stdin();
        loop {
            print!("Enter command:  ");
            io::stdout().flush()?;

            let mut line = String::new();
            if stdin.lock().read_line(&mut line)? == 0 {
                break; // EOF behaves like exit
            }
            if self.dispatch(line.trim()) == ShellOutcome::Exit {
                break;
            }
        }
        if let Some(system) = &self.system {
            system.scheduler.stop();
        }
        Ok(())
    }

    /// Execute one command line.
    pub fn dispatch(&mut self, line: &str) -> ShellOutcome {
        let line = line.trim();
        if line.is_empty() {
            return ShellOutcome::Continue;
        }

        match line {
            "initialize" => {
                self.handle_initialize();
                return ShellOutcome::Continue;
            }
            "help" => {
                print_help();
                return ShellOutcome::Continue;
            }
            "clear" => {
                print!("\x1b[2J\x1b[H");
                let _ = io::stdout().flush();
                return ShellOutcome::Continue;
            }
            "exit" => {
                println!("Shutting down OS simulator. Goodbye!");
                return ShellOutcome::Exit;
            }
            _ => {}
        }

        let Some(system) = &self.system else {
            println!("ERROR: System not initialized. Please run 'initialize' first.");
            return ShellOutcome::Continue;
        };

        if line == "screen-ls" {
            print!("{}", report::screen_ls(&system.scheduler));
        } else if let Some(rest) = line.strip_prefix("screen ") {
            match parse_screen_command(rest) {
                Ok(cmd) => self.handle_screen(cmd),
                Err(usage) => println!("{}", usage),
            }
        } else if line == "scheduler-start" {
            system.scheduler.start_generation();
            println!("Automatic process generation started.");
        } else if line == "scheduler-stop" {
            system.scheduler.stop_generation();
            println!("Automatic process generation stopped.");
        } else if line == "report-util" {
            system.scheduler.sweep_finished();
            match report::write_utilization_report(
                &self.report_path,
                &system.scheduler,
                &system.memory,
            ) {
                Ok(()) => println!("Report written to {}", self.report_path.display()),
                Err(e) => eprintln!("WARNING: could not write report: {}", e),
            }
        } else if line == "vmstat" {
            system.scheduler.sweep_finished();
            print!("{}", report::vmstat(&system.memory));
        } else if line == "process-smi" {
            print!("{}", report::process_smi(&system.scheduler, &system.memory));
        } else if let Some(name) = line.strip_prefix("process-smi ") {
            match report::process_smi_for(&system.scheduler, name.trim()) {
                Some(detail) => print!("{}", detail),
                None => println!("Process '{}' not found.", name.trim()),
            }
        } else {
            println!("Unknown command: '{}'", line);
            println!("Type 'help' for available commands.");
        }

        ShellOutcome::Continue
    }

    /// `initialize`: load + validate config, build the memory manager
    /// (paged, first-fit) and the scheduler, start the cycle loop.
    fn handle_initialize(&mut self) {
        if self.system.is_some() {
            println!("System already initialized.");
            return;
        }

        let config = SimConfig::load(&self.config_path);
        if let Err(errors) = config.validate() {
            for error in &errors {
                eprintln!("ERROR: {}", error);
            }
            println!("Initialization refused: fix the configuration and retry.");
            return;
        }

        print!("{}", config.summary());

        let memory = Arc::new(MemoryManager::new(
            &config,
            AllocationMode::Paged,
            PlacementPolicy::FirstFit,
            &self.backing_path,
        ));
        let scheduler = Scheduler::new(config, memory.clone(), &self.log_dir);
        scheduler.start();

        self.system = Some(System { scheduler, memory });
        println!("System initialization complete.");
    }

    fn handle_screen(&self, command: ScreenCommand) {
        let Some(system) = &self.system else { return };

        match command {
            ScreenCommand::Start { name, size_kib } => {
                let config = system.scheduler.config().clone();
                let mut rng = rand::thread_rng();
                let count = rng.gen_range(config.min_ins..=config.max_ins) as usize;
                let program = autogen::auto_program(&name, count, &mut rng);
                self.submit_process(system, &name, size_kib, program);
            }
            ScreenCommand::Custom {
                name,
                size_kib,
                source,
            } => {
                let program = parse_program(&source);
                self.submit_process(system, &name, size_kib, program);
            }
            ScreenCommand::Attach { name } => match system.scheduler.find(&name) {
                Some(process) => {
                    let p = process.lock().unwrap();
                    print!("{}", p.info_block());
                    if let Some(log) = p.log() {
                        println!("--- log ---");
                        print!("{}", log.contents());
                    }
                }
                None => println!("Process '{}' not found.", name),
            },
        }
    }

    /// Allocate memory, build the process, initialize its log and hand
    /// it to the scheduler; then attach (print its info).
    fn submit_process(
        &self,
        system: &System,
        name: &str,
        size_kib: u64,
        program: Vec<crate::process::instruction::ProgramLine>,
    ) {
        let pid = system.scheduler.allocate_pid();
        if !system.memory.allocate(pid, name, size_kib) {
            println!(
                "ERROR: could not allocate {} KiB for process '{}' (memory full or duplicate).",
                size_kib, name
            );
            return;
        }
        let Some(record) = system.memory.record(pid) else {
            return;
        };

        let mut process = Process::new(pid, name, program);
        process.bind_memory(record.required_kib, system.memory.frame_kib(), &record.frames);
        process.attach_log(ProcessLog::create(&self.log_dir, name));
        print!("{}", process.info_block());

        system.scheduler.submit(Arc::new(Mutex::new(process)));
        println!("Process '{}' created and queued.", name);
    }
}

/// Memory sizes given on the command line must be a power of two within
/// `[64, 65536]`.
pub fn valid_mem_size(size_kib: u64) -> bool {
    (64..=65536).contains(&size_kib) && size_kib.is_power_of_two()
}

/// Parse the arguments after `screen `.
pub fn parse_screen_command(rest: &str) -> Result<ScreenCommand, String> {
    let rest = rest.trim();
    let usage_s = "Usage: screen -s <name> <size-kib>".to_string();
    let usage_c = "Usage: screen -c <name> <size-kib> \"<instr; instr; ...>\"".to_string();

    if let Some(args) = rest.strip_prefix("-s ") {
        let mut parts = args.split_whitespace();
        let (Some(name), Some(size)) = (parts.next(), parts.next()) else {
            return Err(usage_s);
        };
        let size_kib: u64 = size.parse().map_err(|_| usage_s.clone())?;
        if !valid_mem_size(size_kib) {
            return Err(format!(
                "ERROR: memory size must be a power of two in [64, 65536] KiB (got {}).",
                size_kib
            ));
        }
        Ok(ScreenCommand::Start {
            name: name.to_string(),
            size_kib,
        })
    } else if let Some(args) = rest.strip_prefix("-c ") {
        let open = args.find('"').ok_or_else(|| usage_c.clone())?;
        let close = args.rfind('"').filter(|&i| i > open).ok_or_else(|| usage_c.clone())?;
        let source = args[open + 1..close].to_string();

        let mut parts = args[..open].split_whitespace();
        let (Some(name), Some(size)) = (parts.next(), parts.next()) else {
            return Err(usage_c);
        };
        let size_kib: u64 = size.parse().map_err(|_| usage_c.clone())?;
        if !valid_mem_size(size_kib) {
            return Err(format!(
                "ERROR: memory size must be a power of two in [64, 65536] KiB (got {}).",
                size_kib
            ));
        }

        let instruction_count = source.split(';').filter(|s| !s.trim().is_empty()).count();
        if instruction_count == 0 || instruction_count > 50 {
            return Err(format!(
                "ERROR: custom programs must hold 1..50 instructions (got {}).",
                instruction_count
            ));
        }

        Ok(ScreenCommand::Custom {
            name: name.to_string(),
            size_kib,
            source,
        })
    } else if let Some(name) = rest.strip_prefix("-r ") {
        let name = name.trim();
        if name.is_empty() {
            return Err("Usage: screen -r <name>".to_string());
        }
        Ok(ScreenCommand::Attach {
            name: name.to_string(),
        })
    } else {
        Err("Usage: screen -s <name> <size> | screen -c <name> <size> \"<program>\" | screen -r <name>".to_string())
    }
}

fn print_help() {
    println!("Available commands:");
    println!("  initialize                         load config and start the system");
    println!("  screen-ls                          list processes");
    println!("  screen -s <name> <size>            create a process (auto program)");
    println!("  screen -c <name> <size> \"<prog>\"   create a process (custom program)");
    println!("  screen -r <name>                   show a process and its log");
    println!("  scheduler-start / scheduler-stop   toggle process generation");
    println!("  report-util                        write the utilization report");
    println!("  vmstat                             memory statistics");
    println!("  process-smi [name]                 system or per-process overview");
    println!("  clear / help / exit");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ProcessState;

    fn temp_shell(config_contents: &str) -> (tempfile::TempDir, Shell) {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.txt");
        std::fs::write(&config_path, config_contents).unwrap();
        let shell = Shell::with_paths(
            &config_path,
            dir.path().join("store.txt"),
            dir.path().join("logs"),
            dir.path().join("report.txt"),
        );
        (dir, shell)
    }

    #[test]
    fn test_valid_mem_size_bounds() {
        assert!(valid_mem_size(64));
        assert!(valid_mem_size(1024));
        assert!(valid_mem_size(65536));
        assert!(!valid_mem_size(32));
        assert!(!valid_mem_size(100));
        assert!(!valid_mem_size(131072));
    }

    #[test]
    fn test_parse_screen_start() {
        let cmd = parse_screen_command("-s worker 256").unwrap();
        assert_eq!(
            cmd,
            ScreenCommand::Start {
                name: "worker".to_string(),
                size_kib: 256
            }
        );
    }

    #[test]
    fn test_parse_screen_start_rejects_bad_size() {
        assert!(parse_screen_command("-s worker 100").is_err());
        assert!(parse_screen_command("-s worker lots").is_err());
        assert!(parse_screen_command("-s worker").is_err());
    }

    #[test]
    fn test_parse_screen_custom() {
        let cmd = parse_screen_command("-c job 128 \"DECLARE x 5; PRINT x\"").unwrap();
        assert_eq!(
            cmd,
            ScreenCommand::Custom {
                name: "job".to_string(),
                size_kib: 128,
                source: "DECLARE x 5; PRINT x".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_screen_custom_instruction_count_limits() {
        assert!(parse_screen_command("-c job 128 \"  ;  \"").is_err());
        let many = vec!["PRINT x"; 51].join("; ");
        assert!(parse_screen_command(&format!("-c job 128 \"{}\"", many)).is_err());
        let fifty = vec!["PRINT x"; 50].join("; ");
        assert!(parse_screen_command(&format!("-c job 128 \"{}\"", fifty)).is_ok());
    }

    #[test]
    fn test_parse_screen_attach() {
        let cmd = parse_screen_command("-r worker").unwrap();
        assert_eq!(
            cmd,
            ScreenCommand::Attach {
                name: "worker".to_string()
            }
        );
    }

    #[test]
    fn test_parse_screen_unknown_flag() {
        assert!(parse_screen_command("-x worker").is_err());
    }

    #[test]
    fn test_commands_refused_before_initialize() {
        let (_dir, mut shell) = temp_shell("num-cpu 1\n");
        assert!(!shell.is_initialized());
        // Must not panic or initialize anything.
        assert_eq!(shell.dispatch("screen-ls"), ShellOutcome::Continue);
        assert_eq!(shell.dispatch("vmstat"), ShellOutcome::Continue);
        assert!(!shell.is_initialized());
    }

    #[test]
    fn test_initialize_with_valid_config() {
        let (_dir, mut shell) = temp_shell("num-cpu 2\nscheduler fcfs\n");
        shell.dispatch("initialize");
        assert!(shell.is_initialized());
        let system = shell.system().unwrap();
        assert_eq!(system.scheduler.config().num_cpu, 2);
        assert!(system.scheduler.is_running());
        system.scheduler.stop();
    }

    #[test]
    fn test_initialize_refuses_invalid_config() {
        let (_dir, mut shell) = temp_shell("num-cpu 0\nscheduler warp\n");
        shell.dispatch("initialize");
        assert!(!shell.is_initialized());
    }

    #[test]
    fn test_screen_s_creates_and_queues_process() {
        let (_dir, mut shell) = temp_shell("num-cpu 1\nmin-ins 5\nmax-ins 5\n");
        shell.dispatch("initialize");
        shell.system().unwrap().scheduler.stop();

        shell.dispatch("screen -s worker 128");
        let system = shell.system().unwrap();
        let counts = system.scheduler.counts();
        assert_eq!(counts.created, 1);
        // Memory was reserved for the new process.
        assert!(system.memory.stats().used_kib > 0);
    }

    #[test]
    fn test_screen_c_runs_custom_program() {
        let (_dir, mut shell) = temp_shell("num-cpu 1\n");
        shell.dispatch("initialize");
        let scheduler = shell.system().unwrap().scheduler.clone();
        scheduler.stop();

        shell.dispatch("screen -c job 128 \"DECLARE x 5; ADD y x x; PRINT y\"");
        // Drive the core synchronously to completion.
        for _ in 0..3 {
            scheduler.tick();
        }
        let process = scheduler.find("job").unwrap();
        let p = process.lock().unwrap();
        assert_eq!(p.state(), ProcessState::Finished);
        assert_eq!(p.variable("y"), Some(10));
        let log = p.log().unwrap().contents();
        assert!(log.lines().any(|l| l.contains("\"10\"")));
    }

    #[test]
    fn test_exit_outcome() {
        let (_dir, mut shell) = temp_shell("");
        assert_eq!(shell.dispatch("exit"), ShellOutcome::Exit);
    }

    #[test]
    fn test_unknown_command_continues() {
        let (_dir, mut shell) = temp_shell("");
        assert_eq!(shell.dispatch("frobnicate"), ShellOutcome::Continue);
    }
}
