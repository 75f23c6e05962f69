//! csopesy: a multi-core OS simulator driven by a command shell.

use std::env;

use csopesy::shell::Shell;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    // Optional first non-flag argument overrides the config path.
    let config_path = env::args()
        .skip(1)
        .find(|a| !a.starts_with('-'))
        .unwrap_or_else(|| "config.txt".to_string());

    println!("CSOPESY OS simulator");
    println!("Type 'help' to see available commands.");
    println!("Type 'initialize' to set up the system.");
    println!();

    Shell::new(config_path).run()
}
