//! Configuration view and validation commands: `cutrix config`.

use std::path::Path;

use anyhow::Result;
use cutrix::config::{Config, DEFAULT_CONFIG_FILE};

use super::super::ConfigCommands;

pub fn cmd_config(
    config: &Config,
    config_path: Option<&Path>,
    command: Option<ConfigCommands>,
) -> Result<()> {
    match command {
        None | Some(ConfigCommands::Show) => {
            match config_path {
                Some(path) => println!("# Config file: {}", path.display()),
                None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                    println!("# Config file: {}", DEFAULT_CONFIG_FILE)
                }
                None => println!("# No config file found; defaults with env/CLI overrides"),
            }
            println!();
            print!("{}", config.render()?);
        }
        Some(ConfigCommands::Validate) => {
            let problems = config.validate();
            if problems.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration problems:");
                for problem in &problems {
                    println!("  - {}", problem);
                }
                anyhow::bail!("{} configuration problem(s) found", problems.len());
            }
        }
        Some(ConfigCommands::Init) => {
            let target = config_path.unwrap_or(Path::new(DEFAULT_CONFIG_FILE));
            if target.exists() {
                println!("{} already exists.", target.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }
            std::fs::write(target, Config::default().render()?)?;
            println!("Created {}", target.display());
        }
    }

    Ok(())
}
