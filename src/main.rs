use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use cutrix::config::{CliOverrides, Config};

mod cmd;

#[derive(Parser)]
#[command(name = "cutrix")]
#[command(version, about = "Cutting-workshop production backend")]
pub struct Cli {
    /// Config file (defaults to ./cutrix.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the JSON API server
    Serve {
        /// Port to serve on
        #[arg(short, long)]
        port: Option<u16>,

        /// Address to bind
        #[arg(long)]
        host: Option<String>,

        /// Database path
        #[arg(long)]
        db_path: Option<PathBuf>,

        /// Enable dev mode (CORS permissive for a local frontend)
        #[arg(long)]
        dev: bool,
    },
    /// Create the database and apply migrations, then exit
    InitDb {
        /// Database path
        #[arg(long)]
        db_path: Option<PathBuf>,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Validate configuration and list any problems
    Validate,
    /// Write a default cutrix.toml
    Init,
}

impl Commands {
    fn overrides(&self) -> CliOverrides {
        match self {
            Commands::Serve {
                port,
                host,
                db_path,
                dev,
            } => CliOverrides {
                host: host.clone(),
                port: *port,
                db_path: db_path.clone(),
                dev_mode: *dev,
            },
            Commands::InitDb { db_path } => CliOverrides {
                db_path: db_path.clone(),
                ..CliOverrides::default()
            },
            Commands::Config { .. } => CliOverrides::default(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // `config init` may target a file that does not exist yet.
    let config = match &cli.command {
        Commands::Config {
            command: Some(ConfigCommands::Init),
        } => Config::default(),
        command => Config::resolve(cli.config.as_deref(), &command.overrides())?,
    };

    let _log_guard = cutrix::observability::init_logging(&config.logging)?;

    match cli.command {
        Commands::Serve { .. } => cmd::cmd_serve(config).await?,
        Commands::InitDb { .. } => cmd::cmd_init_db(&config)?,
        Commands::Config { command } => {
            cmd::cmd_config(&config, cli.config.as_deref(), command)?
        }
    }

    Ok(())
}
