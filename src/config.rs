//! Layered runtime configuration.
//!
//! Values are resolved in order: built-in defaults, then `cutrix.toml` (or the
//! file passed with `--config`), then `CUTRIX_*` environment variables (after
//! loading a `.env` file), then command-line flags.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "cutrix.toml";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid log format: {} (expected pretty or json)", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Permissive CORS for a locally served frontend.
    #[serde(default)]
    pub dev_mode: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            dev_mode: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    /// How long a writer waits on a locked database file.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("cutrix.db")
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl DatabaseConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    /// When set, JSON logs are also written to a daily-rolling file here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            dir: None,
        }
    }
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct BootstrapConfig {
    #[serde(default = "default_admin_name")]
    pub admin_name: String,
    /// No admin is created at start-up unless this is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_password: Option<String>,
}

fn default_admin_name() -> String {
    "admin".to_string()
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            admin_name: default_admin_name(),
            admin_password: None,
        }
    }
}

impl std::fmt::Debug for BootstrapConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapConfig")
            .field("admin_name", &self.admin_name)
            .field(
                "admin_password",
                &self.admin_password.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
}

/// Command-line values that take precedence over every other layer.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub db_path: Option<PathBuf>,
    pub dev_mode: bool,
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => bail!("{} must be a boolean, got '{}'", key, other),
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse configuration")
    }

    /// Load an explicit file, or `cutrix.toml` in the working directory when
    /// present, or fall back to defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::load(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Resolve the full stack: file, `.env`, process environment, CLI.
    pub fn resolve(path: Option<&Path>, cli: &CliOverrides) -> Result<Self> {
        // A missing .env is normal.
        let _ = dotenvy::dotenv();
        let mut config = Self::load_or_default(path)?;
        config.apply_env_from(|key| std::env::var(key).ok())?;
        config.apply_cli(cli);
        Ok(config)
    }

    /// Overlay environment values read through `lookup`.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("CUTRIX_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("CUTRIX_PORT").or_else(|| lookup("PORT")) {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("Invalid port: '{}'", port))?;
        }
        if let Some(dev) = lookup("CUTRIX_DEV_MODE") {
            self.server.dev_mode = parse_bool("CUTRIX_DEV_MODE", &dev)?;
        }
        if let Some(path) = lookup("CUTRIX_DB_PATH") {
            self.database.path = PathBuf::from(path);
        }
        if let Some(level) = lookup("CUTRIX_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("CUTRIX_LOG_FORMAT") {
            self.logging.format = format.parse().map_err(anyhow::Error::msg)?;
        }
        if let Some(dir) = lookup("CUTRIX_LOG_DIR") {
            self.logging.dir = Some(PathBuf::from(dir));
        }
        if let Some(name) = lookup("CUTRIX_ADMIN_NAME") {
            self.bootstrap.admin_name = name;
        }
        if let Some(password) = lookup("CUTRIX_ADMIN_PASSWORD") {
            self.bootstrap.admin_password = Some(password);
        }
        Ok(())
    }

    pub fn apply_cli(&mut self, cli: &CliOverrides) {
        if let Some(host) = &cli.host {
            self.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            self.server.port = port;
        }
        if let Some(path) = &cli.db_path {
            self.database.path = path.clone();
        }
        if cli.dev_mode {
            self.server.dev_mode = true;
        }
    }

    /// Check values that parse fine but cannot work.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.server.host.trim().is_empty() {
            problems.push("server.host must not be empty".to_string());
        }
        if self.database.path.as_os_str().is_empty() {
            problems.push("database.path must not be empty".to_string());
        }
        if self.bootstrap.admin_name.trim().is_empty() {
            problems.push("bootstrap.admin_name must not be empty".to_string());
        }
        if matches!(&self.bootstrap.admin_password, Some(p) if p.is_empty()) {
            problems.push("bootstrap.admin_password must not be empty when set".to_string());
        }
        problems
    }

    /// TOML rendering with secrets masked, for `cutrix config`.
    pub fn render(&self) -> Result<String> {
        let mut shown = self.clone();
        if shown.bootstrap.admin_password.is_some() {
            shown.bootstrap.admin_password = Some("********".to_string());
        }
        toml::to_string_pretty(&shown).context("Failed to render configuration")
    }
}
