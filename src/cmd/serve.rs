//! HTTP server command: `cutrix serve`.

use anyhow::{Result, bail};
use cutrix::config::Config;

pub async fn cmd_serve(config: Config) -> Result<()> {
    let problems = config.validate();
    if !problems.is_empty() {
        bail!("Invalid configuration:\n  - {}", problems.join("\n  - "));
    }

    if config.bootstrap.admin_password.is_none() {
        tracing::debug!("no bootstrap admin password configured; skipping admin bootstrap");
    }

    cutrix::workshop::server::start_server(config).await
}
