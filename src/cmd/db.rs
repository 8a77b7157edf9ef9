//! Database setup command: `cutrix init-db`.

use anyhow::{Context, Result};
use cutrix::config::Config;
use cutrix::workshop::server::open_database;
use cutrix::workshop::workers::ensure_admin;

pub fn cmd_init_db(config: &Config) -> Result<()> {
    let db = open_database(config)?;
    println!("Database initialized at {}", config.database.path.display());

    if let Some(password) = &config.bootstrap.admin_password {
        let created = ensure_admin(&db, &config.bootstrap.admin_name, password)
            .context("Failed to bootstrap admin account")?;
        match created {
            Some(admin) => println!("Created admin account '{}'", admin.name),
            None => println!("Admin account already present"),
        }
    }

    Ok(())
}
