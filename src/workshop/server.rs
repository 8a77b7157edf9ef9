use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::api::{self, AppState};
use super::db::{DbHandle, WorkshopDb};
use super::workers::ensure_admin;
use crate::config::Config;

/// Build the full application router.
pub fn build_router(state: Arc<AppState>, dev_mode: bool) -> Router {
    let app = api::api_router()
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if dev_mode {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}

/// Open (creating if needed) the database file and apply migrations.
pub fn open_database(config: &Config) -> Result<WorkshopDb> {
    let path = &config.database.path;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }
    let db = WorkshopDb::new(path, config.database.busy_timeout())
        .with_context(|| format!("Failed to initialize database at {}", path.display()))?;
    Ok(db)
}

/// Start the workshop server and block until shutdown.
pub async fn start_server(config: Config) -> Result<()> {
    let db = DbHandle::new(open_database(&config)?);

    if let Some(password) = &config.bootstrap.admin_password {
        let guard = db.lock_sync()?;
        ensure_admin(&guard, &config.bootstrap.admin_name, password)
            .context("Failed to bootstrap admin account")?;
        drop(guard);
    }

    let state = Arc::new(AppState { db });
    let app = build_router(state, config.server.dev_mode);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    tracing::info!(
        %local_addr,
        db = %config.database.path.display(),
        dev_mode = config.server.dev_mode,
        "cutrix listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutdown requested"),
        Err(e) => {
            // Without a handler the server can only be killed.
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;

    fn test_router(dev_mode: bool) -> Router {
        let db = WorkshopDb::new_in_memory().unwrap();
        build_router(
            Arc::new(AppState {
                db: DbHandle::new(db),
            }),
            dev_mode,
        )
    }

    #[tokio::test]
    async fn test_router_serves_health() {
        let response = test_router(false)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_dev_mode_adds_cors() {
        let request = || {
            Request::get("/api/styles")
                .header("origin", "http://localhost:5173")
                .body(Body::empty())
                .unwrap()
        };

        let response = test_router(true).oneshot(request()).await.unwrap();
        assert!(response.headers().contains_key("access-control-allow-origin"));

        let response = test_router(false).oneshot(request()).await.unwrap();
        assert!(!response.headers().contains_key("access-control-allow-origin"));
    }

    #[test]
    fn test_open_database_creates_parent_dirs() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut config = Config::default();
        config.database.path = dir.path().join("nested/data/cutrix.db");
        open_database(&config)?;
        assert!(config.database.path.exists());
        Ok(())
    }

    #[test]
    fn test_bootstrap_admin_is_idempotent() -> anyhow::Result<()> {
        let db = WorkshopDb::new_in_memory()?;
        assert!(ensure_admin(&db, "admin", "secret")?.is_some());
        assert!(ensure_admin(&db, "admin", "secret")?.is_none());
        Ok(())
    }
}
