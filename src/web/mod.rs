//! # Web - the browser-facing roster
//!
//! The server owns the store and the loaded configuration and hands both to
//! the router as shared state.
//!
//! ```rust,no_run
//! use roster::config::Config;
//! use roster::web::WebServer;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     WebServer::new(config)?.run().await
//! }
//! ```

pub mod context;
pub mod forms;
pub mod render;
pub mod routes;
pub mod views;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use axum::Router;
use log::{info, warn};

use crate::config::Config;
use crate::game::{GameStore, GameStoreBuilder};

pub use context::{require_owner, require_user, RequestContext, ViewError};
pub use routes::{build_router, AppState, SESSION_COOKIE};
pub use views::{Page, Route, ViewResponse, Views};

/// How often stale sessions are swept while serving.
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(15 * 60);

pub struct WebServer {
    config: Arc<Config>,
    store: Arc<GameStore>,
}

impl WebServer {
    /// Open the store named by the configuration.
    pub fn new(config: Config) -> Result<Self> {
        let params = config.security.argon2_params()?;
        let path = config.storage.database_path();
        let store = GameStoreBuilder::new(&path)
            .with_argon2_params(params)
            .open()
            .with_context(|| format!("Failed to open store at {}", path.display()))?;
        Ok(Self {
            config: Arc::new(config),
            store: Arc::new(store),
        })
    }

    pub fn store(&self) -> Arc<GameStore> {
        self.store.clone()
    }

    pub fn router(&self) -> Router {
        build_router(AppState {
            store: self.store.clone(),
            config: self.config.clone(),
        })
    }

    /// Purge stale sessions now and then every [`SESSION_SWEEP_INTERVAL`].
    fn spawn_session_sweeper(&self) -> tokio::task::JoinHandle<()> {
        let store = self.store.clone();
        let timeout = self.config.server.session_timeout;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SESSION_SWEEP_INTERVAL);
            loop {
                ticker.tick().await;
                let store = store.clone();
                let swept = tokio::task::spawn_blocking(move || {
                    store.accounts().purge_expired_sessions(timeout)
                })
                .await;
                match swept {
                    Ok(Ok(0)) => {}
                    Ok(Ok(n)) => info!("Purged {} stale sessions", n),
                    Ok(Err(e)) => warn!("Session purge failed: {}", e),
                    Err(e) => warn!("Session purge task failed: {}", e),
                }
            }
        })
    }

    /// Serve until Ctrl-C.
    pub async fn run(self) -> Result<()> {
        let addr: SocketAddr = self
            .config
            .server
            .bind
            .parse()
            .map_err(|e| anyhow!("Invalid bind address {}: {}", self.config.server.bind, e))?;
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        info!("Roster listening on http://{}", addr);

        let sweeper = self.spawn_session_sweeper();
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Received shutdown signal");
                }
            })
            .await?;
        sweeper.abort();

        info!("Roster server shutdown complete");
        Ok(())
    }
}
