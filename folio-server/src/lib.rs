use std::sync::Arc;
use std::time::Instant;

pub mod auth;
pub mod config;
pub mod controllers;
pub mod db;
pub mod error;
pub mod extract;
pub mod last_update;
pub mod migrate;
pub mod portfolio;
pub mod routes;
pub mod scheduler;
pub mod two_factor;
pub mod users;

pub use config::{Config, Environment};
pub use db::{Database, Param, RunResult, Tx};
pub use error::AppError;
pub use last_update::LastUpdateCache;

/// Shared state handed to every handler, middleware and scheduler job.
pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub last_update: LastUpdateCache,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: Config, db: Database, last_update: LastUpdateCache) -> Arc<Self> {
        Arc::new(Self {
            config,
            db,
            last_update,
            started_at: Instant::now(),
        })
    }
}
