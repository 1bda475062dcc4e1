//! Applies a schema file statement by statement. Exits non-zero on the first failure.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use folio_server::{migrate::run_migrations, Config, Database};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    match run().await {
        Ok(count) => {
            info!(count, "migration finished");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("migration failed: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<usize> {
    let config = Config::load().context("load configuration")?;
    let schema_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| config.schema_path.clone());

    let script = tokio::fs::read_to_string(&schema_path)
        .await
        .with_context(|| format!("read schema {:?}", schema_path))?;

    let db = Database::open(&config.database_path)
        .await
        .context("open database")?;
    info!(schema = %schema_path.display(), db = %config.database_path.display(), "running migrations");

    // the connection is closed whether or not the run succeeded
    let result = run_migrations(&db, &script).await;
    db.close().await;

    Ok(result?)
}
