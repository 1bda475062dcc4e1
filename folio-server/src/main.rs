use std::net::SocketAddr;

use anyhow::Context;
use folio_server::{
    migrate, routes,
    scheduler::{RefreshJob, Scheduler, SnapshotJob},
    AppState, Config, Database, LastUpdateCache,
};
use tokio::{net::TcpListener, signal};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info"));
    fmt().with_env_filter(filter).init();

    let config = Config::load().context("load configuration")?;
    info!(environment = ?config.environment, "starting folio");

    let db = Database::open(&config.database_path)
        .await
        .context("open database")?;
    migrate::apply_schema(&db).await.context("apply schema")?;

    let last_update = LastUpdateCache::init(config.last_update_cache_path.clone()).await;
    let refresh_interval = config.refresh_interval;
    let port = config.port;
    let state = AppState::new(config, db, last_update);

    let jobs: Vec<Box<dyn RefreshJob>> = vec![Box::new(SnapshotJob)];
    let scheduler = Scheduler::start(state.clone(), refresh_interval, jobs);

    let app = routes::router(state.clone());
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .context("bind tcp listener")?;
    info!("listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server shutdown")?;

    scheduler.shutdown().await;
    state.last_update.shutdown().await;
    state.db.close().await;
    info!("bye");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("received Ctrl+C, shutting down"),
            Err(e) => {
                warn!(error = %e, "failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("received terminate signal, shutting down");
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
