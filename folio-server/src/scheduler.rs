//! Background refresh loop. On every tick each registered job whose data
//! source is stale runs once; successful runs are recorded in the
//! last-update cache.

use std::sync::Arc;
use std::time::Duration;

use folio_core::DataSource;
use futures::future::BoxFuture;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::{portfolio, users, AppState};

/// A refresh of one data source.
pub trait RefreshJob: Send + Sync {
    fn source(&self) -> DataSource;

    fn name(&self) -> &'static str;

    fn run<'a>(&'a self, state: &'a AppState) -> BoxFuture<'a, anyhow::Result<()>>;
}

/// Records a portfolio snapshot for every user.
pub struct SnapshotJob;

impl RefreshJob for SnapshotJob {
    fn source(&self) -> DataSource {
        DataSource::ManualInvestments
    }

    fn name(&self) -> &'static str {
        "portfolio-snapshots"
    }

    fn run<'a>(&'a self, state: &'a AppState) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            let owners = users::list_ids_with_currency(&state.db).await?;
            for (user_id, base_currency) in &owners {
                portfolio::record_snapshot(&state.db, *user_id, base_currency).await?;
            }
            debug!(users = owners.len(), "snapshots recorded");
            Ok(())
        })
    }
}

/// Runs every stale job once, in order. Returns how many succeeded.
pub async fn run_cycle(state: &AppState, jobs: &[Box<dyn RefreshJob>]) -> usize {
    let mut refreshed = 0;
    for job in jobs {
        let source = job.source();
        if !state.last_update.needs_refresh(source).await {
            continue;
        }
        match job.run(state).await {
            Ok(()) => {
                state.last_update.update(source).await;
                info!(job = job.name(), %source, "refresh completed");
                refreshed += 1;
            }
            Err(e) => error!(job = job.name(), %source, error = %e, "refresh failed"),
        }
    }
    refreshed
}

pub struct Scheduler;

impl Scheduler {
    pub fn start(
        state: Arc<AppState>,
        period: Duration,
        jobs: Vec<Box<dyn RefreshJob>>,
    ) -> SchedulerHandle {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(period_secs = period.as_secs(), jobs = jobs.len(), "scheduler started");

            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        run_cycle(&state, &jobs).await;
                    }
                }
            }
            info!("scheduler stopped");
        });

        SchedulerHandle {
            stop: Some(stop_tx),
            task,
        }
    }
}

pub struct SchedulerHandle {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stops the loop after the current cycle and waits for it.
    pub async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Err(e) = self.task.await {
            warn!(error = %e, "scheduler task ended abnormally");
        }
    }
}
