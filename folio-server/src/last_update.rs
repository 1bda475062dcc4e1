//! Remembers when each market data feed was last refreshed, persisted as a
//! small JSON file so the information survives restarts.

use std::io;
use std::path::{Path, PathBuf};

use folio_core::{epoch_millis_to_rfc3339, now_millis, DataSource, LastUpdateTimes};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Data older than this is due for a refresh.
pub const STALE_AFTER_MINUTES: i64 = 30;

const MILLIS_PER_MINUTE: i64 = 60 * 1000;

/// On-disk shape: `{"currency": ms|null, "ibPortfolio": ms|null, "manualInvestments": ms|null}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StoredTimes {
    pub currency: Option<i64>,
    pub ib_portfolio: Option<i64>,
    pub manual_investments: Option<i64>,
}

impl StoredTimes {
    pub fn get(&self, source: DataSource) -> Option<i64> {
        match source {
            DataSource::Currency => self.currency,
            DataSource::IbPortfolio => self.ib_portfolio,
            DataSource::ManualInvestments => self.manual_investments,
        }
    }

    fn set(&mut self, source: DataSource, millis: i64) {
        let slot = match source {
            DataSource::Currency => &mut self.currency,
            DataSource::IbPortfolio => &mut self.ib_portfolio,
            DataSource::ManualInvestments => &mut self.manual_investments,
        };
        *slot = Some(millis);
    }
}

pub struct LastUpdateCache {
    path: PathBuf,
    times: Mutex<StoredTimes>,
}

impl LastUpdateCache {
    /// Loads the cache file. A missing or unreadable file starts from all-null.
    pub async fn init(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let times = load(&path).await;
        info!(path = %path.display(), ?times, "last-update cache initialised");
        Self {
            path,
            times: Mutex::new(times),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Marks `source` as refreshed now and persists all three timestamps.
    pub async fn update(&self, source: DataSource) {
        self.update_at(source, now_millis()).await;
    }

    pub async fn update_at(&self, source: DataSource, millis: i64) {
        // held across the write so concurrent updates cannot drop each other
        let mut times = self.times.lock().await;
        times.set(source, millis);
        if let Err(e) = persist(&self.path, &times).await {
            warn!(path = %self.path.display(), error = %e, "failed to persist last-update cache");
        } else {
            debug!(%source, millis, "last update recorded");
        }
    }

    pub async fn update_currency(&self) {
        self.update(DataSource::Currency).await;
    }

    pub async fn update_ib_portfolio(&self) {
        self.update(DataSource::IbPortfolio).await;
    }

    pub async fn update_manual_investments(&self) {
        self.update(DataSource::ManualInvestments).await;
    }

    pub async fn snapshot(&self) -> StoredTimes {
        *self.times.lock().await
    }

    /// RFC3339 time of the last refresh, or `None` if never refreshed.
    pub async fn last_update(&self, source: DataSource) -> Option<String> {
        self.snapshot()
            .await
            .get(source)
            .and_then(epoch_millis_to_rfc3339)
    }

    pub async fn currency_last_update(&self) -> Option<String> {
        self.last_update(DataSource::Currency).await
    }

    pub async fn ib_portfolio_last_update(&self) -> Option<String> {
        self.last_update(DataSource::IbPortfolio).await
    }

    pub async fn manual_investments_last_update(&self) -> Option<String> {
        self.last_update(DataSource::ManualInvestments).await
    }

    pub async fn all_last_update_times(&self) -> LastUpdateTimes {
        let times = self.snapshot().await;
        LastUpdateTimes {
            currency: times.currency.and_then(epoch_millis_to_rfc3339),
            ib_portfolio: times.ib_portfolio.and_then(epoch_millis_to_rfc3339),
            manual_investments: times.manual_investments.and_then(epoch_millis_to_rfc3339),
        }
    }

    pub async fn minutes_since_update(&self, source: DataSource) -> Option<i64> {
        self.snapshot()
            .await
            .get(source)
            .map(|last| (now_millis() - last) / MILLIS_PER_MINUTE)
    }

    pub async fn needs_refresh(&self, source: DataSource) -> bool {
        self.needs_refresh_at(source, now_millis()).await
    }

    /// Same as `needs_refresh` with an explicit clock.
    pub async fn needs_refresh_at(&self, source: DataSource, now_millis: i64) -> bool {
        match self.snapshot().await.get(source) {
            None => true,
            Some(last) => now_millis - last >= STALE_AFTER_MINUTES * MILLIS_PER_MINUTE,
        }
    }

    /// Flushes the current state to disk.
    pub async fn shutdown(&self) {
        let times = self.times.lock().await;
        match persist(&self.path, &times).await {
            Ok(()) => info!("last-update cache saved"),
            Err(e) => warn!(error = %e, "failed to save last-update cache on shutdown"),
        }
    }
}

async fn load(path: &Path) -> StoredTimes {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!(path = %path.display(), "no last-update cache file yet");
            return StoredTimes::default();
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read last-update cache");
            return StoredTimes::default();
        }
    };

    serde_json::from_str(&raw).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "corrupt last-update cache, resetting");
        StoredTimes::default()
    })
}

/// Writes to a sibling temp file then renames it over the target.
async fn persist(path: &Path, times: &StoredTimes) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_string_pretty(times).map_err(io::Error::other)?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, json).await?;
    tokio::fs::rename(&tmp, path).await
}
