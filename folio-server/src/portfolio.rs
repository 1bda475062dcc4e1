//! Exchange-rate lookup and portfolio valuation shared by the currency and
//! performance routes and the snapshot job.

use folio_core::{
    now_timestamp, Account, AccountValuation, CurrencyRate, PerformanceSummary, PortfolioSnapshot,
};
use sqlx::FromRow;

use crate::db::Database;
use crate::params;

#[derive(Debug, Clone, FromRow)]
pub struct AccountRow {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub account_type: String,
    pub currency: String,
    pub balance: f64,
    pub created_at: String,
    pub updated_at: String,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Account {
            id: row.id,
            name: row.name,
            account_type: row.account_type,
            currency: row.currency,
            balance: row.balance,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct RateRow {
    pub from_currency: String,
    pub to_currency: String,
    pub rate: f64,
    pub updated_at: String,
}

impl From<RateRow> for CurrencyRate {
    fn from(row: RateRow) -> Self {
        CurrencyRate {
            from_currency: row.from_currency,
            to_currency: row.to_currency,
            rate: row.rate,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct SnapshotRow {
    pub id: i64,
    pub total_value: f64,
    pub currency: String,
    pub recorded_at: String,
}

impl From<SnapshotRow> for PortfolioSnapshot {
    fn from(row: SnapshotRow) -> Self {
        PortfolioSnapshot {
            id: row.id,
            total_value: row.total_value,
            currency: row.currency,
            recorded_at: row.recorded_at,
        }
    }
}

pub async fn user_accounts(db: &Database, user_id: i64) -> Result<Vec<AccountRow>, sqlx::Error> {
    db.all(
        "SELECT id, user_id, name, account_type, currency, balance, created_at, updated_at \
         FROM accounts WHERE user_id = ? ORDER BY id",
        &params![user_id],
    )
    .await
}

/// Rate converting `from` into `to`: 1 for the same currency, the stored pair,
/// or the inverse of the reverse pair.
pub async fn lookup_rate(db: &Database, from: &str, to: &str) -> Result<Option<f64>, sqlx::Error> {
    if from == to {
        return Ok(Some(1.0));
    }

    let direct: Option<(f64,)> = db
        .get(
            "SELECT rate FROM currency_rates WHERE from_currency = ? AND to_currency = ?",
            &params![from, to],
        )
        .await?;
    if let Some((rate,)) = direct {
        return Ok(Some(rate));
    }

    let inverse: Option<(f64,)> = db
        .get(
            "SELECT rate FROM currency_rates WHERE from_currency = ? AND to_currency = ?",
            &params![to, from],
        )
        .await?;
    Ok(inverse.map(|(rate,)| 1.0 / rate))
}

pub async fn summarize(
    db: &Database,
    user_id: i64,
    base_currency: &str,
) -> Result<PerformanceSummary, sqlx::Error> {
    let mut total_value = 0.0;
    let mut accounts = Vec::new();
    let mut unconverted = Vec::new();

    for account in user_accounts(db, user_id).await? {
        let rate = lookup_rate(db, &account.currency, base_currency).await?;
        let converted_value = rate.map(|r| account.balance * r);
        match converted_value {
            Some(value) => total_value += value,
            None => unconverted.push(account.id),
        }
        accounts.push(AccountValuation {
            account_id: account.id,
            name: account.name,
            currency: account.currency,
            balance: account.balance,
            rate,
            converted_value,
        });
    }

    Ok(PerformanceSummary {
        base_currency: base_currency.to_string(),
        total_value,
        accounts,
        unconverted,
    })
}

/// Stores the current total as a snapshot.
pub async fn record_snapshot(
    db: &Database,
    user_id: i64,
    base_currency: &str,
) -> Result<PortfolioSnapshot, sqlx::Error> {
    let summary = summarize(db, user_id, base_currency).await?;
    let recorded_at = now_timestamp();
    let result = db
        .run(
            "INSERT INTO portfolio_snapshots (user_id, total_value, currency, recorded_at) \
             VALUES (?, ?, ?, ?)",
            &params![user_id, summary.total_value, base_currency, recorded_at.as_str()],
        )
        .await?;

    Ok(PortfolioSnapshot {
        id: result.last_insert_id,
        total_value: summary.total_value,
        currency: base_currency.to_string(),
        recorded_at,
    })
}

/// Newest first. Snapshot ids are AUTOINCREMENT, so they follow insertion order.
pub async fn snapshot_history(
    db: &Database,
    user_id: i64,
    limit: u32,
) -> Result<Vec<PortfolioSnapshot>, sqlx::Error> {
    let rows: Vec<SnapshotRow> = db
        .all(
            "SELECT id, total_value, currency, recorded_at FROM portfolio_snapshots \
             WHERE user_id = ? ORDER BY id DESC LIMIT ?",
            &params![user_id, i64::from(limit)],
        )
        .await?;
    Ok(rows.into_iter().map(Into::into).collect())
}
