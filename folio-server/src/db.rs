//! Thin async accessor over a SQLite pool: `run`, `get` and `all` with
//! positional parameters, plus scoped transactions.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use sqlx::query::{Query, QueryAs};
use sqlx::sqlite::{
    SqliteArguments, SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteQueryResult,
    SqliteRow,
};
use sqlx::{FromRow, Sqlite, Transaction};
use tracing::{debug, info};

/// A positional SQL parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Int(i64),
    Real(f64),
    Text(String),
    Null,
}

impl From<i64> for Param {
    fn from(v: i64) -> Self {
        Param::Int(v)
    }
}

impl From<f64> for Param {
    fn from(v: f64) -> Self {
        Param::Real(v)
    }
}

impl From<&str> for Param {
    fn from(v: &str) -> Self {
        Param::Text(v.to_string())
    }
}

impl From<String> for Param {
    fn from(v: String) -> Self {
        Param::Text(v)
    }
}

impl From<&String> for Param {
    fn from(v: &String) -> Self {
        Param::Text(v.clone())
    }
}

impl<T: Into<Param>> From<Option<T>> for Param {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Param::Null)
    }
}

/// Builds a `Vec<Param>` from heterogeneous values.
#[macro_export]
macro_rules! params {
    () => { Vec::<$crate::db::Param>::new() };
    ($($value:expr),+ $(,)?) => { vec![$($crate::db::Param::from($value)),+] };
}

/// Outcome of a write statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunResult {
    pub last_insert_id: i64,
    pub changes: u64,
}

impl From<SqliteQueryResult> for RunResult {
    fn from(result: SqliteQueryResult) -> Self {
        Self {
            last_insert_id: result.last_insert_rowid(),
            changes: result.rows_affected(),
        }
    }
}

fn bind<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    params: &'q [Param],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for param in params {
        query = match param {
            Param::Int(v) => query.bind(*v),
            Param::Real(v) => query.bind(*v),
            Param::Text(v) => query.bind(v.as_str()),
            // NULL senza tipo: sqlite lo accetta per qualsiasi colonna
            Param::Null => query.bind(None::<i64>),
        };
    }
    query
}

/* stessa cosa di `bind`, ma per le query che mappano le righe in un tipo */
fn bind_as<'q, T>(
    mut query: QueryAs<'q, Sqlite, T, SqliteArguments<'q>>,
    params: &'q [Param],
) -> QueryAs<'q, Sqlite, T, SqliteArguments<'q>> {
    for param in params {
        query = match param {
            Param::Int(v) => query.bind(*v),
            Param::Real(v) => query.bind(*v),
            Param::Text(v) => query.bind(v.as_str()),
            Param::Null => query.bind(None::<i64>),
        };
    }
    query
}

/// Creates the parent directories of a database file if they are missing.
pub fn prepare_db_path(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create parent dirs for {:?}", parent))?;
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens (creating if needed) the SQLite file with foreign keys enforced.
    pub async fn open(path: &Path) -> anyhow::Result<Self> {
        // crea le directory genitrici se non esistono
        prepare_db_path(path)?;

        // foreign keys are per-connection in SQLite, so every pooled connection gets the pragma
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .with_context(|| format!("connect to sqlite at {:?}", path))?;

        info!(path = %path.display(), "database opened");
        Ok(Self { pool })
    }

    pub async fn run(&self, sql: &str, params: &[Param]) -> Result<RunResult, sqlx::Error> {
        debug!(sql, "run");
        /* execute non ritorna righe, solo last_insert_rowid e rows_affected */
        let result = bind(sqlx::query(sql), params).execute(&self.pool).await?;
        Ok(result.into())
    }

    pub async fn get<T>(&self, sql: &str, params: &[Param]) -> Result<Option<T>, sqlx::Error>
    where
        T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
    {
        // fetch_optional: Ok(None) se la query non ritorna righe
        bind_as(sqlx::query_as::<_, T>(sql), params)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn all<T>(&self, sql: &str, params: &[Param]) -> Result<Vec<T>, sqlx::Error>
    where
        T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
    {
        bind_as(sqlx::query_as::<_, T>(sql), params)
            .fetch_all(&self.pool)
            .await
    }

    /// Starts a transaction. It rolls back when dropped without `commit`.
    pub async fn begin(&self) -> Result<Tx, sqlx::Error> {
        Ok(Tx {
            inner: self.pool.begin().await?,
        })
    }

    /// True when a connection can be acquired.
    pub async fn health(&self) -> bool {
        // fails once the pool is closed
        self.pool.acquire().await.is_ok()
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("database closed");
    }
}

/// A transaction scoped to one pooled connection.
pub struct Tx {
    inner: Transaction<'static, Sqlite>,
}

impl Tx {
    pub async fn run(&mut self, sql: &str, params: &[Param]) -> Result<RunResult, sqlx::Error> {
        let result = bind(sqlx::query(sql), params)
            .execute(&mut *self.inner)
            .await?;
        Ok(result.into())
    }

    pub async fn all<T>(&mut self, sql: &str, params: &[Param]) -> Result<Vec<T>, sqlx::Error>
    where
        T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
    {
        bind_as(sqlx::query_as::<_, T>(sql), params)
            .fetch_all(&mut *self.inner)
            .await
    }

    /// Without a commit the transaction is rolled back when `Tx` is dropped.
    pub async fn commit(self) -> Result<(), sqlx::Error> {
        self.inner.commit().await
    }
}
