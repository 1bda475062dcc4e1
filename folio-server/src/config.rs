use std::{env, fmt::Display, path::PathBuf, str::FromStr, time::Duration};

use anyhow::{anyhow, Context};
use axum::http::HeaderValue;
use tracing::{info, warn};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: PathBuf,
    /// `None` leaves every token operation answering 500
    pub jwt_secret: Option<String>,
    pub jwt_expires_in: Duration,
    pub port: u16,
    pub cors_origin: HeaderValue,
    pub environment: Environment,
    pub last_update_cache_path: PathBuf,
    pub frontend_dir: PathBuf,
    pub refresh_interval: Duration,
    pub schema_path: PathBuf,
}

impl Config {
    /// Reads the process environment.
    pub fn load() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = lookup("JWT_SECRET").filter(|s| !s.trim().is_empty());
        if jwt_secret.is_none() {
            warn!("JWT_SECRET not set, authenticated endpoints will fail");
        }

        let expires_raw: String = try_load(&lookup, "JWT_EXPIRES_IN", "7d")?;
        let jwt_expires_in = parse_duration(&expires_raw)
            .ok_or_else(|| anyhow!("invalid JWT_EXPIRES_IN value: {expires_raw}"))?;

        let origin_raw: String = try_load(&lookup, "CORS_ORIGIN", "http://localhost:3000")?;
        let cors_origin = HeaderValue::from_str(&origin_raw)
            .with_context(|| format!("invalid CORS_ORIGIN value: {origin_raw}"))?;

        let refresh_secs: u64 = try_load(&lookup, "REFRESH_INTERVAL_SECS", "300")?;

        Ok(Self {
            database_path: try_load(&lookup, "DATABASE_PATH", "./data/folio.db")?,
            jwt_secret,
            jwt_expires_in,
            port: try_load(&lookup, "PORT", "3001")?,
            cors_origin,
            environment: try_load(&lookup, "NODE_ENV", "development")?,
            last_update_cache_path: try_load(
                &lookup,
                "LAST_UPDATE_CACHE_PATH",
                "./cache/last_updates.json",
            )?,
            frontend_dir: try_load(&lookup, "FRONTEND_DIR", "./frontend/dist")?,
            refresh_interval: Duration::from_secs(refresh_secs.max(1)),
            schema_path: try_load(&lookup, "SCHEMA_PATH", "./folio-server/migrations/schema.sql")?,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    pub fn jwt_secret(&self) -> Result<&str, AppError> {
        self.jwt_secret
            .as_deref()
            .ok_or_else(|| AppError::Misconfigured("JWT secret is not configured".to_string()))
    }
}

fn try_load<F, T>(lookup: &F, key: &str, default: &str) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    let raw = lookup(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.trim()
        .parse()
        .map_err(|e| anyhow!("invalid {key} value {raw:?}: {e}"))
}

/// Parses "3600", "90s", "30m", "12h" or "7d".
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let (digits, unit) = match raw.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) => raw.split_at(idx),
        None => (raw, "s"),
    };
    let value: u64 = digits.parse().ok()?;
    let secs = match unit {
        "s" => value,
        "m" => value.checked_mul(60)?,
        "h" => value.checked_mul(60 * 60)?,
        "d" => value.checked_mul(24 * 60 * 60)?,
        _ => return None,
    };
    (secs > 0).then(|| Duration::from_secs(secs))
}
