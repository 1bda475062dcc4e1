use folio_core::User;
use sqlx::FromRow;

use crate::auth::AuthUser;
use crate::db::Database;
use crate::params;

/// Full `users` row, credentials included. Never serialized.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub base_currency: String,
    pub two_factor_enabled: bool,
    pub two_factor_secret: Option<String>,
    pub two_factor_last_step: Option<i64>,
}

impl UserRow {
    pub fn to_user(&self) -> User {
        User {
            id: self.id,
            email: self.email.clone(),
            name: self.name.clone(),
            base_currency: self.base_currency.clone(),
            two_factor_enabled: self.two_factor_enabled,
        }
    }
}

const USER_COLUMNS: &str = "id, email, password_hash, name, base_currency, \
    two_factor_enabled, two_factor_secret, two_factor_last_step";

pub async fn find_by_id(db: &Database, id: i64) -> Result<Option<UserRow>, sqlx::Error> {
    db.get(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"),
        &params![id],
    )
    .await
}

pub async fn find_by_email(db: &Database, email: &str) -> Result<Option<UserRow>, sqlx::Error> {
    db.get(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"),
        &params![email],
    )
    .await
}

/// Projection attached to authenticated requests.
pub async fn find_auth_user(db: &Database, id: i64) -> Result<Option<AuthUser>, sqlx::Error> {
    db.get(
        "SELECT id, email, name, base_currency FROM users WHERE id = ?",
        &params![id],
    )
    .await
}

pub async fn list_ids_with_currency(db: &Database) -> Result<Vec<(i64, String)>, sqlx::Error> {
    db.all("SELECT id, base_currency FROM users ORDER BY id", &[])
        .await
}

/// Lowercased, trimmed email used as the lookup key.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}
