use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::{config::Config, error::AppError, users, AppState};

/// Purpose claim carried by the token that bridges password login and 2FA.
pub const LOGIN_CHALLENGE_PURPOSE: &str = "2fa-login";
pub const LOGIN_CHALLENGE_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub user_id: i64,
    /// Absent on session tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn new(user_id: i64, purpose: Option<&str>, ttl: Duration) -> Self {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        Self {
            user_id,
            purpose: purpose.map(str::to_string),
            iat: now,
            exp: now.saturating_add(i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX)),
        }
    }
}

/// Minimal user projection available to handlers behind `require_auth`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub base_currency: String,
}

pub fn sign(secret: &str, claims: &Claims) -> Result<String, AppError> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(e.into()))
}

/// Verifies signature and expiry. A token is dead the second its `exp` passes.
pub fn verify(secret: &str, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
}

pub fn issue_session_token(config: &Config, user_id: i64) -> Result<String, AppError> {
    let secret = config.jwt_secret()?;
    sign(secret, &Claims::new(user_id, None, config.jwt_expires_in))
}

pub fn issue_login_challenge(config: &Config, user_id: i64) -> Result<String, AppError> {
    let secret = config.jwt_secret()?;
    sign(
        secret,
        &Claims::new(user_id, Some(LOGIN_CHALLENGE_PURPOSE), LOGIN_CHALLENGE_TTL),
    )
}

/// Accepts only an unexpired login challenge issued for `user_id`.
pub fn check_login_challenge(config: &Config, token: &str, user_id: i64) -> Result<(), AppError> {
    let secret = config.jwt_secret()?;
    let rejected = || AppError::Forbidden("Invalid or expired login session".to_string());

    let claims = verify(secret, token).map_err(|e| {
        debug!(error = %e, "login challenge rejected");
        rejected()
    })?;
    if claims.purpose.as_deref() != Some(LOGIN_CHALLENGE_PURPOSE) || claims.user_id != user_id {
        return Err(rejected());
    }
    Ok(())
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Rejects the request unless it carries a valid session token for an existing user.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(req.headers())
        .map(str::to_string)
        .ok_or_else(|| AppError::Unauthorized("Access token required".to_string()))?;

    let secret = state.config.jwt_secret()?;
    let claims = verify(secret, &token).map_err(|e| {
        warn!(error = %e, "token verification failed");
        AppError::Forbidden("Invalid or expired token".to_string())
    })?;
    if claims.purpose.is_some() {
        warn!(user_id = claims.user_id, "non-session token presented");
        return Err(AppError::Forbidden("Invalid or expired token".to_string()));
    }

    let user = users::find_auth_user(&state.db, claims.user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".to_string()))?;

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("Access token required".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn huge_ttl_saturates_instead_of_wrapping() {
        let claims = Claims::new(1, None, Duration::from_secs(u64::MAX));
        assert_eq!(claims.exp, i64::MAX);
        assert!(claims.exp > claims.iat);

        let token = sign("k", &claims).unwrap();
        assert_eq!(verify("k", &token).unwrap().user_id, 1);
    }

    #[test]
    fn expiry_has_no_grace_period() {
        let mut claims = Claims::new(7, None, Duration::from_secs(60));
        claims.exp = claims.iat - 2;
        let token = sign("k", &claims).unwrap();

        let err = verify("k", &token).unwrap_err();
        assert!(matches!(
            err.kind(),
            jsonwebtoken::errors::ErrorKind::ExpiredSignature
        ));
    }
}
