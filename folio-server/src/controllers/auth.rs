use std::sync::Arc;

use anyhow::anyhow;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use axum::{extract::State, http::StatusCode, Json};
use folio_core::{
    models::currency::is_currency_code, now_timestamp, AuthResponse, LoginRequest, LoginResponse,
    RegisterRequest, TwoFactorChallenge, User,
};
use rand::rngs::OsRng;
use tracing::{info, warn};

use crate::{
    auth::{issue_login_challenge, issue_session_token, AuthUser},
    error::AppError,
    extract::ApiJson,
    params,
    users::{self, normalize_email},
    AppState,
};

const MIN_PASSWORD_LEN: usize = 8;
const DEFAULT_BASE_CURRENCY: &str = "EUR";

fn argon2() -> Argon2<'static> {
    Argon2::new(Algorithm::Argon2id, Version::V0x13, Params::default())
}

async fn hash_password(password: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || {
        // salt casuale per ogni password
        let salt = SaltString::generate(&mut OsRng);
        argon2()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| anyhow!("hash password: {e}"))
    })
    .await
    .map_err(|e| AppError::Internal(e.into()))?
    .map_err(AppError::Internal)
}

async fn verify_password(password: String, stored_hash: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || -> anyhow::Result<bool> {
        /* l'hash salvato contiene algoritmo, parametri e salt in formato PHC */
        let parsed = PasswordHash::new(&stored_hash).map_err(|e| anyhow!("parse hash: {e}"))?;
        Ok(argon2()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    })
    .await
    .map_err(|e| AppError::Internal(e.into()))?
    .map_err(AppError::Internal)
}

/// Handler for POST /api/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    // validazione input
    let email = normalize_email(&req.email);
    if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
        return Err(AppError::BadRequest("A valid email is required".to_string()));
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::BadRequest("Name is required".to_string()));
    }
    let base_currency = req
        .base_currency
        .as_deref()
        .map(|c| c.trim().to_ascii_uppercase())
        .unwrap_or_else(|| DEFAULT_BASE_CURRENCY.to_string());
    if !is_currency_code(&base_currency) {
        return Err(AppError::BadRequest("Invalid base currency".to_string()));
    }

    // controllo se l'email esiste già
    if users::find_by_email(&state.db, &email).await?.is_some() {
        return Err(AppError::Conflict("Email already registered".to_string()));
    }

    // hash della password, poi inserisci
    let password_hash = hash_password(req.password).await?;
    let result = state
        .db
        .run(
            "INSERT INTO users (email, password_hash, name, base_currency, created_at) \
             VALUES (?, ?, ?, ?, ?)",
            &params![
                email.as_str(),
                password_hash,
                name.as_str(),
                base_currency.as_str(),
                now_timestamp()
            ],
        )
        .await?;

    let user = User {
        id: result.last_insert_id,
        email,
        name,
        base_currency,
        two_factor_enabled: false,
    };
    /* creazione della risposta: il nuovo utente è già loggato */
    let token = issue_session_token(&state.config, user.id)?;
    info!(user_id = user.id, "user registered");

    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

/// Handler for POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let invalid = || AppError::Unauthorized("Invalid email or password".to_string());

    // cerca utente; email sconosciuta e password errata danno lo stesso errore
    let row = users::find_by_email(&state.db, &normalize_email(&req.email))
        .await?
        .ok_or_else(invalid)?;
    if !verify_password(req.password, row.password_hash.clone()).await? {
        warn!(user_id = row.id, "failed login attempt");
        return Err(invalid());
    }

    /* con la 2FA attiva niente sessione: solo un token di challenge per /api/2fa/verify-login */
    if row.two_factor_enabled {
        let login_token = issue_login_challenge(&state.config, row.id)?;
        info!(user_id = row.id, "password accepted, awaiting second factor");
        return Ok(Json(LoginResponse::TwoFactorRequired(TwoFactorChallenge {
            requires_two_factor: true,
            user_id: row.id,
            login_token,
        })));
    }

    let token = issue_session_token(&state.config, row.id)?;
    info!(user_id = row.id, "user logged in");
    Ok(Json(LoginResponse::Session(AuthResponse {
        token,
        user: row.to_user(),
    })))
}

/// Handler for GET /api/auth/me
pub async fn me(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<User>, AppError> {
    let row = users::find_by_id(&state.db, user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    Ok(Json(row.to_user()))
}
