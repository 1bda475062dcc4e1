use std::sync::Arc;

use axum::{extract::State, Json};
use folio_core::{
    now_timestamp, AuthResponse, MessageResponse, TwoFactorLoginRequest, TwoFactorSetupResponse,
    TwoFactorStatusResponse, TwoFactorVerifyRequest, TwoFactorVerifyResponse,
};
use tracing::{info, warn};

use crate::{
    auth::{check_login_challenge, issue_session_token, AuthUser},
    error::AppError,
    extract::ApiJson,
    params,
    two_factor::{
        generate_backup_codes, generate_enrollment, hash_backup_code, is_backup_code,
        is_totp_code, matching_step, unix_now, validate_code_format,
    },
    users::{self, UserRow},
    AppState,
};

async fn load_user(state: &AppState, id: i64) -> Result<UserRow, AppError> {
    users::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

fn invalid_code() -> AppError {
    AppError::BadRequest("Invalid verification code".to_string())
}

/// Handler for POST /api/2fa/setup
///
/// Stores a fresh secret; 2FA stays disabled until `verify` succeeds.
pub async fn setup(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<TwoFactorSetupResponse>, AppError> {
    let row = load_user(&state, user.id).await?;
    if row.two_factor_enabled {
        return Err(AppError::BadRequest(
            "Two-factor authentication is already enabled".to_string(),
        ));
    }

    let enrollment = generate_enrollment(&row.email)?;
    state
        .db
        .run(
            "UPDATE users SET two_factor_secret = ?, two_factor_last_step = NULL WHERE id = ?",
            &params![enrollment.secret.as_str(), row.id],
        )
        .await?;
    info!(user_id = row.id, "2fa setup started");

    Ok(Json(TwoFactorSetupResponse {
        secret: enrollment.secret,
        otpauth_url: enrollment.otpauth_url,
        qr_code: enrollment.qr_code,
    }))
}

/// Handler for POST /api/2fa/verify
pub async fn verify(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(req): ApiJson<TwoFactorVerifyRequest>,
) -> Result<Json<TwoFactorVerifyResponse>, AppError> {
    // format check first, before the secret is even loaded
    let code = validate_code_format(req.token.as_deref())?;

    let row = load_user(&state, user.id).await?;
    if row.two_factor_enabled {
        return Err(AppError::BadRequest(
            "Two-factor authentication is already enabled".to_string(),
        ));
    }
    let secret = row.two_factor_secret.as_deref().ok_or_else(|| {
        AppError::BadRequest("Two-factor authentication has not been set up".to_string())
    })?;

    let Some(step) = matching_step(secret, &row.email, code, unix_now())? else {
        warn!(user_id = row.id, "2fa verification failed");
        return Err(invalid_code());
    };

    /* abilita 2FA e sostituisce i backup code in un'unica transazione */
    let backup_codes = generate_backup_codes();
    let mut tx = state.db.begin().await?;
    tx.run(
        "UPDATE users SET two_factor_enabled = 1, two_factor_last_step = ? WHERE id = ?",
        &params![step as i64, row.id],
    )
    .await?;
    tx.run(
        "DELETE FROM two_factor_backup_codes WHERE user_id = ?",
        &params![row.id],
    )
    .await?;
    for code in &backup_codes {
        tx.run(
            "INSERT INTO two_factor_backup_codes (user_id, code_hash) VALUES (?, ?)",
            &params![row.id, hash_backup_code(code)],
        )
        .await?;
    }
    tx.commit().await?;
    info!(user_id = row.id, "2fa enabled");

    Ok(Json(TwoFactorVerifyResponse {
        message: "Two-factor authentication enabled".to_string(),
        backup_codes,
    }))
}

/// Handler for POST /api/2fa/verify-login
///
/// Second step of a login: requires the challenge token handed out by
/// `/api/auth/login` for the same user, plus a TOTP or backup code.
pub async fn verify_login(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<TwoFactorLoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    // il challenge deve essere stato emesso da /api/auth/login per lo stesso utente
    check_login_challenge(&state.config, &req.login_token, req.user_id)?;

    let code = req
        .token
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::BadRequest("Token is required".to_string()))?;

    let row = load_user(&state, req.user_id).await?;
    let secret = match (&row.two_factor_secret, row.two_factor_enabled) {
        (Some(secret), true) => secret.as_str(),
        _ => {
            return Err(AppError::BadRequest(
                "Two-factor authentication is not enabled".to_string(),
            ))
        }
    };

    if is_totp_code(code) {
        let step = matching_step(secret, &row.email, code, unix_now())?.ok_or_else(invalid_code)?;
        // a step at or before the last accepted one is a replay
        let claimed = state
            .db
            .run(
                "UPDATE users SET two_factor_last_step = ? \
                 WHERE id = ? AND (two_factor_last_step IS NULL OR two_factor_last_step < ?)",
                &params![step as i64, row.id, step as i64],
            )
            .await?;
        if claimed.changes == 0 {
            warn!(user_id = row.id, "2fa code replayed");
            return Err(invalid_code());
        }
    } else if is_backup_code(code) {
        // used_at IS NULL makes the code single-use even under concurrent logins
        let consumed = state
            .db
            .run(
                "UPDATE two_factor_backup_codes SET used_at = ? \
                 WHERE user_id = ? AND code_hash = ? AND used_at IS NULL",
                &params![now_timestamp(), row.id, hash_backup_code(code)],
            )
            .await?;
        if consumed.changes == 0 {
            warn!(user_id = row.id, "unknown or used backup code");
            return Err(invalid_code());
        }
        info!(user_id = row.id, "backup code consumed");
    } else {
        return Err(AppError::BadRequest("Token must be 6 digits".to_string()));
    }

    let token = issue_session_token(&state.config, row.id)?;
    let mut user = row.to_user();
    user.two_factor_enabled = true;
    info!(user_id = row.id, "2fa login completed");

    Ok(Json(AuthResponse { token, user }))
}

/// Handler for GET /api/2fa/status
pub async fn status(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<TwoFactorStatusResponse>, AppError> {
    let row = load_user(&state, user.id).await?;
    Ok(Json(TwoFactorStatusResponse {
        enabled: row.two_factor_enabled,
    }))
}

/// Handler for POST /api/2fa/disable
pub async fn disable(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<MessageResponse>, AppError> {
    let mut tx = state.db.begin().await?;
    tx.run(
        "UPDATE users SET two_factor_enabled = 0, two_factor_secret = NULL, \
         two_factor_last_step = NULL WHERE id = ?",
        &params![user.id],
    )
    .await?;
    tx.run(
        "DELETE FROM two_factor_backup_codes WHERE user_id = ?",
        &params![user.id],
    )
    .await?;
    tx.commit().await?;
    info!(user_id = user.id, "2fa disabled");

    Ok(Json(MessageResponse::new(
        "Two-factor authentication disabled",
    )))
}
