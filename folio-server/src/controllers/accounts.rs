use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use folio_core::{
    models::currency::is_currency_code, now_timestamp, AccountResponse, CreateAccountRequest,
    ListAccountsResponse, MessageResponse, UpdateAccountRequest,
};
use tracing::info;

use crate::{
    auth::AuthUser,
    error::AppError,
    extract::{ApiJson, ApiPath},
    params,
    portfolio::{user_accounts, AccountRow},
    AppState,
};

async fn find_owned(state: &AppState, user_id: i64, id: i64) -> Result<AccountRow, AppError> {
    state
        .db
        .get(
            "SELECT id, user_id, name, account_type, currency, balance, created_at, updated_at \
             FROM accounts WHERE id = ? AND user_id = ?",
            &params![id, user_id],
        )
        .await?
        .ok_or_else(|| AppError::NotFound("Account not found".to_string()))
}

fn clean_name(raw: &str, field: &str) -> Result<String, AppError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(AppError::BadRequest(format!("{field} is required")));
    }
    Ok(value.to_string())
}

fn clean_currency(raw: &str) -> Result<String, AppError> {
    let code = raw.trim().to_ascii_uppercase();
    if !is_currency_code(&code) {
        return Err(AppError::BadRequest(format!("Invalid currency code: {raw}")));
    }
    Ok(code)
}

fn check_balance(balance: f64) -> Result<f64, AppError> {
    if !balance.is_finite() {
        return Err(AppError::BadRequest("Balance must be a finite number".to_string()));
    }
    Ok(balance)
}

/// Handler for GET /api/accounts
pub async fn list(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<ListAccountsResponse>, AppError> {
    let accounts = user_accounts(&state.db, user.id)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(Json(ListAccountsResponse { accounts }))
}

/// Handler for POST /api/accounts
pub async fn create(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(req): ApiJson<CreateAccountRequest>,
) -> Result<(StatusCode, Json<AccountResponse>), AppError> {
    let name = clean_name(&req.name, "Name")?;
    let account_type = clean_name(&req.account_type, "Account type")?;
    let currency = clean_currency(&req.currency)?;
    let balance = check_balance(req.balance.unwrap_or(0.0))?;
    let now = now_timestamp();

    let result = state
        .db
        .run(
            "INSERT INTO accounts (user_id, name, account_type, currency, balance, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            &params![user.id, name, account_type, currency, balance, now.as_str(), now.as_str()],
        )
        .await?;
    state.last_update.update_manual_investments().await;
    info!(user_id = user.id, account_id = result.last_insert_id, "account created");

    let account = find_owned(&state, user.id, result.last_insert_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(AccountResponse {
            account: account.into(),
        }),
    ))
}

/// Handler for GET /api/accounts/{id}
pub async fn get(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<AccountResponse>, AppError> {
    let account = find_owned(&state, user.id, id).await?;
    Ok(Json(AccountResponse {
        account: account.into(),
    }))
}

/// Handler for PUT /api/accounts/{id}
pub async fn update(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<UpdateAccountRequest>,
) -> Result<Json<AccountResponse>, AppError> {
    // 404 anche per gli account di altri utenti
    let existing = find_owned(&state, user.id, id).await?;

    /* merge parziale: i campi assenti mantengono il valore attuale */
    let name = match req.name.as_deref() {
        Some(raw) => clean_name(raw, "Name")?,
        None => existing.name,
    };
    let account_type = match req.account_type.as_deref() {
        Some(raw) => clean_name(raw, "Account type")?,
        None => existing.account_type,
    };
    let currency = match req.currency.as_deref() {
        Some(raw) => clean_currency(raw)?,
        None => existing.currency,
    };
    let balance = check_balance(req.balance.unwrap_or(existing.balance))?;

    state
        .db
        .run(
            "UPDATE accounts SET name = ?, account_type = ?, currency = ?, balance = ? \
             WHERE id = ? AND user_id = ?",
            &params![name, account_type, currency, balance, id, user.id],
        )
        .await?;
    state.last_update.update_manual_investments().await;
    info!(user_id = user.id, account_id = id, "account updated");

    let account = find_owned(&state, user.id, id).await?;
    Ok(Json(AccountResponse {
        account: account.into(),
    }))
}

/// Handler for DELETE /api/accounts/{id}
pub async fn delete(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<MessageResponse>, AppError> {
    let result = state
        .db
        .run(
            "DELETE FROM accounts WHERE id = ? AND user_id = ?",
            &params![id, user.id],
        )
        .await?;
    if result.changes == 0 {
        return Err(AppError::NotFound("Account not found".to_string()));
    }
    state.last_update.update_manual_investments().await;
    info!(user_id = user.id, account_id = id, "account deleted");

    Ok(Json(MessageResponse::new("Account deleted")))
}
