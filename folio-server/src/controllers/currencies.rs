use std::sync::Arc;

use axum::{extract::State, Json};
use folio_core::{
    models::currency::is_currency_code, now_timestamp, ConversionQuery, ConversionResponse,
    CurrencyRate, DataSource, LastUpdatesResponse, ListRatesResponse, RefreshFlags,
    UpsertRateRequest,
};
use tracing::info;

use crate::{
    auth::AuthUser,
    error::AppError,
    extract::{ApiJson, ApiQuery},
    params,
    portfolio::{lookup_rate, RateRow},
    AppState,
};

fn currency_code(raw: &str) -> Result<String, AppError> {
    let code = raw.trim().to_ascii_uppercase();
    if !is_currency_code(&code) {
        return Err(AppError::BadRequest(format!("Invalid currency code: {raw}")));
    }
    Ok(code)
}

/// Handler for GET /api/currencies/rates
pub async fn list_rates(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
) -> Result<Json<ListRatesResponse>, AppError> {
    let rows: Vec<RateRow> = state
        .db
        .all(
            "SELECT from_currency, to_currency, rate, updated_at FROM currency_rates \
             ORDER BY from_currency, to_currency",
            &[],
        )
        .await?;
    Ok(Json(ListRatesResponse {
        rates: rows.into_iter().map(Into::into).collect(),
    }))
}

/// Handler for PUT /api/currencies/rates
pub async fn upsert_rate(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    ApiJson(req): ApiJson<UpsertRateRequest>,
) -> Result<Json<CurrencyRate>, AppError> {
    let from = currency_code(&req.from)?;
    let to = currency_code(&req.to)?;
    if from == to {
        return Err(AppError::BadRequest(
            "Source and target currency must differ".to_string(),
        ));
    }
    if !(req.rate.is_finite() && req.rate > 0.0) {
        return Err(AppError::BadRequest("Rate must be a positive number".to_string()));
    }

    let updated_at = now_timestamp();
    state
        .db
        .run(
            "INSERT INTO currency_rates (from_currency, to_currency, rate, updated_at) \
             VALUES (?, ?, ?, ?) \
             ON CONFLICT(from_currency, to_currency) \
             DO UPDATE SET rate = excluded.rate, updated_at = excluded.updated_at",
            &params![from.as_str(), to.as_str(), req.rate, updated_at.as_str()],
        )
        .await?;
    state.last_update.update_currency().await;
    info!(%from, %to, rate = req.rate, "exchange rate stored");

    Ok(Json(CurrencyRate {
        from_currency: from,
        to_currency: to,
        rate: req.rate,
        updated_at,
    }))
}

/// Handler for GET /api/currencies/convert?amount=&from=&to=
pub async fn convert(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    ApiQuery(query): ApiQuery<ConversionQuery>,
) -> Result<Json<ConversionResponse>, AppError> {
    let from = currency_code(&query.from)?;
    let to = currency_code(&query.to)?;
    if !query.amount.is_finite() {
        return Err(AppError::BadRequest("Amount must be a finite number".to_string()));
    }

    let rate = lookup_rate(&state.db, &from, &to)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No exchange rate for {from} to {to}")))?;

    Ok(Json(ConversionResponse {
        amount: query.amount,
        converted: query.amount * rate,
        from,
        to,
        rate,
    }))
}

/// Handler for GET /api/currencies/last-updates
pub async fn last_updates(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
) -> Json<LastUpdatesResponse> {
    let cache = &state.last_update;
    let needs_refresh = RefreshFlags {
        currency: cache.needs_refresh(DataSource::Currency).await,
        ib_portfolio: cache.needs_refresh(DataSource::IbPortfolio).await,
        manual_investments: cache.needs_refresh(DataSource::ManualInvestments).await,
    };
    Json(LastUpdatesResponse {
        times: cache.all_last_update_times().await,
        needs_refresh,
    })
}
