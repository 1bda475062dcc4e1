use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{
            AUTHORIZATION, CONTENT_TYPE, REFERRER_POLICY, X_CONTENT_TYPE_OPTIONS,
            X_FRAME_OPTIONS, X_XSS_PROTECTION,
        },
        HeaderName, HeaderValue, Method,
    },
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::CorsLayer,
    services::{ServeDir, ServeFile},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use crate::controllers::{self, accounts, auth, currencies, health, performance, two_factor};
use crate::{auth::require_auth, error, AppState};

/// JSON bodies above this are rejected with 413.
pub const BODY_LIMIT_BYTES: usize = 10 * 1024 * 1024;

fn auth_routes(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/me", get(auth::me))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
}

fn two_factor_routes(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/setup", post(two_factor::setup))
        .route("/verify", post(two_factor::verify))
        .route("/status", get(two_factor::status))
        .route("/disable", post(two_factor::disable))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .route("/verify-login", post(two_factor::verify_login))
}

fn account_routes(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(accounts::list).post(accounts::create))
        .route(
            "/{id}",
            get(accounts::get)
                .put(accounts::update)
                .delete(accounts::delete),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
}

fn currency_routes(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/rates",
            get(currencies::list_rates).put(currencies::upsert_rate),
        )
        .route("/convert", get(currencies::convert))
        .route("/last-updates", get(currencies::last_updates))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
}

fn performance_routes(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/summary", get(performance::summary))
        .route("/snapshots", post(performance::create_snapshot))
        .route("/history", get(performance::history))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
}

fn cors(origin: HeaderValue) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(60 * 60))
}

fn header(name: HeaderName, value: &'static str) -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::if_not_present(name, HeaderValue::from_static(value))
}

pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .nest("/auth", auth_routes(&state))
        .nest("/2fa", two_factor_routes(&state))
        .nest("/accounts", account_routes(&state))
        .nest("/currencies", currency_routes(&state))
        .nest("/performance", performance_routes(&state))
        .fallback(controllers::api_not_found);

    let frontend_dir = &state.config.frontend_dir;
    let frontend = ServeDir::new(frontend_dir)
        .fallback(ServeFile::new(frontend_dir.join("index.html")));

    Router::new()
        .route("/health", get(health::health))
        .nest("/api", api)
        .fallback_service(frontend)
        .layer(CatchPanicLayer::custom(error::panic_response))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            error::expose_error_details,
        ))
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors(state.config.cors_origin.clone()))
        .layer(header(X_CONTENT_TYPE_OPTIONS, "nosniff"))
        .layer(header(X_FRAME_OPTIONS, "SAMEORIGIN"))
        .layer(header(REFERRER_POLICY, "no-referrer"))
        .layer(header(X_XSS_PROTECTION, "0"))
        .layer(header(
            HeaderName::from_static("cross-origin-opener-policy"),
            "same-origin",
        ))
        .with_state(state)
}
