#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use folio_server::{migrate, routes, AppState, Config, Database, LastUpdateCache};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

pub const SECRET: &str = "test-secret";

/// Builds a config rooted in `dir`, overriding with `extra` pairs.
pub fn config_in(dir: &TempDir, extra: &[(&str, &str)]) -> Result<Config> {
    let mut vars: HashMap<String, String> = HashMap::new();
    vars.insert("JWT_SECRET".into(), SECRET.into());
    vars.insert(
        "DATABASE_PATH".into(),
        dir.path().join("db").join("folio.db").display().to_string(),
    );
    vars.insert(
        "LAST_UPDATE_CACHE_PATH".into(),
        dir.path().join("cache").join("last_updates.json").display().to_string(),
    );
    vars.insert(
        "FRONTEND_DIR".into(),
        dir.path().join("frontend").display().to_string(),
    );
    for (k, v) in extra {
        vars.insert(k.to_string(), v.to_string());
    }
    // an empty value means "unset"
    vars.retain(|_, v| !v.is_empty());
    Config::from_lookup(|key| vars.get(key).cloned())
}

pub struct TestApp {
    pub dir: TempDir,
    pub state: Arc<AppState>,
    pub app: Router,
}

pub async fn spawn_app() -> Result<TestApp> {
    spawn_app_with(&[]).await
}

pub async fn spawn_app_with(extra: &[(&str, &str)]) -> Result<TestApp> {
    let dir = TempDir::new()?;
    let config = config_in(&dir, extra)?;
    let db = Database::open(&config.database_path).await?;
    migrate::apply_schema(&db).await?;
    let last_update = LastUpdateCache::init(config.last_update_cache_path.clone()).await;
    let state = AppState::new(config, db, last_update);
    let app = routes::router(state.clone());
    Ok(TestApp { dir, state, app })
}

pub fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    builder.body(body).expect("valid request")
}

impl TestApp {
    pub async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let res = self.app.clone().oneshot(req).await.expect("infallible");
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .expect("read body");
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(request(Method::GET, uri, token, None)).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(request(Method::POST, uri, token, Some(body))).await
    }

    pub async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(request(Method::PUT, uri, token, Some(body))).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(request(Method::DELETE, uri, token, None)).await
    }

    /// Registers a user and returns (id, session token).
    pub async fn register(&self, email: &str) -> (i64, String) {
        let (status, body) = self
            .post(
                "/api/auth/register",
                None,
                json!({
                    "email": email,
                    "password": "correct horse battery",
                    "name": "Test User",
                    "baseCurrency": "EUR",
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
        let id = body["user"]["id"].as_i64().expect("user id");
        let token = body["token"].as_str().expect("token").to_string();
        (id, token)
    }
}
