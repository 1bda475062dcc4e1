mod common;

use anyhow::Result;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use common::{request, spawn_app, spawn_app_with};
use folio_server::scheduler::{run_cycle, RefreshJob, SnapshotJob};
use serde_json::{json, Value};
use tower::ServiceExt;

fn approx(value: &Value, expected: f64) -> bool {
    value.as_f64().is_some_and(|v| (v - expected).abs() < 1e-9)
}

#[tokio::test]
async fn health_reports_ok() -> Result<()> {
    let app = spawn_app().await?;

    let (status, body) = app.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "OK");
    assert!(body["timestamp"].is_string());
    assert!(body["uptime"].as_f64().unwrap() >= 0.0);

    app.state.db.close().await;
    let (status, body) = app.get("/health", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "UNAVAILABLE");
    Ok(())
}

#[tokio::test]
async fn unknown_api_route_is_json_404() -> Result<()> {
    let app = spawn_app().await?;

    let (status, body) = app.get("/api/nothing/here", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Not Found");
    assert_eq!(body["message"], "No API route for /api/nothing/here");
    Ok(())
}

#[tokio::test]
async fn security_headers_are_set() -> Result<()> {
    let app = spawn_app().await?;

    let res = app
        .app
        .clone()
        .oneshot(request(Method::GET, "/health", None, None))
        .await?;
    let headers = res.headers();
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "SAMEORIGIN");
    assert_eq!(headers["referrer-policy"], "no-referrer");
    assert_eq!(headers["cross-origin-opener-policy"], "same-origin");
    Ok(())
}

// Non-API paths fall through to the single-page frontend
#[tokio::test]
async fn frontend_is_served_with_index_fallback() -> Result<()> {
    let app = spawn_app().await?;
    let dist = app.dir.path().join("frontend");
    std::fs::create_dir_all(&dist)?;
    std::fs::write(dist.join("index.html"), "<html>folio</html>")?;
    std::fs::write(dist.join("app.js"), "console.log(1)")?;

    for (uri, expected) in [
        ("/app.js", "console.log(1)"),
        ("/portfolio/overview", "<html>folio</html>"),
    ] {
        let res = app
            .app
            .clone()
            .oneshot(request(Method::GET, uri, None, None))
            .await?;
        assert_eq!(res.status(), StatusCode::OK, "{uri}");
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await?;
        assert_eq!(std::str::from_utf8(&bytes)?, expected);
    }
    Ok(())
}

#[tokio::test]
async fn malformed_json_is_bad_request() -> Result<()> {
    let app = spawn_app().await?;
    let (_, token) = app.register("ada@example.com").await;

    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/accounts")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))?;
    let (status, body) = app.send(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Bad Request");
    assert!(body["message"].is_string());

    let (status, _) = app.get("/api/accounts/abc", Some(&token)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn server_errors_hide_details_in_production() -> Result<()> {
    let dev = spawn_app_with(&[("JWT_SECRET", "")]).await?;
    let (status, body) = dev.get("/api/accounts", Some("token")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Something went wrong on our end");
    assert!(body["details"].as_str().unwrap().contains("JWT secret"));

    let prod = spawn_app_with(&[("JWT_SECRET", ""), ("NODE_ENV", "production")]).await?;
    let (status, body) = prod.get("/api/accounts", Some("token")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Something went wrong on our end");
    assert!(body.get("details").is_none());
    Ok(())
}

#[tokio::test]
async fn account_crud() -> Result<()> {
    let app = spawn_app().await?;
    let (_, token) = app.register("ada@example.com").await;

    let (status, body) = app
        .post(
            "/api/accounts",
            Some(&token),
            json!({"name": " Broker ", "accountType": "brokerage", "currency": "usd", "balance": 1500.5}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let account = &body["account"];
    let id = account["id"].as_i64().unwrap();
    assert_eq!(account["name"], "Broker");
    assert_eq!(account["currency"], "USD");
    assert!(approx(&account["balance"], 1500.5));

    let (status, body) = app
        .put(&format!("/api/accounts/{id}"), Some(&token), json!({"balance": 2000.0}))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["account"]["name"], "Broker");
    assert!(approx(&body["account"]["balance"], 2000.0));

    let (status, body) = app.get("/api/accounts", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["accounts"].as_array().unwrap().len(), 1);

    let (status, _) = app
        .post(
            "/api/accounts",
            Some(&token),
            json!({"name": "x", "accountType": "cash", "currency": "euro"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.delete(&format!("/api/accounts/{id}"), Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = app.get(&format!("/api/accounts/{id}"), Some(&token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Account not found");
    Ok(())
}

#[tokio::test]
async fn accounts_are_private_to_their_owner() -> Result<()> {
    let app = spawn_app().await?;
    let (_, ada) = app.register("ada@example.com").await;
    let (_, bob) = app.register("bob@example.com").await;

    let (_, body) = app
        .post(
            "/api/accounts",
            Some(&ada),
            json!({"name": "Savings", "accountType": "cash", "currency": "EUR"}),
        )
        .await;
    let id = body["account"]["id"].as_i64().unwrap();
    let uri = format!("/api/accounts/{id}");

    let (status, _) = app.get(&uri, Some(&bob)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.put(&uri, Some(&bob), json!({"name": "Mine now"})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.delete(&uri, Some(&bob)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = app.get("/api/accounts", Some(&bob)).await;
    assert!(body["accounts"].as_array().unwrap().is_empty());

    let (status, body) = app.get(&uri, Some(&ada)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["account"]["name"], "Savings");
    Ok(())
}

#[tokio::test]
async fn currency_rates_and_conversion() -> Result<()> {
    let app = spawn_app().await?;
    let (_, token) = app.register("ada@example.com").await;

    let (_, body) = app.get("/api/currencies/last-updates", Some(&token)).await;
    assert!(body["times"]["currency"].is_null());
    assert_eq!(body["needsRefresh"]["currency"], true);

    let (status, body) = app
        .put(
            "/api/currencies/rates",
            Some(&token),
            json!({"from": "usd", "to": "EUR", "rate": 0.5}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["fromCurrency"], "USD");

    let (status, _) = app
        .put(
            "/api/currencies/rates",
            Some(&token),
            json!({"from": "USD", "to": "EUR", "rate": -1.0}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app
        .put(
            "/api/currencies/rates",
            Some(&token),
            json!({"from": "USD", "to": "USD", "rate": 1.0}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .get("/api/currencies/convert?amount=100&from=USD&to=EUR", Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(approx(&body["converted"], 50.0));

    let (_, body) = app
        .get("/api/currencies/convert?amount=100&from=EUR&to=USD", Some(&token))
        .await;
    assert!(approx(&body["rate"], 2.0));
    assert!(approx(&body["converted"], 200.0));

    let (status, body) = app
        .get("/api/currencies/convert?amount=1&from=USD&to=JPY", Some(&token))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "No exchange rate for USD to JPY");

    let (_, body) = app.get("/api/currencies/rates", Some(&token)).await;
    assert_eq!(body["rates"].as_array().unwrap().len(), 1);

    let (_, body) = app.get("/api/currencies/last-updates", Some(&token)).await;
    assert!(body["times"]["currency"].is_string());
    assert_eq!(body["needsRefresh"]["currency"], false);
    assert_eq!(body["needsRefresh"]["ibPortfolio"], true);
    Ok(())
}

#[tokio::test]
async fn performance_summary_and_history() -> Result<()> {
    let app = spawn_app().await?;
    let (_, token) = app.register("ada@example.com").await;

    app.put(
        "/api/currencies/rates",
        Some(&token),
        json!({"from": "USD", "to": "EUR", "rate": 0.5}),
    )
    .await;
    let mut gbp_id = 0;
    for (name, currency, balance) in [("Cash", "EUR", 1000.0), ("Broker", "USD", 200.0), ("Pension", "GBP", 50.0)] {
        let (_, body) = app
            .post(
                "/api/accounts",
                Some(&token),
                json!({"name": name, "accountType": "cash", "currency": currency, "balance": balance}),
            )
            .await;
        if currency == "GBP" {
            gbp_id = body["account"]["id"].as_i64().unwrap();
        }
    }

    let (status, body) = app.get("/api/performance/summary", Some(&token)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["baseCurrency"], "EUR");
    assert!(approx(&body["totalValue"], 1100.0));
    assert_eq!(body["unconverted"], json!([gbp_id]));
    assert_eq!(body["accounts"].as_array().unwrap().len(), 3);

    for _ in 0..3 {
        let (status, body) = app
            .post("/api/performance/snapshots", Some(&token), json!({}))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(approx(&body["snapshot"]["totalValue"], 1100.0));
    }

    let (_, body) = app.get("/api/performance/history?limit=2", Some(&token)).await;
    let snapshots = body["snapshots"].as_array().unwrap();
    assert_eq!(snapshots.len(), 2);
    assert!(snapshots[0]["id"].as_i64() > snapshots[1]["id"].as_i64());

    let (_, body) = app.get("/api/performance/history", Some(&token)).await;
    assert_eq!(body["snapshots"].as_array().unwrap().len(), 3);
    Ok(())
}

#[tokio::test]
async fn refresh_cycle_runs_only_stale_jobs() -> Result<()> {
    let app = spawn_app().await?;
    let (_, token) = app.register("ada@example.com").await;
    let jobs: Vec<Box<dyn RefreshJob>> = vec![Box::new(SnapshotJob)];

    assert_eq!(run_cycle(&app.state, &jobs).await, 1);
    assert_eq!(run_cycle(&app.state, &jobs).await, 0);

    let (_, body) = app.get("/api/performance/history", Some(&token)).await;
    assert_eq!(body["snapshots"].as_array().unwrap().len(), 1);

    let (_, body) = app.get("/api/currencies/last-updates", Some(&token)).await;
    assert!(body["times"]["manualInvestments"].is_string());
    Ok(())
}
