mod common;

use anyhow::Result;
use axum::http::StatusCode;
use common::{spawn_app, spawn_app_with, SECRET};
use folio_server::auth::{self, Claims, LOGIN_CHALLENGE_PURPOSE};
use serde_json::json;
use time::OffsetDateTime;

fn claims(user_id: i64, purpose: Option<&str>, exp_offset: i64) -> Claims {
    let now = OffsetDateTime::now_utc().unix_timestamp();
    Claims {
        user_id,
        purpose: purpose.map(str::to_string),
        iat: now,
        exp: now + exp_offset,
    }
}

#[tokio::test]
async fn valid_token_reaches_handler() -> Result<()> {
    let app = spawn_app().await?;
    let (id, token) = app.register("ada@example.com").await;

    let (status, body) = app.get("/api/auth/me", Some(&token)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["id"], json!(id));
    assert_eq!(body["email"], "ada@example.com");
    assert_eq!(body["baseCurrency"], "EUR");
    assert_eq!(body["twoFactorEnabled"], false);
    Ok(())
}

#[tokio::test]
async fn missing_header_is_unauthorized() -> Result<()> {
    let app = spawn_app().await?;

    let (status, body) = app.get("/api/auth/me", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized");
    assert_eq!(body["message"], "Access token required");
    Ok(())
}

#[tokio::test]
async fn foreign_signature_is_forbidden() -> Result<()> {
    let app = spawn_app().await?;
    let (id, _) = app.register("ada@example.com").await;

    let forged = auth::sign("some-other-secret", &claims(id, None, 3600))?;
    let (status, body) = app.get("/api/accounts", Some(&forged)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Invalid or expired token");
    Ok(())
}

#[tokio::test]
async fn expired_token_is_forbidden() -> Result<()> {
    let app = spawn_app().await?;
    let (id, _) = app.register("ada@example.com").await;

    let expired = auth::sign(SECRET, &claims(id, None, -3600))?;
    let (status, _) = app.get("/api/auth/me", Some(&expired)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}

// A token stops working as soon as its exp has passed
#[tokio::test]
async fn just_expired_token_is_forbidden() -> Result<()> {
    let app = spawn_app().await?;
    let (id, _) = app.register("ada@example.com").await;

    let expired = auth::sign(SECRET, &claims(id, None, -5))?;
    let (status, body) = app.get("/api/auth/me", Some(&expired)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Invalid or expired token");

    let stale_challenge = auth::sign(SECRET, &claims(id, Some(LOGIN_CHALLENGE_PURPOSE), -5))?;
    let (status, _) = app
        .post(
            "/api/2fa/verify-login",
            None,
            json!({"userId": id, "token": "123456", "loginToken": stale_challenge}),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn garbage_token_is_forbidden() -> Result<()> {
    let app = spawn_app().await?;

    let (status, _) = app.get("/api/auth/me", Some("not.a.jwt")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn deleted_user_is_unauthorized() -> Result<()> {
    let app = spawn_app().await?;

    let ghost = auth::sign(SECRET, &claims(4242, None, 3600))?;
    let (status, body) = app.get("/api/auth/me", Some(&ghost)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "User not found");
    Ok(())
}

// A login challenge only unlocks /api/2fa/verify-login, never a session
#[tokio::test]
async fn challenge_token_is_not_a_session() -> Result<()> {
    let app = spawn_app().await?;
    let (id, _) = app.register("ada@example.com").await;

    let challenge = auth::sign(SECRET, &claims(id, Some(LOGIN_CHALLENGE_PURPOSE), 300))?;
    let (status, _) = app.get("/api/auth/me", Some(&challenge)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn missing_secret_is_a_server_error() -> Result<()> {
    let app = spawn_app_with(&[("JWT_SECRET", "")]).await?;

    let (status, body) = app.get("/api/auth/me", Some("anything")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Internal Server Error");

    // without a token the request is turned away before the secret matters
    let (status, _) = app.get("/api/auth/me", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn login_flow_issues_working_token() -> Result<()> {
    let app = spawn_app().await?;
    let (id, _) = app.register("ada@example.com").await;

    let (status, body) = app
        .post(
            "/api/auth/login",
            None,
            json!({"email": "ADA@example.com ", "password": "correct horse battery"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["user"]["id"], json!(id));
    let token = body["token"].as_str().expect("token");

    let (status, _) = app.get("/api/auth/me", Some(token)).await;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn bad_credentials_are_rejected() -> Result<()> {
    let app = spawn_app().await?;
    app.register("ada@example.com").await;

    for (email, password) in [
        ("ada@example.com", "wrong password"),
        ("nobody@example.com", "correct horse battery"),
    ] {
        let (status, body) = app
            .post("/api/auth/login", None, json!({"email": email, "password": password}))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Invalid email or password");
    }
    Ok(())
}

#[tokio::test]
async fn register_validates_and_rejects_duplicates() -> Result<()> {
    let app = spawn_app().await?;
    app.register("ada@example.com").await;

    let (status, body) = app
        .post(
            "/api/auth/register",
            None,
            json!({"email": "ada@example.com", "password": "another password", "name": "Ada"}),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Email already registered");

    let (status, _) = app
        .post(
            "/api/auth/register",
            None,
            json!({"email": "bob@example.com", "password": "short", "name": "Bob"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            "/api/auth/register",
            None,
            json!({"email": "not-an-email", "password": "long enough", "name": "Bob"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}
