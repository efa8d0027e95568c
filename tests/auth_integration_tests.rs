mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use common::{TestApp, category_body};
use jsonwebtoken::{EncodingKey, Header, encode};
use menu_catalog::{
    AppConfig, AppError,
    auth::{self, Claims},
    models::Role,
};
use serde_json::json;
use std::time::{Duration, Instant};

fn now() -> u64 {
    chrono::Utc::now().timestamp() as u64
}

fn sign(claims: &Claims, secret: &str) -> String {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

// --- Token primitives ---

#[test]
fn test_issued_token_round_trips_subject() {
    let config = AppConfig::default();
    let token = auth::issue_token("60d5ec49f87d2e5a2c9c1234", &config).unwrap();

    let claims = auth::verify_token(&token, &config.jwt_secret).unwrap();
    assert_eq!(claims.sub, "60d5ec49f87d2e5a2c9c1234");
    assert_eq!(claims.exp - claims.iat, 30 * 60);
}

#[test]
fn test_token_signed_with_other_secret_is_rejected() {
    let config = AppConfig::default();
    let token = auth::issue_token("60d5ec49f87d2e5a2c9c1234", &config).unwrap();

    let result = auth::verify_token(&token, "a-completely-different-secret");
    assert!(matches!(result, Err(AppError::Unauthenticated(_))));
}

#[test]
fn test_out_of_range_lifetime_is_an_error_not_a_panic() {
    let config = AppConfig {
        access_token_ttl_minutes: i64::MAX,
        ..AppConfig::default()
    };
    let result = auth::issue_token("60d5ec49f87d2e5a2c9c1234", &config);
    assert!(matches!(result, Err(AppError::Internal(_))));

    let year = AppConfig {
        access_token_ttl_minutes: AppConfig::MAX_TOKEN_TTL_MINUTES,
        ..AppConfig::default()
    };
    let token = auth::issue_token("60d5ec49f87d2e5a2c9c1234", &year).unwrap();
    let claims = auth::verify_token(&token, &year.jwt_secret).unwrap();
    assert_eq!(claims.exp - claims.iat, 525_600 * 60);
}

#[tokio::test]
async fn test_password_hashing() {
    let hashed = auth::hash_password("Secret123!").await.unwrap();
    assert!(hashed.starts_with("$argon2"));
    assert_ne!(hashed, "Secret123!");

    assert!(auth::verify_password("Secret123!", &hashed).await.unwrap());
    assert!(!auth::verify_password("secret123!", &hashed).await.unwrap());
    assert!(!auth::verify_password("Secret123!", "not-a-phc-string").await.unwrap());

    // Salted: the same password hashes differently each time.
    assert_ne!(hashed, auth::hash_password("Secret123!").await.unwrap());
}

#[tokio::test(flavor = "current_thread")]
async fn test_hashing_leaves_the_runtime_free() {
    // On a single-threaded runtime, a hash computed inline would hold the only
    // worker until it finished, so the timer could not fire first.
    let (hashed, timer_fired) = tokio::join!(
        async {
            let hashed = auth::hash_password("Secret123!").await.unwrap();
            (hashed, Instant::now())
        },
        async {
            tokio::time::sleep(Duration::from_millis(1)).await;
            Instant::now()
        }
    );
    let (hashed, hashed_at) = hashed;

    assert!(timer_fired < hashed_at);
    assert!(auth::verify_password("Secret123!", &hashed).await.unwrap());
}

// --- Gate behavior over HTTP ---

#[tokio::test]
async fn test_expired_token_is_401_not_403() {
    let app = TestApp::new();
    let (user_id, _) = app.user_with_roles("plain_user", &[Role::User]).await;

    let expired = sign(
        &Claims {
            sub: user_id,
            exp: now() - 3600,
            iat: now() - 7200,
        },
        &app.config.jwt_secret,
    );

    let response = app
        .post("/categories/", Some(&expired), category_body("Postres"))
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["detail"], "Token has expired");
    assert_eq!(
        response.headers.get(header::WWW_AUTHENTICATE).unwrap(),
        "Bearer"
    );
}

#[tokio::test]
async fn test_badly_signed_token_is_401_not_403() {
    let app = TestApp::new();
    let (user_id, _) = app.user_with_roles("plain_user", &[Role::User]).await;

    let forged = sign(
        &Claims {
            sub: user_id,
            exp: now() + 3600,
            iat: now(),
        },
        "attacker-secret",
    );

    let response = app
        .post("/categories/", Some(&forged), category_body("Postres"))
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_malformed_authorization_headers_are_401() {
    let app = TestApp::new();
    let (_, token) = app.user_with_roles("plain_user", &[Role::User]).await;

    for value in [
        format!("Token {token}"),
        format!("bearer{token}"),
        "Bearer ".to_string(),
        "Bearer not.a.jwt".to_string(),
    ] {
        let request = Request::builder()
            .uri("/users/me")
            .header(header::AUTHORIZATION, value.as_str())
            .body(Body::empty())
            .unwrap();
        let response = app.send(request).await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED, "{value}");
    }

    let missing = app.get("/users/me").await;
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);
    assert_eq!(missing.body["detail"], "Not authenticated");
}

#[tokio::test]
async fn test_token_for_removed_user_is_401() {
    let app = TestApp::new();
    let (user_id, token) = app.user_with_roles("short_lived", &[Role::User]).await;
    let super_token = app.super_admin_token().await;

    assert_eq!(app.get_as("/users/me", &token).await.status, StatusCode::OK);

    let deleted = app
        .delete(&format!("/users/{user_id}"), Some(&super_token))
        .await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);

    let response = app.get_as("/users/me", &token).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_with_non_id_subject_is_401() {
    let app = TestApp::new();
    let token = sign(
        &Claims {
            sub: "someone@example.com".to_string(),
            exp: now() + 3600,
            iat: now(),
        },
        &app.config.jwt_secret,
    );

    let response = app.get_as("/users/me", &token).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_roles_are_read_at_request_time() {
    let app = TestApp::new();
    let (user_id, token) = app.user_with_roles("promoted", &[Role::User]).await;
    let super_token = app.super_admin_token().await;

    let before = app
        .post("/categories/", Some(&token), category_body("Postres"))
        .await;
    assert_eq!(before.status, StatusCode::FORBIDDEN);

    let promoted = app
        .put(
            &format!("/users/{user_id}"),
            Some(&super_token),
            json!({ "roles": ["user", "admin"] }),
        )
        .await;
    assert_eq!(promoted.status, StatusCode::OK);

    // Same token, new roles.
    let after = app
        .post("/categories/", Some(&token), category_body("Postres"))
        .await;
    assert_eq!(after.status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_super_admin_gate_excludes_admins() {
    let app = TestApp::new();
    let (target, _) = app.user_with_roles("target_user", &[Role::User]).await;
    let admin_token = app.admin_token().await;

    let update = app
        .put(
            &format!("/users/{target}"),
            Some(&admin_token),
            json!({ "username": "renamed" }),
        )
        .await;
    assert_eq!(update.status, StatusCode::FORBIDDEN);

    let delete = app
        .delete(&format!("/users/{target}"), Some(&admin_token))
        .await;
    assert_eq!(delete.status, StatusCode::FORBIDDEN);
}
