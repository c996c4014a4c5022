//! Router-level scenarios against the in-memory store.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{HeaderValue, Request, StatusCode, header};
use platform::client::TrustedProxies;
use platform::rate_limit::{MemoryRateLimitStore, RateLimitConfig};
use platform::token::{TokenKind, TokenSubject};
use serde_json::{Value, json};
use tower::ServiceExt;

use crate::application::{AuthConfig, AuthServices, SideEffectDispatcher, spawn_side_effect_worker};
use crate::domain::RevocationRegistry;
use crate::domain::entity::audit::AuditEventType;
use crate::infra::{Argon2PasswordHasher, MemoryAuthStore};
use crate::presentation::router::auth_router_generic;

const EMAIL: &str = "alice@example.com";
const PASSWORD: &str = "Password123!";

struct Harness {
    app: Router,
    store: MemoryAuthStore,
    services: AuthServices,
}

fn test_config() -> AuthConfig {
    AuthConfig {
        register_rate_limit: RateLimitConfig::per_minute(1000),
        login_rate_limit: RateLimitConfig::per_minute(1000),
        ..AuthConfig::with_random_secret()
    }
}

fn harness_with(config: AuthConfig) -> Harness {
    let store = MemoryAuthStore::new();
    let (dispatcher, rx) = SideEffectDispatcher::channel(config.event_queue_capacity);
    spawn_side_effect_worker(rx, Arc::new(store.clone()), Arc::new(store.clone()));

    let services = AuthServices::new(config, Arc::new(Argon2PasswordHasher::default()), dispatcher);
    let app = auth_router_generic(
        store.clone(),
        services.clone(),
        Arc::new(MemoryRateLimitStore::new()),
    );

    Harness {
        app,
        store,
        services,
    }
}

fn harness() -> Harness {
    harness_with(test_config())
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn with_bearer(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

async fn register(app: &Router, email: &str) -> (StatusCode, Value) {
    send(
        app,
        post_json(
            "/register",
            json!({ "email": email, "password": PASSWORD, "fullName": "Alice Example" }),
        ),
    )
    .await
}

async fn login(app: &Router, email: &str, password: &str) -> (StatusCode, Value) {
    send(
        app,
        post_json("/login", json!({ "email": email, "password": password })),
    )
    .await
}

/// A login arriving from socket peer `peer` that claims `forwarded_for`.
fn login_from(peer: [u8; 4], forwarded_for: &str) -> Request<Body> {
    let mut req = post_json("/login", json!({ "email": EMAIL, "password": PASSWORD }));
    req.headers_mut().insert(
        "x-forwarded-for",
        HeaderValue::from_str(forwarded_for).unwrap(),
    );
    req.extensions_mut()
        .insert(ConnectInfo(SocketAddr::from((peer, 50_000))));
    req
}

async fn stored_user(store: &MemoryAuthStore, email: &str) -> crate::domain::entity::user::User {
    let email = crate::domain::value_object::email::Email::new(email).unwrap();
    crate::domain::UserRepository::find_by_email(store, &email)
        .await
        .unwrap()
        .unwrap()
}

fn token(body: &Value, field: &str) -> String {
    body["data"][field].as_str().unwrap().to_string()
}

/// Wait for the side-effect worker to drain.
async fn wait_for_audit(store: &MemoryAuthStore, count: usize) {
    for _ in 0..200 {
        if store.audit_entries().await.len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn register_returns_tokens_of_matching_kind() {
    let h = harness();
    let (status, body) = register(&h.app, EMAIL).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["user"]["email"], EMAIL);
    assert_eq!(body["data"]["user"]["roles"], json!(["user"]));
    assert!(body["data"]["user"].get("passwordHash").is_none());

    let codec = &h.services.codec;
    let access = codec
        .verify_kind(&token(&body, "accessToken"), TokenKind::Access)
        .unwrap();
    let refresh = codec
        .verify_kind(&token(&body, "refreshToken"), TokenKind::Refresh)
        .unwrap();
    assert_eq!(access.subject.id, refresh.subject.id);
    assert_eq!(access.subject.email.as_deref(), Some(EMAIL));
    assert_eq!(access.subject.role.as_deref(), Some("user"));
}

#[tokio::test]
async fn duplicate_registration_is_rejected_case_insensitively() {
    let h = harness();
    register(&h.app, EMAIL).await;

    let (status, body) = register(&h.app, "Alice@Example.COM").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "User with this email already exists");
}

#[tokio::test]
async fn weak_password_and_malformed_body_are_validation_errors() {
    let h = harness();

    let (status, body) = send(
        &h.app,
        post_json(
            "/register",
            json!({ "email": EMAIL, "password": "short", "fullName": "Alice Example" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, body) = send(&h.app, post_json("/register", json!({ "email": EMAIL }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn lockout_after_five_failures_blocks_correct_password() {
    let h = harness();
    assert_eq!(register(&h.app, EMAIL).await.0, StatusCode::CREATED);

    let (status, body) = login(&h.app, EMAIL, PASSWORD).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["accessToken"].is_string());

    for _ in 0..5 {
        let (status, body) = login(&h.app, EMAIL, "WrongPassword1!").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid email or password");
    }

    let (status, body) = login(&h.app, EMAIL, PASSWORD).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        body["error"],
        "Account is temporarily locked due to multiple failed login attempts"
    );
}

#[tokio::test]
async fn attempt_while_locked_does_not_count_as_failure() {
    let h = harness();
    register(&h.app, EMAIL).await;

    for _ in 0..5 {
        login(&h.app, EMAIL, "WrongPassword1!").await;
    }
    let locked_until = stored_user(&h.store, EMAIL).await.locked_until;
    assert!(locked_until.is_some());

    let (status, _) = login(&h.app, EMAIL, "WrongPassword1!").await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let user = stored_user(&h.store, EMAIL).await;
    assert_eq!(user.failed_login_attempts, 5);
    assert_eq!(user.locked_until, locked_until);
}

#[tokio::test]
async fn lockout_expires_and_success_resets_counter() {
    let h = harness_with(AuthConfig {
        max_login_attempts: 2,
        lockout_duration: Duration::from_secs(1),
        ..test_config()
    });
    register(&h.app, EMAIL).await;

    login(&h.app, EMAIL, "WrongPassword1!").await;
    login(&h.app, EMAIL, "WrongPassword1!").await;
    assert_eq!(login(&h.app, EMAIL, PASSWORD).await.0, StatusCode::FORBIDDEN);

    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert_eq!(login(&h.app, EMAIL, PASSWORD).await.0, StatusCode::OK);

    let user = stored_user(&h.store, EMAIL).await;
    assert_eq!(user.failed_login_attempts, 0);
    assert!(user.locked_until.is_none());
    assert!(user.last_login.is_some());
}

#[tokio::test]
async fn unknown_email_and_wrong_password_look_the_same() {
    let h = harness();
    register(&h.app, EMAIL).await;

    let unknown = login(&h.app, "nobody@example.com", PASSWORD).await;
    let wrong = login(&h.app, EMAIL, "WrongPassword1!").await;
    assert_eq!(unknown, wrong);
}

#[tokio::test]
async fn deactivated_account_cannot_log_in_or_refresh() {
    let h = harness();
    let (_, body) = register(&h.app, EMAIL).await;
    let refresh = token(&body, "refreshToken");
    let user_id = body["data"]["user"]["id"].as_str().unwrap().parse().unwrap();

    h.store.set_active(&user_id, false).await;

    let (status, body) = login(&h.app, EMAIL, PASSWORD).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Account is deactivated");

    let (status, _) = send(&h.app, post_json("/refresh", json!({ "refreshToken": refresh }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn logout_revokes_access_token() {
    let h = harness();
    register(&h.app, EMAIL).await;
    let (_, body) = login(&h.app, EMAIL, PASSWORD).await;
    let access = token(&body, "accessToken");

    let (status, _) = send(&h.app, with_bearer("GET", "/profile", &access)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&h.app, with_bearer("POST", "/logout", &access)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    // Signature alone still verifies; the registry is what rejects it.
    assert!(h.services.codec.verify(&access).is_ok());

    let (status, body) = send(&h.app, with_bearer("GET", "/profile", &access)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Token has been revoked");
}

#[tokio::test]
async fn logout_twice_succeeds() {
    let h = harness();
    let (_, body) = register(&h.app, EMAIL).await;
    let access = token(&body, "accessToken");

    let first = send(&h.app, with_bearer("POST", "/logout", &access)).await;
    let second = send(&h.app, with_bearer("POST", "/logout", &access)).await;
    assert_eq!(first.0, StatusCode::OK);
    assert_eq!(second.0, StatusCode::OK);

    wait_for_audit(&h.store, 2).await;
    let logouts = h
        .store
        .audit_entries()
        .await
        .into_iter()
        .filter(|e| e.event_type == AuditEventType::UserLoggedOut)
        .count();
    assert_eq!(logouts, 1);
}

#[tokio::test]
async fn logout_without_token_is_unauthorized() {
    let h = harness();
    let req = Request::post("/logout").body(Body::empty()).unwrap();
    let (status, body) = send(&h.app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "No token provided");
}

#[tokio::test]
async fn logout_fails_when_revocation_cannot_be_recorded() {
    let h = harness();
    let (_, body) = register(&h.app, EMAIL).await;
    let access = token(&body, "accessToken");

    h.store.fail_revocations(true);
    let (status, body) = send(&h.app, with_bearer("POST", "/logout", &access)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Internal server error");
}

#[tokio::test]
async fn refresh_issues_new_pair_and_rejects_access_token() {
    let h = harness();
    let (_, body) = register(&h.app, EMAIL).await;
    let access = token(&body, "accessToken");
    let refresh = token(&body, "refreshToken");

    let (status, body) = send(&h.app, post_json("/refresh", json!({ "refreshToken": refresh }))).await;
    assert_eq!(status, StatusCode::OK);
    let new_access = token(&body, "accessToken");
    assert!(h.services.codec.verify_kind(&new_access, TokenKind::Access).is_ok());

    // Without rotation the old refresh token stays usable.
    let (status, _) = send(&h.app, post_json("/refresh", json!({ "refreshToken": refresh }))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&h.app, post_json("/refresh", json!({ "refreshToken": access }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid token type");

    let (status, body) = send(&h.app, post_json("/refresh", json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Refresh token is required");

    let (status, body) =
        send(&h.app, post_json("/refresh", json!({ "refreshToken": "garbage" }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid or expired refresh token");
}

#[tokio::test]
async fn refresh_rotation_revokes_presented_token() {
    let h = harness_with(AuthConfig {
        rotate_refresh_tokens: true,
        ..test_config()
    });
    let (_, body) = register(&h.app, EMAIL).await;
    let refresh = token(&body, "refreshToken");

    let (status, _) = send(&h.app, post_json("/refresh", json!({ "refreshToken": refresh }))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&h.app, post_json("/refresh", json!({ "refreshToken": refresh }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Token has been revoked");
}

#[tokio::test]
async fn revoked_refresh_token_is_rejected() {
    let h = harness();
    let (_, body) = register(&h.app, EMAIL).await;
    let refresh = token(&body, "refreshToken");

    h.store
        .revoke(&refresh, Duration::from_secs(60))
        .await
        .unwrap();

    let (status, body) = send(&h.app, post_json("/refresh", json!({ "refreshToken": refresh }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Token has been revoked");
}

#[tokio::test]
async fn profile_requires_access_token() {
    let h = harness();
    let (_, body) = register(&h.app, EMAIL).await;
    let refresh = token(&body, "refreshToken");

    let req = Request::get("/profile").body(Body::empty()).unwrap();
    assert_eq!(send(&h.app, req).await.0, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&h.app, with_bearer("GET", "/profile", &refresh)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid token type");
}

#[tokio::test]
async fn profile_of_vanished_user_is_not_found() {
    let h = harness();
    let stranger = TokenSubject::new(uuid::Uuid::new_v4().to_string());
    let access = h
        .services
        .codec
        .issue(&stranger, TokenKind::Access, Duration::from_secs(60))
        .unwrap()
        .token;

    let (status, body) = send(&h.app, with_bearer("GET", "/profile", &access)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "User not found");
}

#[tokio::test]
async fn side_effects_recorded_and_failures_do_not_break_requests() {
    let h = harness();
    register(&h.app, EMAIL).await;
    login(&h.app, EMAIL, PASSWORD).await;
    login(&h.app, EMAIL, "WrongPassword1!").await;

    wait_for_audit(&h.store, 3).await;
    let types: Vec<_> = h
        .store
        .audit_entries()
        .await
        .into_iter()
        .map(|e| e.event_type)
        .collect();
    assert!(types.contains(&AuditEventType::UserRegistered));
    assert!(types.contains(&AuditEventType::UserLoggedIn));
    assert!(types.contains(&AuditEventType::LoginFailed));
    assert_eq!(h.store.events().await.len(), 2);

    h.store.fail_side_effects(true);
    let (status, _) = register(&h.app, "bob@example.com").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(login(&h.app, "bob@example.com", PASSWORD).await.0, StatusCode::OK);
}

#[tokio::test]
async fn login_is_rate_limited_per_client() {
    let h = harness_with(AuthConfig {
        login_rate_limit: RateLimitConfig::per_minute(2),
        ..test_config()
    });

    for _ in 0..2 {
        let (status, _) = login(&h.app, EMAIL, PASSWORD).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    let response = h
        .app
        .clone()
        .oneshot(post_json("/login", json!({ "email": EMAIL, "password": PASSWORD })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key(header::RETRY_AFTER));

    // Other routes keep their own counters.
    assert_eq!(register(&h.app, EMAIL).await.0, StatusCode::CREATED);
}

#[tokio::test]
async fn login_limit_keys_on_peer_unless_it_is_a_trusted_proxy() {
    let h = harness_with(AuthConfig {
        login_rate_limit: RateLimitConfig::per_minute(2),
        trusted_proxies: TrustedProxies::new(["10.1.1.1".parse().unwrap()]),
        ..test_config()
    });

    // A direct caller cannot mint new identities with the header.
    for i in 0..2 {
        let (status, _) = send(&h.app, login_from([203, 0, 113, 7], &format!("10.0.0.{i}"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
    let (status, _) = send(&h.app, login_from([203, 0, 113, 7], "10.0.0.9")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    // Behind the trusted proxy each forwarded client has its own counter.
    for client in ["198.51.100.1", "198.51.100.2", "198.51.100.3"] {
        let (status, _) = send(&h.app, login_from([10, 1, 1, 1], client)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
