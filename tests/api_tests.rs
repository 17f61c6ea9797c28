use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use rosterd::api::AppState;
use rosterd::config::Config;
use rosterd::entities::users::Role;
use rosterd::services::token;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

const ADMIN_SECRET: &str = "super-secret-admin-key";
const SIGNING_KEY: &str = "test-signing-key";

async fn spawn_app() -> (Router, Arc<AppState>) {
    let mut config = Config::default();
    config.general.database_path = "sqlite::memory:".to_string();
    // Single connection so every request sees the same in-memory database.
    config.general.max_db_connections = 1;
    config.general.min_db_connections = 1;
    config.auth.admin_signup_secret = Some(ADMIN_SECRET.to_string());
    config.auth.token_signing_key = Some(SIGNING_KEY.to_string());
    // Cheap hashing keeps the suite fast.
    config.security.argon2_memory_cost_kib = 1024;
    config.security.argon2_time_cost = 1;

    let state = rosterd::api::create_app_state(&config)
        .await
        .expect("Failed to create app state");
    let app = rosterd::api::router(state.clone(), &config);

    (app, state)
}

async fn request(
    app: &Router,
    method: &str,
    uri: &str,
    bearer: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };

    (status, json)
}

async fn register(
    app: &Router,
    username: &str,
    password: &str,
    secret: Option<&str>,
) -> (StatusCode, Value) {
    let mut body = json!({"username": username, "password": password});
    if let Some(secret) = secret {
        body["secretKey"] = Value::String(secret.to_string());
    }
    request(app, "POST", "/users", None, Some(body)).await
}

async fn login(app: &Router, username: &str, password: &str) -> (StatusCode, Value) {
    request(
        app,
        "POST",
        "/users/login",
        None,
        Some(json!({"username": username, "password": password})),
    )
    .await
}

/// Log in and pull the bearer token out of the envelope message.
async fn login_token(app: &Router, username: &str, password: &str) -> String {
    let (status, body) = login(app, username, password).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "SUCCESS");
    body["message"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_registration_approval_flow() {
    let (app, state) = spawn_app().await;

    let (status, body) = register(&app, "alice", "pw1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "SUCCESS");

    let alice = state
        .store
        .get_user_by_username("alice")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(alice.role, Role::User);
    assert!(!alice.approved);

    // Unapproved accounts cannot log in yet.
    let (status, body) = login(&app, "alice", "pw1").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["status"], "FAIL");

    // Admin approval happens out of band, directly against the store.
    state.store.approve_user(alice.id, true).await.unwrap();

    let bearer = login_token(&app, "alice", "pw1").await;
    let claims = token::verify(&bearer, SIGNING_KEY).unwrap();
    assert_eq!(claims.sub, alice.id);
    assert_eq!(claims.username, "alice");
    assert_eq!(claims.role, Role::User);
}

#[tokio::test]
async fn test_admin_registration_logs_in_immediately() {
    let (app, _state) = spawn_app().await;

    let (status, body) = register(&app, "root", "pw-root", Some(ADMIN_SECRET)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "SUCCESS");

    let bearer = login_token(&app, "root", "pw-root").await;
    let claims = token::verify(&bearer, SIGNING_KEY).unwrap();
    assert_eq!(claims.role, Role::Admin);
    assert!(claims.exp > chrono::Utc::now().timestamp());
}

#[tokio::test]
async fn test_wrong_admin_secret_rejected() {
    let (app, state) = spawn_app().await;

    let (status, body) = register(&app, "mallory", "pw", Some("not-the-secret")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["status"], "FAIL");

    // Nothing was inserted.
    assert!(
        state
            .store
            .get_user_by_username("mallory")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_duplicate_username_rejected() {
    let (app, state) = spawn_app().await;

    let (status, _) = register(&app, "alice", "pw1", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = register(&app, "alice", "pw2", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], "FAIL");

    assert_eq!(state.store.list_users().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_empty_credentials_rejected() {
    let (app, _state) = spawn_app().await;

    let (status, body) = register(&app, "", "pw", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "FAIL");

    let (status, _) = register(&app, "alice", "", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = login(&app, "", "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_failures() {
    let (app, _state) = spawn_app().await;

    let (status, body) = login(&app, "nobody", "pw").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "FAIL");

    register(&app, "root", "pw-root", Some(ADMIN_SECRET)).await;
    let (status, body) = login(&app, "root", "wrong").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], "FAIL");
}

#[tokio::test]
async fn test_list_is_admin_only_and_hash_free() {
    let (app, state) = spawn_app().await;

    register(&app, "root", "pw-root", Some(ADMIN_SECRET)).await;
    register(&app, "alice", "pw1", None).await;

    let alice = state
        .store
        .get_user_by_username("alice")
        .await
        .unwrap()
        .unwrap();
    state.store.approve_user(alice.id, true).await.unwrap();

    // A regular account is turned away.
    let user_token = login_token(&app, "alice", "pw1").await;
    let (status, body) = request(&app, "GET", "/users", Some(&user_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["status"], "FAIL");

    // The admin gets the raw array, in insertion order, without hashes.
    let admin_token = login_token(&app, "root", "pw-root").await;
    let (status, body) = request(&app, "GET", "/users", Some(&admin_token), None).await;
    assert_eq!(status, StatusCode::OK);

    let users = body.as_array().expect("list endpoint returns a raw array");
    assert_eq!(users.len(), 2);
    assert_eq!(users[0]["username"], "root");
    assert_eq!(users[0]["role"], "admin");
    assert_eq!(users[1]["username"], "alice");
    assert_eq!(users[1]["role"], "user");

    for user in users {
        let fields = user.as_object().unwrap();
        assert!(!fields.contains_key("password"));
        assert!(!fields.contains_key("password_hash"));
    }
}

#[tokio::test]
async fn test_update_is_self_service_for_regular_accounts() {
    let (app, state) = spawn_app().await;

    register(&app, "root", "pw-root", Some(ADMIN_SECRET)).await;
    register(&app, "alice", "pw1", None).await;

    let root = state
        .store
        .get_user_by_username("root")
        .await
        .unwrap()
        .unwrap();
    let alice = state
        .store
        .get_user_by_username("alice")
        .await
        .unwrap()
        .unwrap();
    state.store.approve_user(alice.id, true).await.unwrap();

    // Alice names the admin's id, but only her own row may change.
    let alice_token = login_token(&app, "alice", "pw1").await;
    let (status, body) = request(
        &app,
        "PATCH",
        "/users",
        Some(&alice_token),
        Some(json!({"id": root.id, "password": "pw2"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "SUCCESS");

    // Her password changed; the admin's did not.
    let (status, _) = login(&app, "alice", "pw1").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    login_token(&app, "alice", "pw2").await;
    login_token(&app, "root", "pw-root").await;

    // An admin may rename any account.
    let admin_token = login_token(&app, "root", "pw-root").await;
    let (status, _) = request(
        &app,
        "PATCH",
        "/users",
        Some(&admin_token),
        Some(json!({"id": alice.id, "username": "alicia"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(
        state
            .store
            .get_user_by_username("alicia")
            .await
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
async fn test_update_edge_cases() {
    let (app, state) = spawn_app().await;

    register(&app, "root", "pw-root", Some(ADMIN_SECRET)).await;
    register(&app, "alice", "pw1", None).await;

    let alice = state
        .store
        .get_user_by_username("alice")
        .await
        .unwrap()
        .unwrap();
    state.store.approve_user(alice.id, true).await.unwrap();

    // Empty fields are no-ops: the record is left untouched.
    let alice_token = login_token(&app, "alice", "pw1").await;
    let (status, body) = request(
        &app,
        "PATCH",
        "/users",
        Some(&alice_token),
        Some(json!({"username": "", "password": ""})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "SUCCESS");

    let unchanged = state.store.get_user_by_id(alice.id).await.unwrap().unwrap();
    assert_eq!(unchanged.username, "alice");
    login_token(&app, "alice", "pw1").await;

    // Admin updates must name a target.
    let admin_token = login_token(&app, "root", "pw-root").await;
    let (status, body) = request(
        &app,
        "PATCH",
        "/users",
        Some(&admin_token),
        Some(json!({"username": "renamed"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "FAIL");

    // Renaming onto a taken username collides.
    let (status, _) = request(
        &app,
        "PATCH",
        "/users",
        Some(&admin_token),
        Some(json!({"id": alice.id, "username": "root"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Unknown target id.
    let (status, _) = request(
        &app,
        "PATCH",
        "/users",
        Some(&admin_token),
        Some(json!({"id": 999, "username": "ghost"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_flow() {
    let (app, state) = spawn_app().await;

    register(&app, "root", "pw-root", Some(ADMIN_SECRET)).await;
    register(&app, "alice", "pw1", None).await;

    let alice = state
        .store
        .get_user_by_username("alice")
        .await
        .unwrap()
        .unwrap();
    state.store.approve_user(alice.id, true).await.unwrap();

    // Regular accounts may not delete.
    let alice_token = login_token(&app, "alice", "pw1").await;
    let uri = format!("/users?id={}", alice.id);
    let (status, _) = request(&app, "DELETE", &uri, Some(&alice_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin_token = login_token(&app, "root", "pw-root").await;

    // Bad query params keep the envelope.
    let (status, body) = request(&app, "DELETE", "/users", Some(&admin_token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "FAIL");

    let (status, _) = request(&app, "DELETE", "/users?id=abc", Some(&admin_token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Hard delete, then the id is gone.
    let (status, body) = request(&app, "DELETE", &uri, Some(&admin_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "SUCCESS");
    assert!(state.store.get_user_by_id(alice.id).await.unwrap().is_none());

    let (status, body) = request(&app, "DELETE", &uri, Some(&admin_token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "FAIL");
}

#[tokio::test]
async fn test_token_rejections() {
    let (app, _state) = spawn_app().await;

    // No Authorization header at all.
    let (status, body) = request(&app, "GET", "/users", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], "FAIL");

    // Header without the Bearer prefix.
    let raw = Request::builder()
        .uri("/users")
        .header(header::AUTHORIZATION, "just-a-token")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(raw).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Expired token, signed with the real key.
    let expired = jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &json!({
            "sub": 1,
            "username": "root",
            "role": "admin",
            "exp": chrono::Utc::now().timestamp() - 300,
        }),
        &jsonwebtoken::EncodingKey::from_secret(SIGNING_KEY.as_bytes()),
    )
    .unwrap();
    let (status, body) = request(&app, "GET", "/users", Some(&expired), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "token has expired");

    // Valid-looking token signed with a different key.
    let foreign = jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &json!({
            "sub": 1,
            "username": "root",
            "role": "admin",
            "exp": chrono::Utc::now().timestamp() + 600,
        }),
        &jsonwebtoken::EncodingKey::from_secret(b"some-other-key"),
    )
    .unwrap();
    let (status, body) = request(&app, "GET", "/users", Some(&foreign), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "token signature is invalid");

    // Garbage token.
    let (status, body) = request(&app, "GET", "/users", Some("not.a.jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "token is malformed");
}
