//! End-to-end auth flow driven through the router with an in-memory database.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use sqlx::sqlite::SqlitePoolOptions;
use tower::ServiceExt;

use dikto::api::{create_router, AppState};
use dikto::config::Config;

fn test_config() -> Config {
    Config {
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        database_url: "sqlite::memory:".to_string(),
        audio_dir: std::env::temp_dir(),
        session_expiry_hours: 1,
        db_max_connections: 1,
        openai_api_key: None,
        speech_api_base: "http://127.0.0.1:0".to_string(),
        whisper_model: "whisper-1".to_string(),
        whisper_language: "da".to_string(),
        gemini_api_key_free: None,
        gemini_api_key_paid: None,
        gemini_api_base: "http://127.0.0.1:0".to_string(),
        gemini_model: "gemini-3-flash-preview".to_string(),
        image_model: "gemini-3-pro-image-preview".to_string(),
        usd_to_dkk: 7.0,
        max_upload_bytes: 1024 * 1024,
    }
}

async fn test_app() -> Router {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();

    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    create_router(AppState::new(pool, test_config()))
}

fn json_request(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// The session cookie value from a Set-Cookie header.
fn session_cookie(response: &axum::response::Response) -> String {
    let header = response
        .headers()
        .get("Set-Cookie")
        .expect("response should set a session cookie")
        .to_str()
        .unwrap();

    let pair = header.split(';').next().unwrap();
    assert!(pair.starts_with("session_token="));
    pair.to_string()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_register_sets_session_cookie() {
    let app = test_app().await;

    let response = app
        .oneshot(json_request(
            "/api/auth/register",
            serde_json::json!({"username": "Alice", "password": "correct-horse-battery"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = session_cookie(&response);
    assert!(cookie.len() > "session_token=".len());

    let body = json_body(response).await;
    assert_eq!(body["username"], "alice");
    assert!(body.get("password_hash").is_none());
}

#[tokio::test]
async fn test_duplicate_username_conflicts() {
    let app = test_app().await;

    let first = app
        .clone()
        .oneshot(json_request(
            "/api/auth/register",
            serde_json::json!({"username": "alice", "password": "correct-horse-battery"}),
        ))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .oneshot(json_request(
            "/api/auth/register",
            serde_json::json!({"username": "alice", "password": "another-long-password"}),
        ))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_short_password_rejected() {
    let app = test_app().await;

    let response = app
        .oneshot(json_request(
            "/api/auth/register",
            serde_json::json!({"username": "alice", "password": "short"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_wrong_password_rejected() {
    let app = test_app().await;

    app.clone()
        .oneshot(json_request(
            "/api/auth/register",
            serde_json::json!({"username": "alice", "password": "correct-horse-battery"}),
        ))
        .await
        .unwrap();

    let response = app
        .oneshot(json_request(
            "/api/auth/login",
            serde_json::json!({"username": "alice", "password": "wrong-horse-battery"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_then_me_then_logout() {
    let app = test_app().await;

    app.clone()
        .oneshot(json_request(
            "/api/auth/register",
            serde_json::json!({"username": "alice", "password": "correct-horse-battery"}),
        ))
        .await
        .unwrap();

    let login = app
        .clone()
        .oneshot(json_request(
            "/api/auth/login",
            serde_json::json!({"username": "alice", "password": "correct-horse-battery"}),
        ))
        .await
        .unwrap();
    assert_eq!(login.status(), StatusCode::OK);
    let cookie = session_cookie(&login);

    let me = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/auth/me")
                .header("Cookie", &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(me.status(), StatusCode::OK);
    let body = json_body(me).await;
    assert_eq!(body["username"], "alice");

    let logout = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/logout")
                .header("Cookie", &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(logout.status(), StatusCode::OK);

    // The session row is gone, so the old cookie no longer authenticates
    let me_after = app
        .oneshot(
            Request::builder()
                .uri("/api/auth/me")
                .header("Cookie", &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(me_after.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_missing_cookie_unauthorized() {
    let app = test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/usage/summary")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
