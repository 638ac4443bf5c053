use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use jsonwebtoken::{EncodingKey, Header, encode};
use resume_portal::{
    AppState, MemoryRepository, MockSessionProvider, MockStorageService,
    auth::{Claims, bearer_token},
    config::{AppConfig, Env},
    create_router,
    models::User,
};
use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};
use tower::ServiceExt;
use uuid::Uuid;

// --- Helper Functions ---

const TEST_JWT_SECRET: &str = "test-secret-value-1234567890";
const ADMIN_ID: Uuid = Uuid::from_u128(1);
const USER_ID: Uuid = Uuid::from_u128(2);

fn create_token(user_id: Uuid, exp_offset: i64, audience: &str, secret: &str) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64;

    let claims = Claims {
        sub: user_id,
        iat: now as usize,
        exp: (now + exp_offset) as usize,
        aud: audience.to_string(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

fn valid_token(user_id: Uuid) -> String {
    create_token(user_id, 3600, "authenticated", TEST_JWT_SECRET)
}

fn app(env: Env) -> axum::Router {
    let repo = MemoryRepository::new()
        .with_user(User {
            id: ADMIN_ID,
            username: "admin".to_string(),
            role: "admin".to_string(),
        })
        .with_user(User {
            id: USER_ID,
            username: "visitor".to_string(),
            role: "user".to_string(),
        });

    let mut config = AppConfig::default();
    config.env = env;
    config.jwt_secret = TEST_JWT_SECRET.to_string();

    create_router(AppState::new(
        Arc::new(repo),
        Arc::new(MockStorageService::new()),
        Arc::new(MockSessionProvider::new()),
        config,
    ))
}

async fn get_me(app: axum::Router, request: Request<Body>) -> StatusCode {
    app.oneshot(request).await.unwrap().status()
}

fn me_request() -> axum::http::request::Builder {
    Request::builder().uri("/api/me")
}

// --- Token parsing ---

#[test]
fn test_bearer_header_wins_over_cookie() {
    let mut headers = axum::http::HeaderMap::new();
    headers.insert(header::COOKIE, "theme=dark; access_token=from-cookie".parse().unwrap());
    assert_eq!(bearer_token(&headers).as_deref(), Some("from-cookie"));

    headers.insert(header::AUTHORIZATION, "Bearer from-header".parse().unwrap());
    assert_eq!(bearer_token(&headers).as_deref(), Some("from-header"));
}

#[test]
fn test_non_bearer_authorization_is_ignored() {
    let mut headers = axum::http::HeaderMap::new();
    headers.insert(header::AUTHORIZATION, "Basic YWRtaW46cHc=".parse().unwrap());
    assert_eq!(bearer_token(&headers), None);
}

// --- JWT validation ---

#[tokio::test]
async fn test_valid_token_is_accepted() {
    let request = me_request()
        .header(header::AUTHORIZATION, format!("Bearer {}", valid_token(USER_ID)))
        .body(Body::empty())
        .unwrap();
    assert_eq!(get_me(app(Env::Production), request).await, StatusCode::OK);
}

#[tokio::test]
async fn test_token_in_cookie_is_accepted() {
    let request = me_request()
        .header(header::COOKIE, format!("access_token={}", valid_token(USER_ID)))
        .body(Body::empty())
        .unwrap();
    assert_eq!(get_me(app(Env::Production), request).await, StatusCode::OK);
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let token = create_token(USER_ID, -3600, "authenticated", TEST_JWT_SECRET);
    let request = me_request()
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    assert_eq!(get_me(app(Env::Production), request).await, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_wrong_audience_is_rejected() {
    let token = create_token(USER_ID, 3600, "anon", TEST_JWT_SECRET);
    let request = me_request()
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    assert_eq!(get_me(app(Env::Production), request).await, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_wrong_secret_is_rejected() {
    let token = create_token(USER_ID, 3600, "authenticated", "some-other-secret");
    let request = me_request()
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    assert_eq!(get_me(app(Env::Production), request).await, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_without_profile_is_a_plain_user() {
    let id = Uuid::new_v4();
    let request = me_request()
        .header(header::AUTHORIZATION, format!("Bearer {}", valid_token(id)))
        .body(Body::empty())
        .unwrap();
    let response = app(Env::Production).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let me: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(me["id"], id.to_string());
    assert_eq!(me["role"], "user");
}

#[tokio::test]
async fn test_token_without_profile_is_sent_home_from_admin_pages() {
    let token = valid_token(Uuid::new_v4());
    let page = |uri: &str| {
        Request::builder()
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap()
    };

    let admin_page = app(Env::Production).oneshot(page("/admin/edit")).await.unwrap();
    assert_eq!(admin_page.status(), StatusCode::SEE_OTHER);
    assert_eq!(admin_page.headers().get(header::LOCATION).unwrap(), "/");

    // Signed in, so an unknown path is a 404 rather than a trip to the login page.
    let unknown = app(Env::Production).oneshot(page("/somewhere")).await.unwrap();
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_missing_token_is_rejected() {
    let request = me_request().body(Body::empty()).unwrap();
    assert_eq!(get_me(app(Env::Local), request).await, StatusCode::UNAUTHORIZED);
}

// --- Local bypass ---

#[tokio::test]
async fn test_local_bypass_accepts_known_profile() {
    let request = me_request()
        .header("x-user-id", USER_ID.to_string())
        .body(Body::empty())
        .unwrap();
    assert_eq!(get_me(app(Env::Local), request).await, StatusCode::OK);
}

#[tokio::test]
async fn test_bypass_is_disabled_in_production() {
    let request = me_request()
        .header("x-user-id", USER_ID.to_string())
        .body(Body::empty())
        .unwrap();
    assert_eq!(get_me(app(Env::Production), request).await, StatusCode::UNAUTHORIZED);
}

// --- Admin gate ---

#[tokio::test]
async fn test_admin_gate_distinguishes_401_and_403() {
    let delete = |auth: Option<String>| {
        let mut builder = Request::builder()
            .method("DELETE")
            .uri(format!("/api/admin/courses/{}", Uuid::new_v4()));
        if let Some(token) = auth {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::empty()).unwrap()
    };

    let anonymous = app(Env::Production).oneshot(delete(None)).await.unwrap();
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let user = app(Env::Production)
        .oneshot(delete(Some(valid_token(USER_ID))))
        .await
        .unwrap();
    assert_eq!(user.status(), StatusCode::FORBIDDEN);
    let bytes = axum::body::to_bytes(user.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], true);
    assert_eq!(body["code"], "FORBIDDEN");

    // Admin passes the gate; the course itself does not exist.
    let admin = app(Env::Production)
        .oneshot(delete(Some(valid_token(ADMIN_ID))))
        .await
        .unwrap();
    assert_eq!(admin.status(), StatusCode::NOT_FOUND);
}
