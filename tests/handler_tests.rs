use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
};
use chrono::Utc;
use resume_portal::{
    AppConfig, AppState, MemoryRepository, MockSessionProvider, MockStorageService,
    create_router,
    error::AppError,
    media::UploadError,
    models::{
        CoursesPage, DemoCourse, LoginPage, LoginResponse, MeResponse, ResumeBundle, ResumeData,
        UploadResponse, User, WorkExperience,
    },
    repository::StoreError,
    session::Role,
    workflow::WorkflowError,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

// --- Test App ---

const ADMIN_ID: Uuid = Uuid::from_u128(10);
const USER_ID: Uuid = Uuid::from_u128(20);
const RESUME_ID: Uuid = Uuid::from_u128(30);

struct TestApp {
    router: Router,
    storage: MockStorageService,
    provider: MockSessionProvider,
}

fn seeded_repo() -> MemoryRepository {
    MemoryRepository::new()
        .with_user(User {
            id: ADMIN_ID,
            username: "admin".to_string(),
            role: "admin".to_string(),
        })
        .with_user(User {
            id: USER_ID,
            username: "visitor".to_string(),
            role: "user".to_string(),
        })
        .with_resume(ResumeData {
            id: RESUME_ID,
            name: "Ada".to_string(),
            title: "Engineer".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            ..ResumeData::default()
        })
        .with_work_experience(WorkExperience {
            id: Uuid::new_v4(),
            resume_id: RESUME_ID,
            title: "Backend".to_string(),
            ..WorkExperience::default()
        })
}

fn spawn(repo: MemoryRepository) -> TestApp {
    let storage = MockStorageService::new();
    let provider = MockSessionProvider::new()
        .with_account("admin", "secret", ADMIN_ID)
        .with_account("visitor", "visitor-pw", USER_ID);

    let state = AppState::new(
        Arc::new(repo),
        Arc::new(storage.clone()),
        Arc::new(provider.clone()),
        AppConfig::default(),
    );

    TestApp {
        router: create_router(state),
        storage,
        provider,
    }
}

fn app() -> TestApp {
    spawn(seeded_repo())
}

async fn send(app: &TestApp, request: Request<Body>) -> Response {
    app.router.clone().oneshot(request).await.unwrap()
}

async fn json_body<T: serde::de::DeserializeOwned>(response: Response) -> T {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn get_as(uri: &str, user: Option<Uuid>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(id) = user {
        builder = builder.header("x-user-id", id.to_string());
    }
    builder.body(Body::empty()).unwrap()
}

fn json_as(method: &str, uri: &str, user: Option<Uuid>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(id) = user {
        builder = builder.header("x-user-id", id.to_string());
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn multipart_as(uri: &str, user: Uuid, file_name: &str, content_type: &str, data: &[u8]) -> Request<Body> {
    let boundary = "resume-portal-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header("x-user-id", user.to_string())
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

// --- Public API ---

#[tokio::test]
async fn test_health_check() {
    let app = app();
    let response = send(&app, get_as("/health", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_resume_bundle() {
    let app = app();
    let response = send(&app, get_as("/api/resume", None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let bundle: ResumeBundle = json_body(response).await;
    assert_eq!(bundle.resume.map(|r| r.name).as_deref(), Some("Ada"));
    assert_eq!(bundle.work_experiences.len(), 1);
    assert!(bundle.skills.is_empty());
}

#[tokio::test]
async fn test_failing_store_serves_empty_lists() {
    let app = spawn(MemoryRepository::new_failing());

    let response = send(&app, get_as("/api/courses", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let courses: Vec<DemoCourse> = json_body(response).await;
    assert!(courses.is_empty());

    let bundle: ResumeBundle = json_body(send(&app, get_as("/api/resume", None)).await).await;
    assert!(bundle.resume.is_none());
}

#[tokio::test]
async fn test_unknown_course_is_404_json() {
    let app = app();
    let response = send(&app, get_as(&format!("/api/courses/{}", Uuid::new_v4()), None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body: Value = json_body(response).await;
    assert_eq!(body["error"], true);
    assert_eq!(body["code"], "NOT_FOUND");
}

// --- Login / logout ---

#[tokio::test]
async fn test_login_success_sets_cookie_and_redirect() {
    let app = app();
    let response = send(
        &app,
        json_as(
            "POST",
            "/api/auth/login",
            None,
            json!({ "username": "admin", "password": "secret", "from": "/admin/edit" }),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("access_token=mock-token-"));
    assert!(cookie.contains("HttpOnly"));

    let body: LoginResponse = json_body(response).await;
    assert_eq!(body.user_id, ADMIN_ID);
    assert_eq!(body.role, Role::Admin);
    assert_eq!(body.redirect_to, "/admin/edit");
}

#[tokio::test]
async fn test_login_redirect_defaults_home_and_rejects_offsite() {
    let app = app();
    let response = send(
        &app,
        json_as(
            "POST",
            "/api/auth/login",
            None,
            json!({ "username": "visitor", "password": "visitor-pw", "from": "//evil.example" }),
        ),
    )
    .await;

    let body: LoginResponse = json_body(response).await;
    assert_eq!(body.role, Role::User);
    assert_eq!(body.redirect_to, "/");
}

#[tokio::test]
async fn test_login_invalid_username_never_reaches_provider() {
    let app = app();
    let response = send(
        &app,
        json_as(
            "POST",
            "/api/auth/login",
            None,
            json!({ "username": "admin; drop", "password": "secret" }),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.provider.calls(), 0);
    let body: Value = json_body(response).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_login_wrong_password_is_401() {
    let app = app();
    let response = send(
        &app,
        json_as(
            "POST",
            "/api/auth/login",
            None,
            json!({ "username": "admin", "password": "nope" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_me_and_logout() {
    let app = app();
    let me: MeResponse = json_body(send(&app, get_as("/api/me", Some(ADMIN_ID))).await).await;
    assert_eq!(me.id, ADMIN_ID);
    assert_eq!(me.role, Role::Admin);

    let response = send(&app, json_as("POST", "/api/auth/logout", Some(ADMIN_ID), json!({}))).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let cookie = response.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(cookie.contains("Max-Age=0"));
}

#[tokio::test]
async fn test_logout_clears_cookie_when_provider_fails() {
    let repo = seeded_repo();
    let provider = MockSessionProvider::new().with_failing_sign_out();
    let router = create_router(AppState::new(
        Arc::new(repo),
        Arc::new(MockStorageService::new()),
        Arc::new(provider.clone()),
        AppConfig::default(),
    ));

    let request = Request::builder()
        .method("POST")
        .uri("/api/auth/logout")
        .header("x-user-id", ADMIN_ID.to_string())
        .header(header::COOKIE, "access_token=stale-token")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(provider.calls(), 1);
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let cookie = response.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(cookie.starts_with("access_token=;"));
    assert!(cookie.contains("Max-Age=0"));
}

// --- Admin API ---

#[tokio::test]
async fn test_course_crud_as_admin() {
    let app = app();

    let create = |title: &str| {
        json_as(
            "POST",
            "/api/admin/courses",
            Some(ADMIN_ID),
            json!({ "title": title, "description": "intro" }),
        )
    };

    let first: DemoCourse = json_body(send(&app, create("One")).await).await;
    let response = send(&app, create("Two")).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let second: DemoCourse = json_body(response).await;
    assert_eq!((first.sort_order, second.sort_order), (0, 1));

    let response = send(
        &app,
        json_as(
            "PUT",
            &format!("/api/admin/courses/{}", second.id),
            Some(ADMIN_ID),
            json!({ "video_url": "http://localhost:9000/course-videos/video_1_abcdef.mp4" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated: DemoCourse = json_body(response).await;
    assert_eq!(updated.title, "Two");
    assert!(updated.video_url.is_some());

    let delete = Request::builder()
        .method("DELETE")
        .uri(format!("/api/admin/courses/{}", first.id))
        .header("x-user-id", ADMIN_ID.to_string())
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&app, delete).await.status(), StatusCode::NO_CONTENT);

    let listed: Vec<DemoCourse> = json_body(send(&app, get_as("/api/courses", None)).await).await;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].sort_order, 1);
}

#[tokio::test]
async fn test_create_course_requires_title() {
    let app = app();
    let response = send(
        &app,
        json_as("POST", "/api/admin/courses", Some(ADMIN_ID), json!({ "title": "  " })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_non_admin_cannot_mutate() {
    let app = app();
    let response = send(
        &app,
        json_as("POST", "/api/admin/courses", Some(USER_ID), json!({ "title": "x" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(
        &app,
        json_as("POST", "/api/admin/courses", None, json!({ "title": "x" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_update_resume() {
    let app = app();
    let response = send(
        &app,
        json_as(
            "PUT",
            &format!("/api/admin/resume/{}", RESUME_ID),
            Some(ADMIN_ID),
            json!({ "location": "Dublin" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated: ResumeData = json_body(response).await;
    assert_eq!(updated.location, "Dublin");
    assert_eq!(updated.name, "Ada");

    let missing = send(
        &app,
        json_as(
            "PUT",
            &format!("/api/admin/resume/{}", Uuid::new_v4()),
            Some(ADMIN_ID),
            json!({}),
        ),
    )
    .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[test]
fn test_error_status_mapping() {
    let store: AppError = StoreError::Unavailable("down".to_string()).into();
    assert_eq!(store.status_code(), StatusCode::BAD_GATEWAY);

    let conflict: AppError = UploadError::StoreConflict("file_1_abcdef.pdf".to_string()).into();
    assert_eq!(conflict.status_code(), StatusCode::CONFLICT);

    let compression: AppError = UploadError::CompressionFailed("decode".to_string()).into();
    assert_eq!(compression.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

    let busy: AppError = WorkflowError::Busy.into();
    assert_eq!(busy.status_code(), StatusCode::CONFLICT);
    assert_eq!(busy.error_code(), "CONFLICT");
}

// --- Uploads ---

#[tokio::test]
async fn test_document_upload() {
    let app = app();
    let response = send(
        &app,
        multipart_as(
            "/api/admin/uploads/document",
            ADMIN_ID,
            "Notes.pdf",
            "application/pdf",
            b"%PDF-1.7 test",
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let uploaded: UploadResponse = json_body(response).await;
    assert!(uploaded.url.starts_with("http://localhost:9000/course-files/file_"));
    assert_eq!(uploaded.name.as_deref(), Some("Notes.pdf"));
    assert_eq!(app.storage.put_calls(), 1);
}

#[tokio::test]
async fn test_upload_rejects_wrong_type_before_storage() {
    let app = app();
    let response = send(
        &app,
        multipart_as(
            "/api/admin/uploads/document",
            ADMIN_ID,
            "archive.zip",
            "application/zip",
            b"PK",
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.storage.put_calls(), 0);
}

#[tokio::test]
async fn test_upload_unknown_kind_is_rejected() {
    let app = app();
    let response = send(
        &app,
        multipart_as("/api/admin/uploads/audio", ADMIN_ID, "a.mp3", "audio/mpeg", b"ID3"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.storage.put_calls(), 0);
}

#[tokio::test]
async fn test_upload_requires_admin() {
    let app = app();
    let response = send(
        &app,
        multipart_as("/api/admin/uploads/video", USER_ID, "a.mp4", "video/mp4", b"...."),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(app.storage.put_calls(), 0);
}

// --- Guarded pages ---

#[tokio::test]
async fn test_anonymous_admin_page_redirects_to_login() {
    let app = app();
    let response = send(&app, get_as("/admin/edit", None)).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login?from=%2Fadmin%2Fedit");
    let body: Value = json_body(response).await;
    assert_eq!(body["redirect"]["from"], "/admin/edit");
    assert_eq!(body["redirect"]["replace"], true);
}

#[tokio::test]
async fn test_user_admin_page_redirects_home() {
    let app = app();
    let response = send(&app, get_as("/admin/courses", Some(USER_ID))).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");
}

#[tokio::test]
async fn test_admin_page_renders_for_admin() {
    let app = app();
    let response = send(&app, get_as("/admin/edit", Some(ADMIN_ID))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let bundle: ResumeBundle = json_body(response).await;
    assert!(bundle.resume.is_some());
}

#[tokio::test]
async fn test_courses_page_manage_flag() {
    let repo = seeded_repo().with_course(DemoCourse {
        id: Uuid::new_v4(),
        title: "Only".to_string(),
        ..DemoCourse::default()
    });
    let app = spawn(repo);

    let anonymous: CoursesPage = json_body(send(&app, get_as("/courses", None)).await).await;
    assert!(!anonymous.can_manage);
    assert_eq!(anonymous.selected.map(|c| c.title).as_deref(), Some("Only"));

    let admin: CoursesPage = json_body(send(&app, get_as("/courses", Some(ADMIN_ID))).await).await;
    assert!(admin.can_manage);
}

#[tokio::test]
async fn test_login_page_echoes_from() {
    let app = app();
    let page: LoginPage =
        json_body(send(&app, get_as("/login?from=%2Fadmin%2Fedit", None)).await).await;
    assert_eq!(page.from, "/admin/edit");
}

#[tokio::test]
async fn test_unknown_page_is_protected() {
    let app = app();

    let anonymous = send(&app, get_as("/somewhere", None)).await;
    assert_eq!(anonymous.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&anonymous), "/login?from=%2Fsomewhere");

    let signed_in = send(&app, get_as("/somewhere", Some(USER_ID))).await;
    assert_eq!(signed_in.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_status_pages_render() {
    let app = app();
    assert_eq!(send(&app, get_as("/403", None)).await.status(), StatusCode::FORBIDDEN);
    assert_eq!(send(&app, get_as("/404", None)).await.status(), StatusCode::NOT_FOUND);
}
