use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
    middleware,
    routing::any,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Access control: path classification, session state, the route guard, token verification.
pub mod access;
pub mod auth;
pub mod guard;
pub mod session;

// Records and media.
pub mod media;
pub mod models;
pub mod repository;
pub mod storage;

// Admin editor workflows over the gateway and the upload pipeline.
pub mod workflow;

pub mod config;
pub mod error;
pub mod handlers;

// Module for routing segregation (Public, Authenticated, Admin, Pages).
pub mod routes;
use routes::{admin, authenticated, pages, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use media::{Buckets, MediaPipeline};
pub use repository::{MemoryRepository, PostgresRepository, RepositoryState};
pub use session::{MockSessionProvider, SessionProviderState, SupabaseAuthProvider};
pub use storage::{MockStorageService, S3StorageClient, StorageState};

/// ApiDoc
///
/// OpenAPI document for the JSON API, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health, handlers::get_resume, handlers::get_courses, handlers::get_course,
        handlers::login, handlers::get_me, handlers::logout, handlers::update_resume,
        handlers::create_course, handlers::update_course, handlers::delete_course,
        handlers::upload_media,
    ),
    components(
        schemas(
            models::ResumeData, models::WorkExperience, models::Skill, models::Honor,
            models::DemoCourse, models::ResumeBundle, models::UpdateResumeRequest,
            models::CreateCourseRequest, models::UpdateCourseRequest, models::LoginRequest,
            models::LoginResponse, models::MeResponse, models::UploadResponse,
            models::CoursesPage, models::LoginPage, models::StatusPage, models::RedirectBody,
            session::Role, guard::Navigation,
        )
    ),
    tags(
        (name = "resume-portal", description = "Resume and demo-course API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The shared container of every service a request may need. Cloning is cheap: each service
/// is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Record CRUD gateway (Postgres in production, in-memory in tests).
    pub repo: RepositoryState,
    /// Object store used by the media pipeline.
    pub storage: StorageState,
    /// Hosted auth provider for sign-in and sign-out.
    pub auth: SessionProviderState,
    pub media: MediaPipeline,
    pub config: AppConfig,
}

impl AppState {
    /// Assembles the state; the media pipeline writes to `storage` using the configured buckets.
    pub fn new(
        repo: RepositoryState,
        storage: StorageState,
        auth: SessionProviderState,
        config: AppConfig,
    ) -> Self {
        let media = MediaPipeline::new(storage.clone(), Buckets::from_config(&config));
        Self {
            repo,
            storage,
            auth,
            media,
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for SessionProviderState {
    fn from_ref(app_state: &AppState) -> SessionProviderState {
        app_state.auth.clone()
    }
}

impl FromRef<AppState> for MediaPipeline {
    fn from_ref(app_state: &AppState) -> MediaPipeline {
        app_state.media.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the API, the guarded pages and the documentation, then wraps everything in the
/// observability and CORS layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    // Unknown paths are classified like any other page: anonymous visitors are sent to the
    // login page, everyone else gets the 404 page.
    let fallback = any(handlers::not_found_page).layer(middleware::from_fn_with_state(
        state.clone(),
        guard::route_guard,
    ));

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(authenticated::authenticated_routes())
        .merge(admin::admin_routes())
        .merge(pages::page_routes(state.clone()))
        .fallback(fallback)
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span factory for `TraceLayer`: every log line of a request carries its `x-request-id`.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
