use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Unauthenticated endpoints: the visitor-facing reads and the sign-in gateway. Read failures
/// degrade to empty payloads instead of errors.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for the load balancer.
        .route("/health", get(handlers::health))
        // GET /api/resume
        // The resume record plus work experiences, skills and honors, each by sort order.
        .route("/api/resume", get(handlers::get_resume))
        // GET /api/courses
        .route("/api/courses", get(handlers::get_courses))
        // GET /api/courses/{id}
        .route("/api/courses/{id}", get(handlers::get_course))
        // POST /api/auth/login
        // Username/password sign-in; sets the access_token cookie.
        .route("/api/auth/login", post(handlers::login))
}
