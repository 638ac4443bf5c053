use crate::{AppState, handlers};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{post, put},
};

/// Largest accepted multipart body: the video ceiling plus room for the form envelope.
pub const UPLOAD_BODY_LIMIT: usize = 101 * 1024 * 1024;

/// Admin Router Module
///
/// Record mutations and media uploads. Each handler takes the `AdminUser` extractor: no
/// session is a 401, any role other than admin a 403.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // PUT /api/admin/resume/{id}
        // Partial update of the resume record.
        .route("/api/admin/resume/{id}", put(handlers::update_resume))
        // POST /api/admin/courses
        // New course, appended at sort_order = current count.
        .route("/api/admin/courses", post(handlers::create_course))
        // PUT/DELETE /api/admin/courses/{id}
        // Deletion never renumbers the remaining courses.
        .route(
            "/api/admin/courses/{id}",
            put(handlers::update_course).delete(handlers::delete_course),
        )
        // POST /api/admin/uploads/{kind}
        // Multipart `file` through the media pipeline; returns the public URL.
        .route(
            "/api/admin/uploads/{kind}",
            post(handlers::upload_media).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
}
