use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Every handler here takes an `AuthUser`, so a request without a valid session is rejected
/// with 401 before the handler runs.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /api/me
        // The resolved principal: id and role.
        .route("/api/me", get(handlers::get_me))
        // POST /api/auth/logout
        // Revokes the provider session and clears the cookie.
        .route("/api/auth/logout", post(handlers::logout))
}
