use crate::{AppState, guard::route_guard, handlers};
use axum::{Router, middleware, routing::get};

/// Pages Router Module
///
/// The navigable pages. All of them, including the public ones, pass through the route guard
/// so that the decision is made in one place; rendered pages find the resolved `Session` in
/// their request extensions.
pub fn page_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::home_page))
        .route("/courses", get(handlers::courses_page))
        .route("/login", get(handlers::login_page))
        .route("/403", get(handlers::forbidden_page))
        .route("/404", get(handlers::not_found_page))
        // Admin-restricted: anonymous visitors go to /login, other roles to /.
        .route("/admin/edit", get(handlers::admin_edit_page))
        .route("/admin/courses", get(handlers::admin_courses_page))
        .route_layer(middleware::from_fn_with_state(state, route_guard))
}
