use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use utoipa::ToSchema;

use crate::{
    AppState,
    access::{RouteClass, classify},
    auth,
    models::RedirectBody,
    session::{Principal, Role, Session},
};

pub const LOGIN_PATH: &str = "/login";
pub const HOME_PATH: &str = "/";

/// Navigation
///
/// A redirect issued by the guard. `from` is the blocked path handed to the login page so it
/// can return there; `replace` means the blocked page must not stay in history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Navigation {
    pub to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    pub replace: bool,
}

impl Navigation {
    fn to_login(from: &str) -> Self {
        Self {
            to: LOGIN_PATH.to_string(),
            from: Some(from.to_string()),
            replace: true,
        }
    }

    fn to_home() -> Self {
        Self {
            to: HOME_PATH.to_string(),
            from: None,
            replace: true,
        }
    }

    /// The target as a URL, with `from` carried in the query string.
    pub fn location(&self) -> String {
        match &self.from {
            Some(from) => {
                let query = url::form_urlencoded::Serializer::new(String::new())
                    .append_pair("from", from)
                    .finish();
                format!("{}?{}", self.to, query)
            }
            None => self.to.clone(),
        }
    }
}

/// GuardDecision
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Session still resolving: show a placeholder, decide nothing.
    Loading,
    Render,
    Redirect(Navigation),
}

/// evaluate
///
/// The access decision for one (session, path) pair.
pub fn evaluate(session: &Session, path: &str) -> GuardDecision {
    if session.loading {
        return GuardDecision::Loading;
    }

    match (classify(path), session.principal) {
        (RouteClass::AdminRestricted, None) => GuardDecision::Redirect(Navigation::to_login(path)),
        (RouteClass::AdminRestricted, Some(Principal { role, .. })) if role != Role::Admin => {
            GuardDecision::Redirect(Navigation::to_home())
        }
        (RouteClass::Protected, None) => GuardDecision::Redirect(Navigation::to_login(path)),
        _ => GuardDecision::Render,
    }
}

/// Navigator
///
/// The host's router. Redirects are the guard's only externally visible effect.
pub trait Navigator {
    fn navigate(&mut self, navigation: &Navigation);
}

/// RouteGuard
///
/// Stateful wrapper around [`evaluate`] for long-lived shells. It remembers the inputs of the
/// last evaluation, so a repeated evaluation with the same session and path never navigates a
/// second time.
pub struct RouteGuard<N> {
    navigator: N,
    last: Option<(Session, String, GuardDecision)>,
}

impl<N: Navigator> RouteGuard<N> {
    pub fn new(navigator: N) -> Self {
        Self {
            navigator,
            last: None,
        }
    }

    pub fn navigator(&self) -> &N {
        &self.navigator
    }

    pub fn into_navigator(self) -> N {
        self.navigator
    }

    pub fn evaluate(&mut self, session: &Session, path: &str) -> GuardDecision {
        if let Some((last_session, last_path, decision)) = &self.last {
            if last_session == session && last_path == path {
                return decision.clone();
            }
        }

        let decision = evaluate(session, path);
        if let GuardDecision::Redirect(navigation) = &decision {
            tracing::debug!(path, to = %navigation.to, "route guard redirect");
            self.navigator.navigate(navigation);
        }
        self.last = Some((session.clone(), path.to_string(), decision.clone()));
        decision
    }

    /// drive
    ///
    /// Re-evaluates on every session or path change until either sender is dropped, then
    /// returns the guard so callers can inspect it.
    pub async fn drive(
        mut self,
        mut session: watch::Receiver<Session>,
        mut path: watch::Receiver<String>,
    ) -> Self {
        loop {
            let current_session = session.borrow_and_update().clone();
            let current_path = path.borrow_and_update().clone();
            self.evaluate(&current_session, &current_path);

            tokio::select! {
                changed = session.changed() => if changed.is_err() { break },
                changed = path.changed() => if changed.is_err() { break },
            }
        }
        self
    }
}

// --- HTTP binding ---

/// route_guard
///
/// Middleware for the page routes. The request's session is resolved up front (so it is never
/// `loading` here), then the decision is applied: redirects become `303 See Other`, rendered
/// pages receive the `Session` as a request extension.
pub async fn route_guard(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let principal = auth::authenticate(request.headers(), &state.repo, &state.config)
        .await
        .ok()
        .map(Principal::from);
    let session = Session::resolved(principal);
    let path = request.uri().path().to_string();

    match evaluate(&session, &path) {
        GuardDecision::Render => {
            request.extensions_mut().insert(session);
            next.run(request).await
        }
        GuardDecision::Redirect(navigation) => redirect_response(navigation),
        GuardDecision::Loading => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({ "loading": true })),
        )
            .into_response(),
    }
}

fn redirect_response(navigation: Navigation) -> Response {
    let location = navigation.location();
    let mut response = (
        StatusCode::SEE_OTHER,
        Json(RedirectBody {
            redirect: navigation,
        }),
    )
        .into_response();

    match HeaderValue::from_str(&location) {
        Ok(value) => {
            response.headers_mut().insert(header::LOCATION, value);
            response
        }
        Err(e) => {
            tracing::error!("unencodable redirect location {:?}: {:?}", location, e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
