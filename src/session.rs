use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};
use thiserror::Error;
use tokio::sync::watch;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::repository::Repository;

/// Role
///
/// Authorization level of a session. Only `Admin` may mutate records or enter the admin area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    Anonymous,
    User,
    Admin,
}

impl Role {
    /// Maps the `profiles.role` column. Anything but "admin" is a plain user.
    pub fn from_profile(role: &str) -> Self {
        if role == "admin" { Role::Admin } else { Role::User }
    }
}

/// Principal
///
/// The authenticated identity attached to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: Uuid,
    pub role: Role,
}

/// Session
///
/// `loading` is true while the provider is still resolving the principal; no access decision
/// may be taken in that window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub principal: Option<Principal>,
    pub loading: bool,
}

impl Session {
    pub fn loading() -> Self {
        Self {
            principal: None,
            loading: true,
        }
    }

    pub fn resolved(principal: Option<Principal>) -> Self {
        Self {
            principal,
            loading: false,
        }
    }

    pub fn role(&self) -> Role {
        self.principal.map(|p| p.role).unwrap_or(Role::Anonymous)
    }

    pub fn is_admin(&self) -> bool {
        self.role() == Role::Admin
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::loading()
    }
}

/// AuthError
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("username may only contain letters, digits and underscores")]
    InvalidUsername,
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("auth provider unreachable: {0}")]
    Provider(String),
}

/// validate_username
///
/// Rejects anything outside `[A-Za-z0-9_]+`. Runs before the provider is contacted.
pub fn validate_username(username: &str) -> Result<(), AuthError> {
    let valid = !username.is_empty()
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(AuthError::InvalidUsername)
    }
}

/// SignedIn
///
/// What the provider hands back after a successful password sign-in.
#[derive(Debug, Clone)]
pub struct SignedIn {
    pub user_id: Uuid,
    pub access_token: String,
    pub expires_in: i64,
}

/// SessionProvider
///
/// Contract of the hosted auth service. It owns credentials; this crate only consumes the
/// tokens it issues.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn sign_in_with_username(
        &self,
        username: &str,
        password: &str,
    ) -> Result<SignedIn, AuthError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError>;
}

/// SessionProviderState
pub type SessionProviderState = Arc<dyn SessionProvider>;

// --- Supabase GoTrue ---

#[derive(Deserialize)]
struct TokenUser {
    id: Uuid,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: i64,
    user: TokenUser,
}

/// SupabaseAuthProvider
///
/// Password sign-in against Supabase Auth. Usernames are mapped to synthetic emails under
/// `username_domain`, since the provider only knows email identities.
#[derive(Clone)]
pub struct SupabaseAuthProvider {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
    username_domain: String,
}

impl SupabaseAuthProvider {
    pub fn new(base_url: &str, anon_key: &str, username_domain: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            username_domain: username_domain.to_string(),
        }
    }
}

#[async_trait]
impl SessionProvider for SupabaseAuthProvider {
    async fn sign_in_with_username(
        &self,
        username: &str,
        password: &str,
    ) -> Result<SignedIn, AuthError> {
        let email = format!("{}@{}", username, self.username_domain);
        let url = format!("{}/auth/v1/token?grant_type=password", self.base_url);

        let response = self
            .client
            .post(url)
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| AuthError::Provider(e.to_string()))?;

        let status = response.status();
        if status.is_client_error() {
            tracing::info!(username, %status, "sign-in rejected");
            return Err(AuthError::InvalidCredentials);
        }
        if !status.is_success() {
            return Err(AuthError::Provider(format!("unexpected status {}", status)));
        }

        let token = response
            .json::<TokenResponse>()
            .await
            .map_err(|e| AuthError::Provider(e.to_string()))?;

        Ok(SignedIn {
            user_id: token.user.id,
            access_token: token.access_token,
            expires_in: token.expires_in,
        })
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        let url = format!("{}/auth/v1/logout", self.base_url);
        let response = self
            .client
            .post(url)
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AuthError::Provider(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(AuthError::Provider(format!(
                "logout failed with status {}",
                response.status()
            )))
        }
    }
}

// --- Mock (tests and offline development) ---

/// MockSessionProvider
///
/// In-memory account table. Counts provider calls so tests can assert that validation
/// failures never reach it.
#[derive(Clone, Default)]
pub struct MockSessionProvider {
    accounts: HashMap<String, (String, Uuid)>,
    calls: Arc<AtomicUsize>,
    sign_out_fails: bool,
}

impl MockSessionProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(mut self, username: &str, password: &str, user_id: Uuid) -> Self {
        self.accounts
            .insert(username.to_string(), (password.to_string(), user_id));
        self
    }

    /// Makes every `sign_out` fail as if the provider were unreachable.
    pub fn with_failing_sign_out(mut self) -> Self {
        self.sign_out_fails = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionProvider for MockSessionProvider {
    async fn sign_in_with_username(
        &self,
        username: &str,
        password: &str,
    ) -> Result<SignedIn, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.accounts.get(username) {
            Some((expected, user_id)) if expected == password => Ok(SignedIn {
                user_id: *user_id,
                access_token: format!("mock-token-{}", user_id.simple()),
                expires_in: 3600,
            }),
            _ => Err(AuthError::InvalidCredentials),
        }
    }

    async fn sign_out(&self, _access_token: &str) -> Result<(), AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.sign_out_fails {
            return Err(AuthError::Provider("provider unreachable".to_string()));
        }
        Ok(())
    }
}

/// sign_in
///
/// Validates the username, signs in with the provider, then loads the role from the
/// principal's profile. A principal without a profile row is a plain user.
pub async fn sign_in(
    provider: &dyn SessionProvider,
    profiles: &dyn Repository,
    username: &str,
    password: &str,
) -> Result<(Principal, SignedIn), AuthError> {
    validate_username(username)?;
    let signed_in = provider.sign_in_with_username(username, password).await?;

    let role = profiles
        .get_user(signed_in.user_id)
        .await
        .map(|user| Role::from_profile(&user.role))
        .unwrap_or(Role::User);

    tracing::info!(user_id = %signed_in.user_id, ?role, "signed in");
    Ok((
        Principal {
            id: signed_in.user_id,
            role,
        },
        signed_in,
    ))
}

// --- Observable session context ---

/// SessionContext
///
/// The app shell's session state. Starts in `loading`, is resolved once the provider answers,
/// and transitions on sign-in/out. Consumers `subscribe` instead of polling.
pub struct SessionContext {
    tx: watch::Sender<Session>,
}

impl SessionContext {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Session::loading());
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> Session {
        self.tx.borrow().clone()
    }

    /// Ends the loading window with whatever the provider restored (possibly nobody).
    pub fn resolve(&self, principal: Option<Principal>) {
        self.tx.send_replace(Session::resolved(principal));
    }

    /// Signs in through [`sign_in`] and publishes the resolved session. On any failure the
    /// current session is left untouched.
    pub async fn sign_in(
        &self,
        provider: &dyn SessionProvider,
        profiles: &dyn Repository,
        username: &str,
        password: &str,
    ) -> Result<(Principal, SignedIn), AuthError> {
        let (principal, signed_in) = sign_in(provider, profiles, username, password).await?;
        self.tx.send_replace(Session::resolved(Some(principal)));
        Ok((principal, signed_in))
    }

    pub fn sign_out(&self) {
        self.tx.send_replace(Session::resolved(None));
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}
