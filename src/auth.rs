use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, StatusCode, header, request::Parts},
};
use jsonwebtoken::{DecodingKey, Validation, decode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    error::AppError,
    repository::RepositoryState,
    session::{Principal, Role},
};

/// Cookie carrying the access token for page navigations, set by the login handler.
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

/// Audience Supabase stamps on tokens of signed-in users.
pub const TOKEN_AUDIENCE: &str = "authenticated";

/// Claims
///
/// The subset of a Supabase access token this service relies on.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the user's UUID, also the primary key of `public.profiles`.
    pub sub: Uuid,
    pub exp: usize,
    pub iat: usize,
    pub aud: String,
}

/// AuthUser
///
/// The resolved identity of an authenticated request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
}

impl From<AuthUser> for Principal {
    fn from(user: AuthUser) -> Self {
        Principal {
            id: user.id,
            role: user.role,
        }
    }
}

/// bearer_token
///
/// Reads the access token from `Authorization: Bearer ...`, falling back to the
/// `access_token` cookie used by browser page navigations.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
    {
        return value.strip_prefix("Bearer ").map(str::to_string);
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == ACCESS_TOKEN_COOKIE)
        .map(|(_, token)| token.to_string())
}

/// authenticate
///
/// Resolves the request's principal:
/// 1. Local bypass: in `Env::Local` an `x-user-id` header naming an existing profile is accepted.
/// 2. Token validation: HS256 JWT signed with the project secret, audience `authenticated`.
/// 3. Profile lookup: the role is read from `public.profiles`. A valid token without a profile
///    row is still a signed-in plain user, matching what sign-in reports.
///
/// Rejection is always `401 Unauthorized`.
pub async fn authenticate(
    headers: &HeaderMap,
    repo: &RepositoryState,
    config: &AppConfig,
) -> Result<AuthUser, StatusCode> {
    if config.env == Env::Local {
        if let Some(user_id) = headers
            .get("x-user-id")
            .and_then(|value| value.to_str().ok())
            .and_then(|id| Uuid::parse_str(id).ok())
        {
            if let Some(user) = repo.get_user(user_id).await {
                return Ok(AuthUser {
                    id: user.id,
                    role: Role::from_profile(&user.role),
                });
            }
        }
    }

    let token = bearer_token(headers).ok_or(StatusCode::UNAUTHORIZED)?;

    let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
    let mut validation = Validation::default();
    validation.validate_exp = true;
    validation.set_audience(&[TOKEN_AUDIENCE]);

    let token_data = decode::<Claims>(&token, &decoding_key, &validation).map_err(|e| {
        match e.kind() {
            ErrorKind::ExpiredSignature => tracing::debug!("rejected expired token"),
            other => tracing::debug!("rejected token: {:?}", other),
        }
        StatusCode::UNAUTHORIZED
    })?;

    let sub = token_data.claims.sub;
    let role = match repo.get_user(sub).await {
        Some(profile) => Role::from_profile(&profile.role),
        None => {
            tracing::debug!(user_id = %sub, "no profile row, treating as user");
            Role::User
        }
    };

    Ok(AuthUser { id: sub, role })
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);
        authenticate(&parts.headers, &repo, &config).await
    }
}

/// AdminUser
///
/// The single role gate: only an admin principal gets through. No principal is a 401,
/// any other role a 403, both in the JSON error envelope.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::Auth("missing or invalid access token".to_string()))?;
        if user.role != Role::Admin {
            tracing::warn!(user_id = %user.id, "non-admin principal refused");
            return Err(AppError::Forbidden);
        }
        Ok(AdminUser(user))
    }
}
