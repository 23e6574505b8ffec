use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{DecodingKey, Validation, decode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    error::{AppError, AppResult},
    models::UserRole,
    repository::UserRepoState,
};

/// Claims
///
/// The subset of the hosted auth provider's access-token payload this server reads.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// The auth user id, which is also `profiles.id`.
    pub sub: Uuid,
    pub exp: usize,
    pub iat: usize,
    /// Supabase issues `authenticated` for signed-in users.
    pub aud: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// AuthUser
///
/// The resolved identity of an authenticated request. Taking it as a handler
/// argument is what makes a route require a session.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: UserRole,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Role check for admin-only handlers.
    pub fn require_admin(&self) -> AppResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }
}

/// decode_session_token
///
/// Verifies signature, expiry and audience of an access token.
pub fn decode_session_token(config: &AppConfig, token: &str) -> AppResult<Claims> {
    let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
    let mut validation = Validation::default();
    validation.validate_exp = true;
    validation.set_audience(&[config.jwt_audience.as_str()]);

    decode::<Claims>(token, &decoding_key, &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => tracing::debug!("session token expired"),
                other => tracing::debug!(reason = ?other, "session token rejected"),
            }
            AppError::Unauthorized
        })
}

/// Reads the access token from the session cookie, falling back to a Bearer header.
fn session_token(parts: &Parts, config: &AppConfig) -> Option<String> {
    let jar = CookieJar::from_headers(&parts.headers);
    if let Some(cookie) = jar.get(&config.session_cookie) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
}

/// Development bypass: in `Env::Local` an `x-user-id` header naming an existing
/// profile authenticates as that profile.
fn local_bypass_id(parts: &Parts, config: &AppConfig) -> Option<Uuid> {
    if config.env != Env::Local {
        return None;
    }
    parts
        .headers
        .get("x-user-id")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| Uuid::parse_str(value).ok())
}

async fn resolve_user(users: &UserRepoState, id: Uuid) -> AppResult<AuthUser> {
    // The profile must still exist: deleting it revokes outstanding tokens.
    let user = users.get_user(id).await?.ok_or(AppError::Unauthorized)?;
    Ok(AuthUser { id: user.id, role: user.role })
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    UserRepoState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let users = UserRepoState::from_ref(state);
        let config = AppConfig::from_ref(state);

        if let Some(user_id) = local_bypass_id(parts, &config) {
            match resolve_user(&users, user_id).await {
                Ok(user) => return Ok(user),
                // Unknown id: fall through to the regular token check.
                Err(AppError::Unauthorized) => {}
                Err(other) => return Err(other),
            }
        }

        let token = session_token(parts, &config).ok_or(AppError::Unauthorized)?;
        let claims = decode_session_token(&config, &token)?;
        resolve_user(&users, claims.sub).await
    }
}

/// MaybeUser
///
/// Optional identity for public routes. Missing or invalid credentials yield
/// `None`; only infrastructure failures reject the request.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<AuthUser>);

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
    UserRepoState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match AuthUser::from_request_parts(parts, state).await {
            Ok(user) => Ok(MaybeUser(Some(user))),
            Err(AppError::Unauthorized) => Ok(MaybeUser(None)),
            Err(other) => Err(other),
        }
    }
}
