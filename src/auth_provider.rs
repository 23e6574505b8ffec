use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    error::{AppError, AppResult},
};

/// AuthProvider
///
/// The hosted identity service that owns credentials. This server only ever sees
/// the resulting user id, which becomes the profile id.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str) -> AppResult<Uuid>;
}

pub type AuthProviderState = Arc<dyn AuthProvider>;

/// SupabaseAuthClient
///
/// Calls the GoTrue `/auth/v1/signup` endpoint with the project's anon key.
pub struct SupabaseAuthClient {
    http: reqwest::Client,
    signup_url: String,
    anon_key: String,
}

impl SupabaseAuthClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            signup_url: format!("{}/auth/v1/signup", config.supabase_url.trim_end_matches('/')),
            anon_key: config.supabase_anon_key.clone(),
        }
    }
}

/// With email confirmation on, sign-up returns the user itself; with auto-confirm it
/// returns a session wrapping the user.
#[derive(Deserialize)]
struct SignupResponse {
    id: Option<Uuid>,
    user: Option<SignupUser>,
}

#[derive(Deserialize)]
struct SignupUser {
    id: Uuid,
}

#[derive(Deserialize, Default)]
struct SignupError {
    msg: Option<String>,
    error_description: Option<String>,
    message: Option<String>,
}

#[async_trait]
impl AuthProvider for SupabaseAuthClient {
    async fn sign_up(&self, email: &str, password: &str) -> AppResult<Uuid> {
        let response = self
            .http
            .post(&self.signup_url)
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("sign-up request: {e}")))?;

        let status = response.status();
        if status.is_client_error() {
            let body: SignupError = response.json().await.unwrap_or_default();
            let reason = body
                .msg
                .or(body.error_description)
                .or(body.message)
                .unwrap_or_else(|| "sign-up rejected".to_string());
            tracing::debug!(status = status.as_u16(), %reason, "auth provider rejected sign-up");
            return Err(AppError::Validation(reason));
        }
        if !status.is_success() {
            return Err(AppError::Upstream(format!("sign-up answered {status}")));
        }

        let body: SignupResponse = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("sign-up response: {e}")))?;
        body.id
            .or(body.user.map(|u| u.id))
            .ok_or_else(|| AppError::Upstream("sign-up response carried no user id".to_string()))
    }
}

/// MockAuthProvider
///
/// Hands out `user_id` for every sign-up, or fails like an unreachable provider.
#[derive(Clone, Default)]
pub struct MockAuthProvider {
    pub user_id: Uuid,
    pub should_fail: bool,
}

impl MockAuthProvider {
    pub fn new(user_id: Uuid) -> Self {
        Self { user_id, should_fail: false }
    }
}

#[async_trait]
impl AuthProvider for MockAuthProvider {
    async fn sign_up(&self, _email: &str, _password: &str) -> AppResult<Uuid> {
        if self.should_fail {
            return Err(AppError::Upstream("mock auth provider failure".to_string()));
        }
        Ok(self.user_id)
    }
}
