//! Web Push delivery (RFC 8030) with aes128gcm payload encryption (RFC 8291)
//! and VAPID authentication (RFC 8292).

use std::{
    sync::{Arc, Mutex},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use p256::pkcs8::{EncodePrivateKey, LineEnding};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    config::VapidConfig,
    models::{PushPayload, PushSubscription},
    repository::NotificationRepoState,
};

/// Seconds the push service may hold an undelivered message.
const PUSH_TTL_SECS: u64 = 24 * 3600;
/// VAPID tokens must expire within 24 hours.
const VAPID_TOKEN_LIFETIME: Duration = Duration::from_secs(12 * 3600);

#[derive(Debug, Error)]
pub enum PushError {
    #[error("invalid VAPID private key: {0}")]
    InvalidKey(String),
    #[error("invalid subscription: {0}")]
    InvalidSubscription(String),
    #[error("payload encryption failed: {0}")]
    Encryption(String),
    #[error("VAPID token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

/// Result of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    Delivered,
    /// The push service answered 404/410: the subscription must be dropped.
    Gone,
    Failed(String),
}

#[async_trait]
pub trait PushService: Send + Sync {
    /// Application server key clients subscribe with; `None` when push is disabled.
    fn public_key(&self) -> Option<&str>;

    async fn send(&self, subscription: &PushSubscription, payload: &PushPayload) -> PushOutcome;
}

pub type PushState = Arc<dyn PushService>;

/// WebPushClient
///
/// Encrypts and posts messages straight to each subscription's push service.
pub struct WebPushClient {
    http: reqwest::Client,
    public_key: String,
    subject: String,
    signing_key: EncodingKey,
}

#[derive(Serialize)]
struct VapidClaims<'a> {
    aud: String,
    exp: u64,
    sub: &'a str,
}

impl WebPushClient {
    /// Parses the raw base64url P-256 scalar once, at startup.
    pub fn new(vapid: &VapidConfig) -> Result<Self, PushError> {
        let raw = URL_SAFE_NO_PAD
            .decode(vapid.private_key.trim())
            .map_err(|e| PushError::InvalidKey(e.to_string()))?;
        let secret = p256::SecretKey::from_slice(&raw).map_err(|e| PushError::InvalidKey(e.to_string()))?;
        let pem = secret
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| PushError::InvalidKey(e.to_string()))?;
        let signing_key = EncodingKey::from_ec_pem(pem.as_bytes())?;

        Ok(Self {
            http: reqwest::Client::new(),
            public_key: vapid.public_key.trim().to_string(),
            subject: vapid.subject.clone(),
            signing_key,
        })
    }

    /// Signs a token whose audience is the origin of the push endpoint.
    fn vapid_token(&self, endpoint: &str) -> Result<String, PushError> {
        let url = url::Url::parse(endpoint).map_err(|e| PushError::InvalidSubscription(e.to_string()))?;
        let aud = url.origin().ascii_serialization();
        let exp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .saturating_add(VAPID_TOKEN_LIFETIME)
            .as_secs();
        let claims = VapidClaims { aud, exp, sub: &self.subject };
        Ok(encode(&Header::new(Algorithm::ES256), &claims, &self.signing_key)?)
    }

    fn encrypt(subscription: &PushSubscription, payload: &PushPayload) -> Result<Vec<u8>, PushError> {
        let p256dh = URL_SAFE_NO_PAD
            .decode(subscription.p256dh.trim_end_matches('='))
            .map_err(|e| PushError::InvalidSubscription(format!("p256dh: {e}")))?;
        let auth = URL_SAFE_NO_PAD
            .decode(subscription.auth.trim_end_matches('='))
            .map_err(|e| PushError::InvalidSubscription(format!("auth: {e}")))?;
        let plaintext =
            serde_json::to_vec(payload).map_err(|e| PushError::Encryption(e.to_string()))?;
        ece::encrypt(&p256dh, &auth, &plaintext).map_err(|e| PushError::Encryption(format!("{e:?}")))
    }
}

#[async_trait]
impl PushService for WebPushClient {
    fn public_key(&self) -> Option<&str> {
        Some(&self.public_key)
    }

    async fn send(&self, subscription: &PushSubscription, payload: &PushPayload) -> PushOutcome {
        let prepared = Self::encrypt(subscription, payload)
            .and_then(|body| Ok((body, self.vapid_token(&subscription.endpoint)?)));
        let (body, token) = match prepared {
            Ok(parts) => parts,
            Err(e) => return PushOutcome::Failed(e.to_string()),
        };

        let response = self
            .http
            .post(&subscription.endpoint)
            .header("Content-Type", "application/octet-stream")
            .header("Content-Encoding", "aes128gcm")
            .header("TTL", PUSH_TTL_SECS.to_string())
            .header("Authorization", format!("vapid t={token},k={}", self.public_key))
            .body(body)
            .send()
            .await;

        match response {
            Ok(res) if res.status().is_success() => PushOutcome::Delivered,
            Ok(res) if matches!(res.status().as_u16(), 404 | 410) => PushOutcome::Gone,
            Ok(res) => PushOutcome::Failed(format!("push service answered {}", res.status())),
            Err(e) => PushOutcome::Failed(format!("network error: {e}")),
        }
    }
}

/// Used when no VAPID keys are configured.
pub struct DisabledPush;

#[async_trait]
impl PushService for DisabledPush {
    fn public_key(&self) -> Option<&str> {
        None
    }

    async fn send(&self, _subscription: &PushSubscription, _payload: &PushPayload) -> PushOutcome {
        PushOutcome::Failed("push is disabled".to_string())
    }
}

/// MockPushService
///
/// Records every payload; endpoints listed in `gone_endpoints` answer as expired.
#[derive(Default)]
pub struct MockPushService {
    pub public_key: Option<String>,
    pub gone_endpoints: Vec<String>,
    pub sent: Mutex<Vec<(String, PushPayload)>>,
}

impl MockPushService {
    pub fn enabled(public_key: &str) -> Self {
        Self { public_key: Some(public_key.to_string()), ..Self::default() }
    }

    pub fn sent(&self) -> Vec<(String, PushPayload)> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl PushService for MockPushService {
    fn public_key(&self) -> Option<&str> {
        self.public_key.as_deref()
    }

    async fn send(&self, subscription: &PushSubscription, payload: &PushPayload) -> PushOutcome {
        if self.gone_endpoints.contains(&subscription.endpoint) {
            return PushOutcome::Gone;
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push((subscription.endpoint.clone(), payload.clone()));
        }
        PushOutcome::Delivered
    }
}

/// deliver_to_user
///
/// Sends `payload` to every subscription of `user_id`, deleting the ones the push
/// service reports as gone. Returns how many deliveries succeeded.
pub async fn deliver_to_user(
    push: &PushState,
    notifications: &NotificationRepoState,
    user_id: Uuid,
    payload: &PushPayload,
) -> usize {
    let subscriptions = match notifications.list_subscriptions(user_id).await {
        Ok(subscriptions) => subscriptions,
        Err(e) => {
            tracing::warn!(%user_id, error = %e, "could not load push subscriptions");
            return 0;
        }
    };

    let mut delivered = 0;
    for subscription in subscriptions {
        match push.send(&subscription, payload).await {
            PushOutcome::Delivered => delivered += 1,
            PushOutcome::Gone => {
                tracing::info!(%user_id, subscription_id = %subscription.id, "dropping expired push subscription");
                if let Err(e) = notifications.delete_subscription_by_endpoint(&subscription.endpoint).await {
                    tracing::warn!(subscription_id = %subscription.id, error = %e, "failed to delete push subscription");
                }
            }
            PushOutcome::Failed(reason) => {
                tracing::warn!(%user_id, subscription_id = %subscription.id, %reason, "push delivery failed");
            }
        }
    }
    delivered
}
