use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{bounded_text, is_slug_like, optional_text};
use crate::error::{AppError, AppResult};

/// UserRole
///
/// Site-wide role. Community-level roles live on the membership row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum UserRole {
    #[default]
    Member,
    Admin,
}

text_enum!(UserRole { Member => "member", Admin => "admin" });

/// User
///
/// A row of `profiles`. The id is the hosted auth user id.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    #[sqlx(try_from = "String")]
    pub role: UserRole,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// PublicProfile
///
/// What other users may see of a profile (no email, no role).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct PublicProfile {
    pub id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

impl From<User> for PublicProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            display_name: user.display_name,
            bio: user.bio,
            avatar_url: user.avatar_url,
            created_at: user.created_at,
        }
    }
}

/// Insert payload for the mirrored profile created after hosted sign-up.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub display_name: Option<String>,
}

/// RegisterUserRequest
///
/// The password is forwarded to the hosted auth API and never stored or logged here.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterUserRequest {
    pub email: String,
    pub password: String,
    pub username: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl RegisterUserRequest {
    /// Checks the local fields; password strength is the auth provider's call.
    pub fn validate(&self) -> AppResult<()> {
        let email = self.email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(AppError::validation("email is invalid"));
        }
        if self.password.is_empty() {
            return Err(AppError::validation("password must not be empty"));
        }
        validate_username(&self.username)?;
        optional_text("display_name", self.display_name.as_deref(), 60)?;
        Ok(())
    }
}

pub fn validate_username(username: &str) -> AppResult<()> {
    if is_slug_like(username, &['_'], 3, 30) {
        Ok(())
    } else {
        Err(AppError::validation(
            "username must be 3-30 characters of a-z, 0-9 or _",
        ))
    }
}

/// UpdateProfileRequest
///
/// Partial update for `PATCH /me`; absent fields stay untouched.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateProfileRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl UpdateProfileRequest {
    pub fn validate(self) -> AppResult<Self> {
        Ok(Self {
            display_name: self
                .display_name
                .map(|v| bounded_text("display_name", &v, 1, 60))
                .transpose()?,
            bio: self.bio.map(|v| bounded_text("bio", &v, 0, 500)).transpose()?,
            avatar_url: self
                .avatar_url
                .map(|v| bounded_text("avatar_url", &v, 1, 500))
                .transpose()?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SetRoleRequest {
    pub role: UserRole,
}

/// AdminDashboardStats
///
/// Counters for `GET /admin/stats`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct AdminDashboardStats {
    pub total_users: i64,
    pub total_posts: i64,
    pub hidden_posts: i64,
    pub total_comments: i64,
    pub total_communities: i64,
    pub open_reports: i64,
    pub pending_memberships: i64,
}
