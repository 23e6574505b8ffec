use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::{bounded_text, is_slug_like, optional_text};
use crate::{
    auth::AuthUser,
    error::{AppError, AppResult},
};

/// Community
///
/// A row of `communities` with its active member count.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Community {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub description: String,
    pub owner_id: Uuid,
    /// When true, joining creates a pending request that a moderator must approve.
    pub requires_approval: bool,
    pub member_count: i64,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateCommunityRequest {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub requires_approval: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewCommunity {
    pub slug: String,
    pub name: String,
    pub description: String,
    pub requires_approval: bool,
}

impl CreateCommunityRequest {
    pub fn validate(self) -> AppResult<NewCommunity> {
        let slug = self.slug.trim().to_string();
        if !is_slug_like(&slug, &['-'], 3, 48) {
            return Err(AppError::validation(
                "slug must be 3-48 characters of a-z, 0-9 or -",
            ));
        }
        Ok(NewCommunity {
            slug,
            name: bounded_text("name", &self.name, 1, 100)?,
            description: optional_text("description", self.description.as_deref(), 2_000)?
                .unwrap_or_default(),
            requires_approval: self.requires_approval,
        })
    }
}

/// CommunityFilter
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct CommunityFilter {
    /// Case-insensitive match on name and slug.
    pub search: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum MemberRole {
    Owner,
    Moderator,
    #[default]
    Member,
}

text_enum!(MemberRole { Owner => "owner", Moderator => "moderator", Member => "member" });

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum MembershipStatus {
    #[default]
    Pending,
    Active,
    Rejected,
    Banned,
}

text_enum!(MembershipStatus {
    Pending => "pending",
    Active => "active",
    Rejected => "rejected",
    Banned => "banned",
});

/// Membership
///
/// A row of `community_members`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Membership {
    pub community_id: Uuid,
    pub user_id: Uuid,
    #[sqlx(try_from = "String")]
    pub role: MemberRole,
    #[sqlx(try_from = "String")]
    pub status: MembershipStatus,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl Membership {
    pub fn is_active(&self) -> bool {
        self.status == MembershipStatus::Active
    }
}

/// MemberView
///
/// A membership joined with the member's username and the community name, used by
/// member listings and the admin approval queue.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct MemberView {
    pub community_id: Uuid,
    pub community_name: String,
    pub user_id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    #[sqlx(try_from = "String")]
    pub role: MemberRole,
    #[sqlx(try_from = "String")]
    pub status: MembershipStatus,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct MemberFilter {
    pub status: Option<MembershipStatus>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum ReviewAction {
    Approve,
    Reject,
    Ban,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ReviewMembershipRequest {
    pub action: ReviewAction,
}

/// join_status
///
/// Status a join request lands in, given the caller's existing membership (if any).
/// A rejected applicant may ask again; a banned one may not.
pub fn join_status(
    existing: Option<&Membership>,
    requires_approval: bool,
) -> AppResult<MembershipStatus> {
    match existing.map(|m| m.status) {
        None | Some(MembershipStatus::Rejected) => Ok(if requires_approval {
            MembershipStatus::Pending
        } else {
            MembershipStatus::Active
        }),
        Some(MembershipStatus::Pending) => Err(AppError::conflict("membership request already pending")),
        Some(MembershipStatus::Active) => Err(AppError::conflict("already a member")),
        Some(MembershipStatus::Banned) => Err(AppError::Forbidden),
    }
}

/// review_status
///
/// Status after a moderator acts on `target`. Owners are never reviewed.
pub fn review_status(target: &Membership, action: ReviewAction) -> AppResult<MembershipStatus> {
    if target.role == MemberRole::Owner {
        return Err(AppError::Forbidden);
    }
    match (action, target.status) {
        (ReviewAction::Approve, MembershipStatus::Pending) => Ok(MembershipStatus::Active),
        (ReviewAction::Reject, MembershipStatus::Pending) => Ok(MembershipStatus::Rejected),
        (ReviewAction::Approve | ReviewAction::Reject, _) => {
            Err(AppError::conflict("membership is not pending"))
        }
        (ReviewAction::Ban, MembershipStatus::Banned) => Err(AppError::conflict("member is already banned")),
        (ReviewAction::Ban, _) => Ok(MembershipStatus::Banned),
    }
}

/// Owners cannot walk away from their community. A ban stays on record, so
/// banned members cannot leave either.
pub fn ensure_can_leave(membership: &Membership) -> AppResult<()> {
    if membership.status == MembershipStatus::Banned {
        Err(AppError::Forbidden)
    } else if membership.role == MemberRole::Owner {
        Err(AppError::conflict("the owner cannot leave the community"))
    } else {
        Ok(())
    }
}

/// Site admins moderate everywhere; otherwise an active owner or moderator is required.
pub fn can_moderate(user: &AuthUser, membership: Option<&Membership>) -> bool {
    user.is_admin()
        || membership.is_some_and(|m| {
            m.is_active() && matches!(m.role, MemberRole::Owner | MemberRole::Moderator)
        })
}
