use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::{bounded_text, optional_text};
use crate::error::{AppError, AppResult};

pub const MAX_REASON_LEN: usize = 1_000;

/// ReportTarget
///
/// What is being reported. Serialised as `{"type": "post", "id": ...}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
#[ts(export)]
pub enum ReportTarget {
    Post { id: Uuid },
    Comment { id: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum ReportTargetKind {
    #[default]
    Post,
    Comment,
}

text_enum!(ReportTargetKind { Post => "post", Comment => "comment" });

impl ReportTarget {
    pub fn kind(&self) -> ReportTargetKind {
        match self {
            ReportTarget::Post { .. } => ReportTargetKind::Post,
            ReportTarget::Comment { .. } => ReportTargetKind::Comment,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum ReportStatus {
    #[default]
    Open,
    Resolved,
    Dismissed,
}

text_enum!(ReportStatus { Open => "open", Resolved => "resolved", Dismissed => "dismissed" });

/// Report
///
/// A row of `reports`. Exactly one of `post_id`/`comment_id` is set at creation;
/// either may become null later if the content is deleted.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Report {
    pub id: Uuid,
    pub reporter_id: Uuid,
    #[sqlx(try_from = "String")]
    pub target_type: ReportTargetKind,
    pub post_id: Option<Uuid>,
    pub comment_id: Option<i64>,
    pub reason: String,
    #[sqlx(try_from = "String")]
    pub status: ReportStatus,
    pub resolved_by: Option<Uuid>,
    pub resolution_note: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string | null")]
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateReportRequest {
    pub target: ReportTarget,
    pub reason: String,
}

impl CreateReportRequest {
    pub fn validate(&self) -> AppResult<String> {
        bounded_text("reason", &self.reason, 1, MAX_REASON_LEN)
    }
}

/// ResolveReportRequest
///
/// Closes an open report. `hide_post` also takes the reported content down: a
/// reported post is hidden, a reported comment is deleted.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ResolveReportRequest {
    pub status: ReportStatus,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub hide_post: bool,
}

/// Validated resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub status: ReportStatus,
    pub note: Option<String>,
    pub take_down: bool,
}

/// A report closed together with its take-down. `hidden_post_author` is set
/// when a reported post went from visible to hidden.
#[derive(Debug, Clone)]
pub struct ClosedReport {
    pub report: Report,
    pub hidden_post_author: Option<Uuid>,
}

impl ResolveReportRequest {
    pub fn validate(self) -> AppResult<Resolution> {
        if self.status == ReportStatus::Open {
            return Err(AppError::validation("a report can only be resolved or dismissed"));
        }
        if self.hide_post && self.status == ReportStatus::Dismissed {
            return Err(AppError::validation("a dismissed report cannot take content down"));
        }
        Ok(Resolution {
            status: self.status,
            note: optional_text("note", self.note.as_deref(), MAX_REASON_LEN)?,
            take_down: self.hide_post,
        })
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ReportFilter {
    pub status: Option<ReportStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}
