use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::{Pagination, bounded_text, optional_text};
use crate::{
    auth::AuthUser,
    error::{AppError, AppResult},
};

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_BODY_LEN: usize = 10_000;
pub const MAX_COMMENT_LEN: usize = 2_000;
pub const MAX_TAGS_PER_POST: usize = 5;
pub const MAX_TAG_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum PostStatus {
    #[default]
    Published,
    Hidden,
}

text_enum!(PostStatus { Published => "published", Hidden => "hidden" });

/// Post
///
/// A post joined with its author's username, counters and tag names.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub author_username: String,
    pub community_id: Option<Uuid>,
    pub title: String,
    pub body: String,
    pub image_key: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: PostStatus,
    pub like_count: i64,
    pub comment_count: i64,
    pub tags: Vec<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl Post {
    /// Published posts are public; hidden ones only reach their author and admins.
    pub fn is_visible_to(&self, viewer: Option<&AuthUser>) -> bool {
        match self.status {
            PostStatus::Published => true,
            PostStatus::Hidden => {
                viewer.is_some_and(|user| user.is_admin() || user.id == self.author_id)
            }
        }
    }
}

/// CreatePostRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreatePostRequest {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub community_id: Option<Uuid>,
    /// Object key returned by `POST /upload/presigned`.
    #[serde(default)]
    pub image_key: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Validated insert payload.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewPost {
    pub title: String,
    pub body: String,
    pub community_id: Option<Uuid>,
    pub image_key: Option<String>,
    pub tags: Vec<String>,
}

impl CreatePostRequest {
    pub fn validate(self) -> AppResult<NewPost> {
        Ok(NewPost {
            title: bounded_text("title", &self.title, 1, MAX_TITLE_LEN)?,
            body: bounded_text("body", &self.body, 1, MAX_BODY_LEN)?,
            community_id: self.community_id,
            image_key: optional_text("image_key", self.image_key.as_deref(), 500)?,
            tags: normalize_tags(&self.tags)?,
        })
    }
}

/// UpdatePostRequest
///
/// Partial update for `PUT /posts/{id}`. `tags`, when present, replaces the whole set.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdatePostRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl UpdatePostRequest {
    pub fn validate(self) -> AppResult<Self> {
        Ok(Self {
            title: self
                .title
                .map(|v| bounded_text("title", &v, 1, MAX_TITLE_LEN))
                .transpose()?,
            body: self
                .body
                .map(|v| bounded_text("body", &v, 1, MAX_BODY_LEN))
                .transpose()?,
            image_key: self
                .image_key
                .map(|v| bounded_text("image_key", &v, 1, 500))
                .transpose()?,
            tags: self.tags.map(|t| normalize_tags(&t)).transpose()?,
        })
    }
}

/// normalize_tag
///
/// Canonical form of a user-typed tag: trimmed, lowercased, leading `#` removed,
/// whitespace and underscores folded into `-`. Returns `None` when nothing valid remains.
pub fn normalize_tag(raw: &str) -> Option<String> {
    let lowered = raw.trim().trim_start_matches('#').to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    for c in lowered.chars() {
        match c {
            'a'..='z' | '0'..='9' => out.push(c),
            '-' | '_' | ' ' | '\t' => {
                if !out.is_empty() && !out.ends_with('-') {
                    out.push('-');
                }
            }
            _ => return None,
        }
    }
    let out = out.trim_end_matches('-').to_string();
    if out.is_empty() || out.len() > MAX_TAG_LEN {
        None
    } else {
        Some(out)
    }
}

/// Normalises a tag list, dropping duplicates while keeping first-seen order.
pub fn normalize_tags(raw: &[String]) -> AppResult<Vec<String>> {
    let mut tags: Vec<String> = Vec::new();
    for item in raw {
        let tag = normalize_tag(item)
            .ok_or_else(|| AppError::validation(format!("invalid tag: {item:?}")))?;
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    if tags.len() > MAX_TAGS_PER_POST {
        return Err(AppError::validation(format!(
            "a post can carry at most {MAX_TAGS_PER_POST} tags"
        )));
    }
    Ok(tags)
}

/// PostFilter
///
/// Query parameters for `GET /posts`.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct PostFilter {
    pub community_id: Option<Uuid>,
    pub tag: Option<String>,
    pub author_id: Option<Uuid>,
    /// Case-insensitive match on title and body.
    pub search: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Repository-side listing criteria; only published posts are ever listed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostQuery {
    pub community_id: Option<Uuid>,
    pub tag: Option<String>,
    pub author_id: Option<Uuid>,
    pub search: Option<String>,
    pub pagination: Pagination,
}

impl PostFilter {
    /// An unparseable tag filter can match nothing, so it is reported instead of ignored.
    pub fn into_query(self) -> AppResult<PostQuery> {
        let tag = match self.tag.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(
                normalize_tag(raw).ok_or_else(|| AppError::validation("invalid tag filter"))?,
            ),
        };
        let search = self
            .search
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        Ok(PostQuery {
            community_id: self.community_id,
            tag,
            author_id: self.author_id,
            search,
            pagination: Pagination::new(self.page, self.per_page),
        })
    }
}

/// AdminPostFilter
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct AdminPostFilter {
    pub status: Option<PostStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SetPostStatusRequest {
    pub status: PostStatus,
}

/// Comment
///
/// A row of `comments` joined with the author's username.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Comment {
    pub id: i64,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub author_username: String,
    pub body: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateCommentRequest {
    pub body: String,
}

impl CreateCommentRequest {
    pub fn validate(&self) -> AppResult<String> {
        bounded_text("body", &self.body, 1, MAX_COMMENT_LEN)
    }
}
