use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};

/// TagCount
///
/// A tag with the number of published posts carrying it.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct TagCount {
    pub name: String,
    pub post_count: i64,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct TagFilter {
    /// Only tags starting with this prefix (normalised like tag names).
    pub prefix: Option<String>,
    pub limit: Option<u32>,
}

impl TagFilter {
    pub fn limit(&self) -> i64 {
        i64::from(self.limit.unwrap_or(50).clamp(1, 200))
    }
}
