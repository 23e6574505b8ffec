//! API and database schemas, grouped by domain area.
//!
//! Row types derive `FromRow` and map straight onto the tables in `migrations/`.
//! Request payloads carry a `validate` step that turns raw client input into the
//! normalised value the repositories accept.

use serde::Deserialize;
use thiserror::Error;
use utoipa::IntoParams;

use crate::error::{AppError, AppResult};

/// Implements `as_str`, `Display`, `FromStr` and `TryFrom<String>` for an enum that
/// is stored as TEXT. Row structs read these columns with `#[sqlx(try_from = "String")]`.
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::models::UnknownVariant;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($text => Ok(Self::$variant),)+
                    other => Err($crate::models::UnknownVariant {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = $crate::models::UnknownVariant;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }
    };
}

pub mod communities;
pub mod messages;
pub mod notifications;
pub mod posts;
pub mod reports;
pub mod tags;
pub mod uploads;
pub mod users;

pub use communities::*;
pub use messages::*;
pub use notifications::*;
pub use posts::*;
pub use reports::*;
pub use tags::*;
pub use uploads::*;
pub use users::*;

/// A TEXT column held a value no enum variant matches.
#[derive(Debug, Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

pub const DEFAULT_PER_PAGE: u32 = 20;
pub const MAX_PER_PAGE: u32 = 100;

/// Pagination
///
/// 1-based page index and page size, already clamped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Pagination {
    /// Clamps raw query values: page 0 becomes 1, page size is kept within 1..=100.
    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        let page = page.unwrap_or(1).max(1);
        let per_page = per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE);
        Self { page, per_page }
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.per_page)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.per_page)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// PageParams
///
/// Query parameters for endpoints that only page.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct PageParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl PageParams {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page, self.per_page)
    }
}

/// Trims `value` and checks its length in characters.
pub(crate) fn bounded_text(field: &str, value: &str, min: usize, max: usize) -> AppResult<String> {
    let trimmed = value.trim();
    let len = trimmed.chars().count();
    if len < min {
        return Err(AppError::validation(format!("{field} must not be empty")));
    }
    if len > max {
        return Err(AppError::validation(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// Like `bounded_text`, but an empty value after trimming becomes `None`.
pub(crate) fn optional_text(field: &str, value: Option<&str>, max: usize) -> AppResult<Option<String>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => bounded_text(field, v, 1, max).map(Some),
    }
}

/// Checks a URL-safe identifier: lowercase ASCII letters, digits and the given extra characters.
pub(crate) fn is_slug_like(value: &str, extra: &[char], min: usize, max: usize) -> bool {
    (min..=max).contains(&value.len())
        && value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || extra.contains(&c))
}
