use axum::{
    Json,
    extract::{Query, State},
};

use crate::{
    AppState,
    error::{AppError, AppResult},
    models::{TagCount, TagFilter, normalize_tag},
};

/// list_tags
///
/// [Public Route] Tags with their published-post counts, most used first. The
/// prefix is normalised the same way tags are.
#[utoipa::path(
    get,
    path = "/tags",
    params(TagFilter),
    responses(
        (status = 200, description = "Tags", body = [TagCount]),
        (status = 400, description = "Invalid prefix")
    )
)]
pub async fn list_tags(
    State(state): State<AppState>,
    Query(filter): Query<TagFilter>,
) -> AppResult<Json<Vec<TagCount>>> {
    let prefix = match filter.prefix.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(normalize_tag(raw).ok_or_else(|| AppError::validation("invalid tag prefix"))?),
    };
    Ok(Json(state.repos.tags.list_tags(prefix, filter.limit()).await?))
}
