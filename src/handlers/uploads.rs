use axum::{Json, extract::State};

use crate::{
    AppState,
    auth::AuthUser,
    error::AppResult,
    models::{PresignedUrlRequest, PresignedUrlResponse},
};

/// get_presigned_url
///
/// [Authenticated Route] Issues a 10-minute PUT URL for a direct browser-to-bucket
/// upload. The object key is built server-side under the caller's id; only image
/// types are accepted.
#[utoipa::path(
    post,
    path = "/upload/presigned",
    request_body = PresignedUrlRequest,
    responses(
        (status = 200, description = "URL", body = PresignedUrlResponse),
        (status = 400, description = "Unsupported file type"),
        (status = 502, description = "Storage unavailable")
    )
)]
pub async fn get_presigned_url(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<PresignedUrlRequest>,
) -> AppResult<Json<PresignedUrlResponse>> {
    let object_key = payload.object_key(user.id)?;
    let content_type = payload.file_type.trim().to_ascii_lowercase();
    let upload_url = state.storage.presigned_upload_url(&object_key, &content_type).await?;
    tracing::debug!(user_id = %user.id, key = %object_key, "upload url issued");
    Ok(Json(PresignedUrlResponse { upload_url, resource_key: object_key }))
}
