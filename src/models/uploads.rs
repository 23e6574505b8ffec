use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Content types accepted for direct-to-storage uploads, with the extension used in the key.
pub const ALLOWED_UPLOAD_TYPES: &[(&str, &str)] = &[
    ("image/png", "png"),
    ("image/jpeg", "jpg"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum UploadPurpose {
    #[default]
    Post,
    Avatar,
}

text_enum!(UploadPurpose { Post => "post", Avatar => "avatar" });

/// PresignedUrlRequest
///
/// Input payload for requesting a short-lived upload URL (POST /upload/presigned).
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct PresignedUrlRequest {
    #[schema(example = "holiday.png")]
    pub filename: String,
    /// The upload is constrained to this MIME type.
    #[schema(example = "image/png")]
    pub file_type: String,
    #[serde(default)]
    pub purpose: UploadPurpose,
}

/// PresignedUrlResponse
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct PresignedUrlResponse {
    /// Time-limited URL for the PUT request.
    pub upload_url: String,
    /// Object key to reference the file from a post or profile.
    pub resource_key: String,
}

impl PresignedUrlRequest {
    /// Builds the object key `"{purpose}s/{user_id}/{uuid}.{ext}"`. The extension comes
    /// from the content type, never from the client's filename.
    pub fn object_key(&self, user_id: Uuid) -> AppResult<String> {
        let ext = ALLOWED_UPLOAD_TYPES
            .iter()
            .find(|(mime, _)| mime.eq_ignore_ascii_case(self.file_type.trim()))
            .map(|(_, ext)| *ext)
            .ok_or_else(|| AppError::validation("unsupported file type"))?;
        Ok(format!(
            "{}s/{}/{}.{}",
            self.purpose.as_str(),
            user_id,
            Uuid::new_v4(),
            ext
        ))
    }
}
