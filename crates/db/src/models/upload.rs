use serde::Serialize;
use sqlx::FromRow;
use xplain_core::types::Timestamp;

/// A row from the `uploads` table, without the image payload.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UploadInfo {
    pub id: i64,
    pub filename: String,
    pub size_bytes: i32,
    pub uploaded_at: Timestamp,
}
