//! Multipart form helpers shared by the upload endpoints.

use axum::body::Bytes;
use axum::extract::Multipart;

use crate::error::{AppError, AppResult};

/// Name of the form field carrying the image.
pub const FILE_FIELD: &str = "file";

/// Read the `file` field of a multipart form, ignoring any other fields.
///
/// Fails with 400 when the form is malformed or carries no `file` field.
pub async fn read_file_field(multipart: &mut Multipart) -> AppResult<Bytes> {
    let mut file: Option<Bytes> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() == Some(FILE_FIELD) {
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(e.to_string()))?;
            file = Some(data);
        }
    }

    file.ok_or_else(|| AppError::BadRequest("No file provided".into()))
}
