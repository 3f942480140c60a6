//! Repository for the `uploads` table.

use sqlx::PgPool;

use crate::models::upload::UploadInfo;

/// Stores and fetches image blobs by filename.
pub struct UploadRepo;

impl UploadRepo {
    /// Insert or replace the blob stored under `filename`.
    pub async fn upsert(pool: &PgPool, filename: &str, image: &[u8]) -> Result<UploadInfo, sqlx::Error> {
        sqlx::query_as::<_, UploadInfo>(
            "INSERT INTO uploads (filename, image, uploaded_at) \
             VALUES ($1, $2, NOW()) \
             ON CONFLICT (filename) DO UPDATE SET image = EXCLUDED.image, uploaded_at = NOW() \
             RETURNING id, filename, octet_length(image) AS size_bytes, uploaded_at",
        )
        .bind(filename)
        .bind(image)
        .fetch_one(pool)
        .await
    }

    /// Fetch the blob stored under `filename`.
    pub async fn find_image(pool: &PgPool, filename: &str) -> Result<Option<Vec<u8>>, sqlx::Error> {
        sqlx::query_scalar::<_, Vec<u8>>("SELECT image FROM uploads WHERE filename = $1")
            .bind(filename)
            .fetch_optional(pool)
            .await
    }
}
