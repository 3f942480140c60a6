//! [`ArtifactStore`] backed by the `uploads` table.

use async_trait::async_trait;
use xplain_core::error::CoreError;
use xplain_core::storage::{validate_filename, ArtifactStore};

use crate::repositories::UploadRepo;
use crate::DbPool;

/// Stores artifacts as `BYTEA` rows keyed by filename.
pub struct PgArtifactStore {
    pool: DbPool,
}

impl PgArtifactStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ArtifactStore for PgArtifactStore {
    async fn persist(&self, filename: &str, bytes: Vec<u8>) -> Result<String, CoreError> {
        validate_filename(filename)?;
        let info = UploadRepo::upsert(&self.pool, filename, &bytes)
            .await
            .map_err(|e| CoreError::Storage(format!("Failed to store {filename}: {e}")))?;
        tracing::debug!(upload_id = info.id, filename, size = info.size_bytes, "Artifact stored");
        Ok(info.filename)
    }

    async fn load(&self, filename: &str) -> Result<Option<Vec<u8>>, CoreError> {
        validate_filename(filename)?;
        UploadRepo::find_image(&self.pool, filename)
            .await
            .map_err(|e| CoreError::Storage(format!("Failed to load {filename}: {e}")))
    }
}
