//! Artifact storage seam and the local filesystem backend.
//!
//! Artifacts are addressed by a flat filename. The reference returned by
//! [`ArtifactStore::persist`] is what job results carry and what the
//! `/uploads/{filename}` read path accepts.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::CoreError;

/// Durable storage for uploaded images and explanation artifacts.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Store `bytes` under `filename`, returning the stable reference.
    async fn persist(&self, filename: &str, bytes: Vec<u8>) -> Result<String, CoreError>;

    /// Fetch a previously stored artifact, `None` if it does not exist.
    async fn load(&self, filename: &str) -> Result<Option<Vec<u8>>, CoreError>;
}

/// Reject anything that is not a single plain path component.
pub fn validate_filename(filename: &str) -> Result<(), CoreError> {
    let ok = !filename.is_empty()
        && filename != "."
        && filename != ".."
        && !filename.contains(['/', '\\', '\0']);
    if ok {
        Ok(())
    } else {
        Err(CoreError::Validation(format!("Invalid artifact filename '{filename}'")))
    }
}

/// Stores artifacts as files in a single directory.
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    /// Use `root` as the artifact directory. It is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn persist(&self, filename: &str, bytes: Vec<u8>) -> Result<String, CoreError> {
        validate_filename(filename)?;
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| CoreError::Storage(format!("Failed to create {}: {e}", self.root.display())))?;

        let path = self.root.join(filename);
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| CoreError::Storage(format!("Failed to write {}: {e}", path.display())))?;

        tracing::debug!(path = %path.display(), size = bytes.len(), "Artifact written");
        Ok(filename.to_string())
    }

    async fn load(&self, filename: &str) -> Result<Option<Vec<u8>>, CoreError> {
        validate_filename(filename)?;
        let path = self.root.join(filename);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CoreError::Storage(format!(
                "Failed to read {}: {e}",
                path.display()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn plain_names_accepted() {
        assert!(validate_filename("abc_explained.jpg").is_ok());
    }

    #[test]
    fn traversal_rejected() {
        assert!(validate_filename("").is_err());
        assert!(validate_filename("..").is_err());
        assert!(validate_filename("../etc/passwd").is_err());
        assert!(validate_filename("a\\b.jpg").is_err());
    }

    #[tokio::test]
    async fn persist_then_load_returns_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path().join("artifacts"));

        let reference = store.persist("x.jpg", vec![1, 2, 3]).await.unwrap();
        assert_eq!(reference, "x.jpg");
        assert_eq!(store.load("x.jpg").await.unwrap(), Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn missing_artifact_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());
        assert_eq!(store.load("nope.jpg").await.unwrap(), None);
    }

    #[tokio::test]
    async fn bad_filename_never_touches_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());
        assert_matches!(
            store.persist("../escape.jpg", vec![0]).await,
            Err(CoreError::Validation(_))
        );
    }
}
