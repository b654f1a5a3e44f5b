//! Storage for complaint image files.

use async_trait::async_trait;
use civiccare_common::{AppError, AppResult, IdGenerator};
use std::path::PathBuf;
use tokio::sync::Mutex;

use crate::services::upload::UploadedImage;

/// Storage backend trait for file operations.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Write file data under `key`.
    async fn save(&self, key: &str, data: &[u8]) -> AppResult<()>;

    /// Delete a file. Deleting a missing file succeeds.
    async fn delete(&self, key: &str) -> AppResult<()>;

    /// Public URL a stored file is served from.
    fn url(&self, key: &str) -> String;
}

/// Type alias for the storage service.
pub type StorageService = std::sync::Arc<dyn StorageBackend>;

/// Local filesystem storage backend.
#[derive(Clone)]
pub struct LocalStorage {
    /// Directory files are written to.
    base_path: PathBuf,
    /// URL prefix the directory is served under.
    base_url: String,
}

impl LocalStorage {
    /// Create a new local storage backend.
    #[must_use]
    pub const fn new(base_path: PathBuf, base_url: String) -> Self {
        Self { base_path, base_url }
    }

    /// Create the upload directory if it does not exist yet.
    pub async fn ensure_dir(&self) -> AppResult<()> {
        tokio::fs::create_dir_all(&self.base_path)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to create directory: {e}")))
    }

    fn get_path(&self, key: &str) -> PathBuf {
        self.base_path.join(key)
    }
}

#[async_trait]
impl StorageBackend for LocalStorage {
    async fn save(&self, key: &str, data: &[u8]) -> AppResult<()> {
        validate_file_name(key)?;
        self.ensure_dir().await?;

        tokio::fs::write(self.get_path(key), data)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to write file: {e}")))
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        validate_file_name(key)?;
        match tokio::fs::remove_file(self.get_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Storage(format!("Failed to delete file: {e}"))),
        }
    }

    fn url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }
}

/// In-memory storage backend, for tests and ephemeral deployments.
#[derive(Default)]
pub struct MemoryStorage {
    files: Mutex<Vec<(String, Vec<u8>)>>,
}

impl MemoryStorage {
    /// Create an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored keys, in write order.
    pub async fn keys(&self) -> Vec<String> {
        self.files.lock().await.iter().map(|(k, _)| k.clone()).collect()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn save(&self, key: &str, data: &[u8]) -> AppResult<()> {
        validate_file_name(key)?;
        let mut files = self.files.lock().await;
        files.retain(|(k, _)| k != key);
        files.push((key.to_string(), data.to_vec()));
        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.files.lock().await.retain(|(k, _)| k != key);
        Ok(())
    }

    fn url(&self, key: &str) -> String {
        format!("/public/uploads/{key}")
    }
}

/// Reject anything but a bare file name.
pub fn validate_file_name(name: &str) -> AppResult<()> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
        && !name.contains("..");
    if valid {
        Ok(())
    } else {
        Err(AppError::Validation(format!("Invalid image name: {name}")))
    }
}

/// Name an image is stored under: `{unix_millis}-{random}.{ext}`.
#[must_use]
pub fn stored_file_name(id_gen: &IdGenerator, image: &UploadedImage) -> String {
    format!(
        "{}-{}.{}",
        chrono::Utc::now().timestamp_millis(),
        id_gen.generate_suffix(),
        image.extension()
    )
}

/// Delete every key, logging failures instead of returning them.
pub async fn discard_files(storage: &dyn StorageBackend, keys: &[String]) {
    for key in keys {
        if let Err(e) = storage.delete(key).await {
            tracing::warn!(image = %key, error = %e, "Failed to remove image file");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::upload::PNG_SIGNATURE;

    fn temp_storage() -> (LocalStorage, PathBuf) {
        let dir = std::env::temp_dir().join(format!("civiccare-{}", IdGenerator::new().generate()));
        (
            LocalStorage::new(dir.clone(), "/public/uploads/".to_string()),
            dir,
        )
    }

    #[test]
    fn test_validate_file_name() {
        assert!(validate_file_name("1700000000000-abc.png").is_ok());
        assert!(validate_file_name("").is_err());
        assert!(validate_file_name("..").is_err());
        assert!(validate_file_name("../secret").is_err());
        assert!(validate_file_name("a/b.png").is_err());
        assert!(validate_file_name("a\\b.png").is_err());
    }

    #[test]
    fn test_stored_file_name_uses_sniffed_extension() {
        let image = UploadedImage::new("photo.JPG", "image/png", PNG_SIGNATURE.to_vec());
        let name = stored_file_name(&IdGenerator::new(), &image);
        assert!(name.ends_with(".png"));
        assert!(validate_file_name(&name).is_ok());
    }

    #[tokio::test]
    async fn test_local_storage_roundtrip() {
        let (storage, dir) = temp_storage();

        storage.save("a.png", b"data").await.unwrap();
        assert_eq!(tokio::fs::read(dir.join("a.png")).await.unwrap(), b"data");
        assert_eq!(storage.url("a.png"), "/public/uploads/a.png");

        storage.delete("a.png").await.unwrap();
        assert!(!tokio::fs::try_exists(dir.join("a.png")).await.unwrap());
        // Deleting again is a no-op.
        storage.delete("a.png").await.unwrap();

        tokio::fs::remove_dir_all(dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_local_storage_rejects_traversal() {
        let (storage, _dir) = temp_storage();
        assert!(storage.delete("../outside.png").await.is_err());
    }

    #[tokio::test]
    async fn test_discard_files_continues_past_failures() {
        let storage = MemoryStorage::new();
        storage.save("a.png", b"a").await.unwrap();
        storage.save("b.png", b"b").await.unwrap();

        discard_files(
            &storage,
            &["a.png".to_string(), "missing.png".to_string(), "b.png".to_string()],
        )
        .await;

        assert!(storage.keys().await.is_empty());
    }
}
