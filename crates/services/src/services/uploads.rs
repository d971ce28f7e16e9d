//! On-disk storage for project images.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::{debug, warn};
use utils::text::{is_allowed_image, secure_filename};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("file type not allowed: {0}")]
    DisallowedType(String),
    #[error("empty file: {0}")]
    Empty(String),
}

#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
}

impl ImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_dir(&self) -> Result<(), UploadError> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Stored name for a client filename: a random prefix plus the sanitised name
    pub fn stored_name(original: &str) -> Result<String, UploadError> {
        if !is_allowed_image(original) {
            return Err(UploadError::DisallowedType(original.to_string()));
        }
        let safe = secure_filename(original);
        // sanitising can eat the stem entirely, e.g. "???.png" -> "png"
        if !is_allowed_image(&safe) {
            return Err(UploadError::DisallowedType(original.to_string()));
        }
        let prefix = Uuid::new_v4().simple().to_string();
        Ok(format!("{}_{}", &prefix[..12], safe))
    }

    /// Validate and write an uploaded image, returning the stored filename
    pub async fn save(&self, original: &str, bytes: &[u8]) -> Result<String, UploadError> {
        let name = Self::stored_name(original)?;
        if bytes.is_empty() {
            return Err(UploadError::Empty(original.to_string()));
        }

        self.ensure_dir().await?;
        tokio::fs::write(self.root.join(&name), bytes).await?;
        debug!(original, stored = %name, size = bytes.len(), "Stored uploaded image");
        Ok(name)
    }

    /// Remove a stored image; a file that is already gone is not an error
    pub async fn remove(&self, filename: &str) -> Result<(), UploadError> {
        // only ever touch names we could have generated
        let safe = secure_filename(filename);
        if safe != filename || safe.is_empty() {
            warn!(filename, "Refusing to remove suspicious image path");
            return Ok(());
        }

        match tokio::fs::remove_file(self.root.join(filename)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_name_rules() {
        let name = ImageStore::stored_name("My Photo.PNG").unwrap();
        assert!(name.ends_with("_My_Photo.PNG"));
        assert_eq!(name.len(), 12 + 1 + "My_Photo.PNG".len());

        assert!(matches!(
            ImageStore::stored_name("script.sh"),
            Err(UploadError::DisallowedType(_))
        ));
        assert!(matches!(
            ImageStore::stored_name("???.png"),
            Err(UploadError::DisallowedType(_))
        ));
    }

    #[tokio::test]
    async fn test_save_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path().join("uploads"));

        let name = store.save("../../evil/cat.gif", b"GIF89a").await.unwrap();
        assert!(name.ends_with("_evil_cat.gif"));
        let path = dir.path().join("uploads").join(&name);
        assert_eq!(std::fs::read(&path).unwrap(), b"GIF89a");

        store.remove(&name).await.unwrap();
        assert!(!path.exists());
        // removing twice is fine
        store.remove(&name).await.unwrap();
    }

    #[tokio::test]
    async fn test_save_rejects_empty_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path());
        assert!(matches!(
            store.save("cat.png", b"").await,
            Err(UploadError::Empty(_))
        ));
    }

    #[tokio::test]
    async fn test_remove_ignores_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let outside = dir.path().join("keep.png");
        std::fs::write(&outside, b"x").unwrap();
        let store = ImageStore::new(dir.path().join("uploads"));

        store.remove("../keep.png").await.unwrap();
        assert!(outside.exists());
    }
}
