//! Listing image validation and storage.
//!
//! Images are checked before any upload: JPEG, PNG or WebP, at most 5 MB each,
//! 1 to 10 per listing. Stored objects are namespaced by owner and upload time
//! so two uploads never collide.

use crate::errors::{Error, Result};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, instrument};

/// Largest accepted image, in bytes.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
/// Most images a listing may carry.
pub const MAX_IMAGES_PER_LISTING: usize = 10;

const ACCEPTED_TYPES: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/webp", "webp"),
];

/// An image as received from the client.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    /// Declared MIME type
    pub content_type: String,
    /// Raw bytes
    pub bytes: Vec<u8>,
}

/// File extension for an accepted MIME type.
#[must_use]
pub fn extension_for(content_type: &str) -> Option<&'static str> {
    let wanted = content_type.trim().to_lowercase();
    ACCEPTED_TYPES
        .iter()
        .find(|(mime, _)| *mime == wanted)
        .map(|(_, ext)| *ext)
}

/// Rejects unsupported types and oversized files.
pub fn validate_image(image: &ImageUpload) -> Result<()> {
    if extension_for(&image.content_type).is_none() {
        return Err(Error::InvalidImage {
            message: format!(
                "نوع الصورة {} غير مدعوم، استخدم JPEG أو PNG أو WebP",
                image.content_type
            ),
        });
    }
    if image.bytes.is_empty() {
        return Err(Error::InvalidImage {
            message: "الصورة فارغة".to_string(),
        });
    }
    if image.bytes.len() > MAX_IMAGE_BYTES {
        return Err(Error::InvalidImage {
            message: "حجم الصورة يجب ألا يتجاوز 5 ميجابايت".to_string(),
        });
    }
    Ok(())
}

/// Checks the number of images attached to a listing.
pub fn validate_image_count(count: usize) -> Result<()> {
    if count == 0 {
        return Err(Error::InvalidImage {
            message: "أضف صورة واحدة على الأقل".to_string(),
        });
    }
    if count > MAX_IMAGES_PER_LISTING {
        return Err(Error::InvalidImage {
            message: format!("الحد الأقصى {MAX_IMAGES_PER_LISTING} صور"),
        });
    }
    Ok(())
}

/// Validates a whole batch before anything is uploaded.
pub fn validate_image_set(images: &[ImageUpload]) -> Result<()> {
    validate_image_count(images.len())?;
    images.iter().try_for_each(validate_image)
}

/// Object path `<owner>/<timestamp_ms>_<index>.<ext>`.
pub fn object_path(
    owner_id: &str,
    timestamp_ms: i64,
    index: usize,
    content_type: &str,
) -> Result<String> {
    let owner = owner_id.trim();
    if owner.is_empty() || owner.contains(['/', '\\']) || owner.starts_with('.') {
        return Err(Error::Validation {
            message: format!("Invalid owner id for object path: {owner_id:?}"),
        });
    }
    let ext = extension_for(content_type).ok_or_else(|| Error::InvalidImage {
        message: format!("Unsupported image type {content_type}"),
    })?;
    Ok(format!("{owner}/{timestamp_ms}_{index}.{ext}"))
}

/// Object store writing into a local directory served under a public URL.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalObjectStore {
    /// Creates a store rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Public URL of an object path.
    #[must_use]
    pub fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.public_base_url, path)
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(Error::Validation {
                message: format!("Object path escapes the store: {path}"),
            });
        }
        Ok(self.root.join(relative))
    }

    /// Writes `bytes` at `path` and returns the public URL.
    #[instrument(skip(self, bytes), fields(len = bytes.len()))]
    pub async fn upload(&self, path: &str, bytes: &[u8]) -> Result<String> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, bytes).await?;
        debug!("Stored object at {}", target.display());
        Ok(self.public_url(path))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn image(content_type: &str, len: usize) -> ImageUpload {
        ImageUpload {
            content_type: content_type.to_string(),
            bytes: vec![0u8; len],
        }
    }

    #[test]
    fn test_accepts_supported_types() {
        for mime in ["image/jpeg", "image/png", "image/webp", "IMAGE/PNG"] {
            assert!(validate_image(&image(mime, 1024)).is_ok(), "{mime}");
        }
    }

    #[test]
    fn test_rejects_type_and_size() {
        assert!(matches!(
            validate_image(&image("image/gif", 10)),
            Err(Error::InvalidImage { .. })
        ));
        assert!(matches!(
            validate_image(&image("image/png", MAX_IMAGE_BYTES + 1)),
            Err(Error::InvalidImage { .. })
        ));
        assert!(validate_image(&image("image/png", MAX_IMAGE_BYTES)).is_ok());
    }

    #[test]
    fn test_image_count_bounds() {
        assert!(validate_image_count(0).is_err());
        assert!(validate_image_count(1).is_ok());
        assert!(validate_image_count(10).is_ok());
        assert!(validate_image_count(11).is_err());
        let batch: Vec<_> = (0..3).map(|_| image("image/webp", 16)).collect();
        assert!(validate_image_set(&batch).is_ok());
    }

    #[test]
    fn test_object_path_is_namespaced() {
        let path = object_path("user-42", 1_700_000_000_000, 2, "image/jpeg").unwrap();
        assert_eq!(path, "user-42/1700000000000_2.jpg");
        assert!(object_path("../etc", 1, 0, "image/png").is_err());
        assert!(object_path("user", 1, 0, "text/plain").is_err());
    }

    #[tokio::test]
    async fn test_local_upload_returns_public_url() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = LocalObjectStore::new(dir.path(), "https://cdn.example.org/img/");
        let url = store.upload("user-1/1_0.png", b"png-bytes").await?;
        assert_eq!(url, "https://cdn.example.org/img/user-1/1_0.png");
        let written = tokio::fs::read(dir.path().join("user-1/1_0.png")).await?;
        assert_eq!(written, b"png-bytes");

        assert!(store.upload("../escape.png", b"x").await.is_err());
        Ok(())
    }
}
