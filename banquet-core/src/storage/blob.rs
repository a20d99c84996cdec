use crate::common::error::{BanquetError, Result};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// Directory (key prefix) that venue photos live under.
pub const IMAGE_PREFIX: &str = "banquet_images";

/// Storage for uploaded files, addressed by slash-separated keys.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Blob store rooted at a directory on local disk (the media root).
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let clean = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if key.is_empty() || !clean {
            return Err(BanquetError::Blob {
                message: format!("Invalid blob key '{key}'"),
            });
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        debug!("Stored blob {} ({} bytes)", key, bytes.len());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Deleted blob {}", key);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Png,
    Jpeg,
    Gif,
    Webp,
}

impl ImageKind {
    /// Identify an image by its leading magic bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            Some(ImageKind::Png)
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(ImageKind::Jpeg)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(ImageKind::Gif)
        } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(ImageKind::Webp)
        } else {
            None
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageKind::Png => "png",
            ImageKind::Jpeg => "jpg",
            ImageKind::Gif => "gif",
            ImageKind::Webp => "webp",
        }
    }
}

/// One uploaded image file, not yet persisted.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub kind: ImageKind,
}

impl ImageUpload {
    /// Checks size and content; the message is shown to the uploader.
    pub fn from_bytes(file_name: &str, bytes: Vec<u8>, max_bytes: usize) -> std::result::Result<Self, String> {
        if bytes.is_empty() {
            return Err(format!("The submitted file \"{file_name}\" is empty."));
        }
        if bytes.len() > max_bytes {
            return Err(format!(
                "\"{file_name}\" is too large ({} bytes, limit {max_bytes}).",
                bytes.len()
            ));
        }
        let kind = ImageKind::sniff(&bytes).ok_or_else(|| {
            format!(
                "Upload a valid image. \"{file_name}\" was either not an image or a corrupted image."
            )
        })?;
        Ok(Self {
            file_name: file_name.to_string(),
            bytes,
            kind,
        })
    }

    /// Fresh key for this upload under the owning listing's prefix.
    pub fn key_for_listing(&self, listing_id: i64) -> String {
        format!(
            "{IMAGE_PREFIX}/{listing_id}/{}.{}",
            Uuid::new_v4(),
            self.kind.extension()
        )
    }
}
