// src/storage/blob_store.rs
//! Local blob store for uploaded images.
//!
//! Durable holding area for photos and signature images before (and
//! alongside) cluster placement; not itself content-addressed. Incoming
//! bytes are resized to canonical dimensions and normalized to PNG before
//! hitting disk, so every stored blob is ready for PDF embedding as-is.
//!
//! Filenames follow `{prefix}_{timestampMillis}.png`. Two saves within the
//! same millisecond collide; the scheme is documented as-is rather than
//! made collision-proof.

use crate::errors::StorageError;
use crate::models::timestamp_millis;
use image::imageops::FilterType;
use image::ImageOutputFormat;
use log::debug;
use serde::Serialize;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tokio::task;

/// Canonical photo dimensions (width, height).
const PHOTO_DIMENSIONS: (u32, u32) = (496, 659);
/// Canonical signature-image dimensions (width, height).
const SIGNATURE_DIMENSIONS: (u32, u32) = (667, 276);

/// Per-directory usage numbers for the health endpoint.
#[derive(Serialize, Debug, Clone, Copy, Default)]
#[serde(rename_all = "camelCase")]
pub struct DirStats {
    pub count: u64,
    pub total_size: u64,
}

/// Combined blob-store usage.
#[derive(Serialize, Debug, Clone, Copy, Default)]
pub struct StorageStats {
    pub photos: DirStats,
    pub signatures: DirStats,
}

/// Filesystem-backed store for normalized photo and signature blobs.
pub struct BlobStore {
    photos_dir: PathBuf,
    signatures_dir: PathBuf,
}

#[allow(dead_code)]
impl BlobStore {
    /// Opens (and creates if needed) `{root}/photos` and
    /// `{root}/signatures`.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, StorageError> {
        let photos_dir = root.as_ref().join("photos");
        let signatures_dir = root.as_ref().join("signatures");
        std::fs::create_dir_all(&photos_dir)?;
        std::fs::create_dir_all(&signatures_dir)?;
        Ok(BlobStore {
            photos_dir,
            signatures_dir,
        })
    }

    /// Normalizes and persists a holder photo.
    ///
    /// # Arguments
    /// * `bytes` - Uploaded image in any decodable format
    ///
    /// # Returns
    /// The generated filename, the only handle callers get back.
    pub async fn save_photo(&self, bytes: &[u8]) -> Result<String, StorageError> {
        self.save(bytes, "photo", PHOTO_DIMENSIONS, self.photos_dir.clone())
            .await
    }

    /// Normalizes and persists a signature image, returning the generated
    /// filename.
    pub async fn save_signature(&self, bytes: &[u8]) -> Result<String, StorageError> {
        self.save(
            bytes,
            "signature",
            SIGNATURE_DIMENSIONS,
            self.signatures_dir.clone(),
        )
        .await
    }

    async fn save(
        &self,
        bytes: &[u8],
        prefix: &str,
        dimensions: (u32, u32),
        dir: PathBuf,
    ) -> Result<String, StorageError> {
        let owned = bytes.to_vec();
        // Decode/resize/encode is CPU-bound; keep it off the async workers.
        let normalized = task::spawn_blocking(move || normalize_image(&owned, dimensions))
            .await
            .map_err(|e| StorageError::InvalidImage(format!("image task failed: {}", e)))??;

        let filename = format!("{}_{}.png", prefix, timestamp_millis());
        tokio::fs::write(dir.join(&filename), normalized).await?;
        debug!("stored blob {}", filename);
        Ok(filename)
    }

    /// A bare filename resolves under the component's directory; an
    /// absolute path is used as-is.
    fn resolve(dir: &Path, reference: &str) -> PathBuf {
        let path = Path::new(reference);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            dir.join(reference)
        }
    }

    pub async fn get_photo(&self, reference: &str) -> Result<Vec<u8>, StorageError> {
        Ok(tokio::fs::read(Self::resolve(&self.photos_dir, reference)).await?)
    }

    pub async fn get_signature(&self, reference: &str) -> Result<Vec<u8>, StorageError> {
        Ok(tokio::fs::read(Self::resolve(&self.signatures_dir, reference)).await?)
    }

    /// Best-effort delete: `false` on any failure, never raises.
    pub async fn delete_photo(&self, reference: &str) -> bool {
        tokio::fs::remove_file(Self::resolve(&self.photos_dir, reference))
            .await
            .is_ok()
    }

    /// Best-effort delete: `false` on any failure, never raises.
    pub async fn delete_signature(&self, reference: &str) -> bool {
        tokio::fs::remove_file(Self::resolve(&self.signatures_dir, reference))
            .await
            .is_ok()
    }

    pub async fn photo_exists(&self, reference: &str) -> bool {
        tokio::fs::metadata(Self::resolve(&self.photos_dir, reference))
            .await
            .is_ok()
    }

    pub async fn signature_exists(&self, reference: &str) -> bool {
        tokio::fs::metadata(Self::resolve(&self.signatures_dir, reference))
            .await
            .is_ok()
    }

    /// File counts and byte totals per directory.
    pub async fn storage_stats(&self) -> Result<StorageStats, StorageError> {
        Ok(StorageStats {
            photos: Self::dir_stats(&self.photos_dir).await?,
            signatures: Self::dir_stats(&self.signatures_dir).await?,
        })
    }

    async fn dir_stats(dir: &Path) -> Result<DirStats, StorageError> {
        let mut stats = DirStats::default();
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let meta = entry.metadata().await?;
            if meta.is_file() {
                stats.count += 1;
                stats.total_size += meta.len();
            }
        }
        Ok(stats)
    }
}

/// Decodes arbitrary uploaded image bytes, resizes to the canonical
/// dimensions and re-encodes as PNG.
fn normalize_image(bytes: &[u8], (width, height): (u32, u32)) -> Result<Vec<u8>, StorageError> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| StorageError::InvalidImage(e.to_string()))?;
    let resized = decoded.resize_exact(width, height, FilterType::Lanczos3);

    let mut encoded = Cursor::new(Vec::new());
    resized
        .write_to(&mut encoded, ImageOutputFormat::Png)
        .map_err(|e| StorageError::InvalidImage(e.to_string()))?;
    Ok(encoded.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A small valid PNG to feed through the normalizer.
    fn test_png() -> Vec<u8> {
        let img = image::DynamicImage::ImageRgb8(image::RgbImage::new(16, 16));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageOutputFormat::Png).unwrap();
        buf.into_inner()
    }

    #[tokio::test]
    async fn save_photo_normalizes_dimensions_and_codec() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path()).unwrap();

        let filename = store.save_photo(&test_png()).await.unwrap();
        assert!(filename.starts_with("photo_"));
        assert!(filename.ends_with(".png"));

        let stored = store.get_photo(&filename).await.unwrap();
        let decoded = image::load_from_memory(&stored).unwrap();
        assert_eq!(decoded.width(), 496);
        assert_eq!(decoded.height(), 659);
    }

    #[tokio::test]
    async fn save_signature_uses_signature_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path()).unwrap();

        let filename = store.save_signature(&test_png()).await.unwrap();
        let stored = store.get_signature(&filename).await.unwrap();
        let decoded = image::load_from_memory(&stored).unwrap();
        assert_eq!(decoded.width(), 667);
        assert_eq!(decoded.height(), 276);
    }

    #[tokio::test]
    async fn invalid_bytes_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path()).unwrap();
        let err = store.save_photo(b"not an image").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidImage(_)));
    }

    #[tokio::test]
    async fn delete_is_best_effort() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path()).unwrap();

        let filename = store.save_photo(&test_png()).await.unwrap();
        assert!(store.photo_exists(&filename).await);
        assert!(store.delete_photo(&filename).await);
        assert!(!store.photo_exists(&filename).await);
        // Second delete fails quietly.
        assert!(!store.delete_photo(&filename).await);
    }

    #[tokio::test]
    async fn get_accepts_absolute_paths() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path()).unwrap();

        let filename = store.save_photo(&test_png()).await.unwrap();
        let absolute = dir.path().join("photos").join(&filename);
        let bytes = store.get_photo(absolute.to_str().unwrap()).await.unwrap();
        assert!(!bytes.is_empty());
    }

    #[tokio::test]
    async fn storage_stats_count_files_and_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path()).unwrap();

        store.save_photo(&test_png()).await.unwrap();
        store.save_signature(&test_png()).await.unwrap();

        let stats = store.storage_stats().await.unwrap();
        assert_eq!(stats.photos.count, 1);
        assert_eq!(stats.signatures.count, 1);
        assert!(stats.photos.total_size > 0);
        assert!(stats.signatures.total_size > 0);
    }
}
