//! Lazily generated thumbnails stored beside each page's images.
//!
//! A thumbnail lives at `<page>/<thumbnail_dir>/<file name>`. Once written it is
//! reused forever; assets never change after they are added.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ImageFormat, ImageReader};
use thiserror::Error;
use tokio::fs;

use super::staging::write_atomically;
use super::types::SupportedTypes;
use crate::config::LibrarySettings;

/// Errors that can occur while producing a thumbnail
#[derive(Debug, Error)]
pub enum ThumbnailError {
    #[error("Source has no file name: {0}")]
    NoFileName(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Thumbnail task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// How a thumbnail was materialized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbnailKind {
    /// Already on disk, left untouched
    Existing,

    /// Source fits in the target box; bytes copied verbatim
    Copied,

    /// Downscaled and re-encoded
    Resized { width: u32, height: u32 },
}

/// Produces and retrieves bounded-size previews
#[derive(Debug, Clone)]
pub struct ThumbnailCache {
    dir_name: String,
    target_size: u32,
    jpeg_quality: u8,
    types: SupportedTypes,
}

impl ThumbnailCache {
    pub fn new(settings: &LibrarySettings, types: SupportedTypes) -> Self {
        Self {
            dir_name: settings.thumbnail_dir.clone(),
            target_size: settings.thumbnail_size.max(1),
            jpeg_quality: settings.jpeg_quality.clamp(1, 100),
            types,
        }
    }

    /// Deterministic thumbnail location for a source image
    pub fn thumbnail_path(&self, source: &Path) -> Option<PathBuf> {
        let name = source.file_name()?;
        let page_dir = source.parent()?;
        Some(page_dir.join(&self.dir_name).join(name))
    }

    /// Return the thumbnail for `source`, generating it if missing.
    ///
    /// Never fails: on any error the source path itself is returned.
    pub async fn ensure_thumbnail(&self, source: &Path) -> PathBuf {
        match self.try_ensure_thumbnail(source).await {
            Ok((path, _)) => path,
            Err(e) => {
                tracing::warn!(
                    "Thumbnail generation failed for {}, using source: {}",
                    source.display(),
                    e
                );
                source.to_path_buf()
            }
        }
    }

    /// Fallible form of [`ensure_thumbnail`](Self::ensure_thumbnail)
    pub async fn try_ensure_thumbnail(
        &self,
        source: &Path,
    ) -> Result<(PathBuf, ThumbnailKind), ThumbnailError> {
        let thumb_path = self
            .thumbnail_path(source)
            .ok_or_else(|| ThumbnailError::NoFileName(source.to_path_buf()))?;

        if fs::try_exists(&thumb_path).await? {
            return Ok((thumb_path, ThumbnailKind::Existing));
        }

        if let Some(thumb_dir) = thumb_path.parent() {
            fs::create_dir_all(thumb_dir).await?;
        }

        let bytes = fs::read(source).await?;
        let lossless = self.types.is_lossless(source);
        let target = self.target_size;
        let quality = self.jpeg_quality;

        let (output, kind) =
            tokio::task::spawn_blocking(move || render(bytes, target, lossless, quality)).await??;

        // Only complete thumbnails ever appear at the final path
        write_atomically(&thumb_path, |staging| async move {
            fs::write(&staging, output).await
        })
        .await?;
        tracing::debug!("Thumbnail {:?} written: {}", kind, thumb_path.display());

        Ok((thumb_path, kind))
    }

    /// Delete the thumbnail belonging to `source`, if any
    pub async fn remove_thumbnail(&self, source: &Path) -> Result<(), ThumbnailError> {
        let thumb_path = self
            .thumbnail_path(source)
            .ok_or_else(|| ThumbnailError::NoFileName(source.to_path_buf()))?;

        match fs::remove_file(&thumb_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Dimensions after fitting `width`x`height` into a `target` square box.
///
/// Returns `None` when the image already fits (no upscaling).
pub fn fitted_dimensions(width: u32, height: u32, target: u32) -> Option<(u32, u32)> {
    if width == 0 || height == 0 {
        return None;
    }

    let scale = f64::min(
        target as f64 / width as f64,
        target as f64 / height as f64,
    );
    if scale >= 1.0 {
        return None;
    }

    let scaled = |side: u32| ((side as f64 * scale).round() as u32).max(1);
    Some((scaled(width), scaled(height)))
}

/// Decode, downscale and re-encode, or pass the bytes through untouched
fn render(
    bytes: Vec<u8>,
    target: u32,
    lossless: bool,
    quality: u8,
) -> Result<(Vec<u8>, ThumbnailKind), ThumbnailError> {
    let (width, height) = ImageReader::new(Cursor::new(&bytes))
        .with_guessed_format()?
        .into_dimensions()?;

    let Some((new_width, new_height)) = fitted_dimensions(width, height, target) else {
        return Ok((bytes, ThumbnailKind::Copied));
    };

    let image = image::load_from_memory(&bytes)?;
    let resized = image.resize_exact(new_width, new_height, FilterType::Lanczos3);

    let mut buffer = Cursor::new(Vec::new());
    if lossless {
        resized.write_to(&mut buffer, ImageFormat::Png)?;
    } else {
        let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
        encoder.encode_image(&resized.to_rgb8())?;
    }

    Ok((
        buffer.into_inner(),
        ThumbnailKind::Resized {
            width: new_width,
            height: new_height,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{RgbImage, Rgb};
    use tempfile::TempDir;

    fn cache() -> ThumbnailCache {
        ThumbnailCache::new(&LibrarySettings::default(), SupportedTypes::default())
    }

    fn write_image(path: &Path, width: u32, height: u32) {
        let image = RgbImage::from_fn(width, height, |x, y| Rgb([x as u8, y as u8, 128]));
        image.save(path).unwrap();
    }

    #[test]
    fn test_fitted_dimensions() {
        assert_eq!(fitted_dimensions(300, 600, 150), Some((75, 150)));
        assert_eq!(fitted_dimensions(600, 300, 150), Some((150, 75)));
        assert_eq!(fitted_dimensions(60, 60, 150), None);
        assert_eq!(fitted_dimensions(150, 150, 150), None);
        assert_eq!(fitted_dimensions(3000, 1, 150), Some((150, 1)));
    }

    #[test]
    fn test_thumbnail_path_is_inside_hidden_dir() {
        let path = cache().thumbnail_path(Path::new("/lib/Default/cat.png"));
        assert_eq!(path, Some(PathBuf::from("/lib/Default/.thumbnails/cat.png")));
    }

    #[tokio::test]
    async fn test_large_png_is_downscaled_losslessly() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("tall.png");
        write_image(&source, 300, 600);

        let (thumb, kind) = cache().try_ensure_thumbnail(&source).await.unwrap();

        assert_eq!(kind, ThumbnailKind::Resized { width: 75, height: 150 });
        assert_eq!(thumb, temp.path().join(".thumbnails").join("tall.png"));
        assert_eq!(image::image_dimensions(&thumb).unwrap(), (75, 150));
        let bytes = std::fs::read(&thumb).unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Png);
    }

    #[tokio::test]
    async fn test_large_jpeg_is_reencoded_lossy() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("wide.jpg");
        write_image(&source, 400, 200);

        let thumb = cache().ensure_thumbnail(&source).await;

        let bytes = std::fs::read(&thumb).unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Jpeg);
        assert_eq!(image::image_dimensions(&thumb).unwrap(), (150, 75));
    }

    #[tokio::test]
    async fn test_small_image_is_copied_verbatim() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("small.png");
        write_image(&source, 60, 60);

        let (thumb, kind) = cache().try_ensure_thumbnail(&source).await.unwrap();

        assert_eq!(kind, ThumbnailKind::Copied);
        assert_eq!(std::fs::read(&thumb).unwrap(), std::fs::read(&source).unwrap());
    }

    #[tokio::test]
    async fn test_existing_thumbnail_is_reused() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("big.png");
        write_image(&source, 500, 500);

        let thumb_dir = temp.path().join(".thumbnails");
        std::fs::create_dir_all(&thumb_dir).unwrap();
        std::fs::write(thumb_dir.join("big.png"), b"stale but kept").unwrap();

        let (thumb, kind) = cache().try_ensure_thumbnail(&source).await.unwrap();

        assert_eq!(kind, ThumbnailKind::Existing);
        assert_eq!(std::fs::read(&thumb).unwrap(), b"stale but kept");
    }

    #[tokio::test]
    async fn test_failed_write_leaves_no_thumbnail() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("noise.png");
        write_image(&source, 500, 500);

        let cache = cache();
        let thumb_path = cache.thumbnail_path(&source).unwrap();
        std::fs::create_dir_all(thumb_path.parent().unwrap()).unwrap();

        // The write dies after the first bytes hit the disk
        let result = write_atomically(&thumb_path, |staging| async move {
            fs::write(&staging, b"\x89PNG").await?;
            Err(std::io::Error::other("File too large"))
        })
        .await;
        assert!(result.is_err());
        assert!(!thumb_path.exists());

        // The next listing regenerates instead of reusing a truncated file
        let (thumb, kind) = cache.try_ensure_thumbnail(&source).await.unwrap();
        assert_eq!(kind, ThumbnailKind::Resized { width: 150, height: 150 });
        assert_eq!(image::image_dimensions(&thumb).unwrap(), (150, 150));
    }

    #[tokio::test]
    async fn test_concurrent_generation_yields_complete_thumbnail() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("wide.png");
        write_image(&source, 600, 300);

        let cache = cache();
        let (first, second) = tokio::join!(
            cache.ensure_thumbnail(&source),
            cache.ensure_thumbnail(&source)
        );

        assert_eq!(first, second);
        assert_eq!(image::image_dimensions(&first).unwrap(), (150, 75));
        let leftovers = std::fs::read_dir(temp.path().join(".thumbnails"))
            .unwrap()
            .count();
        assert_eq!(leftovers, 1);
    }

    #[tokio::test]
    async fn test_corrupt_source_falls_back_to_source_path() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("broken.png");
        std::fs::write(&source, b"definitely not a png").unwrap();

        let thumb = cache().ensure_thumbnail(&source).await;

        assert_eq!(thumb, source);
        assert!(!temp.path().join(".thumbnails").join("broken.png").exists());
    }

    #[tokio::test]
    async fn test_remove_missing_thumbnail_is_ok() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("gone.png");
        assert!(cache().remove_thumbnail(&source).await.is_ok());
    }
}
