//! Content fingerprints for duplicate detection.
//!
//! A fingerprint is the SHA-256 digest of either the exact bytes of a file on
//! disk, or the PNG encoding of an in-memory raster. Pasted rasters are stored
//! as exactly those PNG bytes, so both paths agree on what gets compared.

use std::io::Cursor;
use std::path::Path;

use image::{ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs;

/// Errors that can occur while fingerprinting content
#[derive(Debug, Error)]
pub enum HashError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Raster buffer is {actual} bytes, expected {expected} for {width}x{height} RGBA")]
    InvalidRaster {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("Encoding error: {0}")]
    Encoding(#[from] image::ImageError),

    #[error("Encoder task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// SHA-256 content digest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Digest an in-memory byte buffer
    pub fn of_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);

        let mut digest = [0u8; 32];
        digest.copy_from_slice(&hasher.finalize());
        Self(digest)
    }

    /// Lowercase hex form
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// A decoded RGBA8 bitmap handed over by the UI layer (e.g. a clipboard paste)
#[derive(Debug, Clone)]
pub struct Raster {
    pub width: u32,
    pub height: u32,

    /// Row-major RGBA pixels, 4 bytes each
    pub pixels: Vec<u8>,
}

impl Raster {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Wrap an already decoded image
    pub fn from_image(image: &image::DynamicImage) -> Self {
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        Self::new(width, height, rgba.into_raw())
    }

    fn into_rgba(self) -> Result<RgbaImage, HashError> {
        let expected = self.width as usize * self.height as usize * 4;
        let actual = self.pixels.len();
        let (width, height) = (self.width, self.height);

        if width == 0 || height == 0 {
            return Err(HashError::InvalidRaster {
                width,
                height,
                expected,
                actual,
            });
        }

        RgbaImage::from_raw(width, height, self.pixels).ok_or(HashError::InvalidRaster {
            width,
            height,
            expected,
            actual,
        })
    }
}

/// Computes content fingerprints
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentHasher;

impl ContentHasher {
    pub fn new() -> Self {
        Self
    }

    /// Fingerprint the exact bytes of a file
    pub async fn fingerprint_file(&self, path: &Path) -> Result<Fingerprint, HashError> {
        let content = fs::read(path).await?;
        Ok(Fingerprint::of_bytes(&content))
    }

    /// Encode a raster to PNG and fingerprint the encoded bytes.
    ///
    /// Returns the encoded bytes as well so callers can write exactly what was
    /// hashed.
    pub async fn fingerprint_raster(
        &self,
        raster: Raster,
    ) -> Result<(Fingerprint, Vec<u8>), HashError> {
        let encoded = tokio::task::spawn_blocking(move || encode_png(raster)).await??;
        Ok((Fingerprint::of_bytes(&encoded), encoded))
    }
}

/// Lossless reference encoding used for raster fingerprints
pub fn encode_png(raster: Raster) -> Result<Vec<u8>, HashError> {
    let image = raster.into_rgba()?;
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png)?;
    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn solid(width: u32, height: u32, value: u8) -> Raster {
        Raster::new(width, height, vec![value; (width * height * 4) as usize])
    }

    #[tokio::test]
    async fn test_identical_files_share_fingerprint() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a.bin");
        let b = temp.path().join("b.bin");
        let c = temp.path().join("c.bin");
        tokio::fs::write(&a, b"same bytes").await.unwrap();
        tokio::fs::write(&b, b"same bytes").await.unwrap();
        tokio::fs::write(&c, b"other bytes").await.unwrap();

        let hasher = ContentHasher::new();
        let fa = hasher.fingerprint_file(&a).await.unwrap();
        let fb = hasher.fingerprint_file(&b).await.unwrap();
        let fc = hasher.fingerprint_file(&c).await.unwrap();

        assert_eq!(fa, fb);
        assert_ne!(fa, fc);
        assert_eq!(fa.to_hex().len(), 64);
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let temp = TempDir::new().unwrap();
        let result = ContentHasher::new()
            .fingerprint_file(&temp.path().join("nope.png"))
            .await;
        assert!(matches!(result, Err(HashError::Io(_))));
    }

    #[tokio::test]
    async fn test_raster_fingerprint_matches_written_file() {
        let temp = TempDir::new().unwrap();
        let hasher = ContentHasher::new();

        let (fingerprint, encoded) = hasher.fingerprint_raster(solid(4, 3, 200)).await.unwrap();
        let path = temp.path().join("pasted.png");
        tokio::fs::write(&path, &encoded).await.unwrap();

        assert_eq!(hasher.fingerprint_file(&path).await.unwrap(), fingerprint);
    }

    #[tokio::test]
    async fn test_raster_fingerprint_is_stable() {
        let hasher = ContentHasher::new();
        let (first, _) = hasher.fingerprint_raster(solid(8, 8, 10)).await.unwrap();
        let (second, _) = hasher.fingerprint_raster(solid(8, 8, 10)).await.unwrap();
        let (other, _) = hasher.fingerprint_raster(solid(8, 8, 11)).await.unwrap();

        assert_eq!(first, second);
        assert_ne!(first, other);
    }

    #[tokio::test]
    async fn test_short_raster_buffer_rejected() {
        let raster = Raster::new(10, 10, vec![0; 12]);
        let result = ContentHasher::new().fingerprint_raster(raster).await;
        assert!(matches!(
            result,
            Err(HashError::InvalidRaster { expected: 400, actual: 12, .. })
        ));
    }

    #[test]
    fn test_empty_raster_rejected() {
        assert!(encode_png(Raster::new(0, 5, Vec::new())).is_err());
    }
}
