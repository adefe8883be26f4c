//! Per-page path -> fingerprint cache.
//!
//! Entries are keyed by file size and modification time, so a file replaced
//! behind the library's back is re-hashed rather than trusted.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tokio::fs;

use super::hasher::{ContentHasher, Fingerprint, HashError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Stamp {
    len: u64,
    modified: Option<SystemTime>,
}

impl Stamp {
    async fn of(path: &Path) -> std::io::Result<Self> {
        let metadata = fs::metadata(path).await?;
        Ok(Self {
            len: metadata.len(),
            modified: metadata.modified().ok(),
        })
    }
}

#[derive(Debug, Default)]
pub struct FingerprintIndex {
    entries: HashMap<PathBuf, (Stamp, Fingerprint)>,
}

impl FingerprintIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached fingerprint if the file is unchanged, otherwise hash and cache it
    pub async fn fingerprint(
        &mut self,
        hasher: &ContentHasher,
        path: &Path,
    ) -> Result<Fingerprint, HashError> {
        let stamp = Stamp::of(path).await?;

        if let Some((cached, fingerprint)) = self.entries.get(path) {
            if *cached == stamp {
                return Ok(*fingerprint);
            }
        }

        let fingerprint = hasher.fingerprint_file(path).await?;
        self.entries.insert(path.to_path_buf(), (stamp, fingerprint));
        Ok(fingerprint)
    }

    /// Record the fingerprint of a file just written by the library
    pub async fn insert(&mut self, path: &Path, fingerprint: Fingerprint) {
        match Stamp::of(path).await {
            Ok(stamp) => {
                self.entries.insert(path.to_path_buf(), (stamp, fingerprint));
            }
            Err(e) => tracing::debug!("Not indexing {}: {}", path.display(), e),
        }
    }

    pub fn remove(&mut self, path: &Path) {
        self.entries.remove(path);
    }

    /// Drop entries for files that are no longer present
    pub fn retain_known(&mut self, known: &HashSet<PathBuf>) {
        self.entries.retain(|path, _| known.contains(path));
    }
}
