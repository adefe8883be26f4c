//! Persisted manual ordering for a page.
//!
//! The marker file holds one file name per line. The directory decides which
//! files exist; the marker only decides the relative order of known ones:
//! recorded names come first (first occurrence wins), everything else follows
//! newest-created first, and names that no longer exist are dropped.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tokio::fs;

use crate::domain::display_name;

/// Reads and writes a page's order marker
#[derive(Debug, Clone)]
pub struct OrderStore {
    file_name: String,
}

impl OrderStore {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
        }
    }

    /// Location of the marker file for a page
    pub fn marker_path(&self, page_dir: &Path) -> PathBuf {
        page_dir.join(&self.file_name)
    }

    /// Names recorded in the marker, blank lines skipped.
    ///
    /// A missing marker reads as an empty order.
    pub async fn read_names(&self, page_dir: &Path) -> std::io::Result<Vec<String>> {
        let path = self.marker_path(page_dir);

        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Merge the recorded order with the files actually present
    pub async fn load_order(&self, page_dir: &Path, known_files: HashSet<PathBuf>) -> Vec<PathBuf> {
        let names = match self.read_names(page_dir).await {
            Ok(names) => names,
            Err(e) => {
                tracing::warn!(
                    "Unreadable order marker in {}, using creation order: {}",
                    page_dir.display(),
                    e
                );
                Vec::new()
            }
        };

        let mut remaining = known_files;
        let mut ordered = Vec::with_capacity(remaining.len());

        for name in names {
            let candidate = page_dir.join(&name);
            if remaining.remove(&candidate) {
                ordered.push(candidate);
            }
        }

        ordered.extend(newest_first(remaining.into_iter().collect()).await);
        ordered
    }

    /// Persist the order, ignoring failures (the next load self-heals)
    pub async fn save_order(&self, page_dir: &Path, ordered: &[PathBuf]) -> bool {
        match self.try_save_order(page_dir, ordered).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Failed to save order for {}: {}", page_dir.display(), e);
                false
            }
        }
    }

    /// Overwrite the marker with one file name per line
    pub async fn try_save_order(&self, page_dir: &Path, ordered: &[PathBuf]) -> std::io::Result<()> {
        let mut content = String::new();
        for path in ordered {
            content.push_str(&display_name(path));
            content.push('\n');
        }

        fs::write(self.marker_path(page_dir), content).await
    }
}

/// Sort by creation time, most recent first; ties broken by file name
async fn newest_first(paths: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut stamped = Vec::with_capacity(paths.len());
    for path in paths {
        let created = creation_time(&path).await;
        stamped.push((created, path));
    }

    stamped.sort_by(|(ta, pa), (tb, pb)| tb.cmp(ta).then_with(|| pa.cmp(pb)));
    stamped.into_iter().map(|(_, path)| path).collect()
}

/// Birth time where the platform reports it, modification time otherwise
async fn creation_time(path: &Path) -> SystemTime {
    match fs::metadata(path).await {
        Ok(metadata) => metadata
            .created()
            .or_else(|_| metadata.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH),
        Err(_) => SystemTime::UNIX_EPOCH,
    }
}
