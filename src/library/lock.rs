//! Advisory file lock serializing writers to a page across processes.

use std::fs::{File, OpenOptions};
use std::path::Path;

use fs2::FileExt;

/// Hidden lock file inside each page directory
pub const LOCK_FILE: &str = ".lock";

/// Exclusive lock on a page; released when dropped
#[derive(Debug)]
pub struct PageLock {
    file: File,
}

impl PageLock {
    /// Block (on a worker thread) until the page's lock file is held exclusively
    pub async fn acquire(page_dir: &Path) -> std::io::Result<Self> {
        let path = page_dir.join(LOCK_FILE);

        tokio::task::spawn_blocking(move || -> std::io::Result<Self> {
            let file = OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&path)?;

            file.lock_exclusive()?;
            Ok(Self { file })
        })
        .await
        .map_err(std::io::Error::other)?
    }
}

impl Drop for PageLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            tracing::debug!("Failed to release page lock: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_lock_is_reacquirable_after_drop() {
        let temp = TempDir::new().unwrap();

        let lock = PageLock::acquire(temp.path()).await.unwrap();
        assert!(temp.path().join(LOCK_FILE).exists());
        drop(lock);

        let again = PageLock::acquire(temp.path()).await;
        assert!(again.is_ok());
    }

    #[tokio::test]
    async fn test_missing_page_dir_fails() {
        let temp = TempDir::new().unwrap();
        let result = PageLock::acquire(&temp.path().join("missing")).await;
        assert!(result.is_err());
    }
}
