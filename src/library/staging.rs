//! All-or-nothing file writes.
//!
//! Content is written under a hidden temporary name next to the target and
//! renamed into place only once complete. Readers skip hidden names, so a
//! failed or interrupted write is never seen as an asset or a thumbnail.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::fs;

/// Suffix of in-flight temporary files
pub const STAGING_SUFFIX: &str = ".partial";

static COUNTER: AtomicU64 = AtomicU64::new(0);

/// Hidden sibling of `target` unique to this process and call
fn staging_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let unique = format!(
        ".{}.{}-{}{}",
        name,
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::Relaxed),
        STAGING_SUFFIX
    );

    target.with_file_name(unique)
}

/// Run `write` against a staging path, then move the result onto `target`.
///
/// On any error the staging file is removed and `target` is left untouched.
pub async fn write_atomically<F, Fut>(target: &Path, write: F) -> std::io::Result<()>
where
    F: FnOnce(PathBuf) -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    let staging = staging_path(target);

    let result = match write(staging.clone()).await {
        Ok(()) => fs::rename(&staging, target).await,
        Err(e) => Err(e),
    };

    if result.is_err() {
        if let Err(e) = fs::remove_file(&staging).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to clean up {}: {}", staging.display(), e);
            }
        }
    }

    result
}
