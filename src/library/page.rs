//! The page library: one directory per page, deduplicated by content.
//!
//! Every public operation degrades instead of failing. I/O and codec errors
//! are logged and turned into skipped adds, fallback thumbnails or unsaved
//! orders, which the merge in [`OrderStore::load_order`] repairs on the next
//! listing.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Local;
use tokio::fs;
use tokio::sync::{broadcast, RwLock};

use super::hasher::{ContentHasher, Fingerprint, Raster};
use super::index::FingerprintIndex;
use super::lock::PageLock;
use super::order::OrderStore;
use super::staging::write_atomically;
use super::thumbnail::ThumbnailCache;
use super::types::SupportedTypes;
use crate::config::{LibrarySettings, ResolvedConfig};
use crate::domain::{display_name, Asset, LibraryEvent, LibraryEventKind, PageName, PageNameError};

/// Capacity of the event channel; slow subscribers see `Lagged`
const EVENT_CAPACITY: usize = 64;

/// Why an add did not produce a new asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Not an accepted image type
    Unsupported,

    /// Byte-identical to an asset already in the page
    Duplicate { existing: PathBuf },

    /// Page name cannot map to a directory
    InvalidPage(PageNameError),

    /// Reading, hashing or writing failed; details were logged
    Failed(String),
}

/// Result of an add operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    Added(Asset),
    Skipped(SkipReason),
}

impl AddOutcome {
    pub fn asset(&self) -> Option<&Asset> {
        match self {
            Self::Added(asset) => Some(asset),
            Self::Skipped(_) => None,
        }
    }

    pub fn is_added(&self) -> bool {
        matches!(self, Self::Added(_))
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Skipped(SkipReason::Duplicate { .. }))
    }
}

/// Mutable per-page state, guarded by the page's lock
#[derive(Debug, Default)]
struct PageState {
    index: FingerprintIndex,
}

/// Owns every page under a library root
pub struct PageLibrary {
    root: PathBuf,
    settings: LibrarySettings,
    types: SupportedTypes,
    hasher: ContentHasher,
    thumbnails: ThumbnailCache,
    order: OrderStore,
    pages: Mutex<HashMap<PageName, Arc<RwLock<PageState>>>>,
    events: broadcast::Sender<LibraryEvent>,
}

impl PageLibrary {
    /// Library rooted at `root`, accepting the configured extensions
    pub fn new(root: impl Into<PathBuf>, settings: LibrarySettings) -> Self {
        let types = SupportedTypes::from_settings(&settings);
        Self::with_types(root, settings, types)
    }

    /// Library with an explicitly injected allow-list
    pub fn with_types(
        root: impl Into<PathBuf>,
        settings: LibrarySettings,
        types: SupportedTypes,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            root: root.into(),
            thumbnails: ThumbnailCache::new(&settings, types.clone()),
            order: OrderStore::new(settings.order_file.clone()),
            hasher: ContentHasher::new(),
            types,
            settings,
            pages: Mutex::new(HashMap::new()),
            events,
        }
    }

    pub fn from_config(config: &ResolvedConfig) -> Self {
        Self::new(config.library.clone(), config.settings.clone())
    }

    pub fn settings(&self) -> &LibrarySettings {
        &self.settings
    }

    pub fn thumbnails(&self) -> &ThumbnailCache {
        &self.thumbnails
    }

    /// Receive `AssetAdded`, `AssetRemoved` and `OrderChanged` notifications
    pub fn subscribe(&self) -> broadcast::Receiver<LibraryEvent> {
        self.events.subscribe()
    }

    /// Directory backing a page (not created)
    pub fn page_dir(&self, page: &PageName) -> PathBuf {
        page.dir_in(&self.root)
    }

    /// Names of existing pages, sorted
    pub async fn list_pages(&self) -> Vec<String> {
        let mut pages = Vec::new();

        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!("Library root {} unreadable: {}", self.root.display(), e);
                return pages;
            }
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            let name = entry.file_name().to_string_lossy().to_string();
            if is_dir && PageName::new(name.as_str()).is_ok() {
                pages.push(name);
            }
        }

        pages.sort();
        pages
    }

    /// Ordered assets of a page, with thumbnails materialized.
    ///
    /// Creates the page directory on first access.
    pub async fn list_assets(&self, page: &str) -> Vec<Asset> {
        let Some(name) = parse_page(page) else {
            return Vec::new();
        };

        let state = self.page_state(&name);
        let _guard = state.read().await;

        let dir = match self.ensure_page_dir(&name).await {
            Ok(dir) => dir,
            Err(e) => {
                tracing::warn!("Cannot create page '{}': {}", name, e);
                return Vec::new();
            }
        };

        let mut assets = Vec::new();
        for path in self.ordered_paths(&dir).await {
            let thumbnail = self.thumbnails.ensure_thumbnail(&path).await;
            assets.push(Asset::new(path).with_thumbnail(thumbnail));
        }

        assets
    }

    /// Look up an asset by file name
    pub async fn find_asset(&self, page: &str, name: &str) -> Option<Asset> {
        self.list_assets(page)
            .await
            .into_iter()
            .find(|asset| asset.name == name)
    }

    /// Copy a file into the page unless it is unsupported or a duplicate
    pub async fn add_file(&self, page: &str, source: &Path) -> AddOutcome {
        let name = match PageName::new(page) {
            Ok(name) => name,
            Err(e) => return AddOutcome::Skipped(SkipReason::InvalidPage(e)),
        };

        if !self.types.is_supported(source) {
            tracing::debug!("Ignoring unsupported file {}", source.display());
            return AddOutcome::Skipped(SkipReason::Unsupported);
        }

        let state = self.page_state(&name);
        let mut state = state.write().await;

        let dir = match self.ensure_page_dir(&name).await {
            Ok(dir) => dir,
            Err(e) => return failed(format!("Cannot create page '{}': {}", name, e)),
        };
        let _lock = self.lock_page(&dir).await;

        let fingerprint = match self.hasher.fingerprint_file(source).await {
            Ok(fingerprint) => fingerprint,
            Err(e) => return failed(format!("Failed to hash {}: {}", source.display(), e)),
        };

        let existing = self.ordered_paths(&dir).await;
        if let Some(duplicate) = self.find_duplicate(&mut state, &existing, fingerprint).await {
            tracing::info!(
                "Skipping {}: same content as {}",
                source.display(),
                duplicate.display()
            );
            return AddOutcome::Skipped(SkipReason::Duplicate {
                existing: duplicate,
            });
        }

        let target = unique_target(&dir, &stored_name(source)).await;
        let copied = write_atomically(&target, |staging| async move {
            fs::copy(source, &staging).await.map(|_| ())
        })
        .await;
        if let Err(e) = copied {
            return failed(format!(
                "Failed to copy {} into page '{}': {}",
                source.display(),
                name,
                e
            ));
        }

        self.finish_add(&name, &dir, &mut state, existing, target, fingerprint)
            .await
    }

    /// Add a batch of dropped files in order
    pub async fn add_files(&self, page: &str, sources: &[PathBuf]) -> Vec<AddOutcome> {
        let mut outcomes = Vec::with_capacity(sources.len());
        for source in sources {
            outcomes.push(self.add_file(page, source).await);
        }
        outcomes
    }

    /// Store a pasted bitmap as `Pasted_<timestamp>.png` unless it is a duplicate
    pub async fn add_raster(&self, page: &str, raster: Raster) -> AddOutcome {
        let name = match PageName::new(page) {
            Ok(name) => name,
            Err(e) => return AddOutcome::Skipped(SkipReason::InvalidPage(e)),
        };

        let file_name = format!("Pasted_{}.png", Local::now().format("%Y%m%d_%H%M%S"));
        if !self.types.is_supported(Path::new(&file_name)) {
            tracing::debug!("PNG is not an accepted type; dropping pasted image");
            return AddOutcome::Skipped(SkipReason::Unsupported);
        }

        let state = self.page_state(&name);
        let mut state = state.write().await;

        let dir = match self.ensure_page_dir(&name).await {
            Ok(dir) => dir,
            Err(e) => return failed(format!("Cannot create page '{}': {}", name, e)),
        };
        let _lock = self.lock_page(&dir).await;

        let (fingerprint, encoded) = match self.hasher.fingerprint_raster(raster).await {
            Ok(result) => result,
            Err(e) => return failed(format!("Failed to encode pasted image: {}", e)),
        };

        let existing = self.ordered_paths(&dir).await;
        if let Some(duplicate) = self.find_duplicate(&mut state, &existing, fingerprint).await {
            tracing::info!("Skipping pasted image: same content as {}", duplicate.display());
            return AddOutcome::Skipped(SkipReason::Duplicate {
                existing: duplicate,
            });
        }

        let target = unique_target(&dir, &file_name).await;
        let written = write_atomically(&target, |staging| async move {
            fs::write(&staging, encoded).await
        })
        .await;
        if let Err(e) = written {
            return failed(format!("Failed to write {}: {}", target.display(), e));
        }

        self.finish_add(&name, &dir, &mut state, existing, target, fingerprint)
            .await
    }

    /// Delete an asset and its thumbnail. Returns whether the source was deleted.
    pub async fn remove_asset(&self, page: &str, asset: &Asset) -> bool {
        let Some(name) = parse_page(page) else {
            return false;
        };

        let state = self.page_state(&name);
        let mut state = state.write().await;

        let dir = self.page_dir(&name);
        if !self.is_asset_path(&dir, &asset.path) {
            tracing::warn!(
                "Refusing to remove {}: not an image in page '{}'",
                asset.path.display(),
                name
            );
            return false;
        }
        let _lock = self.lock_page(&dir).await;

        let removed = match fs::remove_file(&asset.path).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Failed to delete {}: {}", asset.path.display(), e);
                false
            }
        };

        if let Err(e) = self.thumbnails.remove_thumbnail(&asset.path).await {
            tracing::warn!("Failed to delete thumbnail of {}: {}", asset.path.display(), e);
        }
        state.index.remove(&asset.path);

        let mut order = self.ordered_paths(&dir).await;
        order.retain(|path| path != &asset.path);
        self.order.save_order(&dir, &order).await;

        tracing::info!("Removed {} from page '{}'", asset.name, name);
        self.emit(
            &name,
            LibraryEventKind::AssetRemoved {
                asset: asset.clone(),
            },
        );

        removed
    }

    /// Replace the manual order. File membership is untouched.
    ///
    /// Returns whether the order was persisted.
    pub async fn reorder(&self, page: &str, new_order: &[Asset]) -> bool {
        let Some(name) = parse_page(page) else {
            return false;
        };

        let state = self.page_state(&name);
        let _guard = state.write().await;

        let dir = match self.ensure_page_dir(&name).await {
            Ok(dir) => dir,
            Err(e) => {
                tracing::warn!("Cannot create page '{}': {}", name, e);
                return false;
            }
        };
        let _lock = self.lock_page(&dir).await;

        let paths: Vec<PathBuf> = new_order
            .iter()
            .filter(|asset| self.is_asset_path(&dir, &asset.path))
            .map(|asset| asset.path.clone())
            .collect();

        let saved = self.order.save_order(&dir, &paths).await;

        self.emit(
            &name,
            LibraryEventKind::OrderChanged {
                order: paths.iter().map(|path| display_name(path)).collect(),
            },
        );

        saved
    }

    /// Tail shared by both add paths: index, thumbnail, persist, notify
    async fn finish_add(
        &self,
        name: &PageName,
        dir: &Path,
        state: &mut PageState,
        existing: Vec<PathBuf>,
        target: PathBuf,
        fingerprint: Fingerprint,
    ) -> AddOutcome {
        if self.settings.fingerprint_cache {
            state.index.insert(&target, fingerprint).await;
        }

        let thumbnail = self.thumbnails.ensure_thumbnail(&target).await;
        let asset = Asset::new(target.clone()).with_thumbnail(thumbnail);

        let mut order = existing;
        order.push(target);
        self.order.save_order(dir, &order).await;

        tracing::info!("Added {} to page '{}'", asset.name, name);
        self.emit(
            name,
            LibraryEventKind::AssetAdded {
                asset: asset.clone(),
            },
        );

        AddOutcome::Added(asset)
    }

    /// First existing file whose content matches `fingerprint`
    async fn find_duplicate(
        &self,
        state: &mut PageState,
        existing: &[PathBuf],
        fingerprint: Fingerprint,
    ) -> Option<PathBuf> {
        if self.settings.fingerprint_cache {
            let known: HashSet<PathBuf> = existing.iter().cloned().collect();
            state.index.retain_known(&known);
        }

        for path in existing {
            let result = if self.settings.fingerprint_cache {
                state.index.fingerprint(&self.hasher, path).await
            } else {
                self.hasher.fingerprint_file(path).await
            };

            match result {
                Ok(candidate) if candidate == fingerprint => return Some(path.clone()),
                Ok(_) => {}
                Err(e) => tracing::warn!("Failed to hash {}: {}", path.display(), e),
            }
        }

        None
    }

    /// Supported image files directly inside the page, merged with the marker
    async fn ordered_paths(&self, dir: &Path) -> Vec<PathBuf> {
        let files = match self.enumerate_files(dir).await {
            Ok(files) => files,
            Err(e) => {
                tracing::warn!("Failed to read page {}: {}", dir.display(), e);
                HashSet::new()
            }
        };

        self.order.load_order(dir, files).await
    }

    async fn enumerate_files(&self, dir: &Path) -> std::io::Result<HashSet<PathBuf>> {
        let mut files = HashSet::new();
        let mut entries = fs::read_dir(dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !self.is_asset_path(dir, &path) {
                continue;
            }

            match fs::metadata(&path).await {
                Ok(metadata) if metadata.is_file() => {
                    files.insert(path);
                }
                _ => {}
            }
        }

        Ok(files)
    }

    /// A visible, supported file name directly inside `dir`.
    ///
    /// Excludes the order marker, lock file, thumbnail directory and staging files.
    fn is_asset_path(&self, dir: &Path, path: &Path) -> bool {
        let visible = path
            .file_name()
            .map(|name| !name.to_string_lossy().starts_with('.'))
            .unwrap_or(false);

        visible && path.parent() == Some(dir) && self.types.is_supported(path)
    }

    async fn ensure_page_dir(&self, name: &PageName) -> std::io::Result<PathBuf> {
        let dir = self.page_dir(name);
        fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Cross-process lock; without it only the in-process lock applies
    async fn lock_page(&self, dir: &Path) -> Option<PageLock> {
        match PageLock::acquire(dir).await {
            Ok(lock) => Some(lock),
            Err(e) => {
                tracing::warn!("Could not lock {}: {}", dir.display(), e);
                None
            }
        }
    }

    fn page_state(&self, name: &PageName) -> Arc<RwLock<PageState>> {
        let mut pages = self.pages.lock().unwrap_or_else(|e| e.into_inner());
        pages.entry(name.clone()).or_default().clone()
    }

    fn emit(&self, name: &PageName, kind: LibraryEventKind) {
        // No subscribers is fine
        let _ = self.events.send(LibraryEvent::new(name.as_str(), kind));
    }
}

fn parse_page(page: &str) -> Option<PageName> {
    match PageName::new(page) {
        Ok(name) => Some(name),
        Err(e) => {
            tracing::warn!("Invalid page name '{}': {}", page, e);
            None
        }
    }
}

fn failed(message: String) -> AddOutcome {
    tracing::warn!("{}", message);
    AddOutcome::Skipped(SkipReason::Failed(message))
}

/// File name used inside the page; leading dots would hide the file
fn stored_name(source: &Path) -> String {
    let name = display_name(source);
    let trimmed = name.trim_start_matches('.');

    if name.starts_with('.') && !trimmed.contains('.') {
        format!("image.{}", trimmed)
    } else {
        trimmed.to_string()
    }
}

/// `dir/name`, or `dir/stem_N.ext` with the first free N
async fn unique_target(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !fs::try_exists(&candidate).await.unwrap_or(false) {
        return candidate;
    }

    let as_path = Path::new(name);
    let stem = as_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| name.to_string());
    let extension = as_path.extension().map(|e| e.to_string_lossy().to_string());

    let mut n = 1u32;
    loop {
        let file_name = match extension {
            Some(ref ext) => format!("{}_{}.{}", stem, n, ext),
            None => format!("{}_{}", stem, n),
        };

        let candidate = dir.join(file_name);
        if !fs::try_exists(&candidate).await.unwrap_or(false) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_stored_name_strips_hiding_dots() {
        assert_eq!(stored_name(Path::new("/x/cat.png")), "cat.png");
        assert_eq!(stored_name(Path::new("/x/.cat.png")), "cat.png");
        assert_eq!(stored_name(Path::new("/x/.png")), "image.png");
    }

    #[tokio::test]
    async fn test_unique_target_appends_suffix() {
        let temp = TempDir::new().unwrap();
        assert_eq!(
            unique_target(temp.path(), "cat.png").await,
            temp.path().join("cat.png")
        );

        std::fs::write(temp.path().join("cat.png"), b"1").unwrap();
        std::fs::write(temp.path().join("cat_1.png"), b"2").unwrap();

        assert_eq!(
            unique_target(temp.path(), "cat.png").await,
            temp.path().join("cat_2.png")
        );
    }

    #[tokio::test]
    async fn test_page_state_is_shared_per_page() {
        let temp = TempDir::new().unwrap();
        let library = PageLibrary::new(temp.path(), LibrarySettings::default());

        let a = library.page_state(&PageName::new("A").unwrap());
        let again = library.page_state(&PageName::new("A").unwrap());
        let b = library.page_state(&PageName::new("B").unwrap());

        assert!(Arc::ptr_eq(&a, &again));
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn test_interrupted_copy_is_never_listed() {
        let temp = TempDir::new().unwrap();
        let library = PageLibrary::new(temp.path().join("lib"), LibrarySettings::default());
        let dir = library
            .ensure_page_dir(&PageName::new("Default").unwrap())
            .await
            .unwrap();

        // The copy dies after part of the file reached disk
        let target = unique_target(&dir, "cat.png").await;
        let result = write_atomically(&target, |staging| async move {
            fs::write(&staging, b"\x89PNG\r\n").await?;
            Err(std::io::Error::other("File too large"))
        })
        .await;
        assert!(result.is_err());

        // Staging leftovers from a crashed process are ignored too
        std::fs::write(dir.join(".dog.png.4242-0.partial"), b"half").unwrap();

        assert!(library.list_assets("Default").await.is_empty());

        // Retrying stores the file under its own name, not as a collision
        let source = temp.path().join("cat.png");
        image::RgbImage::from_pixel(4, 4, image::Rgb([1, 2, 3]))
            .save(&source)
            .unwrap();
        let outcome = library.add_file("Default", &source).await;
        assert_eq!(outcome.asset().unwrap().name, "cat.png");
        assert_eq!(library.list_assets("Default").await.len(), 1);
    }

    #[test]
    fn test_asset_path_filter() {
        let library = PageLibrary::new("/lib", LibrarySettings::default());
        let dir = Path::new("/lib/Default");

        assert!(library.is_asset_path(dir, &dir.join("cat.png")));
        assert!(!library.is_asset_path(dir, &dir.join(".order")));
        assert!(!library.is_asset_path(dir, &dir.join(".lock")));
        assert!(!library.is_asset_path(dir, &dir.join(".cat.png.1-0.partial")));
        assert!(!library.is_asset_path(dir, &dir.join("notes.txt")));
        assert!(!library.is_asset_path(dir, &dir.join(".thumbnails").join("cat.png")));
        assert!(!library.is_asset_path(dir, Path::new("/elsewhere/cat.png")));
    }

    #[tokio::test]
    async fn test_hidden_and_unsupported_files_are_not_listed() {
        let temp = TempDir::new().unwrap();
        let library = PageLibrary::new(temp.path(), LibrarySettings::default());
        let dir = temp.path().join("Default");
        std::fs::create_dir_all(dir.join("nested.png")).unwrap();
        std::fs::write(dir.join("notes.txt"), b"x").unwrap();
        std::fs::write(dir.join(".hidden.png"), b"x").unwrap();
        std::fs::write(dir.join("shown.png"), b"x").unwrap();

        let files = library.enumerate_files(&dir).await.unwrap();

        assert_eq!(files.len(), 1);
        assert!(files.contains(&dir.join("shown.png")));
    }
}
