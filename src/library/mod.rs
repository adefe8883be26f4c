//! Per-page favorites library.
//!
//! Each page is a directory of image files under the library root, with a
//! hidden thumbnail cache and a hidden order marker beside them.
//!
//! # Storage Layout
//!
//! ```text
//! <library root>/
//! └── <page name>/
//!     ├── cat.png               # Favorited images (the set of assets)
//!     ├── Pasted_20240101_120000.png
//!     ├── .order                # One file name per line, manual order
//!     ├── .lock                 # Advisory writer lock
//!     ├── .x.png.1-0.partial    # In-flight write, renamed when complete
//!     └── .thumbnails/
//!         ├── cat.png           # Same file name as the source
//!         └── Pasted_20240101_120000.png
//! ```

pub mod drag;
pub mod hasher;
pub mod index;
pub mod lock;
pub mod order;
pub mod page;
pub mod staging;
pub mod thumbnail;
pub mod types;
pub mod watcher;

pub use drag::{compute_insertion_index, preview_move, DragReorderSession, ItemBounds};
pub use hasher::{ContentHasher, Fingerprint, HashError, Raster};
pub use index::FingerprintIndex;
pub use order::OrderStore;
pub use page::{AddOutcome, PageLibrary, SkipReason};
pub use thumbnail::{ThumbnailCache, ThumbnailError, ThumbnailKind};
pub use types::SupportedTypes;
pub use watcher::{PageChange, PageWatcher, WatchHandle, WatcherConfig, WatcherError};
