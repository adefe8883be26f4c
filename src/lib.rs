//! favshelf - Per-page favorites shelf for images
//!
//! Keeps named pages of favorited image files on disk, with content-based
//! deduplication, a lazily built thumbnail cache and a manual order that
//! survives independently of file-system order.
//!
//! # Architecture
//!
//! The file system is the source of truth:
//! - A page is a directory; its assets are the image files inside it
//! - A hidden marker file records manual order for known files only
//! - Thumbnails are derived and reused, never invalidated
//!
//! # Modules
//!
//! - `library`: Hashing, thumbnails, ordering, the page library and drag sessions
//! - `domain`: Data structures (Asset, PageName, LibraryEvent)
//! - `config`: Paths and library settings
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Add files to a page
//! favshelf add Default cat.png dog.jpg
//!
//! # Show the page in display order
//! favshelf list Default
//!
//! # Move an asset to the front
//! favshelf move Default dog.jpg 0
//! ```

pub mod cli;
pub mod config;
pub mod domain;
pub mod library;

// Re-export main types at crate root for convenience
pub use config::{LibrarySettings, ResolvedConfig};
pub use domain::{Asset, LibraryEvent, LibraryEventKind, PageName};
pub use library::{
    AddOutcome, ContentHasher, DragReorderSession, Fingerprint, ItemBounds, OrderStore,
    PageLibrary, Raster, SkipReason, SupportedTypes, ThumbnailCache,
};
