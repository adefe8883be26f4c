//! Domain types for the favorites shelf.
//!
//! This module contains the core data structures:
//! - Asset: One favorited image file and its preview
//! - PageName: A validated page identifier
//! - Events: Notifications for collaborators

pub mod asset;
pub mod events;

// Re-export commonly used types
pub use asset::{display_name, Asset, PageName, PageNameError};
pub use events::{LibraryEvent, LibraryEventKind};
