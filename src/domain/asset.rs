//! Pages and the assets they hold.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::library::hasher::{ContentHasher, Fingerprint, HashError};

/// Reasons a page name cannot map to a directory
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PageNameError {
    #[error("Page name is empty")]
    Empty,

    #[error("Page name contains a path separator or NUL: {0}")]
    InvalidCharacter(String),

    #[error("Page name cannot be '.' or '..' or start with a dot: {0}")]
    Reserved(String),
}

/// A validated page name; maps 1:1 to a directory under the library root
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageName(String);

impl PageName {
    pub fn new(name: impl Into<String>) -> Result<Self, PageNameError> {
        let name = name.into();

        if name.trim().is_empty() {
            return Err(PageNameError::Empty);
        }
        if name.contains(['/', '\\', '\0']) {
            return Err(PageNameError::InvalidCharacter(name));
        }
        if name.starts_with('.') {
            return Err(PageNameError::Reserved(name));
        }

        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Directory backing this page
    pub fn dir_in(&self, root: &Path) -> PathBuf {
        root.join(&self.0)
    }
}

impl std::fmt::Display for PageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One favorited image inside a page directory
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Asset {
    /// Absolute path of the stored file (directly inside the page directory)
    pub path: PathBuf,

    /// File name, as recorded in the order marker
    pub name: String,

    /// Preview image; the source path itself when no thumbnail could be made
    pub thumbnail: PathBuf,
}

impl Asset {
    /// Build an asset whose thumbnail is not materialized yet
    pub fn new(path: PathBuf) -> Self {
        let name = display_name(&path);
        Self {
            thumbnail: path.clone(),
            path,
            name,
        }
    }

    pub fn with_thumbnail(mut self, thumbnail: PathBuf) -> Self {
        self.thumbnail = thumbnail;
        self
    }

    /// True when the preview is a real thumbnail rather than the source fallback
    pub fn has_thumbnail(&self) -> bool {
        self.thumbnail != self.path
    }

    /// Content fingerprint, computed on demand from the stored bytes
    pub async fn fingerprint(&self) -> Result<Fingerprint, HashError> {
        ContentHasher::new().fingerprint_file(&self.path).await
    }
}

/// File name of a path, lossily converted
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string()
}
