//! Which files count as images for a page.

use std::collections::HashSet;
use std::path::Path;

use crate::config::LibrarySettings;

/// Extension allow-list supplied by configuration
#[derive(Debug, Clone)]
pub struct SupportedTypes {
    extensions: HashSet<String>,
    lossless: HashSet<String>,
}

impl SupportedTypes {
    /// Build from explicit extension lists (case-insensitive, leading dot optional)
    pub fn new<I, J, S, T>(extensions: I, lossless: J) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        Self {
            extensions: extensions.into_iter().map(|e| normalize(e.as_ref())).collect(),
            lossless: lossless.into_iter().map(|e| normalize(e.as_ref())).collect(),
        }
    }

    pub fn from_settings(settings: &LibrarySettings) -> Self {
        Self::new(&settings.extensions, &settings.lossless_extensions)
    }

    /// True if the path carries an accepted image extension
    pub fn is_supported(&self, path: &Path) -> bool {
        extension_of(path)
            .map(|ext| self.extensions.contains(&ext))
            .unwrap_or(false)
    }

    /// True if thumbnails for this path should be re-encoded losslessly
    pub fn is_lossless(&self, path: &Path) -> bool {
        extension_of(path)
            .map(|ext| self.lossless.contains(&ext))
            .unwrap_or(false)
    }
}

impl Default for SupportedTypes {
    fn default() -> Self {
        Self::from_settings(&LibrarySettings::default())
    }
}

fn normalize(ext: &str) -> String {
    ext.trim_start_matches('.').to_lowercase()
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}
