//! Configuration for favshelf paths and library behaviour.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (FAVSHELF_HOME, FAVSHELF_LIBRARY)
//! 2. Config file (.favshelf/config.yaml)
//! 3. Defaults (~/.favshelf)
//!
//! Config file discovery:
//! - Searches current directory and parents for .favshelf/config.yaml
//! - Paths in config file are relative to the config file's parent directory

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub library: Option<LibraryConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory (relative to .favshelf/)
    pub home: Option<String>,
    /// Library root holding one directory per page (relative to project root)
    pub library: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LibraryConfig {
    pub thumbnail_size: Option<u32>,
    pub jpeg_quality: Option<u8>,
    pub thumbnail_dir: Option<String>,
    pub order_file: Option<String>,
    pub extensions: Option<Vec<String>>,
    pub lossless_extensions: Option<Vec<String>>,
    pub fingerprint_cache: Option<bool>,
    pub default_page: Option<String>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute path to favshelf home (state)
    pub home: PathBuf,
    /// Absolute path to the library root
    pub library: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    /// Library behaviour
    pub settings: LibrarySettings,
}

/// Tunables for a page library
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibrarySettings {
    /// Thumbnails fit inside a square box of this many pixels
    pub thumbnail_size: u32,

    /// Quality for lossy thumbnail re-encodes (1-100)
    pub jpeg_quality: u8,

    /// Hidden thumbnail subdirectory inside each page
    pub thumbnail_dir: String,

    /// Hidden order marker file inside each page
    pub order_file: String,

    /// Accepted image extensions (lowercase, no dot)
    pub extensions: Vec<String>,

    /// Extensions whose thumbnails are re-encoded losslessly
    pub lossless_extensions: Vec<String>,

    /// Keep a per-page path -> fingerprint cache between adds
    pub fingerprint_cache: bool,

    /// Page used by the CLI when none is given
    pub default_page: String,
}

impl Default for LibrarySettings {
    fn default() -> Self {
        Self {
            thumbnail_size: 150,
            jpeg_quality: 80,
            thumbnail_dir: ".thumbnails".to_string(),
            order_file: ".order".to_string(),
            extensions: ["png", "jpg", "jpeg", "webp", "bmp", "gif", "tif", "tiff", "ico", "svg"]
                .iter()
                .map(|e| e.to_string())
                .collect(),
            lossless_extensions: ["png", "ico", "svg"].iter().map(|e| e.to_string()).collect(),
            fingerprint_cache: false,
            default_page: "Default".to_string(),
        }
    }
}

impl LibrarySettings {
    /// Overlay values present in a config file section
    pub fn merged_with(mut self, config: &LibraryConfig) -> Self {
        if let Some(size) = config.thumbnail_size {
            self.thumbnail_size = size.max(1);
        }
        if let Some(quality) = config.jpeg_quality {
            self.jpeg_quality = quality.clamp(1, 100);
        }
        if let Some(ref dir) = config.thumbnail_dir {
            self.thumbnail_dir = dir.clone();
        }
        if let Some(ref file) = config.order_file {
            self.order_file = file.clone();
        }
        if let Some(ref extensions) = config.extensions {
            self.extensions = normalize_extensions(extensions);
        }
        if let Some(ref extensions) = config.lossless_extensions {
            self.lossless_extensions = normalize_extensions(extensions);
        }
        if let Some(cache) = config.fingerprint_cache {
            self.fingerprint_cache = cache;
        }
        if let Some(ref page) = config.default_page {
            self.default_page = page.clone();
        }
        self
    }
}

fn normalize_extensions(extensions: &[String]) -> Vec<String> {
    extensions
        .iter()
        .map(|e| e.trim_start_matches('.').to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".favshelf").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's parent
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".favshelf");

    let config_file = find_config_file();

    let (home, library, settings) = if let Some(ref config_path) = config_file {
        let config = load_config_file(config_path)?;

        // Base directory is the parent of .favshelf/ (i.e., grandparent of config.yaml)
        let favshelf_dir = config_path.parent().unwrap_or(Path::new("."));
        let base_dir = favshelf_dir.parent().unwrap_or(Path::new("."));

        let home = if let Ok(env_home) = std::env::var("FAVSHELF_HOME") {
            PathBuf::from(env_home)
        } else if let Some(ref home_path) = config.paths.home {
            resolve_path(favshelf_dir, home_path)
        } else {
            default_home.clone()
        };

        let library = if let Ok(env_lib) = std::env::var("FAVSHELF_LIBRARY") {
            PathBuf::from(env_lib)
        } else if let Some(ref lib_path) = config.paths.library {
            resolve_path(base_dir, lib_path)
        } else {
            home.join("library")
        };

        let settings = match config.library {
            Some(ref section) => LibrarySettings::default().merged_with(section),
            None => LibrarySettings::default(),
        };

        (home, library, settings)
    } else {
        let home = std::env::var("FAVSHELF_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_home.clone());

        let library = std::env::var("FAVSHELF_LIBRARY")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home.join("library"));

        (home, library, LibrarySettings::default())
    };

    Ok(ResolvedConfig {
        home,
        library,
        config_file,
        settings,
    })
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}
