//! Command-line interface for favshelf.
//!
//! Provides commands for listing pages and assets, adding files or pasted
//! images, removing assets, moving them within a page and watching a page
//! for outside changes.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::config::{self, ResolvedConfig};
use crate::domain::Asset;
use crate::library::{
    AddOutcome, DragReorderSession, PageLibrary, PageWatcher, Raster, SkipReason, SupportedTypes,
    WatcherConfig,
};

/// favshelf - Per-page favorites shelf for images
#[derive(Parser, Debug)]
#[command(name = "favshelf")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List pages in the library
    Pages,

    /// List assets of a page in display order
    List {
        /// Page name (defaults to the configured default page)
        page: Option<String>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Add image files to a page (duplicates and non-images are skipped)
    Add {
        /// Page name
        page: String,

        /// Files to add
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Add an image as if pasted from the clipboard
    Paste {
        /// Page name
        page: String,

        /// Image to decode and paste
        image: PathBuf,
    },

    /// Remove an asset from a page
    Remove {
        /// Page name
        page: String,

        /// File name of the asset
        name: String,
    },

    /// Move an asset to a new position
    Move {
        /// Page name
        page: String,

        /// File name of the asset
        name: String,

        /// Target index (0 = first)
        index: usize,
    },

    /// Watch a page for files changed outside favshelf
    Watch {
        /// Page name
        page: String,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let config = config::config()?;
        let library = PageLibrary::from_config(config);

        match self.command {
            Commands::Pages => list_pages(&library).await,
            Commands::List { page, json } => {
                let page = page.unwrap_or_else(|| config.settings.default_page.clone());
                list_assets(&library, &page, json).await
            }
            Commands::Add { page, paths } => add_files(&library, &page, &paths).await,
            Commands::Paste { page, image } => paste_image(&library, &page, &image).await,
            Commands::Remove { page, name } => remove_asset(&library, &page, &name).await,
            Commands::Move { page, name, index } => {
                move_asset(&library, &page, &name, index).await
            }
            Commands::Watch { page } => watch_page(&library, &page).await,
            Commands::Config => show_config(config),
        }
    }
}

/// List pages in the library
async fn list_pages(library: &PageLibrary) -> Result<()> {
    let pages = library.list_pages().await;

    if pages.is_empty() {
        println!("No pages yet. Use 'favshelf add <page> <file>' to create one.");
        return Ok(());
    }

    for page in &pages {
        println!("{}", page);
    }

    Ok(())
}

/// List assets of a page
async fn list_assets(library: &PageLibrary, page: &str, json: bool) -> Result<()> {
    let assets = library.list_assets(page).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&assets)?);
        return Ok(());
    }

    if assets.is_empty() {
        println!("Page '{}' is empty.", page);
        return Ok(());
    }

    println!("{:<4} {:<40} {:<10}", "#", "NAME", "THUMBNAIL");
    println!("{}", "-".repeat(56));

    for (i, asset) in assets.iter().enumerate() {
        let thumbnail = if asset.has_thumbnail() { "yes" } else { "fallback" };
        println!("{:<4} {:<40} {:<10}", i, truncate(&asset.name, 40), thumbnail);
    }

    println!("\nTotal: {} assets", assets.len());

    Ok(())
}

/// Add files to a page
async fn add_files(library: &PageLibrary, page: &str, paths: &[PathBuf]) -> Result<()> {
    let outcomes = library.add_files(page, paths).await;

    let mut added = 0;
    for (path, outcome) in paths.iter().zip(&outcomes) {
        report(path, outcome);
        if outcome.is_added() {
            added += 1;
        }
    }

    println!("\n{} of {} file(s) added to '{}'", added, paths.len(), page);

    Ok(())
}

/// Decode an image and add it through the raster path
async fn paste_image(library: &PageLibrary, page: &str, image_path: &Path) -> Result<()> {
    let image = image::open(image_path)
        .with_context(|| format!("Failed to decode image: {}", image_path.display()))?;

    let outcome = library.add_raster(page, Raster::from_image(&image)).await;
    report(image_path, &outcome);

    if let AddOutcome::Skipped(SkipReason::Failed(reason)) = outcome {
        anyhow::bail!("Paste failed: {}", reason);
    }

    Ok(())
}

/// Remove an asset by file name
async fn remove_asset(library: &PageLibrary, page: &str, name: &str) -> Result<()> {
    let asset = find(library, page, name).await?;

    if library.remove_asset(page, &asset).await {
        println!("Removed {} from '{}'", asset.name, page);
    } else {
        eprintln!("Could not delete {}; it was dropped from the order", asset.path.display());
    }

    Ok(())
}

/// Move an asset the same way a drag-and-drop would
async fn move_asset(library: &PageLibrary, page: &str, name: &str, index: usize) -> Result<()> {
    let assets = library.list_assets(page).await;
    let dragged = assets
        .iter()
        .find(|asset| asset.name == name)
        .cloned()
        .with_context(|| format!("Asset not found in '{}': {}", page, name))?;

    let mut session = DragReorderSession::new(assets, dragged);
    session.move_to(index);

    if !session.is_changed() {
        println!("{} is already at position {}", name, index);
        return Ok(());
    }

    let order = session.finish();
    if !library.reorder(page, &order).await {
        eprintln!("Warning: order could not be saved; it will revert on next listing");
    }

    for (i, asset) in order.iter().enumerate() {
        println!("{:<4} {}", i, asset.name);
    }

    Ok(())
}

/// Watch a page and print changes until Ctrl-C
async fn watch_page(library: &PageLibrary, page: &str) -> Result<()> {
    let before = library.list_assets(page).await;
    let name = crate::domain::PageName::new(page)?;
    let dir = library.page_dir(&name);

    let watcher = PageWatcher::new(
        WatcherConfig::new(&dir),
        SupportedTypes::from_settings(library.settings()),
    );
    let (mut changes, handle) = watcher.watch()?;

    println!("Watching '{}' ({} assets). Press Ctrl-C to stop.", page, before.len());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            change = changes.recv() => {
                let Some(change) = change else { break };
                let verb = if change.present { "changed" } else { "removed" };
                let count = library.list_assets(page).await.len();
                println!("{} {} ({} assets)", verb, change.path.display(), count);
            }
        }
    }

    handle.stop().await?;
    Ok(())
}

/// Show the resolved configuration
fn show_config(config: &ResolvedConfig) -> Result<()> {
    println!("Home:           {}", config.home.display());
    println!("Library:        {}", config.library.display());
    match config.config_file {
        Some(ref path) => println!("Config file:    {}", path.display()),
        None => println!("Config file:    (none, using defaults)"),
    }

    let settings = &config.settings;
    println!("Default page:   {}", settings.default_page);
    println!("Thumbnail size: {}", settings.thumbnail_size);
    println!("JPEG quality:   {}", settings.jpeg_quality);
    println!("Thumbnail dir:  {}", settings.thumbnail_dir);
    println!("Order file:     {}", settings.order_file);
    println!("Extensions:     {}", settings.extensions.join(", "));
    println!("Lossless:       {}", settings.lossless_extensions.join(", "));
    println!("Hash cache:     {}", settings.fingerprint_cache);

    Ok(())
}

async fn find(library: &PageLibrary, page: &str, name: &str) -> Result<Asset> {
    library
        .find_asset(page, name)
        .await
        .with_context(|| format!("Asset not found in '{}': {}", page, name))
}

fn report(path: &Path, outcome: &AddOutcome) {
    match outcome {
        AddOutcome::Added(asset) => println!("added      {} -> {}", path.display(), asset.name),
        AddOutcome::Skipped(SkipReason::Duplicate { existing }) => println!(
            "duplicate  {} (same as {})",
            path.display(),
            crate::domain::display_name(existing)
        ),
        AddOutcome::Skipped(SkipReason::Unsupported) => {
            println!("skipped    {} (not an image)", path.display())
        }
        AddOutcome::Skipped(SkipReason::InvalidPage(e)) => {
            println!("skipped    {} ({})", path.display(), e)
        }
        AddOutcome::Skipped(SkipReason::Failed(reason)) => {
            println!("failed     {} ({})", path.display(), reason)
        }
    }
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() > width {
        let cut: String = text.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_move_command() {
        let cli = Cli::try_parse_from(["favshelf", "move", "Default", "cat.png", "2"]).unwrap();
        match cli.command {
            Commands::Move { page, name, index } => {
                assert_eq!(page, "Default");
                assert_eq!(name, "cat.png");
                assert_eq!(index, 2);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_add_requires_paths() {
        assert!(Cli::try_parse_from(["favshelf", "add", "Default"]).is_err());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short.png", 40), "short.png");
        assert_eq!(truncate("abcdefghij", 6), "abc...");
    }
}
