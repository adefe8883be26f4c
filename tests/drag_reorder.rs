//! Drag Reorder Integration Tests
//!
//! Drives a drag session over a page's tiles (including the trailing
//! "add new" tile) and commits the drop through the library.

use std::path::Path;

use favshelf::{Asset, DragReorderSession, ItemBounds, LibrarySettings, PageLibrary};
use image::{Rgb, RgbImage};
use tempfile::TempDir;

/// What a page view displays: assets followed by the "add new" tile
#[derive(Debug, Clone, PartialEq)]
enum Tile {
    Asset(Asset),
    AddNew,
}

fn write_png(path: &Path, seed: u8) {
    RgbImage::from_pixel(4, 4, Rgb([seed, seed, seed]))
        .save(path)
        .unwrap();
}

async fn library_with(names: &[&str]) -> (TempDir, PageLibrary) {
    let temp = TempDir::new().unwrap();
    let sources = temp.path().join("sources");
    std::fs::create_dir_all(&sources).unwrap();

    let library = PageLibrary::new(temp.path().join("library"), LibrarySettings::default());
    for (i, name) in names.iter().enumerate() {
        let source = sources.join(name);
        write_png(&source, i as u8 * 40);
        assert!(library.add_file("Default", &source).await.is_added());
    }

    (temp, library)
}

fn tiles(assets: &[Asset]) -> Vec<Tile> {
    let mut tiles: Vec<Tile> = assets.iter().cloned().map(Tile::Asset).collect();
    tiles.push(Tile::AddNew);
    tiles
}

/// Tiles laid out left to right, 100 units wide
fn row(count: usize) -> Vec<ItemBounds> {
    (0..count)
        .map(|i| ItemBounds::new(i as f64 * 100.0, 100.0))
        .collect()
}

fn committed(order: Vec<Tile>) -> Vec<Asset> {
    order
        .into_iter()
        .filter_map(|tile| match tile {
            Tile::Asset(asset) => Some(asset),
            Tile::AddNew => None,
        })
        .collect()
}

fn names(assets: &[Asset]) -> Vec<&str> {
    assets.iter().map(|a| a.name.as_str()).collect()
}

#[tokio::test]
async fn test_drag_to_end_stops_before_add_tile() {
    let (_temp, library) = library_with(&["a.png", "b.png", "c.png"]).await;
    let assets = library.list_assets("Default").await;
    let first = Tile::Asset(assets[0].clone());

    let mut session = DragReorderSession::new(tiles(&assets), first).with_sentinel(Tile::AddNew);
    let preview = session.pointer_moved(&row(4), 395.0).to_vec();

    assert_eq!(preview.last(), Some(&Tile::AddNew));

    let order = committed(session.finish());
    assert!(library.reorder("Default", &order).await);

    let listed = library.list_assets("Default").await;
    assert_eq!(names(&listed), vec!["b.png", "c.png", "a.png"]);
}

#[tokio::test]
async fn test_drag_last_to_front_persists() {
    let (temp, library) = library_with(&["a.png", "b.png", "c.png"]).await;
    let assets = library.list_assets("Default").await;
    let last = Tile::Asset(assets[2].clone());

    let mut session = DragReorderSession::new(tiles(&assets), last).with_sentinel(Tile::AddNew);
    session.pointer_moved(&row(4), 10.0);
    assert!(session.is_changed());

    library.reorder("Default", &committed(session.finish())).await;

    let marker =
        std::fs::read_to_string(temp.path().join("library").join("Default").join(".order")).unwrap();
    assert_eq!(marker, "c.png\na.png\nb.png\n");
}

#[tokio::test]
async fn test_cancelled_drag_changes_nothing() {
    let (_temp, library) = library_with(&["a.png", "b.png"]).await;
    let assets = library.list_assets("Default").await;

    let mut session =
        DragReorderSession::new(tiles(&assets), Tile::Asset(assets[0].clone())).with_sentinel(Tile::AddNew);
    session.pointer_moved(&row(3), 250.0);
    let restored = committed(session.cancel());

    assert_eq!(restored, assets);
    assert_eq!(library.list_assets("Default").await, assets);
}

#[tokio::test]
async fn test_add_tile_cannot_be_dragged() {
    let (_temp, library) = library_with(&["a.png", "b.png"]).await;
    let assets = library.list_assets("Default").await;

    let mut session = DragReorderSession::new(tiles(&assets), Tile::AddNew).with_sentinel(Tile::AddNew);
    session.pointer_moved(&row(3), 0.0);

    assert!(!session.is_changed());
    assert_eq!(session.preview().last(), Some(&Tile::AddNew));
}

#[tokio::test]
async fn test_added_file_lands_after_manual_order() {
    let (temp, library) = library_with(&["a.png", "b.png"]).await;
    let assets = library.list_assets("Default").await;

    let mut session = DragReorderSession::new(assets.clone(), assets[1].clone());
    session.move_to(0);
    library.reorder("Default", &session.finish()).await;

    let new_file = temp.path().join("sources").join("c.png");
    write_png(&new_file, 200);
    library.add_file("Default", &new_file).await;

    assert_eq!(
        names(&library.list_assets("Default").await),
        vec!["b.png", "a.png", "c.png"]
    );
}
