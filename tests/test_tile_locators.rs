mod common;

use common::{init_logging, write_tile_with_rows};
use sarprep::io::{build_tile_index, build_tile_index_in, find_tiles, TileLocator};
use sarprep::{BoundingBox, Crs, DemConfig};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const CELLS: [(i32, i32); 6] = [(-70, 160), (-70, 161), (-70, 162), (-70, 163), (-69, 161), (-69, 162)];

/// Low resolution tiles: only footprints and names matter here
fn write_tiles(root: &Path) -> Vec<PathBuf> {
    CELLS
        .iter()
        .map(|&(lat, lon)| write_tile_with_rows(root, lat, lon, 36, 0.0))
        .collect()
}

fn paths(locator: &dyn TileLocator, bbox: &BoundingBox) -> Vec<PathBuf> {
    locator
        .tiles_for(bbox, 0.3)
        .unwrap()
        .into_iter()
        .map(|tile| tile.path)
        .collect()
}

fn queries() -> Vec<BoundingBox> {
    vec![
        BoundingBox::new(161.4, -69.6, 162.6, -69.4).unwrap(),
        BoundingBox::new(161.4, -69.4, 162.6, -68.6).unwrap(),
        BoundingBox::new(163.5, -69.6, 163.6, -69.5).unwrap(),
        BoundingBox::new(150.5, -60.6, 150.6, -60.5).unwrap(),
    ]
}

#[test]
fn index_and_folder_lookup_agree() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let tiles = write_tiles(dir.path());
    let index = dir.path().join("tiles.gpkg");
    assert_eq!(build_tile_index(&tiles, &index, false).unwrap(), tiles.len());

    let folder = DemConfig::for_tile_folder(dir.path()).locator().unwrap();
    let indexed = DemConfig {
        tile_index: Some(index),
        ..DemConfig::for_tile_folder(dir.path())
    }
    .locator()
    .unwrap();

    for bbox in queries() {
        assert_eq!(paths(indexed.as_ref(), &bbox), paths(folder.as_ref(), &bbox), "{:?}", bbox.bounds());
    }
}

#[test]
fn polar_stereographic_index_agrees_with_folder() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let tiles = write_tiles(dir.path());
    let index = dir.path().join("tiles_3031.gpkg");
    let written = build_tile_index_in(&tiles, &index, false, Crs::ANTARCTIC_POLAR_STEREOGRAPHIC).unwrap();
    assert_eq!(written, tiles.len());

    let folder = DemConfig::for_tile_folder(dir.path()).locator().unwrap();
    let indexed = DemConfig {
        tile_index: Some(index.clone()),
        ..DemConfig::for_tile_folder(dir.path())
    }
    .locator()
    .unwrap();

    for bbox in queries() {
        assert_eq!(paths(indexed.as_ref(), &bbox), paths(folder.as_ref(), &bbox), "{:?}", bbox.bounds());
    }

    // footprints come back in WGS 84, close to the tile extents
    let search = BoundingBox::new(161.1, -69.9, 162.9, -69.1).unwrap();
    let entries = find_tiles(&index, &search).unwrap();
    assert_eq!(entries.len(), 2);
    let first = &entries[0].footprint;
    assert!(first.xmin() > 160.9 && first.xmin() < 161.0);
    assert!(first.xmax() > 161.9 && first.xmax() < 162.0);
    assert!(first.ymin() > -70.1 && first.ymax() < -68.9);
}

#[test]
fn expected_tiles_are_found() {
    init_logging();
    let dir = TempDir::new().unwrap();
    write_tiles(dir.path());
    let folder = DemConfig::for_tile_folder(dir.path()).locator().unwrap();

    let found = paths(folder.as_ref(), &queries()[0]);
    let names: Vec<String> = found
        .iter()
        .map(|p| p.file_stem().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        vec![
            "Copernicus_DSM_COG_10_S70_00_E161_00_DEM",
            "Copernicus_DSM_COG_10_S70_00_E162_00_DEM",
        ]
    );
    assert!(paths(folder.as_ref(), &queries()[3]).is_empty());
}

#[test]
fn absolute_index_locations_are_used_directly() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let tiles = write_tiles(dir.path());
    let index = dir.path().join("absolute.gpkg");
    build_tile_index(&tiles, &index, true).unwrap();

    let search = BoundingBox::new(161.1, -69.9, 162.9, -69.1).unwrap();
    let entries = find_tiles(&index, &search).unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| Path::new(&e.location).is_absolute()));

    // a tile folder elsewhere does not matter for absolute locations
    let other = TempDir::new().unwrap();
    let indexed = DemConfig {
        tile_index: Some(index),
        ..DemConfig::for_tile_folder(other.path())
    }
    .locator()
    .unwrap();
    assert_eq!(paths(indexed.as_ref(), &queries()[0]).len(), 2);
}
