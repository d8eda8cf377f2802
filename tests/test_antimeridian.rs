mod common;

use common::{init_logging, write_tile};
use sarprep::core::spatial::{transform_bounds, DEFAULT_SEGMENT_LENGTH};
use sarprep::core::{crosses_antimeridian, split_at_antimeridian, target_crs};
use sarprep::{BoundingBox, Crs, DemBuilder, DemConfig};
use tempfile::TempDir;

const OFFSET: f32 = 500.0;

fn crossing_bounds() -> BoundingBox {
    BoundingBox::new(-179.99817, -79.59302, 179.99705, -79.59171).unwrap()
}

#[test]
fn crossing_scene_is_split_and_targets_polar_stereographic() {
    let bbox = crossing_bounds();
    assert!(crosses_antimeridian(&bbox, 8.0));
    assert_eq!(target_crs(&bbox), Crs::ANTARCTIC_POLAR_STEREOGRAPHIC);

    let split = split_at_antimeridian(&bbox, 0.0).unwrap();
    assert_eq!(split.western.bounds(), (-180.0, -79.59302, -179.99817, -79.59171));
    assert_eq!(split.eastern.xmin(), 179.99705);
    assert!(split.eastern.xmax() < 180.0);
}

#[test]
fn mid_latitude_crossing_uses_utm() {
    let bbox = BoundingBox::new(-179.5, -20.0, 179.2, -19.0).unwrap();
    assert!(crosses_antimeridian(&bbox, 8.0));
    assert_eq!(target_crs(&bbox), Crs::from_epsg(32760));
}

#[test]
fn merged_dem_covers_both_sides() {
    init_logging();
    let dir = TempDir::new().unwrap();
    write_tile(dir.path(), -80, 179, OFFSET);
    write_tile(dir.path(), -80, -180, OFFSET);

    let builder = DemBuilder::new(DemConfig::for_tile_folder(dir.path())).unwrap();
    let bbox = crossing_bounds();
    let product = builder.get_dem_for_bounds(&bbox, None).unwrap();

    assert_eq!(product.grid.crs, Crs::ANTARCTIC_POLAR_STEREOGRAPHIC);
    assert_eq!(product.grid.transform.pixel_width, -product.grid.transform.pixel_height);

    let split = split_at_antimeridian(&bbox, 0.0).unwrap();
    for half in [split.eastern, split.western] {
        let projected = transform_bounds(
            &half,
            Crs::WGS84,
            Crs::ANTARCTIC_POLAR_STEREOGRAPHIC,
            DEFAULT_SEGMENT_LENGTH,
        )
        .unwrap();
        assert!(product.grid.bounds().contains(&projected), "{:?}", half.bounds());
    }

    let valid: Vec<f32> = product.array.iter().copied().filter(|v| !v.is_nan()).collect();
    assert!(!valid.is_empty());
    assert!(valid.iter().all(|&v| v >= OFFSET));
}

#[test]
fn crossing_output_is_written_projected() {
    init_logging();
    let dir = TempDir::new().unwrap();
    write_tile(dir.path(), -80, 179, OFFSET);
    write_tile(dir.path(), -80, -180, OFFSET);
    let output = dir.path().join("crossing.tif");

    let builder = DemBuilder::new(DemConfig::for_tile_folder(dir.path())).unwrap();
    builder.get_dem_for_bounds(&crossing_bounds(), Some(output.as_path())).unwrap();

    let written = sarprep::io::read_raster(&output).unwrap();
    assert_eq!(written.grid.crs, Crs::ANTARCTIC_POLAR_STEREOGRAPHIC);
}
