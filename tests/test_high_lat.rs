mod common;

use approx::assert_abs_diff_eq;
use common::{init_logging, write_tile};
use sarprep::core::expand_bounds_at_high_lat;
use sarprep::{BoundingBox, DemBuilder, DemConfig};
use tempfile::TempDir;

#[test]
fn southern_box_expands_to_reference() {
    let bbox = BoundingBox::new(161.00062, -69.00084, 161.002205, -69.00027).unwrap();
    let adjusted = expand_bounds_at_high_lat(&bbox).unwrap();
    assert_abs_diff_eq!(adjusted.xmin(), 161.00013080091566, epsilon = 1e-8);
    assert_abs_diff_eq!(adjusted.ymin(), -69.00101498631649, epsilon = 1e-8);
    assert_abs_diff_eq!(adjusted.xmax(), 161.0026941537473, epsilon = 1e-8);
    assert_abs_diff_eq!(adjusted.ymax(), -69.00009501072573, epsilon = 1e-8);
}

#[test]
fn adjusted_bounds_never_shrink() {
    let boxes = [
        (161.0, -69.5, 162.0, -69.0),
        (-60.0, -75.0, -50.0, -70.0),
        (20.0, 75.0, 30.0, 78.0),
        (-10.0, 51.0, -9.0, 52.0),
        (100.0, 10.0, 101.0, 11.0),
    ];
    for b in boxes {
        let bbox = BoundingBox::try_from(b).unwrap();
        let adjusted = expand_bounds_at_high_lat(&bbox).unwrap();
        assert!(adjusted.contains(&bbox), "{:?} -> {:?}", b, adjusted.bounds());
    }
}

#[test]
fn adjustment_grows_the_dem() {
    init_logging();
    let dir = TempDir::new().unwrap();
    write_tile(dir.path(), -70, 161, 0.0);
    let bbox = BoundingBox::new(161.00062, -69.00084, 161.002205, -69.00027).unwrap();

    let plain = DemConfig {
        adjust_at_high_lat: false,
        buffer_pixels: None,
        ..DemConfig::for_tile_folder(dir.path())
    };
    let adjusted = DemConfig {
        adjust_at_high_lat: true,
        ..plain.clone()
    };

    let plain = DemBuilder::new(plain).unwrap().get_dem_for_bounds(&bbox, None).unwrap();
    let adjusted = DemBuilder::new(adjusted).unwrap().get_dem_for_bounds(&bbox, None).unwrap();

    assert!(adjusted.grid.bounds().contains(&plain.grid.bounds()));
    assert!(adjusted.grid.width > plain.grid.width);
    assert!(adjusted.grid.height > plain.grid.height);
}
