//! Synthetic Copernicus tiles and geoid rasters for integration tests

#![allow(dead_code)]

use gdal::raster::Buffer;
use gdal::{Dataset, DatasetOptions, GdalOpenFlags};
use ndarray::Array2;
use sarprep::core::grid::{longitude_multiplier, tile_transform, MINIMUM_PIXEL_SPACING, TILE_ROWS};
use sarprep::io::tiles::{tile_name, tile_path};
use sarprep::io::write_geotiff;
use sarprep::{Crs, DemProduct, GeoTransform, RasterGrid};
use std::path::{Path, PathBuf};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Value of the synthetic tile at `(row, col)`; exact in f32
pub fn tile_value(row: usize, col: usize, offset: f32) -> f32 {
    row as f32 * 0.5 + col as f32 * 0.25 + offset
}

/// Write a tile with `rows` rows for the cell whose south-west corner is `(lat, lon)`,
/// laid out as `<root>/<stem>/<stem>.tif`
pub fn write_tile_with_rows(root: &Path, lat: i32, lon: i32, rows: usize, offset: f32) -> PathBuf {
    let multiplier = longitude_multiplier((lat as f64 + 0.5).abs()).unwrap();
    let lat_spacing = if rows == TILE_ROWS {
        MINIMUM_PIXEL_SPACING
    } else {
        1.0 / rows as f64
    };
    let lon_spacing = lat_spacing * multiplier;
    let cols = (rows as f64 / multiplier).round() as usize;

    let transform = tile_transform(lon as f64, (lat + 1) as f64, lon_spacing, lat_spacing);
    let grid = RasterGrid::new(cols, rows, transform, Crs::WGS84).unwrap();
    let array = Array2::from_shape_fn((rows, cols), |(r, c)| tile_value(r, c, offset));

    let path = tile_path(root, &tile_name(lat, lon), true);
    write_geotiff(&path, &DemProduct { array, grid }).unwrap();
    path
}

/// Full resolution GLO-30 tile
pub fn write_tile(root: &Path, lat: i32, lon: i32, offset: f32) -> PathBuf {
    write_tile_with_rows(root, lat, lon, TILE_ROWS, offset)
}

/// Global 1 degree geoid with a constant undulation
pub fn write_constant_geoid(path: &Path, undulation: f32) {
    let transform = GeoTransform::from_origin(-180.0, 90.0, 1.0, -1.0);
    let grid = RasterGrid::new(360, 180, transform, Crs::WGS84).unwrap();
    let array = Array2::from_elem((180, 360), undulation);
    write_geotiff(path, &DemProduct { array, grid }).unwrap();
}

/// Overwrite `pixels` `(row, col)` of band 1 with `nodata` and declare it as the band's nodata value
pub fn mark_nodata(path: &Path, pixels: &[(usize, usize)], nodata: f64) {
    let dataset = Dataset::open_ex(
        path,
        DatasetOptions {
            open_flags: GdalOpenFlags::GDAL_OF_UPDATE | GdalOpenFlags::GDAL_OF_RASTER,
            ..Default::default()
        },
    )
    .unwrap();
    let mut band = dataset.rasterband(1).unwrap();
    for &(row, col) in pixels {
        let buffer = Buffer::new((1, 1), vec![nodata as f32]);
        band.write((col as isize, row as isize), (1, 1), &buffer).unwrap();
    }
    band.set_no_data_value(Some(nodata)).unwrap();
}
