//! Orthometric to ellipsoidal height conversion

use crate::core::reproject::map_pixels;
use crate::core::spatial::{transform_bounds, CrsTransformer, DEFAULT_SEGMENT_LENGTH};
use crate::io::raster::{dataset_grid, read_raster_window};
use crate::types::{BoundingBox, Crs, DemError, DemProduct, DemResult, ElevationArray, PixelConvention};
use gdal::Dataset;
use std::path::Path;

/// Geoid pixels read around the DEM extent by default
pub const DEFAULT_GEOID_BUFFER_PIXELS: usize = 2;

/// DEM extent in the geoid's geographic CRS
fn geographic_bounds(dem: &DemProduct) -> DemResult<BoundingBox> {
    transform_bounds(&dem.grid.bounds(), dem.grid.crs, Crs::WGS84, DEFAULT_SEGMENT_LENGTH)
}

/// Whether the geoid raster at `geoid_path` spans the whole of `dem`
pub fn geoid_covers<P: AsRef<Path>>(geoid_path: P, dem: &DemProduct) -> DemResult<bool> {
    let geoid_path = geoid_path.as_ref();
    if !geoid_path.exists() {
        return Err(DemError::MissingFile(geoid_path.to_path_buf()));
    }
    let extent = dataset_grid(&Dataset::open(geoid_path)?)?.bounds();
    Ok(extent.contains(&geographic_bounds(dem)?))
}

/// Read the geoid covering `dem`'s extent plus `buffer_pixels`, nodata as NaN
pub fn read_geoid<P: AsRef<Path>>(geoid_path: P, dem: &DemProduct, buffer_pixels: usize) -> DemResult<DemProduct> {
    let geoid_path = geoid_path.as_ref();
    if !geoid_path.exists() {
        return Err(DemError::MissingFile(geoid_path.to_path_buf()));
    }
    // geoid rasters are geographic; bring projected DEM bounds across first
    let bounds = geographic_bounds(dem)?;
    let geoid = read_raster_window(geoid_path, &bounds, buffer_pixels)?;
    log::debug!(
        "Geoid window {}x{} at resolution {}",
        geoid.grid.width,
        geoid.grid.height,
        geoid.grid.transform.resolution()
    );
    Ok(geoid)
}

/// Warn when the geoid buffer gives bilinear resampling too little context.
///
/// Returns the recommended buffer when the current one is insufficient.
pub fn check_geoid_buffer(dem_resolution: f64, geoid_resolution: f64, buffer_pixels: usize) -> Option<usize> {
    if geoid_resolution * buffer_pixels as f64 <= dem_resolution {
        let recommendation = (dem_resolution / geoid_resolution).ceil() as usize;
        log::warn!(
            "The dem resolution is larger than the geoid resolution and its buffer; \
             edges resampled with bilinear interpolation will be inconsistent so select a larger buffer. \
             Select `buffer_pixels = {}`",
            recommendation
        );
        return Some(recommendation);
    }
    None
}

/// Bilinear sample at pixel coordinates (GDAL convention, centres at +0.5)
fn bilinear(array: &ElevationArray, col: f64, row: f64) -> f32 {
    let (height, width) = array.dim();
    let c = col - 0.5;
    let r = row - 0.5;
    if !(c > -1.0 && r > -1.0 && c < width as f64 && r < height as f64) {
        return f32::NAN;
    }

    let c0 = c.floor();
    let r0 = r.floor();
    let dc = c - c0;
    let dr = r - r0;
    let clamp_c = |v: f64| v.max(0.0).min((width - 1) as f64) as usize;
    let clamp_r = |v: f64| v.max(0.0).min((height - 1) as f64) as usize;
    let (c0i, c1i) = (clamp_c(c0), clamp_c(c0 + 1.0));
    let (r0i, r1i) = (clamp_r(r0), clamp_r(r0 + 1.0));

    let v00 = array[[r0i, c0i]] as f64;
    let v01 = array[[r0i, c1i]] as f64;
    let v10 = array[[r1i, c0i]] as f64;
    let v11 = array[[r1i, c1i]] as f64;

    let top = v00 * (1.0 - dc) + v01 * dc;
    let bottom = v10 * (1.0 - dc) + v11 * dc;
    (top * (1.0 - dr) + bottom * dr) as f32
}

/// Resample `geoid` onto `dem`'s grid with bilinear interpolation.
///
/// For DEM tiles in point convention the geoid is shifted half a pixel so
/// sample centres line up.
pub fn resample_geoid(geoid: &DemProduct, dem: &DemProduct, source_convention: PixelConvention) -> DemResult<ElevationArray> {
    let mut geoid_transform = geoid.grid.transform;
    if source_convention == PixelConvention::Point {
        geoid_transform = geoid_transform.shifted_by_pixels(-0.5, -0.5);
    }

    let (height, width) = dem.grid.shape();
    let mut xs = Vec::with_capacity(width * height);
    let mut ys = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let (x, y) = dem.grid.pixel_center(col, row);
            xs.push(x);
            ys.push(y);
        }
    }
    if dem.grid.crs != geoid.grid.crs {
        CrsTransformer::new(dem.grid.crs, geoid.grid.crs)?.transform_points(&mut xs, &mut ys)?;
    }

    let mut pixels = Vec::with_capacity(xs.len());
    for (x, y) in xs.iter().zip(ys.iter()) {
        pixels.push(geoid_transform.world_to_pixel(*x, *y)?);
    }

    map_pixels(dem.grid.shape(), |row, col| {
        let (c, r) = pixels[row * width + col];
        bilinear(&geoid.array, c, r)
    })
}

/// Convert orthometric heights to ellipsoidal: `ellipsoidal = orthometric + geoid`
pub fn remove_geoid<P: AsRef<Path>>(
    dem: &DemProduct,
    geoid_path: P,
    buffer_pixels: usize,
    source_convention: PixelConvention,
) -> DemResult<DemProduct> {
    log::info!("Using geoid file: {}", geoid_path.as_ref().display());
    let geoid = read_geoid(geoid_path, dem, buffer_pixels)?;

    let dem_resolution = dem.grid.transform.resolution();
    let geoid_resolution = geoid.grid.transform.resolution();
    if dem.grid.crs == geoid.grid.crs {
        check_geoid_buffer(dem_resolution, geoid_resolution, buffer_pixels);
    }

    let undulation = resample_geoid(&geoid, dem, source_convention)?;
    Ok(DemProduct {
        array: &dem.array + &undulation,
        grid: dem.grid,
    })
}
