//! Tile mosaicking onto the GLO-30 pixel grid

use crate::core::grid::{aligned_grid, cop_glo30_spacing};
use crate::io::raster::{dataset_grid, nodata_to_nan};
use crate::io::tiles::TileReference;
use crate::io::vrt::{VrtBuilder, VrtSource};
use crate::types::{BoundingBox, DemError, DemProduct, DemResult, ElevationArray, RasterGrid};
use gdal::Dataset;
use ndarray::Array2;

/// Coverage comparisons tolerate this much floating point drift (degrees)
pub const COVERAGE_TOLERANCE: f64 = 1e-9;

/// Value written where no tile has data
pub const FILL_VALUE: f32 = 0.0;

/// Merge `tiles` into one raster covering `bbox` plus `buffer_pixels` on every side.
///
/// The grid uses the finer of the latitude band spacing for `bbox` and the
/// finest tile spacing. With no tiles the result is a zero raster of the
/// band spacing grid.
pub fn mosaic(tiles: &[TileReference], bbox: &BoundingBox, buffer_pixels: usize) -> DemResult<DemProduct> {
    let (mut lon_spacing, mut lat_spacing) = cop_glo30_spacing(bbox)?;

    let mut sources = Vec::with_capacity(tiles.len());
    let mut nodata_values = Vec::new();
    for tile in tiles {
        let dataset = Dataset::open(&tile.path)?;
        let tile_grid = dataset_grid(&dataset)?;
        lon_spacing = lon_spacing.min(tile_grid.transform.pixel_width.abs());
        lat_spacing = lat_spacing.min(tile_grid.transform.pixel_height.abs());
        if !tile_grid.nodata.is_nan() && !nodata_values.contains(&tile_grid.nodata) {
            nodata_values.push(tile_grid.nodata);
        }
        sources.push(VrtSource {
            path: tile.path.clone(),
            width: tile_grid.width,
            height: tile_grid.height,
            transform: tile_grid.transform,
        });
    }

    let (_, grid) = aligned_grid(bbox, lon_spacing, lat_spacing)?;
    let grid = grid.buffered(buffer_pixels);
    log::info!(
        "Mosaic grid {}x{} at ({}, {}) for {:?}",
        grid.width,
        grid.height,
        lon_spacing,
        lat_spacing,
        bbox.bounds()
    );

    if sources.is_empty() {
        log::warn!(
            "No DEM tiles found. Assuming that the bounds are over water and creating a DEM containing all zeros."
        );
        return Ok(DemProduct {
            array: Array2::from_elem(grid.shape(), FILL_VALUE),
            grid,
        });
    }

    let mut array = read_vrt(&grid, sources)?;
    for nodata in nodata_values {
        nodata_to_nan(&mut array, nodata);
    }
    log::info!("Dem array shape = {:?}", array.dim());
    Ok(DemProduct { array, grid })
}

/// Compose the sources in a temporary VRT and read it on `grid`
fn read_vrt(grid: &RasterGrid, sources: Vec<VrtSource>) -> DemResult<ElevationArray> {
    let mut builder = VrtBuilder::new(*grid);
    for source in sources {
        builder.add_source(source);
    }

    // removed when dropped, including on error paths
    let vrt = tempfile::Builder::new()
        .prefix("sarprep_mosaic_")
        .suffix(".vrt")
        .tempfile()?;
    builder.write(vrt.path())?;
    log::debug!("VRT path = {}", vrt.path().display());

    let dataset = Dataset::open(vrt.path())?;
    let band = dataset.rasterband(1)?;
    let data = band.read_as::<f32>(
        (0, 0),
        (grid.width, grid.height),
        (grid.width, grid.height),
        None,
    )?;
    Array2::from_shape_vec(grid.shape(), data.data)
        .map_err(|e| DemError::Processing(format!("Failed to reshape mosaic data: {}", e)))
}

/// Verify `produced` covers `requested`.
///
/// A shortfall only at the east edge next to +180 degrees is expected (the last
/// pixel edge sits half a pixel before the antimeridian) and is logged. Any
/// other shortfall is a coverage error.
pub fn check_coverage(requested: &BoundingBox, produced: &BoundingBox, lon_spacing: f64) -> DemResult<()> {
    let short_west = produced.xmin() > requested.xmin() + COVERAGE_TOLERANCE;
    let short_south = produced.ymin() > requested.ymin() + COVERAGE_TOLERANCE;
    let short_east = produced.xmax() < requested.xmax() - COVERAGE_TOLERANCE;
    let short_north = produced.ymax() < requested.ymax() - COVERAGE_TOLERANCE;

    if !(short_west || short_south || short_east || short_north) {
        return Ok(());
    }

    let at_antimeridian = produced.xmax() >= 180.0 - lon_spacing - COVERAGE_TOLERANCE;
    if short_east && at_antimeridian && !(short_west || short_south || short_north) {
        log::warn!(
            "The DEM bounds {:?} do not fully cover the requested bounds {:?}. \
             At the antimeridian this is expected, with bounds being slightly smaller on the +ve side.",
            produced.bounds(),
            requested.bounds()
        );
        return Ok(());
    }

    Err(DemError::Coverage(format!(
        "DEM bounds {:?} do not cover requested bounds {:?}",
        produced.bounds(),
        requested.bounds()
    )))
}
