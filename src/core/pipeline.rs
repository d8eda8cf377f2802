//! DEM engine: bounds in, elevation raster out
//!
//! Control flow for one request:
//!
//! 1. antimeridian check; a crossing box is split and each half runs the
//!    direct path, the halves are reprojected to one CRS and merged
//! 2. direct path: high latitude correction, buffering, snapping to the
//!    GLO-30 grid, tile lookup, mosaic (zeros over water)
//! 3. optional geoid correction to ellipsoidal heights
//!
//! Temporary rasters (the VRT mosaic, a downloaded geoid window) live in
//! temporary directories scoped to the call.

use crate::config::{DemConfig, HeightReference};
use crate::core::antimeridian::{crosses_antimeridian, split_at_antimeridian, target_crs};
use crate::core::geoid::{geoid_covers, remove_geoid};
use crate::core::grid::{buffer_bounds, clamp_to_globe, cop_glo30_spacing};
use crate::core::high_lat::expand_bounds_at_high_lat;
use crate::core::mosaic::{check_coverage, mosaic};
use crate::core::reproject::{merge_rasters, reproject_raster};
use crate::io::raster::write_geotiff;
use crate::io::tiles::TileLocator;
use crate::types::{BoundingBox, DemError, DemProduct, DemResult, PixelConvention};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Builds DEM rasters for bounding boxes from a fixed configuration
pub struct DemBuilder {
    config: DemConfig,
    locator: Box<dyn TileLocator>,
}

impl DemBuilder {
    /// Validate `config` and set up the tile locator it describes
    pub fn new(config: DemConfig) -> DemResult<Self> {
        config.validate()?;
        let locator = config.locator()?;
        Ok(Self { config, locator })
    }

    /// Use a custom tile locator
    pub fn with_locator(config: DemConfig, locator: Box<dyn TileLocator>) -> DemResult<Self> {
        config.validate()?;
        Ok(Self { config, locator })
    }

    pub fn config(&self) -> &DemConfig {
        &self.config
    }

    /// Elevation raster covering `bbox`, optionally written to `output_path`.
    ///
    /// Boxes crossing the antimeridian come back in a projected CRS (polar
    /// stereographic or UTM); all others in WGS 84.
    pub fn get_dem_for_bounds(&self, bbox: &BoundingBox, output_path: Option<&Path>) -> DemResult<DemProduct> {
        let product = if crosses_antimeridian(bbox, self.config.max_scene_width) {
            log::warn!("DEM crosses the dateline/antimeridian. Bounds will be split and processed.");
            self.dem_across_antimeridian(bbox)?
        } else {
            self.dem_for_direct_bounds(bbox, self.config.adjust_at_high_lat)?
        };

        if let Some(path) = output_path {
            write_geotiff(path, &product)?;
        }
        Ok(product)
    }

    fn dem_across_antimeridian(&self, bbox: &BoundingBox) -> DemResult<DemProduct> {
        let target = target_crs(bbox);
        let split = split_at_antimeridian(bbox, self.config.antimeridian_lat_buffer)?;

        let mut reprojected = Vec::with_capacity(2);
        for (name, half) in [("eastern", split.eastern), ("western", split.western)] {
            log::info!("Producing raster for {} hemisphere bounds", name);
            let product = self.dem_for_direct_bounds(&half, true)?;
            log::info!("Reprojecting {} hemisphere raster to {}", name, target);
            reprojected.push(reproject_raster(&product, target)?);
        }

        log::info!("Merging across antimeridian");
        merge_rasters(&reprojected)
    }

    fn dem_for_direct_bounds(&self, bbox: &BoundingBox, adjust_at_high_lat: bool) -> DemResult<DemProduct> {
        log::info!("Getting cop30m dem for bounds: {:?}", bbox.bounds());

        let mut adjusted = if adjust_at_high_lat {
            let adjusted = clamp_to_globe(&expand_bounds_at_high_lat(bbox)?)?;
            log::info!("Getting cop30m dem for adjusted bounds: {:?}", adjusted.bounds());
            adjusted
        } else {
            *bbox
        };

        if self.config.buffer_pixels.is_some() || self.config.buffer_degrees.is_some() {
            log::info!("Buffering bounds by requested value");
            adjusted = buffer_bounds(&adjusted, self.config.buffer_pixels, self.config.buffer_degrees)?;
        }

        let tiles = self.locator.tiles_for(&adjusted, self.config.search_buffer)?;
        log::info!("{} tiles found in bounds", tiles.len());
        for tile in &tiles {
            log::info!("{}", tile.path.display());
        }

        let mut product = mosaic(&tiles, &adjusted, 0)?;
        let (lon_spacing, _) = cop_glo30_spacing(bbox)?;
        check_coverage(bbox, &product.grid.bounds(), lon_spacing)?;

        if self.config.heights == HeightReference::Ellipsoidal {
            log::info!("Subtracting the geoid from the DEM to return ellipsoid heights");
            let scratch = TempDir::new()?;
            let geoid_path = self.ensure_geoid(&product, scratch.path())?;
            product = remove_geoid(
                &product,
                &geoid_path,
                self.config.geoid_buffer_pixels as usize,
                PixelConvention::Point,
            )?;
        }
        Ok(product)
    }

    /// Geoid raster spanning `dem`.
    ///
    /// A configured geoid is used when it covers the DEM; otherwise the
    /// needed window is fetched into `scratch` when downloads are allowed.
    fn ensure_geoid(&self, dem: &DemProduct, scratch: &Path) -> DemResult<PathBuf> {
        if let Some(path) = &self.config.geoid_path {
            match geoid_covers(path, dem) {
                Ok(true) => return Ok(path.clone()),
                Ok(false) if !self.config.download_geoid => {
                    return Err(DemError::Coverage(format!(
                        "geoid {} does not cover the DEM bounds {:?}",
                        path.display(),
                        dem.grid.bounds().bounds()
                    )));
                }
                Ok(false) => log::warn!(
                    "Geoid {} does not cover the DEM bounds, downloading the needed window",
                    path.display()
                ),
                Err(e) if !self.config.download_geoid => return Err(e),
                Err(_) => {}
            }
        } else if !self.config.download_geoid {
            return Err(DemError::Config(
                "ellipsoidal heights need a geoid path or download_geoid = true".to_string(),
            ));
        }

        log::info!("Downloading the egm_08 geoid");
        let path = scratch.join("egm08_geoid.tif");
        self.config.downloader().download_geoid(&path, &dem.grid.bounds())?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::tiles::TileReference;
    use std::cell::RefCell;

    /// Records every query and never finds a tile
    struct OceanLocator {
        queries: RefCell<Vec<BoundingBox>>,
    }

    impl TileLocator for OceanLocator {
        fn tiles_for(&self, bbox: &BoundingBox, _search_buffer: f64) -> DemResult<Vec<TileReference>> {
            self.queries.borrow_mut().push(*bbox);
            Ok(Vec::new())
        }
    }

    fn ocean_builder(config: DemConfig) -> DemBuilder {
        let locator = OceanLocator {
            queries: RefCell::new(Vec::new()),
        };
        DemBuilder::with_locator(config, Box::new(locator)).unwrap()
    }

    #[test]
    fn ocean_box_is_zero_filled() {
        let config = DemConfig {
            adjust_at_high_lat: false,
            buffer_pixels: None,
            ..DemConfig::for_tile_folder("/unused")
        };
        let builder = ocean_builder(config);
        let bbox = BoundingBox::new(161.00062, -69.00084, 161.002205, -69.00027).unwrap();
        let product = builder.get_dem_for_bounds(&bbox, None).unwrap();
        assert_eq!(product.array.dim(), (3, 4));
        assert!(product.array.iter().all(|&v| v == 0.0));
        assert!(product.grid.bounds().contains(&bbox));
    }

    #[test]
    fn missing_geoid_is_reported_with_path() {
        let config = DemConfig {
            heights: HeightReference::Ellipsoidal,
            geoid_path: Some(PathBuf::from("/nonexistent/geoid.tif")),
            ..DemConfig::for_tile_folder("/unused")
        };
        let builder = ocean_builder(config);
        let bbox = BoundingBox::new(10.0, 10.0, 10.01, 10.01).unwrap();
        let err = builder.get_dem_for_bounds(&bbox, None).unwrap_err();
        assert!(matches!(err, DemError::MissingFile(p) if p.ends_with("geoid.tif")));
    }

    fn write_geoid_window(path: &Path, x0: f64, y0: f64, undulation: f32) {
        use crate::types::{Crs, GeoTransform, RasterGrid};
        let transform = GeoTransform::from_origin(x0, y0, 0.25, -0.25);
        let grid = RasterGrid::new(8, 8, transform, Crs::WGS84).unwrap();
        let array = ndarray::Array2::from_elem((8, 8), undulation);
        write_geotiff(path, &DemProduct { array, grid }).unwrap();
    }

    #[test]
    fn partial_geoid_is_not_reused_outside_its_window() {
        let dir = TempDir::new().unwrap();
        let geoid = dir.path().join("geoid.tif");
        // covers 178..180 E, 71..69 S only
        write_geoid_window(&geoid, 178.0, -69.0, 12.0);
        let config = DemConfig {
            heights: HeightReference::Ellipsoidal,
            geoid_path: Some(geoid),
            adjust_at_high_lat: false,
            buffer_pixels: None,
            ..DemConfig::for_tile_folder("/unused")
        };
        let builder = ocean_builder(config);

        let inside = BoundingBox::new(178.5, -70.0, 178.6, -69.9).unwrap();
        let product = builder.get_dem_for_bounds(&inside, None).unwrap();
        assert!(product.array.iter().all(|&v| v == 12.0));

        let outside = BoundingBox::new(-179.9, -70.0, -179.8, -69.9).unwrap();
        let err = builder.get_dem_for_bounds(&outside, None).unwrap_err();
        assert!(matches!(err, DemError::Coverage(_)));
    }

    #[test]
    fn adjusted_bounds_stay_on_the_globe() {
        let config = DemConfig {
            buffer_pixels: None,
            ..DemConfig::for_tile_folder("/unused")
        };
        let locator = OceanLocator {
            queries: RefCell::new(Vec::new()),
        };
        let builder = DemBuilder::with_locator(config, Box::new(locator)).unwrap();
        // high latitude round trip widens this box past both +-180
        let east = BoundingBox::new(179.9, -80.0, 179.9995, -79.9).unwrap();
        let product = builder.dem_for_direct_bounds(&east, true).unwrap();
        let (lon_spacing, _) = cop_glo30_spacing(&east).unwrap();
        assert!(product.grid.bounds().xmax() <= 180.0 + 1e-9);
        assert!(product.grid.bounds().xmax() > 180.0 - lon_spacing);

        let west = BoundingBox::new(-180.0, -80.0, -179.9, -79.9).unwrap();
        let product = builder.dem_for_direct_bounds(&west, true).unwrap();
        assert!(product.grid.bounds().xmin() >= -180.0 - 0.5 * lon_spacing - 1e-9);
    }
}
