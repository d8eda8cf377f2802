//! Vector footprint index of elevation tiles
//!
//! The index is any OGR readable polygon layer with a `location` string
//! attribute naming the tile, either an absolute path or a bare filename.

use crate::core::spatial::{spatial_ref, CrsTransformer};
use crate::io::raster::dataset_grid;
use crate::types::{ring_to_wkt, BoundingBox, Crs, DemError, DemResult};
use gdal::vector::{FieldValue, Geometry, LayerAccess, OGRFieldType};
use gdal::{Dataset, DriverManager, LayerOptions};
use std::path::{Path, PathBuf};

/// Attribute holding the tile location
pub const LOCATION_FIELD: &str = "location";

/// Densification step, in degrees, of boxes carried into a projected index CRS
const SEGMENT_DEGREES: f64 = 0.1;

/// One index record
#[derive(Debug, Clone, PartialEq)]
pub struct TileIndexEntry {
    pub location: String,
    /// WGS 84 footprint of the record's geometry envelope
    pub footprint: BoundingBox,
}

/// Index records whose footprint intersects `search` (WGS 84), sorted by location
pub fn find_tiles<P: AsRef<Path>>(index_path: P, search: &BoundingBox) -> DemResult<Vec<TileIndexEntry>> {
    let index_path = index_path.as_ref();
    if !index_path.exists() {
        return Err(DemError::MissingFile(index_path.to_path_buf()));
    }
    log::info!("Finding intersecting DEM files from: {}", index_path.display());

    let dataset = Dataset::open(index_path)?;
    let mut layer = dataset.layer(0)?;

    // Query in the index's own CRS when it is not WGS 84
    let to_index = match layer.spatial_ref() {
        Some(srs) if srs.auth_code().ok() != Some(Crs::WGS84.epsg() as i32) => {
            log::debug!("Reprojecting search bounds into the tile index CRS");
            Some((
                CrsTransformer::from_refs(spatial_ref(Crs::WGS84)?, srs.clone())?,
                CrsTransformer::from_refs(srs, spatial_ref(Crs::WGS84)?)?,
            ))
        }
        _ => None,
    };

    let filter_wkt = match &to_index {
        Some((forward, _)) => {
            let (xs, ys) = forward.transform_ring(&search.densified_ring(SEGMENT_DEGREES))?;
            let ring: Vec<(f64, f64)> = xs.into_iter().zip(ys).collect();
            ring_to_wkt(&ring)
        }
        None => search.to_wkt(),
    };
    let filter = Geometry::from_wkt(&filter_wkt)?;
    layer.set_spatial_filter(&filter);

    let mut entries = Vec::new();
    for feature in layer.features() {
        let location = match feature.field_as_string_by_name(LOCATION_FIELD)? {
            Some(location) if !location.is_empty() => location,
            _ => {
                log::warn!("Skipping tile index record without a {} value", LOCATION_FIELD);
                continue;
            }
        };

        // the OGR filter may be envelope based, keep only true intersections
        let geometry = feature.geometry_by_index(0)?;
        if !geometry.intersects(&filter) {
            continue;
        }

        let footprint = match &to_index {
            Some((_, back)) => {
                let (mut xs, mut ys): (Vec<f64>, Vec<f64>) = geometry
                    .get_geometry(0)
                    .get_point_vec()
                    .into_iter()
                    .map(|(x, y, _)| (x, y))
                    .unzip();
                back.transform_points(&mut xs, &mut ys)?;
                BoundingBox::from_points(&xs, &ys)?
            }
            None => {
                let envelope = geometry.envelope();
                BoundingBox::new(envelope.MinX, envelope.MinY, envelope.MaxX, envelope.MaxY)?
            }
        };
        entries.push(TileIndexEntry { location, footprint });
    }

    entries.sort_by(|a, b| a.location.cmp(&b.location));
    log::info!("Number of cop30 files found intersecting bounds : {}", entries.len());
    Ok(entries)
}

/// Write a GeoPackage footprint index for `tiles` in WGS 84.
///
/// Each record's polygon is the tile's raster extent. With `absolute_locations`
/// the `location` attribute holds the full path, otherwise the bare filename.
pub fn build_tile_index<P: AsRef<Path>>(
    tiles: &[PathBuf],
    output_path: P,
    absolute_locations: bool,
) -> DemResult<usize> {
    build_tile_index_in(tiles, output_path, absolute_locations, Crs::WGS84)
}

/// Write a GeoPackage footprint index for `tiles` with polygons in `index_crs`.
///
/// Footprint edges are densified before projection so the polygons follow
/// the curved parallels.
pub fn build_tile_index_in<P: AsRef<Path>>(
    tiles: &[PathBuf],
    output_path: P,
    absolute_locations: bool,
    index_crs: Crs,
) -> DemResult<usize> {
    let output_path = output_path.as_ref();
    log::info!(
        "Building tile index of {} tiles at {} ({})",
        tiles.len(),
        output_path.display(),
        index_crs
    );

    let to_index = if index_crs == Crs::WGS84 {
        None
    } else {
        Some(CrsTransformer::new(Crs::WGS84, index_crs)?)
    };

    let driver = DriverManager::get_driver_by_name("GPKG")?;
    let mut dataset = driver.create_vector_only(output_path)?;
    let srs = spatial_ref(index_crs)?;
    let mut layer = dataset.create_layer(LayerOptions {
        name: "tiles",
        srs: Some(&srs),
        ty: gdal_sys::OGRwkbGeometryType::wkbPolygon,
        options: None,
    })?;
    layer.create_defn_fields(&[(LOCATION_FIELD, OGRFieldType::OFTString)])?;

    let mut written = 0;
    for tile in tiles {
        let grid = dataset_grid(&Dataset::open(tile)?)?;
        if grid.crs != Crs::WGS84 {
            return Err(DemError::Processing(format!(
                "tile {} is in {}, the index expects {}",
                tile.display(),
                grid.crs,
                Crs::WGS84
            )));
        }
        let location = if absolute_locations {
            tile.canonicalize()?.to_string_lossy().into_owned()
        } else {
            tile.file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .ok_or_else(|| DemError::Processing(format!("tile path {} has no filename", tile.display())))?
        };

        let wkt = match &to_index {
            Some(forward) => {
                let (xs, ys) = forward.transform_ring(&grid.bounds().densified_ring(SEGMENT_DEGREES))?;
                let ring: Vec<(f64, f64)> = xs.into_iter().zip(ys).collect();
                ring_to_wkt(&ring)
            }
            None => grid.bounds().to_wkt(),
        };
        layer.create_feature_fields(
            Geometry::from_wkt(&wkt)?,
            &[LOCATION_FIELD],
            &[FieldValue::StringValue(location)],
        )?;
        written += 1;
    }

    Ok(written)
}
