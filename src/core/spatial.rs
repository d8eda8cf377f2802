//! CRS transforms for points, rings and bounding boxes

use crate::types::{BoundingBox, Crs, DemError, DemResult};
use gdal::spatial_ref::{CoordTransform, SpatialRef};

/// Default densification step (degrees) for geographic box edges
pub const DEFAULT_SEGMENT_LENGTH: f64 = 0.1;

/// Spatial reference with x = longitude / easting regardless of the authority's axis order
pub fn spatial_ref(crs: Crs) -> DemResult<SpatialRef> {
    let srs = SpatialRef::from_epsg(crs.epsg())?;
    traditional_axis_order(srs)
}

pub(crate) fn traditional_axis_order(mut srs: SpatialRef) -> DemResult<SpatialRef> {
    srs.set_axis_mapping_strategy(
        gdal_sys::OSRAxisMappingStrategy::OAMS_TRADITIONAL_GIS_ORDER,
    );
    Ok(srs)
}

/// Point transformer between two CRS
pub struct CrsTransformer {
    transform: CoordTransform,
    source: String,
    target: String,
}

impl CrsTransformer {
    pub fn new(source: Crs, target: Crs) -> DemResult<Self> {
        let src = spatial_ref(source)?;
        let dst = spatial_ref(target)?;
        let transform = CoordTransform::new(&src, &dst)?;
        Ok(Self {
            transform,
            source: source.to_string(),
            target: target.to_string(),
        })
    }

    /// Transformer for spatial references that may not carry an EPSG code
    pub fn from_refs(source: SpatialRef, target: SpatialRef) -> DemResult<Self> {
        let src = traditional_axis_order(source)?;
        let dst = traditional_axis_order(target)?;
        let transform = CoordTransform::new(&src, &dst)?;
        Ok(Self {
            transform,
            source: src.to_proj4().unwrap_or_else(|_| "unknown".to_string()),
            target: dst.to_proj4().unwrap_or_else(|_| "unknown".to_string()),
        })
    }

    /// Transform coordinates in place
    pub fn transform_points(&self, xs: &mut [f64], ys: &mut [f64]) -> DemResult<()> {
        if xs.len() != ys.len() {
            return Err(DemError::Processing(format!(
                "coordinate length mismatch: {} x values, {} y values",
                xs.len(),
                ys.len()
            )));
        }
        if xs.is_empty() {
            return Ok(());
        }
        let mut zs = vec![0.0; xs.len()];
        self.transform.transform_coords(xs, ys, &mut zs).map_err(|e| {
            DemError::Processing(format!(
                "failed to transform {} points from {} to {}: {}",
                xs.len(),
                self.source,
                self.target,
                e
            ))
        })
    }

    pub fn transform_point(&self, x: f64, y: f64) -> DemResult<(f64, f64)> {
        let mut xs = [x];
        let mut ys = [y];
        self.transform_points(&mut xs, &mut ys)?;
        Ok((xs[0], ys[0]))
    }

    /// Transform a ring, returning separate x / y vectors
    pub fn transform_ring(&self, ring: &[(f64, f64)]) -> DemResult<(Vec<f64>, Vec<f64>)> {
        let mut xs: Vec<f64> = ring.iter().map(|p| p.0).collect();
        let mut ys: Vec<f64> = ring.iter().map(|p| p.1).collect();
        self.transform_points(&mut xs, &mut ys)?;
        Ok((xs, ys))
    }
}

/// Bounds of `bbox` after reprojection, with edges densified every `segment_length` source units
pub fn transform_bounds(
    bbox: &BoundingBox,
    source: Crs,
    target: Crs,
    segment_length: f64,
) -> DemResult<BoundingBox> {
    if source == target {
        return Ok(*bbox);
    }
    let transformer = CrsTransformer::new(source, target)?;
    let (xs, ys) = transformer.transform_ring(&bbox.densified_ring(segment_length))?;
    BoundingBox::from_points(&xs, &ys)
}

/// UTM zone number (1..=60) containing `lon`
pub fn utm_zone(lon: f64) -> u32 {
    let wrapped = (lon + 180.0).rem_euclid(360.0);
    ((wrapped / 6.0).floor() as u32).min(59) + 1
}

/// WGS 84 / UTM CRS for the centre of `bbox`.
///
/// With `antimeridian` set the centre longitude is pinned to 179.9 when the
/// naive centre is negative (-179.9 otherwise), keeping the zone off the
/// 180 degree boundary.
pub fn local_utm(bbox: &BoundingBox, antimeridian: bool) -> Crs {
    let (mut centre_lon, centre_lat) = bbox.center();
    if antimeridian {
        centre_lon = if centre_lon < 0.0 { 179.9 } else { -179.9 };
    }
    let crs = Crs::utm(utm_zone(centre_lon), centre_lat >= 0.0);
    log::info!("Local UTM CRS for {:?}: {}", bbox.bounds(), crs);
    crs
}

/// Shift longitudes by whole turns so they sit within 180 degrees of `reference`
pub fn unwrap_longitudes(lons: &mut [f64], reference: f64) {
    for lon in lons.iter_mut() {
        while *lon - reference > 180.0 {
            *lon -= 360.0;
        }
        while *lon - reference < -180.0 {
            *lon += 360.0;
        }
    }
}
