//! Bounds correction near the poles
//!
//! A lon/lat box built from scene corners misses the scene's true extent at
//! high latitude because meridians converge. Passing the box through a polar
//! stereographic projection and back recovers a geographic box that contains
//! the projected footprint.

use crate::core::spatial::{unwrap_longitudes, CrsTransformer, DEFAULT_SEGMENT_LENGTH};
use crate::types::{BoundingBox, Crs, DemResult};

/// Latitude beyond which the polar correction applies
pub const HIGH_LATITUDE_THRESHOLD: f64 = 50.0;

/// Round trip `bbox` through `reference` and back to WGS 84.
///
/// The box edges are densified every `segment_length` degrees before the
/// forward transform. The projected bounds are returned to geographic
/// coordinates through their four corners. The result never shrinks below the
/// input.
pub fn round_trip_bounds(bbox: &BoundingBox, reference: Crs, segment_length: f64) -> DemResult<BoundingBox> {
    let forward = CrsTransformer::new(Crs::WGS84, reference)?;
    let back = CrsTransformer::new(reference, Crs::WGS84)?;

    let (xs, ys) = forward.transform_ring(&bbox.densified_ring(segment_length))?;
    let projected = BoundingBox::from_points(&xs, &ys)?;
    log::debug!("Bounds in {}: {:?}", reference, projected.bounds());

    let (mut lons, lats) = back.transform_ring(&projected.densified_ring(0.0))?;
    unwrap_longitudes(&mut lons, bbox.center().0);
    let corrected = BoundingBox::from_points(&lons, &lats)?;

    Ok(corrected.union(bbox))
}

/// Expand `bbox` so it contains the true scene extent at high latitude.
///
/// Boxes with `ymin < -50` go through EPSG:3031, then boxes with `ymin > 50`
/// through EPSG:3995. Anything else is returned unchanged.
pub fn expand_bounds_at_high_lat(bbox: &BoundingBox) -> DemResult<BoundingBox> {
    let mut bounds = *bbox;
    if bounds.ymin() < -HIGH_LATITUDE_THRESHOLD {
        log::info!("Adjusting bounds at high southern latitudes");
        bounds = round_trip_bounds(&bounds, Crs::ANTARCTIC_POLAR_STEREOGRAPHIC, DEFAULT_SEGMENT_LENGTH)?;
    }
    if bounds.ymin() > HIGH_LATITUDE_THRESHOLD {
        log::info!("Adjusting bounds at high northern latitudes");
        bounds = round_trip_bounds(&bounds, Crs::ARCTIC_POLAR_STEREOGRAPHIC, DEFAULT_SEGMENT_LENGTH)?;
    }
    if bounds != *bbox {
        log::info!("Adjusted bounds {:?} -> {:?}", bbox.bounds(), bounds.bounds());
    }
    Ok(bounds)
}
