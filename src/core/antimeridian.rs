//! Antimeridian detection and splitting

use crate::core::grid::cop_glo30_spacing;
use crate::core::high_lat::HIGH_LATITUDE_THRESHOLD;
use crate::core::spatial::local_utm;
use crate::types::{BoundingBox, Crs, DemError, DemResult};

/// Widest plausible single scene, in degrees of longitude
pub const DEFAULT_MAX_SCENE_WIDTH: f64 = 8.0;

/// Whether `bbox` straddles +/-180 rather than being genuinely wide.
///
/// A crossing scene's corner-derived box spans almost the whole globe: its west
/// edge sits just east of -180 and its east edge just west of +180.
pub fn crosses_antimeridian(bbox: &BoundingBox, max_scene_width: f64) -> bool {
    let west_limit = -180.0 + max_scene_width;
    let east_limit = 180.0 - max_scene_width;
    bbox.xmin() > -180.0 && bbox.xmin() < west_limit && bbox.xmax() > east_limit && bbox.xmax() < 180.0
}

/// CRS the two halves of a crossing box are merged in
pub fn target_crs(bbox: &BoundingBox) -> Crs {
    let (_, centre_lat) = bbox.center();
    let crs = if centre_lat < -HIGH_LATITUDE_THRESHOLD {
        Crs::ANTARCTIC_POLAR_STEREOGRAPHIC
    } else if centre_lat > HIGH_LATITUDE_THRESHOLD {
        Crs::ARCTIC_POLAR_STEREOGRAPHIC
    } else {
        local_utm(bbox, true)
    };
    log::warn!("Data will be returned in {} projection", crs);
    crs
}

/// The two sides of a crossing box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AntimeridianSplit {
    /// Part east of the scene's western edge, ending at the last pixel edge before +180
    pub eastern: BoundingBox,
    /// Part from -180 to the scene's eastern edge
    pub western: BoundingBox,
}

/// Split a crossing box into its eastern (+180 side) and western (-180 side) pieces.
///
/// Both keep the north/south extent grown by `lat_buffer` and clamped to the
/// globe.
pub fn split_at_antimeridian(bbox: &BoundingBox, lat_buffer: f64) -> DemResult<AntimeridianSplit> {
    let (lon_spacing, _) = cop_glo30_spacing(bbox)?;

    let edges = [bbox.xmin(), bbox.xmax()];
    let eastern_x = edges
        .iter()
        .copied()
        .filter(|&x| x > 0.0)
        .fold(f64::INFINITY, f64::min);
    let western_x = edges
        .iter()
        .copied()
        .filter(|&x| x < 0.0)
        .fold(f64::NEG_INFINITY, f64::max);

    if !(eastern_x.is_finite() && eastern_x <= 180.0) {
        return Err(DemError::InvalidBounds(format!(
            "no eastern hemisphere edge below 180 in {:?}",
            bbox.bounds()
        )));
    }
    if !(western_x.is_finite() && western_x >= -180.0) {
        return Err(DemError::InvalidBounds(format!(
            "no western hemisphere edge above -180 in {:?}",
            bbox.bounds()
        )));
    }

    let ymin = (bbox.ymin() - lat_buffer).max(-90.0);
    let ymax = (bbox.ymax() + lat_buffer).min(90.0);

    // an east edge inside the last half pixel keeps one pixel column
    let eastern_xmax = 180.0 - 0.5 * lon_spacing;
    let eastern_x = eastern_x.min(eastern_xmax - lon_spacing);

    let split = AntimeridianSplit {
        eastern: BoundingBox::new(eastern_x, ymin, eastern_xmax, ymax)?,
        western: BoundingBox::new(-180.0, ymin, western_x, ymax)?,
    };
    log::info!("Eastern Hemisphere bounds: {:?}", split.eastern.bounds());
    log::info!("Western Hemisphere bounds: {:?}", split.western.bounds());
    Ok(split)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn detects_crossing_not_width() {
        let crossing = BoundingBox::new(-179.99817, -79.59302, 179.99705, -79.59171).unwrap();
        assert!(crosses_antimeridian(&crossing, DEFAULT_MAX_SCENE_WIDTH));

        let wide = BoundingBox::new(-150.0, -10.0, 150.0, 10.0).unwrap();
        assert!(!crosses_antimeridian(&wide, DEFAULT_MAX_SCENE_WIDTH));

        let east = BoundingBox::new(175.0, -70.0, 179.5, -69.0).unwrap();
        assert!(!crosses_antimeridian(&east, DEFAULT_MAX_SCENE_WIDTH));

        let edge = BoundingBox::new(-180.0, -70.0, 179.5, -69.0).unwrap();
        assert!(!crosses_antimeridian(&edge, DEFAULT_MAX_SCENE_WIDTH));
    }

    #[test]
    fn reference_split() {
        let bbox = BoundingBox::new(-179.99817, -79.59302, 179.99705, -79.59171).unwrap();
        let split = split_at_antimeridian(&bbox, 0.0).unwrap();
        assert_eq!(split.western.bounds(), (-180.0, -79.59302, -179.99817, -79.59171));
        assert_eq!(split.eastern.xmin(), 179.99705);
        assert_abs_diff_eq!(split.eastern.xmax(), 179.99958333333333, epsilon = 1e-10);
        assert_eq!(split.eastern.ymin(), -79.59302);
        assert_eq!(target_crs(&bbox), Crs::ANTARCTIC_POLAR_STEREOGRAPHIC);
    }

    #[test]
    fn east_edge_in_last_half_pixel() {
        let bbox = BoundingBox::new(-179.5, -70.0, 179.9999, -69.0).unwrap();
        let (lon_spacing, _) = cop_glo30_spacing(&bbox).unwrap();
        let split = split_at_antimeridian(&bbox, 0.0).unwrap();
        assert_abs_diff_eq!(split.eastern.xmax(), 180.0 - 0.5 * lon_spacing, epsilon = 1e-12);
        assert_abs_diff_eq!(split.eastern.width(), lon_spacing, epsilon = 1e-9);
        assert_eq!(split.western.bounds(), (-180.0, -70.0, -179.5, -69.0));
    }

    #[test]
    fn latitude_buffer_is_clamped() {
        let bbox = BoundingBox::new(-179.5, -89.8, 179.0, -89.0).unwrap();
        let split = split_at_antimeridian(&bbox, 0.5).unwrap();
        assert_eq!(split.western.ymin(), -90.0);
        assert_eq!(split.eastern.ymax(), -88.5);
    }

    #[test]
    fn mid_latitude_uses_utm() {
        let bbox = BoundingBox::new(-179.5, -17.0, 179.0, -16.0).unwrap();
        // naive centre is negative, so the zone at +179.9 is used
        assert_eq!(target_crs(&bbox), Crs::from_epsg(32760));
        let north = BoundingBox::new(-179.5, 65.0, 179.0, 66.0).unwrap();
        assert_eq!(target_crs(&north), Crs::ARCTIC_POLAR_STEREOGRAPHIC);
    }
}
