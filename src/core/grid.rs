//! Copernicus GLO-30 pixel grid model
//!
//! The GLO-30 product keeps latitude spacing fixed at one arc-second and widens
//! longitude spacing in bands towards the poles. Tiles are point registered: the
//! top-left sample sits on the integer-degree node, so the area-convention
//! origin is half a pixel up and left of it.

use crate::types::{BoundingBox, Crs, DemError, DemResult, GeoTransform, RasterGrid};

/// One arc-second, the finest GLO-30 spacing
pub const MINIMUM_PIXEL_SPACING: f64 = 0.0002777777777777778;

/// Rows in every 1x1 degree tile
pub const TILE_ROWS: usize = 3600;

/// Longitude multiplier for a given absolute latitude
pub fn longitude_multiplier(abs_lat: f64) -> DemResult<f64> {
    let multiplier = if abs_lat < 50.0 {
        1.0
    } else if abs_lat < 60.0 {
        1.5
    } else if abs_lat < 70.0 {
        2.0
    } else if abs_lat < 80.0 {
        3.0
    } else if abs_lat < 85.0 {
        5.0
    } else if abs_lat < 90.0 {
        10.0
    } else {
        return Err(DemError::InvalidLatitude(abs_lat));
    };
    Ok(multiplier)
}

/// `(lon_spacing, lat_spacing)` at the mean latitude of `bbox`
pub fn cop_glo30_spacing(bbox: &BoundingBox) -> DemResult<(f64, f64)> {
    let mean_latitude = ((bbox.ymin() + bbox.ymax()) / 2.0).abs();
    let multiplier = longitude_multiplier(mean_latitude)?;
    Ok((MINIMUM_PIXEL_SPACING * multiplier, MINIMUM_PIXEL_SPACING))
}

/// Shift a point-convention origin to the corner of its pixel
pub fn point_to_area_origin(x: f64, y: f64, pixel_width: f64, pixel_height: f64) -> (f64, f64) {
    GeoTransform::from_origin(x, y, pixel_width, pixel_height).pixel_to_world(-0.5, -0.5)
}

/// Area-convention transform of the tile containing `(origin_lon, origin_lat)`
pub fn tile_transform(
    origin_lon: f64,
    origin_lat: f64,
    lon_spacing: f64,
    lat_spacing: f64,
) -> GeoTransform {
    let whole_degree_lon = origin_lon.floor();
    let whole_degree_lat = origin_lat.ceil();
    let pixel_height = -lat_spacing.abs();
    let (x, y) = point_to_area_origin(whole_degree_lon, whole_degree_lat, lon_spacing, pixel_height);
    GeoTransform::from_origin(x, y, lon_spacing, pixel_height)
}

/// Snap `bbox` outward onto the pixel grid of `transform`.
///
/// Returns the expanded bounds and a transform whose origin is the expanded
/// top-left corner with the same pixel size.
pub fn expand_bounding_box_to_pixel_edges(
    bbox: &BoundingBox,
    transform: &GeoTransform,
) -> DemResult<(BoundingBox, GeoTransform)> {
    let (tl_x, tl_y) = bbox.top_left();
    let (br_x, br_y) = bbox.bottom_right();

    let (tl_col, tl_row) = transform.world_to_pixel(tl_x, tl_y)?;
    let (br_col, br_row) = transform.world_to_pixel(br_x, br_y)?;

    let (x0, y0) = transform.pixel_to_world(tl_col.floor(), tl_row.floor());
    let (x1, y1) = transform.pixel_to_world(br_col.ceil(), br_row.ceil());

    let expanded = BoundingBox::new(x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1))?;
    let expanded_transform = GeoTransform::from_origin(
        expanded.xmin(),
        expanded.ymax(),
        transform.pixel_width,
        transform.pixel_height,
    );
    Ok((expanded, expanded_transform))
}

/// Grid aligned with the GLO-30 tiles that covers `bbox` at the given spacing
pub fn aligned_grid(
    bbox: &BoundingBox,
    lon_spacing: f64,
    lat_spacing: f64,
) -> DemResult<(BoundingBox, RasterGrid)> {
    let glo30_transform = tile_transform(bbox.xmin(), bbox.ymax(), lon_spacing, lat_spacing);
    let (expanded, transform) = expand_bounding_box_to_pixel_edges(bbox, &glo30_transform)?;

    let (left_px, top_px) = transform.world_to_pixel(expanded.xmin(), expanded.ymax())?;
    let (right_px, bottom_px) = transform.world_to_pixel(expanded.xmax(), expanded.ymin())?;
    let width = (right_px.round() - left_px.round()).abs() as usize;
    let height = (bottom_px.round() - top_px.round()).abs() as usize;

    let grid = RasterGrid::new(width, height, transform, Crs::WGS84)?;
    Ok((expanded, grid))
}

/// Empty GLO-30 grid for `bbox` at the spacing of its mean latitude
pub fn empty_grid_for_bounds(bbox: &BoundingBox) -> DemResult<(BoundingBox, RasterGrid)> {
    let (lon_spacing, lat_spacing) = cop_glo30_spacing(bbox)?;
    aligned_grid(bbox, lon_spacing, lat_spacing)
}

/// Buffer `bbox` by a pixel count or a distance in degrees.
///
/// A degree buffer wins when both are given. The result is clamped to the
/// globe, with the east edge held at the last pixel edge before 180 degrees.
pub fn buffer_bounds(
    bbox: &BoundingBox,
    pixel_buffer: Option<u32>,
    degree_buffer: Option<f64>,
) -> DemResult<BoundingBox> {
    let (lon_spacing, lat_spacing) = cop_glo30_spacing(bbox)?;

    let pixel_buffer = pixel_buffer.filter(|&p| p > 0);
    let degree_buffer = degree_buffer.filter(|&d| d > 0.0);

    let (dx, dy) = match (pixel_buffer, degree_buffer) {
        (None, None) => {
            log::warn!("No buffer has been provided");
            return Ok(*bbox);
        }
        (Some(_), Some(degrees)) => {
            log::warn!("Both pixel and degree buffer provided. Degree buffer will be used");
            (degrees, degrees)
        }
        (None, Some(degrees)) => (degrees, degrees),
        (Some(pixels), None) => (pixels as f64 * lon_spacing, pixels as f64 * lat_spacing),
    };

    clamped(
        bbox.xmin() - dx,
        bbox.ymin() - dy,
        bbox.xmax() + dx,
        bbox.ymax() + dy,
        lon_spacing,
    )
}

/// Clamp `bbox` to the globe, the east edge held at the last pixel edge before 180 degrees
pub fn clamp_to_globe(bbox: &BoundingBox) -> DemResult<BoundingBox> {
    let (lon_spacing, _) = cop_glo30_spacing(bbox)?;
    clamped(bbox.xmin(), bbox.ymin(), bbox.xmax(), bbox.ymax(), lon_spacing)
}

fn clamped(xmin: f64, ymin: f64, xmax: f64, ymax: f64, lon_spacing: f64) -> DemResult<BoundingBox> {
    BoundingBox::new(
        xmin.max(-180.0),
        ymin.max(-90.0),
        xmax.min(180.0 - 0.5 * lon_spacing),
        ymax.min(90.0),
    )
}

/// Footprint of the GLO-30 tile whose south-west integer corner is `(lat, lon)`
pub fn tile_footprint(lat: i32, lon: i32) -> DemResult<BoundingBox> {
    let multiplier = longitude_multiplier((lat as f64 + 0.5).abs())?;
    let lon_spacing = MINIMUM_PIXEL_SPACING * multiplier;
    let columns = (TILE_ROWS as f64 / multiplier).round();

    let (x0, y0) = point_to_area_origin(
        lon as f64,
        (lat + 1) as f64,
        lon_spacing,
        -MINIMUM_PIXEL_SPACING,
    );
    BoundingBox::new(
        x0,
        y0 - TILE_ROWS as f64 * MINIMUM_PIXEL_SPACING,
        x0 + columns * lon_spacing,
        y0,
    )
}
