use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Elevation values (metres), row-major (row = latitude, col = longitude)
pub type ElevationArray = Array2<f32>;

/// Coordinate reference system identified by its EPSG code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Crs(u32);

impl Crs {
    /// WGS 84 geographic (lon, lat in degrees)
    pub const WGS84: Crs = Crs(4326);
    /// WGS 84 / Antarctic Polar Stereographic
    pub const ANTARCTIC_POLAR_STEREOGRAPHIC: Crs = Crs(3031);
    /// WGS 84 / Arctic Polar Stereographic
    pub const ARCTIC_POLAR_STEREOGRAPHIC: Crs = Crs(3995);

    pub fn from_epsg(code: u32) -> Self {
        Crs(code)
    }

    /// WGS 84 / UTM zone (1..=60), north or south
    pub fn utm(zone: u32, north: bool) -> Self {
        if north {
            Crs(32600 + zone)
        } else {
            Crs(32700 + zone)
        }
    }

    pub fn epsg(&self) -> u32 {
        self.0
    }

    pub fn is_geographic(&self) -> bool {
        self.0 == 4326
    }
}

impl std::fmt::Display for Crs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}

/// Whether a raster sample represents a cell area or a point at the cell centre
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelConvention {
    /// Value covers the cell; transform origin is the top-left corner of the top-left cell
    Area,
    /// Value is sampled at a node; transform origin is the top-left node itself
    Point,
}

impl PixelConvention {
    /// Value of the GDAL `AREA_OR_POINT` metadata item
    pub fn gdal_tag(&self) -> &'static str {
        match self {
            PixelConvention::Area => "Area",
            PixelConvention::Point => "Point",
        }
    }
}

/// Geographic (or projected) bounding box.
///
/// Always satisfies `xmin < xmax` and `ymin < ymax`; every transform returns a
/// new box. A scene straddling the antimeridian is represented "wide", e.g.
/// `xmin = -179.99`, `xmax = 179.99`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    xmin: f64,
    ymin: f64,
    xmax: f64,
    ymax: f64,
}

impl BoundingBox {
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> DemResult<Self> {
        if !(xmin.is_finite() && ymin.is_finite() && xmax.is_finite() && ymax.is_finite()) {
            return Err(DemError::InvalidBounds(format!(
                "non-finite bounds ({}, {}, {}, {})",
                xmin, ymin, xmax, ymax
            )));
        }
        if ymin >= ymax {
            return Err(DemError::InvalidBounds(format!(
                "ymin {} is greater than or equal to ymax {}. Check ordering",
                ymin, ymax
            )));
        }
        if xmin >= xmax {
            return Err(DemError::InvalidBounds(format!(
                "xmin {} is greater than or equal to xmax {}. Check ordering",
                xmin, xmax
            )));
        }
        Ok(Self { xmin, ymin, xmax, ymax })
    }

    pub fn xmin(&self) -> f64 {
        self.xmin
    }

    pub fn ymin(&self) -> f64 {
        self.ymin
    }

    pub fn xmax(&self) -> f64 {
        self.xmax
    }

    pub fn ymax(&self) -> f64 {
        self.ymax
    }

    /// `(xmin, ymin, xmax, ymax)`
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        (self.xmin, self.ymin, self.xmax, self.ymax)
    }

    pub fn top_left(&self) -> (f64, f64) {
        (self.xmin, self.ymax)
    }

    pub fn bottom_right(&self) -> (f64, f64) {
        (self.xmax, self.ymin)
    }

    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    pub fn center(&self) -> (f64, f64) {
        ((self.xmin + self.xmax) / 2.0, (self.ymin + self.ymax) / 2.0)
    }

    /// True when `other` lies inside `self` (shared edges count as inside)
    pub fn contains(&self, other: &BoundingBox) -> bool {
        self.xmin <= other.xmin
            && self.ymin <= other.ymin
            && self.xmax >= other.xmax
            && self.ymax >= other.ymax
    }

    /// Intersection test, inclusive of touching edges
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.xmin <= other.xmax
            && self.xmax >= other.xmin
            && self.ymin <= other.ymax
            && self.ymax >= other.ymin
    }

    /// Smallest box containing both
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            xmin: self.xmin.min(other.xmin),
            ymin: self.ymin.min(other.ymin),
            xmax: self.xmax.max(other.xmax),
            ymax: self.ymax.max(other.ymax),
        }
    }

    /// Grow every edge by `dx` / `dy` (no clamping)
    pub fn buffer(&self, dx: f64, dy: f64) -> DemResult<BoundingBox> {
        BoundingBox::new(
            self.xmin - dx,
            self.ymin - dy,
            self.xmax + dx,
            self.ymax + dy,
        )
    }

    /// Closed exterior ring with extra vertices so no edge is longer than
    /// `max_segment_length`. Counter-clockwise from the bottom-left corner.
    pub fn densified_ring(&self, max_segment_length: f64) -> Vec<(f64, f64)> {
        let corners = [
            (self.xmin, self.ymin),
            (self.xmax, self.ymin),
            (self.xmax, self.ymax),
            (self.xmin, self.ymax),
            (self.xmin, self.ymin),
        ];

        let mut ring = Vec::new();
        for edge in corners.windows(2) {
            let (x0, y0) = edge[0];
            let (x1, y1) = edge[1];
            let length = ((x1 - x0).powi(2) + (y1 - y0).powi(2)).sqrt();
            let segments = if max_segment_length > 0.0 {
                (length / max_segment_length).ceil().max(1.0) as usize
            } else {
                1
            };
            for i in 0..segments {
                let t = i as f64 / segments as f64;
                ring.push((x0 + t * (x1 - x0), y0 + t * (y1 - y0)));
            }
        }
        ring.push(corners[4]);
        ring
    }

    /// WKT polygon of the box outline
    pub fn to_wkt(&self) -> String {
        ring_to_wkt(&self.densified_ring(0.0))
    }

    /// Bounds of a set of points; fails if they do not span a box
    pub fn from_points(xs: &[f64], ys: &[f64]) -> DemResult<BoundingBox> {
        let fold = |values: &[f64]| {
            values
                .iter()
                .filter(|v| v.is_finite())
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
        };
        let (xmin, xmax) = fold(xs);
        let (ymin, ymax) = fold(ys);
        BoundingBox::new(xmin, ymin, xmax, ymax)
    }
}

impl TryFrom<(f64, f64, f64, f64)> for BoundingBox {
    type Error = DemError;

    fn try_from(value: (f64, f64, f64, f64)) -> DemResult<Self> {
        BoundingBox::new(value.0, value.1, value.2, value.3)
    }
}

impl<'de> Deserialize<'de> for BoundingBox {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            xmin: f64,
            ymin: f64,
            xmax: f64,
            ymax: f64,
        }
        let raw = Raw::deserialize(deserializer)?;
        BoundingBox::new(raw.xmin, raw.ymin, raw.xmax, raw.ymax).map_err(serde::de::Error::custom)
    }
}

pub(crate) fn ring_to_wkt(ring: &[(f64, f64)]) -> String {
    let coords: Vec<String> = ring.iter().map(|(x, y)| format!("{} {}", x, y)).collect();
    format!("POLYGON (({}))", coords.join(", "))
}

/// Affine pixel -> world transform in GDAL coefficient order
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    /// North-up transform: translation to `origin` then scale
    pub fn from_origin(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            top_left_x: origin_x,
            pixel_width,
            rotation_x: 0.0,
            top_left_y: origin_y,
            rotation_y: 0.0,
            pixel_height,
        }
    }

    pub fn from_gdal(gt: [f64; 6]) -> Self {
        Self {
            top_left_x: gt[0],
            pixel_width: gt[1],
            rotation_x: gt[2],
            top_left_y: gt[3],
            rotation_y: gt[4],
            pixel_height: gt[5],
        }
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.top_left_x,
            self.pixel_width,
            self.rotation_x,
            self.top_left_y,
            self.rotation_y,
            self.pixel_height,
        ]
    }

    /// Pixel (col, row) -> world (x, y)
    pub fn pixel_to_world(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.top_left_x + col * self.pixel_width + row * self.rotation_x,
            self.top_left_y + col * self.rotation_y + row * self.pixel_height,
        )
    }

    /// World (x, y) -> pixel (col, row)
    pub fn world_to_pixel(&self, x: f64, y: f64) -> DemResult<(f64, f64)> {
        let det = self.pixel_width * self.pixel_height - self.rotation_x * self.rotation_y;
        if det == 0.0 {
            return Err(DemError::Processing(format!(
                "geotransform {:?} is not invertible",
                self
            )));
        }
        let dx = x - self.top_left_x;
        let dy = y - self.top_left_y;
        let col = (dx * self.pixel_height - dy * self.rotation_x) / det;
        let row = (dy * self.pixel_width - dx * self.rotation_y) / det;
        Ok((col, row))
    }

    /// Same scale, origin moved by a (possibly fractional) number of pixels
    pub fn shifted_by_pixels(&self, cols: f64, rows: f64) -> Self {
        let (x, y) = self.pixel_to_world(cols, rows);
        Self {
            top_left_x: x,
            top_left_y: y,
            ..*self
        }
    }

    /// Largest absolute pixel dimension
    pub fn resolution(&self) -> f64 {
        self.pixel_width.abs().max(self.pixel_height.abs())
    }
}

/// Strongly typed raster profile
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RasterGrid {
    pub width: usize,
    pub height: usize,
    pub transform: GeoTransform,
    pub crs: Crs,
    pub nodata: f64,
    pub convention: PixelConvention,
}

impl RasterGrid {
    /// Area-convention grid with NaN nodata
    pub fn new(width: usize, height: usize, transform: GeoTransform, crs: Crs) -> DemResult<Self> {
        if width == 0 || height == 0 {
            return Err(DemError::Processing(format!(
                "raster grid must be non-empty, got {}x{}",
                width, height
            )));
        }
        Ok(Self {
            width,
            height,
            transform,
            crs,
            nodata: f64::NAN,
            convention: PixelConvention::Area,
        })
    }

    /// `(rows, cols)` as used by ndarray
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    /// World bounds of the grid's outer pixel edges
    pub fn bounds(&self) -> BoundingBox {
        let (x0, y0) = self.transform.pixel_to_world(0.0, 0.0);
        let (x1, y1) = self.transform.pixel_to_world(self.width as f64, self.height as f64);
        BoundingBox {
            xmin: x0.min(x1),
            ymin: y0.min(y1),
            xmax: x0.max(x1),
            ymax: y0.max(y1),
        }
    }

    /// Grow by `pixels` on every side, keeping the pixel grid
    pub fn buffered(&self, pixels: usize) -> Self {
        let p = pixels as f64;
        Self {
            width: self.width + 2 * pixels,
            height: self.height + 2 * pixels,
            transform: self.transform.shifted_by_pixels(-p, -p),
            ..*self
        }
    }

    /// World coordinates of the centre of pixel (col, row)
    pub fn pixel_center(&self, col: usize, row: usize) -> (f64, f64) {
        self.transform.pixel_to_world(col as f64 + 0.5, row as f64 + 0.5)
    }
}

/// Elevation raster together with its grid
#[derive(Debug, Clone)]
pub struct DemProduct {
    pub array: ElevationArray,
    pub grid: RasterGrid,
}

/// Error types for DEM preparation
#[derive(Debug, thiserror::Error)]
pub enum DemError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid bounding box: {0}")]
    InvalidBounds(String),

    #[error("cannot resolve latitude {0} to a pixel spacing")]
    InvalidLatitude(f64),

    #[error("Coverage error: {0}")]
    Coverage(String),

    #[error("File does not exist: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("Download error: {0}")]
    Download(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML parsing error: {0}")]
    XmlParsing(String),
}

/// Result type for DEM operations
pub type DemResult<T> = Result<T, DemError>;

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn rejects_inverted_bounds() {
        assert!(matches!(
            BoundingBox::new(10.0, 0.0, 5.0, 1.0),
            Err(DemError::InvalidBounds(_))
        ));
        assert!(BoundingBox::new(0.0, 1.0, 1.0, 1.0).is_err());
        assert!(BoundingBox::new(f64::NAN, 0.0, 1.0, 1.0).is_err());
    }

    #[test]
    fn densified_ring_is_closed_and_short() {
        let bbox = BoundingBox::new(0.0, 0.0, 1.0, 0.5).unwrap();
        let ring = bbox.densified_ring(0.1);
        assert_eq!(ring.first(), ring.last());
        for pair in ring.windows(2) {
            let d = ((pair[1].0 - pair[0].0).powi(2) + (pair[1].1 - pair[0].1).powi(2)).sqrt();
            assert!(d <= 0.1 + 1e-12);
        }
        // 10 + 5 + 10 + 5 segments plus the closing vertex
        assert_eq!(ring.len(), 31);
    }

    #[test]
    fn geotransform_round_trip() {
        let gt = GeoTransform::from_origin(160.0, -69.0, 0.5, -0.25);
        let (x, y) = gt.pixel_to_world(3.0, 4.0);
        assert_abs_diff_eq!(x, 161.5);
        assert_abs_diff_eq!(y, -70.0);
        let (col, row) = gt.world_to_pixel(x, y).unwrap();
        assert_abs_diff_eq!(col, 3.0);
        assert_abs_diff_eq!(row, 4.0);
    }

    #[test]
    fn grid_bounds_and_buffer() {
        let gt = GeoTransform::from_origin(10.0, 20.0, 1.0, -1.0);
        let grid = RasterGrid::new(4, 3, gt, Crs::WGS84).unwrap();
        assert_eq!(grid.bounds().bounds(), (10.0, 17.0, 14.0, 20.0));
        let buffered = grid.buffered(2);
        assert_eq!(buffered.shape(), (7, 8));
        assert_eq!(buffered.bounds().bounds(), (8.0, 15.0, 16.0, 22.0));
    }
}
