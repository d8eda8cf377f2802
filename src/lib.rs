//! sarprep: Copernicus GLO-30 DEM preparation for Sentinel-1 processing
//!
//! Builds elevation rasters for arbitrary bounding boxes from 1° Copernicus
//! tiles, with the corrections polar scenes need: bounds expansion at high
//! latitudes, splitting and re-merging across the antimeridian, and geoid
//! removal for ellipsoidal heights.

pub mod config;
pub mod core;
pub mod io;
pub mod types;

#[cfg(feature = "python")]
mod python;

// Re-export main types
pub use config::{DemConfig, HeightReference};
pub use crate::core::DemBuilder;
pub use types::{BoundingBox, Crs, DemError, DemProduct, DemResult, GeoTransform, PixelConvention, RasterGrid};
