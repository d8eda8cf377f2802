//! Core DEM processing modules

pub mod antimeridian;
pub mod geoid;
pub mod grid;
pub mod high_lat;
pub mod mosaic;
pub mod pipeline;
pub mod reproject;
pub mod spatial;

// Re-export main types
pub use antimeridian::{crosses_antimeridian, split_at_antimeridian, target_crs, AntimeridianSplit};
pub use geoid::{geoid_covers, remove_geoid};
pub use grid::{buffer_bounds, clamp_to_globe, cop_glo30_spacing, expand_bounding_box_to_pixel_edges, longitude_multiplier};
pub use high_lat::expand_bounds_at_high_lat;
pub use mosaic::{check_coverage, mosaic};
pub use pipeline::DemBuilder;
pub use reproject::{merge_rasters, reproject_raster};
pub use spatial::{transform_bounds, CrsTransformer};
