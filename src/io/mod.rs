//! Input/output modules for elevation tiles, rasters and Sentinel-1 products

pub mod download;
pub mod orbit;
pub mod raster;
pub mod scene;
pub mod tile_index;
pub mod tiles;
pub mod vrt;

// Re-export main types
pub use download::Downloader;
pub use orbit::{find_latest_orbit_covering_window, find_latest_orbit_for_scene, find_orbits, OrbitFile, OrbitType};
pub use raster::{read_raster, read_raster_window, write_geotiff};
pub use scene::{find_scene_file, scene_footprint, SceneId, SceneInfo};
pub use tile_index::{build_tile_index, build_tile_index_in, find_tiles, TileIndexEntry};
pub use tiles::{tile_name, FolderTileLocator, IndexTileLocator, TileLocator, TileReference};
pub use vrt::{VrtBuilder, VrtSource};
