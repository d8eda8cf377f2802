//! Engine configuration

use crate::io::tiles::{FolderTileLocator, IndexTileLocator, TileLocator};
use crate::types::{DemError, DemResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Public Copernicus GLO-30 bucket (no authentication)
pub const COP30_TILE_URL: &str = "https://copernicus-dem-30m.s3.eu-central-1.amazonaws.com";

/// EGM2008 geoid as a cloud optimised GeoTIFF
pub const EGM08_GEOID_URL: &str =
    "https://aria-geoid.s3.us-west-2.amazonaws.com/us_nga_egm2008_1_4326__agisoft.tif";

/// Vertical reference of the returned heights
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeightReference {
    /// Heights above the WGS 84 ellipsoid (geoid added back)
    Ellipsoidal,
    /// Heights above the geoid, as stored in the tiles
    Orthometric,
}

/// Everything the DEM engine needs, passed in at construction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemConfig {
    pub tile_folder: Option<PathBuf>,
    pub tile_index: Option<PathBuf>,
    pub tiles_in_subfolder: bool,
    pub geoid_path: Option<PathBuf>,
    pub heights: HeightReference,
    pub adjust_at_high_lat: bool,
    pub buffer_pixels: Option<u32>,
    pub buffer_degrees: Option<f64>,
    pub search_buffer: f64,
    pub max_scene_width: f64,
    pub antimeridian_lat_buffer: f64,
    pub geoid_buffer_pixels: u32,
    pub download_dem_tiles: bool,
    pub download_geoid: bool,
    pub tile_url: String,
    pub geoid_url: String,
    pub download_timeout_secs: u64,
    pub cache_dir: Option<PathBuf>,
}

impl Default for DemConfig {
    fn default() -> Self {
        Self {
            tile_folder: None,
            tile_index: None,
            tiles_in_subfolder: true,
            geoid_path: None,
            heights: HeightReference::Ellipsoidal,
            adjust_at_high_lat: true,
            buffer_pixels: Some(10),
            buffer_degrees: None,
            search_buffer: 0.3,
            max_scene_width: 8.0,
            antimeridian_lat_buffer: 0.0,
            geoid_buffer_pixels: 2,
            download_dem_tiles: false,
            download_geoid: false,
            tile_url: COP30_TILE_URL.to_string(),
            geoid_url: EGM08_GEOID_URL.to_string(),
            download_timeout_secs: 300,
            cache_dir: None,
        }
    }
}

impl DemConfig {
    /// Orthometric heights from a local tile folder, default buffering
    pub fn for_tile_folder<P: Into<PathBuf>>(folder: P) -> Self {
        Self {
            tile_folder: Some(folder.into()),
            heights: HeightReference::Orthometric,
            ..Default::default()
        }
    }

    /// Fail fast on settings the engine cannot work with
    pub fn validate(&self) -> DemResult<()> {
        if self.tile_folder.is_none() && self.tile_index.is_none() {
            return Err(DemError::Config(
                "either a tile folder or a tile index must be provided".to_string(),
            ));
        }
        if self.tile_index.is_some() && self.tile_folder.is_none() && self.cache_dir().is_none() {
            return Err(DemError::Config(
                "a tile index with bare filenames needs a tile folder or cache directory".to_string(),
            ));
        }
        if !(self.search_buffer >= 0.0) {
            return Err(DemError::Config(format!(
                "search buffer must be non-negative, got {}",
                self.search_buffer
            )));
        }
        if !(self.max_scene_width > 0.0 && self.max_scene_width < 180.0) {
            return Err(DemError::Config(format!(
                "max scene width must be in (0, 180), got {}",
                self.max_scene_width
            )));
        }
        if let Some(degrees) = self.buffer_degrees {
            if !(degrees >= 0.0) {
                return Err(DemError::Config(format!(
                    "degree buffer must be non-negative, got {}",
                    degrees
                )));
            }
        }
        if self.heights == HeightReference::Ellipsoidal
            && self.geoid_path.is_none()
            && !self.download_geoid
        {
            return Err(DemError::Config(
                "ellipsoidal heights need a geoid path or download_geoid = true".to_string(),
            ));
        }
        Ok(())
    }

    /// Where tile downloads land when no tile folder is configured
    pub fn cache_dir(&self) -> Option<PathBuf> {
        self.cache_dir
            .clone()
            .or_else(|| dirs::cache_dir().map(|dir| dir.join("sarprep")))
    }

    /// Folder holding (or receiving) the elevation tiles
    pub fn tile_root(&self) -> DemResult<PathBuf> {
        self.tile_folder
            .clone()
            .or_else(|| self.cache_dir().map(|dir| dir.join("copernicus_30m_world")))
            .ok_or_else(|| DemError::Config("no tile folder and no cache directory".to_string()))
    }

    /// Index lookup when an index is configured, filename construction otherwise
    pub fn locator(&self) -> DemResult<Box<dyn TileLocator>> {
        let root = self.tile_root()?;
        match &self.tile_index {
            Some(index) => Ok(Box::new(IndexTileLocator::new(
                index.clone(),
                root,
                self.tiles_in_subfolder,
                self.download_dem_tiles,
                self.downloader(),
            ))),
            None => Ok(Box::new(FolderTileLocator::new(
                root,
                self.tiles_in_subfolder,
                self.download_dem_tiles,
                self.downloader(),
            ))),
        }
    }

    pub(crate) fn downloader(&self) -> crate::io::download::Downloader {
        crate::io::download::Downloader::new(
            self.tile_url.clone(),
            self.geoid_url.clone(),
            self.download_timeout_secs,
        )
    }
}
