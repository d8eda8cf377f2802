//! Elevation tile lookup
//!
//! Two strategies resolve the tiles covering a bounding box: a vector tile
//! index queried by intersection, and filename construction from the integer
//! degree grid. Both return the same tiles for the same inputs.

use crate::core::grid::tile_footprint;
use crate::io::download::Downloader;
use crate::io::tile_index::find_tiles;
use crate::types::{BoundingBox, DemResult};
use std::path::{Path, PathBuf};

/// One elevation tile and the area it covers (WGS 84, area convention)
#[derive(Debug, Clone, PartialEq)]
pub struct TileReference {
    pub path: PathBuf,
    pub footprint: BoundingBox,
}

/// Resolves the tiles intersecting a bounding box
pub trait TileLocator {
    /// Tiles whose footprint intersects `bbox` grown by `search_buffer` degrees,
    /// sorted by path. An empty result means the area has no elevation data.
    fn tiles_for(&self, bbox: &BoundingBox, search_buffer: f64) -> DemResult<Vec<TileReference>>;
}

/// Canonical GLO-30 tile stem for the cell whose south-west corner is `(lat, lon)`
pub fn tile_name(lat: i32, lon: i32) -> String {
    let ns = if lat < 0 { 'S' } else { 'N' };
    let ew = if lon < 0 { 'W' } else { 'E' };
    format!(
        "Copernicus_DSM_COG_10_{}{:02}_00_{}{:03}_00_DEM",
        ns,
        lat.unsigned_abs(),
        ew,
        lon.unsigned_abs()
    )
}

/// Integer-degree cells `(lat, lon)` whose tile footprint intersects `bbox`
pub fn tile_cells(bbox: &BoundingBox) -> DemResult<Vec<(i32, i32)>> {
    // footprints sit half a pixel off the integer grid, so look one cell beyond
    let lat_start = ((bbox.ymin().floor() as i32) - 1).max(-90);
    let lat_end = (bbox.ymax().floor() as i32).min(89);
    let lon_start = ((bbox.xmin().floor() as i32) - 1).max(-180);
    let lon_end = (bbox.xmax().floor() as i32).min(179);

    let mut cells = Vec::new();
    for lat in lat_start..=lat_end {
        for lon in lon_start..=lon_end {
            if tile_footprint(lat, lon)?.intersects(bbox) {
                cells.push((lat, lon));
            }
        }
    }
    Ok(cells)
}

/// Local path of a tile stem under `root`
pub fn tile_path(root: &Path, stem: &str, in_subfolder: bool) -> PathBuf {
    let filename = format!("{}.tif", stem);
    if in_subfolder {
        root.join(stem).join(filename)
    } else {
        root.join(filename)
    }
}

/// Keep tiles present on disk, fetching missing ones when downloads are enabled
fn resolve_local(
    candidates: Vec<TileReference>,
    downloader: Option<&Downloader>,
) -> DemResult<Vec<TileReference>> {
    let mut local = Vec::with_capacity(candidates.len());
    let mut missing = 0usize;

    for tile in candidates {
        if tile.path.exists() {
            local.push(tile);
            continue;
        }
        match downloader {
            Some(downloader) => {
                let stem = tile
                    .path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                if downloader.download_tile(&stem, &tile.path)? {
                    local.push(tile);
                } else {
                    missing += 1;
                }
            }
            None => {
                log::debug!("Tile not found locally: {}", tile.path.display());
                missing += 1;
            }
        }
    }

    log::info!("Number of tiles existing locally : {}", local.len());
    log::info!("Number of tiles missing locally : {}", missing);
    local.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(local)
}

/// Tiles found by constructing canonical names under a folder
#[derive(Debug, Clone)]
pub struct FolderTileLocator {
    root: PathBuf,
    in_subfolder: bool,
    downloader: Option<Downloader>,
}

impl FolderTileLocator {
    pub fn new(root: PathBuf, in_subfolder: bool, download: bool, downloader: Downloader) -> Self {
        Self {
            root,
            in_subfolder,
            downloader: download.then_some(downloader),
        }
    }
}

impl TileLocator for FolderTileLocator {
    fn tiles_for(&self, bbox: &BoundingBox, search_buffer: f64) -> DemResult<Vec<TileReference>> {
        let search = bbox.buffer(search_buffer, search_buffer)?;
        let mut candidates = Vec::new();
        for (lat, lon) in tile_cells(&search)? {
            let stem = tile_name(lat, lon);
            candidates.push(TileReference {
                path: tile_path(&self.root, &stem, self.in_subfolder),
                footprint: tile_footprint(lat, lon)?,
            });
        }
        log::info!(
            "{} tile names cover {:?} (search buffer {})",
            candidates.len(),
            bbox.bounds(),
            search_buffer
        );
        resolve_local(candidates, self.downloader.as_ref())
    }
}

/// Tiles found by querying a vector footprint index
#[derive(Debug, Clone)]
pub struct IndexTileLocator {
    index: PathBuf,
    root: PathBuf,
    in_subfolder: bool,
    downloader: Option<Downloader>,
}

impl IndexTileLocator {
    pub fn new(
        index: PathBuf,
        root: PathBuf,
        in_subfolder: bool,
        download: bool,
        downloader: Downloader,
    ) -> Self {
        Self {
            index,
            root,
            in_subfolder,
            downloader: download.then_some(downloader),
        }
    }

    /// Absolute `location` values are used as is; bare filenames resolve under the root
    fn resolve_location(&self, location: &str) -> PathBuf {
        let path = Path::new(location);
        if path.is_absolute() {
            return path.to_path_buf();
        }
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| location.to_string());
        let filename = path.file_name().map(PathBuf::from).unwrap_or_else(|| path.to_path_buf());
        if self.in_subfolder {
            self.root.join(stem).join(filename)
        } else {
            self.root.join(filename)
        }
    }
}

impl TileLocator for IndexTileLocator {
    fn tiles_for(&self, bbox: &BoundingBox, search_buffer: f64) -> DemResult<Vec<TileReference>> {
        let search = bbox.buffer(search_buffer, search_buffer)?;
        let entries = find_tiles(&self.index, &search)?;
        log::info!(
            "Number of tiles found in {} intersecting bounds : {}",
            self.index.display(),
            entries.len()
        );

        let candidates = entries
            .into_iter()
            .map(|entry| TileReference {
                path: self.resolve_location(&entry.location),
                footprint: entry.footprint,
            })
            .collect();
        resolve_local(candidates, self.downloader.as_ref())
    }
}
