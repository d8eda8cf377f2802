use crate::io::raster::{read_dataset_window, write_geotiff};
use crate::types::{BoundingBox, DemError, DemResult};
use gdal::Dataset;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

/// Extra degrees read around the requested bounds when fetching the geoid
const GEOID_FETCH_MARGIN_DEGREES: f64 = 1.0;

/// Fetches elevation tiles and the geoid from public object storage
#[derive(Debug, Clone)]
pub struct Downloader {
    tile_url: String,
    geoid_url: String,
    timeout: Duration,
}

impl Downloader {
    pub fn new(tile_url: String, geoid_url: String, timeout_secs: u64) -> Self {
        Self {
            tile_url: tile_url.trim_end_matches('/').to_string(),
            geoid_url,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    fn client(&self) -> DemResult<reqwest::blocking::Client> {
        reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("sarprep/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DemError::Download(format!("Failed to create HTTP client: {}", e)))
    }

    /// URL of a tile in the `<stem>/<stem>.tif` bucket layout
    pub fn tile_url(&self, stem: &str) -> String {
        format!("{}/{}/{}.tif", self.tile_url, stem, stem)
    }

    /// Download one tile to `destination`.
    ///
    /// Returns `Ok(false)` when the store has no such tile (HTTP 404), which
    /// happens for cells entirely over water.
    pub fn download_tile(&self, stem: &str, destination: &Path) -> DemResult<bool> {
        let url = self.tile_url(stem);
        log::info!("Downloading tile {} from {}", stem, url);

        let response = self
            .client()?
            .get(&url)
            .send()
            .map_err(|e| DemError::Download(format!("HTTP request failed for {}: {}", url, e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            log::info!("Tile {} not present in the store, treating it as ocean", stem);
            return Ok(false);
        }
        if !response.status().is_success() {
            return Err(DemError::Download(format!(
                "HTTP {} {}: {}",
                response.status().as_u16(),
                response.status().canonical_reason().unwrap_or(""),
                url
            )));
        }

        let content = response
            .bytes()
            .map_err(|e| DemError::Download(format!("Failed to read response body: {}", e)))?;
        log::debug!("Downloaded {} bytes", content.len());

        write_atomically(destination, &content)?;
        Ok(true)
    }

    /// Fetch the part of the remote geoid covering `bounds` and store it at `destination`.
    ///
    /// GDAL reads the cloud optimised GeoTIFF over HTTP range requests, so only
    /// the needed window is transferred.
    pub fn download_geoid(&self, destination: &Path, bounds: &BoundingBox) -> DemResult<()> {
        let remote = format!("/vsicurl/{}", self.geoid_url);
        log::info!("Downloading geoid window {:?} from {}", bounds.bounds(), self.geoid_url);

        let dataset = Dataset::open(Path::new(&remote))
            .map_err(|e| DemError::Download(format!("Failed to open {}: {}", remote, e)))?;
        let margin = BoundingBox::new(
            (bounds.xmin() - GEOID_FETCH_MARGIN_DEGREES).max(-180.0),
            (bounds.ymin() - GEOID_FETCH_MARGIN_DEGREES).max(-90.0),
            (bounds.xmax() + GEOID_FETCH_MARGIN_DEGREES).min(180.0),
            (bounds.ymax() + GEOID_FETCH_MARGIN_DEGREES).min(90.0),
        )?;
        let window = read_dataset_window(&dataset, &margin, 0)?;

        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent)?;
        }
        write_geotiff(destination, &window)
    }
}

/// Write `content` next to `destination` and rename it into place
pub fn write_atomically(destination: &Path, content: &[u8]) -> DemResult<()> {
    let parent = destination
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(destination).map_err(|e| DemError::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn tile_urls_follow_bucket_layout() {
        let downloader = Downloader::new("https://bucket.example/".to_string(), String::new(), 10);
        assert_eq!(
            downloader.tile_url("Copernicus_DSM_COG_10_S70_00_E161_00_DEM"),
            "https://bucket.example/Copernicus_DSM_COG_10_S70_00_E161_00_DEM/Copernicus_DSM_COG_10_S70_00_E161_00_DEM.tif"
        );
    }

    #[test]
    fn atomic_write_creates_parents() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("a").join("b").join("tile.tif");
        write_atomically(&target, b"abc").unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"abc");
        // nothing else left behind
        assert_eq!(std::fs::read_dir(target.parent().unwrap()).unwrap().count(), 1);
    }
}
