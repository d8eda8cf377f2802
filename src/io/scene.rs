//! Sentinel-1 scene identifiers and footprints

use crate::types::{BoundingBox, DemError, DemResult};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use zip::ZipArchive;

/// Timestamp layout used in Sentinel-1 product and orbit names
pub const S1_TIME_FORMAT: &str = "%Y%m%dT%H%M%S";

pub(crate) fn parse_s1_time(value: &str) -> DemResult<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(value, S1_TIME_FORMAT)
        .map_err(|e| DemError::Parse(format!("invalid timestamp '{}': {}", value, e)))?;
    Ok(Utc.from_utc_datetime(&naive))
}

fn regex(pattern: &str) -> DemResult<Regex> {
    Regex::new(pattern).map_err(|e| DemError::Parse(format!("invalid pattern {}: {}", pattern, e)))
}

/// Parsed scene name, e.g. `S1A_EW_GRDM_1SDH_20220612T120348_20220612T120452_043629_053582_0F6E`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneId {
    pub id: String,
    /// S1A, S1B, S1C or S1D
    pub sensor: String,
    /// Acquisition mode (IW, EW, SM, WV)
    pub mode: String,
    pub start: DateTime<Utc>,
    pub stop: DateTime<Utc>,
}

impl SceneId {
    pub fn parse(scene_id: &str) -> DemResult<Self> {
        let sensor = regex(r"^(S1[ABCD])_")?
            .captures(scene_id)
            .map(|c| c[1].to_string())
            .ok_or_else(|| {
                DemError::Parse(format!(
                    "No valid sensor was found in the scene ID {}. Valid sensors are S1A, S1B, S1C, or S1D",
                    scene_id
                ))
            })?;

        let dates = regex(r"(\d{8}T\d{6})_(\d{8}T\d{6})_")?
            .captures(scene_id)
            .ok_or_else(|| {
                DemError::Parse(format!("scene ID {} has no start/stop timestamps", scene_id))
            })?;
        let start = parse_s1_time(&dates[1])?;
        let stop = parse_s1_time(&dates[2])?;

        let mode = scene_id.split('_').nth(1).unwrap_or_default().to_string();

        Ok(Self {
            id: scene_id.to_string(),
            sensor,
            mode,
            start,
            stop,
        })
    }
}

/// Locate `<scene_id>.zip` under the `<root>/<YYYY>/<YYYY-MM>/` archive layout.
///
/// Exactly one match is expected.
pub fn find_scene_file<P: AsRef<Path>>(scene_root: P, scene: &SceneId) -> DemResult<PathBuf> {
    let search = scene_root
        .as_ref()
        .join(scene.start.format("%Y").to_string())
        .join(scene.start.format("%Y-%m").to_string());
    let filename = format!("{}.zip", scene.id);

    let mut found = Vec::new();
    find_files_named(&search, &filename, &mut found)?;
    match found.len() {
        1 => Ok(found.remove(0)),
        0 => Err(DemError::MissingFile(search.join(filename))),
        n => Err(DemError::Processing(format!(
            "{} files named {} under {}. Review before proceeding",
            n,
            filename,
            search.display()
        ))),
    }
}

fn find_files_named(dir: &Path, filename: &str, found: &mut Vec<PathBuf>) -> DemResult<()> {
    if !dir.is_dir() {
        return Ok(());
    }
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            find_files_named(&path, filename, found)?;
        } else if path.file_name().map(|n| n == filename).unwrap_or(false) {
            found.push(path);
        }
    }
    Ok(())
}

/// Bounding box of the footprint in a scene zip's `manifest.safe`.
///
/// The footprint is the `gml:coordinates` list of `lat,lon` pairs.
pub fn scene_footprint<P: AsRef<Path>>(zip_path: P) -> DemResult<BoundingBox> {
    let file = File::open(zip_path.as_ref())?;
    let mut archive = ZipArchive::new(file)?;

    let manifest_name = archive
        .file_names()
        .find(|name| name.ends_with("manifest.safe"))
        .map(str::to_string)
        .ok_or_else(|| {
            DemError::MissingFile(zip_path.as_ref().join("manifest.safe"))
        })?;

    let mut manifest = String::new();
    archive.by_name(&manifest_name)?.read_to_string(&mut manifest)?;
    footprint_from_manifest(&manifest)
}

pub(crate) fn footprint_from_manifest(manifest: &str) -> DemResult<BoundingBox> {
    let coordinates = regex(r"<gml:coordinates>([^<]+)</gml:coordinates>")?
        .captures(manifest)
        .map(|c| c[1].to_string())
        .ok_or_else(|| DemError::XmlParsing("manifest has no gml:coordinates footprint".to_string()))?;

    let mut lons = Vec::new();
    let mut lats = Vec::new();
    for pair in coordinates.split_whitespace() {
        let (lat, lon) = pair
            .split_once(',')
            .ok_or_else(|| DemError::XmlParsing(format!("malformed footprint coordinate '{}'", pair)))?;
        let parse = |v: &str| {
            v.trim()
                .parse::<f64>()
                .map_err(|e| DemError::XmlParsing(format!("invalid coordinate '{}': {}", v, e)))
        };
        lats.push(parse(lat)?);
        lons.push(parse(lon)?);
    }
    BoundingBox::from_points(&lons, &lats)
}

/// What scene discovery hands to the DEM engine
#[derive(Debug, Clone, PartialEq)]
pub struct SceneInfo {
    pub start: DateTime<Utc>,
    pub stop: DateTime<Utc>,
    pub sensor: String,
    pub bounds: BoundingBox,
}

impl SceneInfo {
    pub fn from_zip<P: AsRef<Path>>(zip_path: P) -> DemResult<Self> {
        let zip_path = zip_path.as_ref();
        let stem = zip_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| DemError::Parse(format!("no scene name in {}", zip_path.display())))?;
        let scene = SceneId::parse(&stem)?;
        let bounds = scene_footprint(zip_path)?;
        log::info!("Scene {} covers {:?}", scene.id, bounds.bounds());
        Ok(Self {
            start: scene.start,
            stop: scene.stop,
            sensor: scene.sensor,
            bounds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    const SCENE: &str = "S1A_EW_GRDM_1SDH_20220612T120348_20220612T120452_043629_053582_0F6E";

    #[test]
    fn parses_sensor_mode_and_window() {
        let scene = SceneId::parse(SCENE).unwrap();
        assert_eq!(scene.sensor, "S1A");
        assert_eq!(scene.mode, "EW");
        assert_eq!((scene.start.year(), scene.start.month(), scene.start.day()), (2022, 6, 12));
        assert_eq!((scene.start.hour(), scene.start.minute(), scene.start.second()), (12, 3, 48));
        assert_eq!(scene.stop.minute(), 4);
        assert_eq!(scene.stop.second(), 52);
    }

    #[test]
    fn rejects_unknown_sensor_and_missing_dates() {
        assert!(matches!(SceneId::parse("S2A_MSIL1C_20220612T120348"), Err(DemError::Parse(_))));
        assert!(matches!(SceneId::parse("S1A_EW_GRDM_1SDH"), Err(DemError::Parse(_))));
    }

    #[test]
    fn manifest_footprint_bounds() {
        let manifest = r#"<safe:frame><safe:footPrint srsName="http://www.opengis.net/gml/srs/epsg.xml#4326">
            <gml:coordinates>-69.0,161.5 -68.5,158.0 -70.9,156.4 -71.4,160.2</gml:coordinates>
            </safe:footPrint></safe:frame>"#;
        let bounds = footprint_from_manifest(manifest).unwrap();
        assert_eq!(bounds.bounds(), (156.4, -71.4, 161.5, -68.5));
    }
}
