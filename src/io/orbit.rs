use crate::io::scene::{parse_s1_time, SceneId};
use crate::types::{DemError, DemResult};
use chrono::{DateTime, Utc};
use regex::Regex;
use std::path::{Path, PathBuf};

/// Orbit file types available from ESA
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum OrbitType {
    /// Precise Orbit Ephemerides (best accuracy, ~20 days delay)
    POEORB,
    /// Restituted Orbit Ephemerides (lower accuracy, ~3 hours delay)
    RESORB,
}

impl std::fmt::Display for OrbitType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrbitType::POEORB => write!(f, "POEORB"),
            OrbitType::RESORB => write!(f, "RESORB"),
        }
    }
}

/// Orbit file metadata parsed from its name, e.g.
/// `S1A_OPER_AUX_POEORB_OPOD_20141207T123431_V20141115T225944_20141117T005944.EOF`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrbitFile {
    pub path: PathBuf,
    pub orbit_type: Option<OrbitType>,
    pub published: DateTime<Utc>,
    pub start: DateTime<Utc>,
    pub stop: DateTime<Utc>,
}

impl OrbitFile {
    pub fn parse<P: AsRef<Path>>(path: P) -> DemResult<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        let pattern = Regex::new(r"(\d{8}T\d{6})_V(\d{8}T\d{6})_(\d{8}T\d{6})\.EOF")
            .map_err(|e| DemError::Parse(format!("invalid orbit pattern: {}", e)))?;
        let captures = pattern.captures(&name).ok_or_else(|| {
            DemError::Parse(format!("{} does not match the expected orbit file format", name))
        })?;

        let orbit_type = if name.contains("POEORB") {
            Some(OrbitType::POEORB)
        } else if name.contains("RESORB") {
            Some(OrbitType::RESORB)
        } else {
            None
        };

        Ok(Self {
            path: path.to_path_buf(),
            orbit_type,
            published: parse_s1_time(&captures[1])?,
            start: parse_s1_time(&captures[2])?,
            stop: parse_s1_time(&captures[3])?,
        })
    }

    /// Whether the orbit's validity spans the whole window
    pub fn covers(&self, start: DateTime<Utc>, stop: DateTime<Utc>) -> bool {
        start >= self.start && stop <= self.stop
    }
}

/// Files with `extension` directly inside each directory (missing directories are skipped)
pub fn find_orbits(directories: &[PathBuf], extension: &str) -> DemResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for directory in directories.iter().filter(|d| d.is_dir()) {
        for entry in std::fs::read_dir(directory)? {
            let path = entry?.path();
            let matches = path
                .file_name()
                .map(|n| n.to_string_lossy().ends_with(extension))
                .unwrap_or(false);
            if matches && path.is_file() {
                files.push(path);
            }
        }
    }
    files.sort();
    log::debug!("Found {} orbit files", files.len());
    Ok(files)
}

/// Latest published orbit among `orbit_files` covering `[start, stop]`.
///
/// Precise orbits win over restituted ones when both cover the window.
/// Unparseable names are skipped with a warning.
pub fn find_latest_orbit_covering_window(
    orbit_files: &[PathBuf],
    start: DateTime<Utc>,
    stop: DateTime<Utc>,
) -> DemResult<PathBuf> {
    let mut covering = Vec::new();
    for file in orbit_files {
        match OrbitFile::parse(file) {
            Ok(orbit) if orbit.covers(start, stop) => covering.push(orbit),
            Ok(_) => {}
            Err(e) => log::warn!("Skipping orbit file: {}", e),
        }
    }

    if covering.iter().any(|o| o.orbit_type == Some(OrbitType::POEORB)) {
        covering.retain(|o| o.orbit_type == Some(OrbitType::POEORB));
    }

    covering
        .into_iter()
        .max_by_key(|o| o.published)
        .map(|o| {
            log::info!("Found orbit file: {}", o.path.display());
            o.path
        })
        .ok_or_else(|| {
            DemError::Processing(format!(
                "No orbits were found within the specified time window {} - {}",
                start, stop
            ))
        })
}

/// Latest orbit covering the acquisition window of `scene_id`
pub fn find_latest_orbit_for_scene(scene_id: &str, orbit_files: &[PathBuf]) -> DemResult<PathBuf> {
    let scene = SceneId::parse(scene_id)?;
    find_latest_orbit_covering_window(orbit_files, scene.start, scene.stop)
}

#[cfg(test)]
mod tests {
    use super::*;

    const POE: &str = "S1A_OPER_AUX_POEORB_OPOD_20141207T123431_V20141115T225944_20141117T005944.EOF";

    #[test]
    fn parses_orbit_name() {
        let orbit = OrbitFile::parse(Path::new("/orbits/POEORB/S1A").join(POE)).unwrap();
        assert_eq!(orbit.orbit_type, Some(OrbitType::POEORB));
        assert_eq!(orbit.published, parse_s1_time("20141207T123431").unwrap());
        assert_eq!(orbit.start, parse_s1_time("20141115T225944").unwrap());
        assert_eq!(orbit.stop, parse_s1_time("20141117T005944").unwrap());
    }

    #[test]
    fn rejects_other_names() {
        assert!(matches!(OrbitFile::parse("notes.txt"), Err(DemError::Parse(_))));
    }

    #[test]
    fn window_must_be_inside_validity() {
        let orbit = OrbitFile::parse(POE).unwrap();
        let t = |s| parse_s1_time(s).unwrap();
        assert!(orbit.covers(t("20141116T000000"), t("20141116T000100")));
        assert!(!orbit.covers(t("20141115T225900"), t("20141116T000100")));
        assert!(!orbit.covers(t("20141117T005900"), t("20141117T010000")));
    }
}
