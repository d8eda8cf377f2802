//! Python bindings (`sarprep._core`)

use crate::config::{DemConfig, HeightReference};
use crate::core::DemBuilder;
use crate::io::{find_latest_orbit_for_scene, SceneInfo};
use crate::types::{BoundingBox, DemError};
use numpy::ToPyArray;
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;
use std::path::PathBuf;

fn to_py_err(e: DemError) -> PyErr {
    match e {
        DemError::InvalidBounds(_) | DemError::Config(_) | DemError::Parse(_) => {
            PyErr::new::<PyValueError, _>(format!("{}", e))
        }
        _ => PyErr::new::<PyRuntimeError, _>(format!("{}", e)),
    }
}

/// DEM for `bounds = (xmin, ymin, xmax, ymax)` as a dict with
/// `data`, `transform` (GDAL order), `crs` (EPSG code) and `nodata`
#[pyfunction]
#[pyo3(signature = (
    bounds,
    tile_folder = None,
    tile_index = None,
    ellipsoid_heights = true,
    geoid_path = None,
    output_path = None,
    buffer_pixels = Some(10),
    adjust_at_high_lat = true,
    download_dem_tiles = false,
    download_geoid = false,
))]
#[allow(clippy::too_many_arguments)]
fn get_dem_for_bounds(
    py: Python,
    bounds: (f64, f64, f64, f64),
    tile_folder: Option<PathBuf>,
    tile_index: Option<PathBuf>,
    ellipsoid_heights: bool,
    geoid_path: Option<PathBuf>,
    output_path: Option<PathBuf>,
    buffer_pixels: Option<u32>,
    adjust_at_high_lat: bool,
    download_dem_tiles: bool,
    download_geoid: bool,
) -> PyResult<PyObject> {
    let bbox = BoundingBox::try_from(bounds).map_err(to_py_err)?;
    let heights = if ellipsoid_heights {
        HeightReference::Ellipsoidal
    } else {
        HeightReference::Orthometric
    };
    let config = DemConfig {
        tile_folder,
        tile_index,
        geoid_path,
        heights,
        buffer_pixels,
        adjust_at_high_lat,
        download_dem_tiles,
        download_geoid,
        ..Default::default()
    };

    let builder = DemBuilder::new(config).map_err(to_py_err)?;
    let product = builder
        .get_dem_for_bounds(&bbox, output_path.as_deref())
        .map_err(to_py_err)?;

    let result = PyDict::new(py);
    result.set_item("data", product.array.to_pyarray(py))?;
    result.set_item("transform", product.grid.transform.to_gdal().to_vec())?;
    result.set_item("crs", product.grid.crs.epsg())?;
    result.set_item("nodata", product.grid.nodata)?;
    Ok(result.into())
}

/// Acquisition window, sensor and footprint bounds of a scene zip
#[pyfunction]
fn scene_info(py: Python, zip_path: PathBuf) -> PyResult<PyObject> {
    let info = SceneInfo::from_zip(&zip_path).map_err(to_py_err)?;
    let result = PyDict::new(py);
    result.set_item("start", info.start.to_rfc3339())?;
    result.set_item("stop", info.stop.to_rfc3339())?;
    result.set_item("sensor", info.sensor)?;
    result.set_item("bounds", info.bounds.bounds())?;
    Ok(result.into())
}

/// Latest orbit file covering the scene's acquisition window
#[pyfunction]
fn latest_orbit_for_scene(scene_id: String, orbit_files: Vec<PathBuf>) -> PyResult<PathBuf> {
    find_latest_orbit_for_scene(&scene_id, &orbit_files).map_err(to_py_err)
}

#[pymodule]
fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(get_dem_for_bounds, m)?)?;
    m.add_function(wrap_pyfunction!(scene_info, m)?)?;
    m.add_function(wrap_pyfunction!(latest_orbit_for_scene, m)?)?;
    Ok(())
}
