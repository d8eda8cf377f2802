//! Raster reprojection and merging for the antimeridian path

use crate::io::raster::{create_dataset, read_dataset};
use crate::types::{Crs, DemError, DemProduct, DemResult, ElevationArray, GeoTransform, RasterGrid};
use gdal::raster::reproject;
use gdal::spatial_ref::SpatialRef;
use gdal::{Dataset, DriverManager, Metadata};
use ndarray::Array2;
use std::ffi::CString;
use std::os::raw::c_int;
use std::ptr;

/// Build an array by evaluating `f(row, col)` for every pixel
pub(crate) fn map_pixels<F>(shape: (usize, usize), f: F) -> DemResult<ElevationArray>
where
    F: Fn(usize, usize) -> f32 + Sync + Send,
{
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        let (height, width) = shape;
        let values: Vec<f32> = (0..height * width)
            .into_par_iter()
            .map(|i| f(i / width, i % width))
            .collect();
        Array2::from_shape_vec(shape, values)
            .map_err(|e| DemError::Processing(format!("Failed to reshape pixel values: {}", e)))
    }
    #[cfg(not(feature = "parallel"))]
    {
        Ok(Array2::from_shape_fn(shape, |(row, col)| f(row, col)))
    }
}

/// Nearest neighbour sample of `product` at world `(x, y)`, NaN outside
fn sample_nearest(product: &DemProduct, x: f64, y: f64) -> f32 {
    let (col, row) = match product.grid.transform.world_to_pixel(x, y) {
        Ok(pixel) => pixel,
        Err(_) => return f32::NAN,
    };
    if !(col >= 0.0 && row >= 0.0) {
        return f32::NAN;
    }
    let (col, row) = (col.floor() as usize, row.floor() as usize);
    if col >= product.grid.width || row >= product.grid.height {
        return f32::NAN;
    }
    product.array[[row, col]]
}

/// GDAL's suggested output transform and size for warping `source` into `target_wkt`
fn suggested_warp_output(source: &Dataset, target_wkt: &str) -> DemResult<(GeoTransform, usize, usize)> {
    let target_wkt = CString::new(target_wkt)
        .map_err(|e| DemError::Processing(format!("invalid target WKT: {}", e)))?;
    let mut transform = [0.0f64; 6];
    let mut extent = [0.0f64; 4];
    let mut pixels: c_int = 0;
    let mut lines: c_int = 0;

    let status = unsafe {
        let transformer = gdal_sys::GDALCreateGenImgProjTransformer(
            source.c_dataset(),
            ptr::null(),
            ptr::null_mut(),
            target_wkt.as_ptr(),
            0,
            0.0,
            0,
        );
        if transformer.is_null() {
            return Err(DemError::Processing(
                "GDAL could not create a transformer to the target CRS".to_string(),
            ));
        }
        let status = gdal_sys::GDALSuggestedWarpOutput2(
            source.c_dataset(),
            Some(gdal_sys::GDALGenImgProjTransform),
            transformer,
            transform.as_mut_ptr(),
            &mut pixels,
            &mut lines,
            extent.as_mut_ptr(),
            0,
        );
        gdal_sys::GDALDestroyGenImgProjTransformer(transformer);
        status
    };

    if status != gdal_sys::CPLErr::CE_None || pixels <= 0 || lines <= 0 {
        return Err(DemError::Processing(format!(
            "GDAL could not suggest a warp output (status {}, {}x{})",
            status, pixels, lines
        )));
    }
    Ok((GeoTransform::from_gdal(transform), pixels as usize, lines as usize))
}

/// Warp `source` into `target` with GDAL, on the grid GDAL suggests.
///
/// Pixels are square. Pixels outside the source are NaN.
pub fn reproject_raster(source: &DemProduct, target: Crs) -> DemResult<DemProduct> {
    if source.grid.crs == target {
        return Ok(source.clone());
    }
    let source_ds = create_dataset("MEM", "", source)?;
    let target_srs = SpatialRef::from_epsg(target.epsg())?;
    let (transform, width, height) = suggested_warp_output(&source_ds, &target_srs.to_wkt()?)?;
    log::info!(
        "Reprojecting {}x{} raster from {} to {}: {}x{} at {:.3}",
        source.grid.width,
        source.grid.height,
        source.grid.crs,
        target,
        width,
        height,
        transform.pixel_width
    );

    let driver = DriverManager::get_driver_by_name("MEM")?;
    let mut target_ds = driver.create_with_band_type::<f32, _>("", width as isize, height as isize, 1)?;
    target_ds.set_geo_transform(&transform.to_gdal())?;
    target_ds.set_spatial_ref(&target_srs)?;
    target_ds.set_metadata_item("AREA_OR_POINT", source.grid.convention.gdal_tag(), "")?;
    {
        let mut band = target_ds.rasterband(1)?;
        band.set_no_data_value(Some(f64::NAN))?;
        // gdal 0.16 has no RasterBand::fill; same call as the later binding
        let rv = unsafe { gdal_sys::GDALFillRaster(band.c_rasterband(), f64::NAN, 0.0) };
        if rv != gdal_sys::CPLErr::CE_None {
            let number = unsafe { gdal_sys::CPLGetLastErrorNo() };
            let msg = unsafe { std::ffi::CStr::from_ptr(gdal_sys::CPLGetLastErrorMsg()) }
                .to_string_lossy()
                .into_owned();
            unsafe { gdal_sys::CPLErrorReset() };
            return Err(gdal::errors::GdalError::CplError { class: rv, number, msg }.into());
        }
    }

    reproject(&source_ds, &target_ds)?;

    read_dataset(&target_ds)
}

/// Merge rasters sharing a CRS, keeping the maximum valid value per pixel.
///
/// The output spans the union of the inputs at the finest input resolution.
pub fn merge_rasters(products: &[DemProduct]) -> DemResult<DemProduct> {
    let first = products
        .first()
        .ok_or_else(|| DemError::Processing("no rasters to merge".to_string()))?;
    if let Some(other) = products.iter().find(|p| p.grid.crs != first.grid.crs) {
        return Err(DemError::Processing(format!(
            "cannot merge rasters in {} and {}",
            first.grid.crs, other.grid.crs
        )));
    }

    let mut bounds = first.grid.bounds();
    let mut x_res = f64::INFINITY;
    let mut y_res = f64::INFINITY;
    for product in products {
        bounds = bounds.union(&product.grid.bounds());
        x_res = x_res.min(product.grid.transform.pixel_width.abs());
        y_res = y_res.min(product.grid.transform.pixel_height.abs());
    }

    let width = ((bounds.width() / x_res - 1e-9).ceil() as usize).max(1);
    let height = ((bounds.height() / y_res - 1e-9).ceil() as usize).max(1);
    let grid = RasterGrid::new(
        width,
        height,
        GeoTransform::from_origin(bounds.xmin(), bounds.ymax(), x_res, -y_res),
        first.grid.crs,
    )?;
    log::info!("Merging {} rasters into {}x{} ({})", products.len(), width, height, grid.crs);

    let array = map_pixels(grid.shape(), |row, col| {
        let (x, y) = grid.pixel_center(col, row);
        products
            .iter()
            .map(|p| sample_nearest(p, x, y))
            .filter(|v| !v.is_nan())
            .fold(f32::NAN, f32::max)
    })?;
    Ok(DemProduct { array, grid })
}
