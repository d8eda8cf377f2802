use crate::types::{
    BoundingBox, Crs, DemError, DemProduct, DemResult, GeoTransform, PixelConvention, RasterGrid,
};
use gdal::raster::Buffer;
use gdal::spatial_ref::SpatialRef;
use gdal::{Dataset, DriverManager, Metadata};
use ndarray::Array2;
use std::path::Path;

/// EPSG code of an open dataset
pub fn dataset_crs(dataset: &Dataset) -> DemResult<Crs> {
    let srs = dataset.spatial_ref()?;
    let code = srs.auth_code().map_err(|e| {
        DemError::Processing(format!("raster CRS has no EPSG authority code: {}", e))
    })?;
    Ok(Crs::from_epsg(code as u32))
}

/// Pixel convention recorded in the `AREA_OR_POINT` metadata item (Area when absent)
pub fn dataset_convention(dataset: &Dataset) -> PixelConvention {
    match dataset.metadata_item("AREA_OR_POINT", "") {
        Some(tag) if tag.eq_ignore_ascii_case("point") => PixelConvention::Point,
        _ => PixelConvention::Area,
    }
}

/// Grid description of an open dataset
pub fn dataset_grid(dataset: &Dataset) -> DemResult<RasterGrid> {
    let (width, height) = dataset.raster_size();
    let transform = GeoTransform::from_gdal(dataset.geo_transform()?);
    let mut grid = RasterGrid::new(width, height, transform, dataset_crs(dataset)?)?;
    grid.convention = dataset_convention(dataset);
    if let Some(nodata) = dataset.rasterband(1)?.no_data_value() {
        grid.nodata = nodata;
    }
    Ok(grid)
}

/// Replace every `nodata` sample with NaN
pub fn nodata_to_nan(array: &mut Array2<f32>, nodata: f64) {
    if nodata.is_nan() {
        return;
    }
    let nodata = nodata as f32;
    array.mapv_inplace(|v| if v == nodata { f32::NAN } else { v });
}

/// Band 1 of an open dataset in full, nodata normalised to NaN
pub fn read_dataset(dataset: &Dataset) -> DemResult<DemProduct> {
    let mut grid = dataset_grid(dataset)?;
    let (width, height) = (grid.width, grid.height);

    let band = dataset.rasterband(1)?;
    let data = band.read_as::<f32>((0, 0), (width, height), (width, height), None)?;
    let mut array = Array2::from_shape_vec((height, width), data.data)
        .map_err(|e| DemError::Processing(format!("Failed to reshape raster data: {}", e)))?;

    nodata_to_nan(&mut array, grid.nodata);
    grid.nodata = f64::NAN;
    Ok(DemProduct { array, grid })
}

/// Read band 1 of a raster in full, nodata normalised to NaN
pub fn read_raster<P: AsRef<Path>>(path: P) -> DemResult<DemProduct> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(DemError::MissingFile(path.to_path_buf()));
    }
    log::debug!("Reading raster: {}", path.display());
    read_dataset(&Dataset::open(path)?)
}

/// Pixel window `(col_off, row_off, cols, rows)` covering `bounds` plus `buffer_pixels`, clipped to the raster
pub fn window_for_bounds(
    grid: &RasterGrid,
    bounds: &BoundingBox,
    buffer_pixels: usize,
) -> DemResult<(usize, usize, usize, usize)> {
    let (c0, r0) = grid.transform.world_to_pixel(bounds.xmin(), bounds.ymax())?;
    let (c1, r1) = grid.transform.world_to_pixel(bounds.xmax(), bounds.ymin())?;
    let buffer = buffer_pixels as f64;

    let col_start = (c0.min(c1).floor() - buffer).max(0.0);
    let row_start = (r0.min(r1).floor() - buffer).max(0.0);
    let col_end = (c0.max(c1).ceil() + buffer).min(grid.width as f64);
    let row_end = (r0.max(r1).ceil() + buffer).min(grid.height as f64);

    if col_end <= col_start || row_end <= row_start {
        return Err(DemError::Coverage(format!(
            "bounds {:?} do not overlap the raster extent {:?}",
            bounds.bounds(),
            grid.bounds().bounds()
        )));
    }

    Ok((
        col_start as usize,
        row_start as usize,
        (col_end - col_start) as usize,
        (row_end - row_start) as usize,
    ))
}

/// Read the part of an open dataset covering `bounds` plus a pixel buffer.
///
/// Bounds are expected in the dataset's CRS. Nodata is normalised to NaN.
pub fn read_dataset_window(
    dataset: &Dataset,
    bounds: &BoundingBox,
    buffer_pixels: usize,
) -> DemResult<DemProduct> {
    let full = dataset_grid(dataset)?;
    let (col, row, cols, rows) = window_for_bounds(&full, bounds, buffer_pixels)?;
    log::debug!(
        "Reading window col={} row={} size={}x{} of {}x{}",
        col, row, cols, rows, full.width, full.height
    );

    let band = dataset.rasterband(1)?;
    let data = band.read_as::<f32>((col as isize, row as isize), (cols, rows), (cols, rows), None)?;
    let mut array = Array2::from_shape_vec((rows, cols), data.data)
        .map_err(|e| DemError::Processing(format!("Failed to reshape window data: {}", e)))?;
    nodata_to_nan(&mut array, full.nodata);

    let mut grid = RasterGrid::new(
        cols,
        rows,
        full.transform.shifted_by_pixels(col as f64, row as f64),
        full.crs,
    )?;
    grid.convention = full.convention;
    Ok(DemProduct { array, grid })
}

pub fn read_raster_window<P: AsRef<Path>>(
    path: P,
    bounds: &BoundingBox,
    buffer_pixels: usize,
) -> DemResult<DemProduct> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(DemError::MissingFile(path.to_path_buf()));
    }
    let dataset = Dataset::open(path)?;
    read_dataset_window(&dataset, bounds, buffer_pixels)
}

/// Single band Float32 dataset from `driver` holding `product`, tagged with
/// CRS, transform, NaN nodata and pixel convention
pub(crate) fn create_dataset<P: AsRef<Path>>(
    driver: &str,
    path: P,
    product: &DemProduct,
) -> DemResult<Dataset> {
    let (height, width) = product.array.dim();
    if (height, width) != product.grid.shape() {
        return Err(DemError::Processing(format!(
            "array shape {:?} does not match grid shape {:?}",
            (height, width),
            product.grid.shape()
        )));
    }

    let driver = DriverManager::get_driver_by_name(driver)?;
    let mut dataset =
        driver.create_with_band_type::<f32, _>(path, width as isize, height as isize, 1)?;

    dataset.set_geo_transform(&product.grid.transform.to_gdal())?;
    dataset.set_spatial_ref(&SpatialRef::from_epsg(product.grid.crs.epsg())?)?;
    dataset.set_metadata_item("AREA_OR_POINT", product.grid.convention.gdal_tag(), "")?;

    let mut band = dataset.rasterband(1)?;
    let data: Vec<f32> = product.array.iter().cloned().collect();
    let buffer = Buffer::new((width, height), data);
    band.write((0, 0), (width, height), &buffer)?;
    band.set_no_data_value(Some(f64::NAN))?;

    Ok(dataset)
}

/// Write a single band Float32 GeoTIFF tagged with CRS, transform, NaN nodata and pixel convention
pub fn write_geotiff<P: AsRef<Path>>(output_path: P, product: &DemProduct) -> DemResult<()> {
    let output_path = output_path.as_ref();
    log::info!("Writing GeoTIFF: {}", output_path.display());

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    create_dataset("GTiff", output_path, product)?;
    Ok(())
}
