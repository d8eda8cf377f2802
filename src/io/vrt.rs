//! GDAL virtual raster (VRT) composition
//!
//! A mosaic is described as a VRT placed on the output grid, with one
//! `ComplexSource` per tile. GDAL reads the tiles lazily when the band is read.
//! The band carries no nodata value, so areas without a tile read back as 0.

use crate::types::{DemError, DemResult, GeoTransform, RasterGrid};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize)]
#[serde(rename = "VRTDataset")]
struct VrtDataset {
    #[serde(rename = "@rasterXSize")]
    raster_x_size: usize,
    #[serde(rename = "@rasterYSize")]
    raster_y_size: usize,
    #[serde(rename = "SRS")]
    srs: String,
    #[serde(rename = "GeoTransform")]
    geo_transform: String,
    #[serde(rename = "VRTRasterBand")]
    band: VrtRasterBand,
}

#[derive(Debug, Serialize)]
struct VrtRasterBand {
    #[serde(rename = "@dataType")]
    data_type: &'static str,
    #[serde(rename = "@band")]
    band: u32,
    #[serde(rename = "ComplexSource")]
    sources: Vec<ComplexSource>,
}

#[derive(Debug, Serialize)]
struct ComplexSource {
    #[serde(rename = "SourceFilename")]
    source_filename: SourceFilename,
    #[serde(rename = "SourceBand")]
    source_band: u32,
    #[serde(rename = "SrcRect")]
    src_rect: Rect,
    #[serde(rename = "DstRect")]
    dst_rect: Rect,
}

#[derive(Debug, Serialize)]
struct SourceFilename {
    #[serde(rename = "@relativeToVRT")]
    relative_to_vrt: u8,
    #[serde(rename = "$text")]
    path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
struct Rect {
    #[serde(rename = "@xOff")]
    x_off: f64,
    #[serde(rename = "@yOff")]
    y_off: f64,
    #[serde(rename = "@xSize")]
    x_size: f64,
    #[serde(rename = "@ySize")]
    y_size: f64,
}

/// Offsets this close to a whole pixel are snapped to it
const PIXEL_SNAP_TOLERANCE: f64 = 1e-6;

fn snap(value: f64) -> f64 {
    let rounded = value.round();
    if (value - rounded).abs() < PIXEL_SNAP_TOLERANCE {
        rounded
    } else {
        value
    }
}

/// Source tile placement for a VRT
#[derive(Debug, Clone)]
pub struct VrtSource {
    pub path: PathBuf,
    pub width: usize,
    pub height: usize,
    pub transform: GeoTransform,
}

/// Builds a single band Float32 VRT over a fixed output grid
#[derive(Debug)]
pub struct VrtBuilder {
    grid: RasterGrid,
    sources: Vec<VrtSource>,
}

impl VrtBuilder {
    pub fn new(grid: RasterGrid) -> Self {
        Self {
            grid,
            sources: Vec::new(),
        }
    }

    pub fn add_source(&mut self, source: VrtSource) -> &mut Self {
        self.sources.push(source);
        self
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Destination rectangle (output pixel units) of a source tile
    fn destination_rect(&self, source: &VrtSource) -> DemResult<Rect> {
        let out = &self.grid.transform;
        let (x0, y0) = source.transform.pixel_to_world(0.0, 0.0);
        let (x1, y1) = source
            .transform
            .pixel_to_world(source.width as f64, source.height as f64);
        let (c0, r0) = out.world_to_pixel(x0, y0)?;
        let (c1, r1) = out.world_to_pixel(x1, y1)?;
        Ok(Rect {
            x_off: snap(c0.min(c1)),
            y_off: snap(r0.min(r1)),
            x_size: snap((c1 - c0).abs()),
            y_size: snap((r1 - r0).abs()),
        })
    }

    /// Render the VRT document
    pub fn to_xml(&self) -> DemResult<String> {
        let mut sources = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            sources.push(ComplexSource {
                source_filename: SourceFilename {
                    relative_to_vrt: 0,
                    path: source.path.to_string_lossy().into_owned(),
                },
                source_band: 1,
                src_rect: Rect {
                    x_off: 0.0,
                    y_off: 0.0,
                    x_size: source.width as f64,
                    y_size: source.height as f64,
                },
                dst_rect: self.destination_rect(source)?,
            });
        }

        let gt = self.grid.transform.to_gdal();
        let dataset = VrtDataset {
            raster_x_size: self.grid.width,
            raster_y_size: self.grid.height,
            srs: self.grid.crs.to_string(),
            geo_transform: gt
                .iter()
                .map(|v| format!("{:e}", v))
                .collect::<Vec<_>>()
                .join(", "),
            band: VrtRasterBand {
                data_type: "Float32",
                band: 1,
                sources,
            },
        };

        quick_xml::se::to_string(&dataset)
            .map_err(|e| DemError::XmlParsing(format!("Failed to serialise VRT: {}", e)))
    }

    /// Write the VRT document to `path`
    pub fn write<P: AsRef<Path>>(&self, path: P) -> DemResult<()> {
        let xml = self.to_xml()?;
        log::debug!(
            "Writing VRT with {} sources to {}",
            self.sources.len(),
            path.as_ref().display()
        );
        std::fs::write(path, xml)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Crs;

    fn output_grid() -> RasterGrid {
        let gt = GeoTransform::from_origin(10.0, 20.0, 0.5, -0.5);
        RasterGrid::new(8, 6, gt, Crs::WGS84).unwrap()
    }

    #[test]
    fn destination_rect_in_output_pixels() {
        let mut builder = VrtBuilder::new(output_grid());
        let tile = VrtSource {
            path: PathBuf::from("/tiles/a.tif"),
            width: 2,
            height: 2,
            transform: GeoTransform::from_origin(11.0, 19.0, 1.0, -1.0),
        };
        builder.add_source(tile.clone());
        let rect = builder.destination_rect(&tile).unwrap();
        assert_eq!(
            rect,
            Rect {
                x_off: 2.0,
                y_off: 2.0,
                x_size: 4.0,
                y_size: 4.0
            }
        );
        assert_eq!(builder.len(), 1);
    }

    #[test]
    fn xml_lists_every_source() {
        let mut builder = VrtBuilder::new(output_grid());
        for name in ["a.tif", "b.tif"] {
            builder.add_source(VrtSource {
                path: PathBuf::from(format!("/tiles/{}", name)),
                width: 4,
                height: 4,
                transform: GeoTransform::from_origin(10.0, 20.0, 0.5, -0.5),
            });
        }
        let xml = builder.to_xml().unwrap();
        assert!(xml.starts_with("<VRTDataset"));
        assert!(xml.contains(r#"rasterXSize="8""#));
        assert!(xml.contains(r#"dataType="Float32""#));
        assert_eq!(xml.matches("<ComplexSource>").count(), 2);
        assert!(xml.contains("/tiles/b.tif</SourceFilename>"));
        assert!(xml.contains("<SRS>EPSG:4326</SRS>"));
    }
}
