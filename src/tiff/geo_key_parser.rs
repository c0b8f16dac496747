//! GeoTIFF Metadata and GeoKey parsing functionality
//!
//! This module provides utilities for parsing and interpreting
//! geographic metadata stored in TIFF files according to the GeoTIFF standard.

use log::debug;

use crate::coordinate::GeoTransform;
use crate::io::seekable::SeekableReader;
use crate::tiff::constants::{geo_keys, model_type, raster_type, tags};
use crate::tiff::errors::{TiffError, TiffResult};
use crate::tiff::geotags::{get_key_name, GeoKeyEntry};
use crate::tiff::ifd::IFD;
use crate::tiff::reader::TiffReader;

/// GeoKey value reserved for user-defined coordinate systems
const USER_DEFINED: u32 = 32767;

/// Parser for GeoTIFF geographic metadata
pub struct GeoKeyParser;

impl GeoKeyParser {
    /// Parse the GeoKey directory from an IFD
    ///
    /// The directory is a SHORT array: a 4-value header (version, revision,
    /// minor revision, key count) followed by 4 values per key.
    pub fn parse_geo_key_directory(
        reader: &TiffReader,
        source: &mut dyn SeekableReader,
        ifd: &IFD,
    ) -> TiffResult<Vec<GeoKeyEntry>> {
        if !ifd.has_tag(tags::GEO_KEY_DIRECTORY_TAG) {
            return Ok(Vec::new());
        }

        let values = reader.read_tag_values(source, ifd, tags::GEO_KEY_DIRECTORY_TAG)?;
        if values.len() < 4 {
            return Err(TiffError::GenericError("Invalid GeoKey directory header".to_string()));
        }

        let num_keys = values[3] as usize;
        debug!("GeoKey directory: version={}, revision={}.{}, keys={}",
               values[0], values[1], values[2], num_keys);

        let mut geo_keys = Vec::with_capacity(num_keys);
        for key in values[4..].chunks_exact(4).take(num_keys) {
            let entry = GeoKeyEntry::new(key[0] as u16, key[1] as u16, key[2] as u16, key[3] as u16);
            debug!("GeoKey: id={} ({}), location={}, count={}, offset={}",
                   entry.key_id, get_key_name(entry.key_id),
                   entry.tiff_tag_location, entry.count, entry.value_offset);
            geo_keys.push(entry);
        }

        Ok(geo_keys)
    }

    /// Get the value of a GeoKey as a string
    ///
    /// GeoKeys store values inline (location 0), in GeoDoubleParamsTag or in
    /// GeoAsciiParamsTag.
    pub fn get_geo_key_value_as_string(
        reader: &TiffReader,
        source: &mut dyn SeekableReader,
        ifd: &IFD,
        key_entry: &GeoKeyEntry,
    ) -> TiffResult<String> {
        if key_entry.is_inline() {
            return Ok(format!("{}", key_entry.value_offset));
        }

        let start = key_entry.value_offset as usize;
        let count = key_entry.count as usize;
        match key_entry.tiff_tag_location {
            tags::GEO_DOUBLE_PARAMS_TAG => {
                let doubles = reader.read_tag_f64_values(source, ifd, tags::GEO_DOUBLE_PARAMS_TAG)?;
                let values = doubles.get(start..start + count).ok_or_else(|| {
                    TiffError::GenericError(format!("GeoKey {} points past GeoDoubleParams", key_entry.key_id))
                })?;
                Ok(values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", "))
            }
            tags::GEO_ASCII_PARAMS_TAG => {
                let ascii = reader.read_ascii(source, ifd, tags::GEO_ASCII_PARAMS_TAG)?;
                let end = (start + count).min(ascii.len());
                let value = ascii.get(start.min(end)..end).unwrap_or_default();
                Ok(value.trim_end_matches('|').to_string())
            }
            other => Err(TiffError::GenericError(format!(
                "GeoKey {} stored in unsupported tag {}", key_entry.key_id, other
            ))),
        }
    }

    /// Extract geospatial information from a TIFF IFD
    pub fn extract_geo_info(
        reader: &TiffReader,
        source: &mut dyn SeekableReader,
        ifd: &IFD,
    ) -> TiffResult<GeoInfo> {
        let mut geo_info = GeoInfo::new();

        let geo_keys = Self::parse_geo_key_directory(reader, source, ifd)?;
        for key in &geo_keys {
            match key.key_id {
                geo_keys::GT_MODEL_TYPE if key.is_inline() => {
                    geo_info.model_type = key.value_offset;
                }
                geo_keys::GT_RASTER_TYPE if key.is_inline() => {
                    geo_info.raster_type = key.value_offset;
                }
                geo_keys::PROJECTED_CS_TYPE if key.is_inline() => {
                    geo_info.epsg_code = key.value_offset as u32;
                }
                geo_keys::GEOGRAPHIC_TYPE if key.is_inline() => {
                    geo_info.geographic_cs_code = key.value_offset as u32;
                }
                geo_keys::GT_CITATION | geo_keys::PROJ_CITATION => {
                    if let Ok(citation) = Self::get_geo_key_value_as_string(reader, source, ifd, key) {
                        geo_info.citation = Some(citation);
                    }
                }
                _ => {}
            }
        }

        if ifd.has_tag(tags::MODEL_PIXEL_SCALE_TAG) {
            let pixel_scale = reader.read_tag_f64_values(source, ifd, tags::MODEL_PIXEL_SCALE_TAG)?;
            if pixel_scale.len() >= 2 {
                geo_info.pixel_size_x = pixel_scale[0];
                geo_info.pixel_size_y = pixel_scale[1];
            }
        }

        if ifd.has_tag(tags::MODEL_TIEPOINT_TAG) {
            let tie_points = reader.read_tag_f64_values(source, ifd, tags::MODEL_TIEPOINT_TAG)?;
            if tie_points.len() >= 6 {
                let mut tie_point = [0.0; 6];
                tie_point.copy_from_slice(&tie_points[..6]);
                geo_info.tie_point = Some(tie_point);

                // Origin of the raster from a tiepoint at (i, j) with pixel size (dx, dy)
                if geo_info.pixel_size_x != 0.0 && geo_info.pixel_size_y != 0.0 {
                    geo_info.origin_x = tie_points[3] - tie_points[0] * geo_info.pixel_size_x;
                    geo_info.origin_y = tie_points[4] + tie_points[1] * geo_info.pixel_size_y;
                }
            }
        }

        if ifd.has_tag(tags::MODEL_TRANSFORMATION_TAG) {
            let matrix = reader.read_tag_f64_values(source, ifd, tags::MODEL_TRANSFORMATION_TAG)?;
            if matrix.len() >= 16 {
                let mut transformation = [0.0; 16];
                transformation.copy_from_slice(&matrix[..16]);
                geo_info.transformation = Some(transformation);
            }
        }

        Ok(geo_info)
    }
}

/// Structure to hold geospatial information extracted from a GeoTIFF
#[derive(Debug, Clone, Default)]
pub struct GeoInfo {
    /// EPSG code of the projected coordinate system
    pub epsg_code: u32,
    /// Geographic coordinate system code
    pub geographic_cs_code: u32,
    /// GTModelTypeGeoKey (1 projected, 2 geographic)
    pub model_type: u16,
    /// GTRasterTypeGeoKey (1 PixelIsArea, 2 PixelIsPoint)
    pub raster_type: u16,
    /// Pixel size in X direction (in map units)
    pub pixel_size_x: f64,
    /// Pixel size in Y direction (in map units)
    pub pixel_size_y: f64,
    /// Origin X coordinate (top-left corner in map units)
    pub origin_x: f64,
    /// Origin Y coordinate (top-left corner in map units)
    pub origin_y: f64,
    /// Optional tie point (i,j,k,x,y,z)
    pub tie_point: Option<[f64; 6]>,
    /// Optional 4x4 model transformation matrix, row major
    pub transformation: Option<[f64; 16]>,
    /// Citation text, when present
    pub citation: Option<String>,
}

impl GeoInfo {
    /// Creates a new empty GeoInfo structure
    pub fn new() -> Self {
        GeoInfo::default()
    }

    /// EPSG code of the raster's coordinate system
    pub fn epsg(&self) -> Option<u32> {
        let known = |code: u32| code > 0 && code != USER_DEFINED;
        if self.model_type == model_type::GEOGRAPHIC && known(self.geographic_cs_code) {
            return Some(self.geographic_cs_code);
        }
        if known(self.epsg_code) {
            return Some(self.epsg_code);
        }
        if known(self.geographic_cs_code) {
            return Some(self.geographic_cs_code);
        }
        None
    }

    /// Affine transform from pixel corners to map coordinates
    ///
    /// PixelIsPoint rasters are shifted by half a pixel so the transform
    /// always refers to pixel corners.
    pub fn geotransform(&self) -> Option<GeoTransform> {
        let mut transform = if let Some(m) = &self.transformation {
            GeoTransform::new(m[3], m[0], m[1], m[7], m[4], m[5])
        } else if self.tie_point.is_some() && self.pixel_size_x != 0.0 && self.pixel_size_y != 0.0 {
            GeoTransform::north_up(self.origin_x, self.origin_y, self.pixel_size_x, self.pixel_size_y)
        } else {
            return None;
        };

        if self.raster_type == raster_type::PIXEL_IS_POINT {
            transform.origin_x -= 0.5 * (transform.pixel_width + transform.row_rotation);
            transform.origin_y -= 0.5 * (transform.col_rotation + transform.pixel_height);
        }

        Some(transform)
    }

    /// Check if the GeoInfo contains valid georeferencing information
    pub fn is_georeferenced(&self) -> bool {
        self.geotransform().is_some()
    }

    /// Get the bounds of the georeferenced image
    ///
    /// Returns (min_x, min_y, max_x, max_y) in world coordinates.
    pub fn get_bounds(&self, width: u32, height: u32) -> Option<(f64, f64, f64, f64)> {
        let bbox = self.geotransform()?.bounds(width as u64, height as u64);
        Some((bbox.min_x, bbox.min_y, bbox.max_x, bbox.max_y))
    }
}
