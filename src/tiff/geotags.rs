//! GeoTIFF tag definitions and utilities
//!
//! Name tables for TIFF tags and GeoKeys, plus the `GeoKeyEntry` record
//! read from a GeoKey directory.

use std::collections::HashMap;
use lazy_static::lazy_static;

use crate::tiff::constants::{compression, field_types, geo_keys, tags};

lazy_static! {
    static ref TAG_NAMES: HashMap<u16, &'static str> = {
        let mut m = HashMap::new();
        m.insert(tags::NEW_SUBFILE_TYPE, "NewSubfileType");
        m.insert(tags::IMAGE_WIDTH, "ImageWidth");
        m.insert(tags::IMAGE_LENGTH, "ImageLength");
        m.insert(tags::BITS_PER_SAMPLE, "BitsPerSample");
        m.insert(tags::COMPRESSION, "Compression");
        m.insert(tags::PHOTOMETRIC_INTERPRETATION, "PhotometricInterpretation");
        m.insert(tags::STRIP_OFFSETS, "StripOffsets");
        m.insert(tags::SAMPLES_PER_PIXEL, "SamplesPerPixel");
        m.insert(tags::ROWS_PER_STRIP, "RowsPerStrip");
        m.insert(tags::STRIP_BYTE_COUNTS, "StripByteCounts");
        m.insert(tags::PLANAR_CONFIGURATION, "PlanarConfiguration");
        m.insert(tags::SOFTWARE, "Software");
        m.insert(tags::PREDICTOR, "Predictor");
        m.insert(tags::TILE_WIDTH, "TileWidth");
        m.insert(tags::TILE_LENGTH, "TileLength");
        m.insert(tags::TILE_OFFSETS, "TileOffsets");
        m.insert(tags::TILE_BYTE_COUNTS, "TileByteCounts");
        m.insert(tags::SAMPLE_FORMAT, "SampleFormat");
        m.insert(tags::MODEL_PIXEL_SCALE_TAG, "ModelPixelScaleTag");
        m.insert(tags::MODEL_TIEPOINT_TAG, "ModelTiepointTag");
        m.insert(tags::MODEL_TRANSFORMATION_TAG, "ModelTransformationTag");
        m.insert(tags::GEO_KEY_DIRECTORY_TAG, "GeoKeyDirectoryTag");
        m.insert(tags::GEO_DOUBLE_PARAMS_TAG, "GeoDoubleParamsTag");
        m.insert(tags::GEO_ASCII_PARAMS_TAG, "GeoAsciiParamsTag");
        m.insert(tags::GDAL_METADATA, "GDAL_METADATA");
        m.insert(tags::GDAL_NODATA, "GDAL_NODATA");
        m
    };

    static ref KEY_NAMES: HashMap<u16, &'static str> = {
        let mut m = HashMap::new();
        m.insert(geo_keys::GT_MODEL_TYPE, "GTModelTypeGeoKey");
        m.insert(geo_keys::GT_RASTER_TYPE, "GTRasterTypeGeoKey");
        m.insert(geo_keys::GT_CITATION, "GTCitationGeoKey");
        m.insert(geo_keys::GEOGRAPHIC_TYPE, "GeographicTypeGeoKey");
        m.insert(geo_keys::GEOG_CITATION, "GeogCitationGeoKey");
        m.insert(2050, "GeogGeodeticDatumGeoKey");
        m.insert(2052, "GeogLinearUnitsGeoKey");
        m.insert(geo_keys::GEOG_ANGULAR_UNITS, "GeogAngularUnitsGeoKey");
        m.insert(2056, "GeogEllipsoidGeoKey");
        m.insert(2057, "GeogSemiMajorAxisGeoKey");
        m.insert(2059, "GeogInvFlatteningGeoKey");
        m.insert(geo_keys::PROJECTED_CS_TYPE, "ProjectedCSTypeGeoKey");
        m.insert(geo_keys::PROJ_CITATION, "PCSCitationGeoKey");
        m.insert(3074, "ProjectionGeoKey");
        m.insert(3075, "ProjCoordTransGeoKey");
        m.insert(geo_keys::PROJ_LINEAR_UNITS, "ProjLinearUnitsGeoKey");
        m.insert(4096, "VerticalCSTypeGeoKey");
        m
    };
}

/// Represents a GeoKey entry in a GeoKey directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeoKeyEntry {
    pub key_id: u16,
    pub tiff_tag_location: u16,
    pub count: u16,
    pub value_offset: u16,
}

impl GeoKeyEntry {
    /// Create a new GeoKey entry
    pub fn new(key_id: u16, tiff_tag_location: u16, count: u16, value_offset: u16) -> Self {
        GeoKeyEntry {
            key_id,
            tiff_tag_location,
            count,
            value_offset,
        }
    }

    /// Whether the value is held directly in the entry
    pub fn is_inline(&self) -> bool {
        self.tiff_tag_location == 0
    }

    /// Get the name of this key
    pub fn get_name(&self) -> String {
        get_key_name(self.key_id)
    }
}

/// Check if a tag is a GeoTIFF tag
pub fn is_geotiff_tag(tag: u16) -> bool {
    matches!(tag,
        tags::MODEL_PIXEL_SCALE_TAG |
        tags::MODEL_TRANSFORMATION_TAG |
        tags::MODEL_TIEPOINT_TAG |
        tags::GEO_KEY_DIRECTORY_TAG |
        tags::GEO_DOUBLE_PARAMS_TAG |
        tags::GEO_ASCII_PARAMS_TAG)
}

/// Get a TIFF or GeoTIFF tag name
pub fn get_tag_name(tag: u16) -> String {
    TAG_NAMES.get(&tag)
        .map(|name| name.to_string())
        .unwrap_or_else(|| format!("Unknown-{}", tag))
}

/// Get a GeoKey name
pub fn get_key_name(key: u16) -> String {
    KEY_NAMES.get(&key)
        .map(|name| name.to_string())
        .unwrap_or_else(|| format!("Unknown-{}", key))
}

/// Get a field type name
pub fn get_field_type_name(field_type: u16) -> &'static str {
    match field_type {
        field_types::BYTE => "BYTE",
        field_types::ASCII => "ASCII",
        field_types::SHORT => "SHORT",
        field_types::LONG => "LONG",
        field_types::RATIONAL => "RATIONAL",
        field_types::SBYTE => "SBYTE",
        field_types::UNDEFINED => "UNDEFINED",
        field_types::SSHORT => "SSHORT",
        field_types::SLONG => "SLONG",
        field_types::SRATIONAL => "SRATIONAL",
        field_types::FLOAT => "FLOAT",
        field_types::DOUBLE => "DOUBLE",
        field_types::LONG8 => "LONG8",
        field_types::SLONG8 => "SLONG8",
        field_types::IFD8 => "IFD8",
        _ => "Unknown",
    }
}

/// Get a compression method name
pub fn get_compression_name(code: u64) -> &'static str {
    match u16::try_from(code) {
        Ok(compression::NONE) => "Uncompressed",
        Ok(compression::LZW) => "LZW",
        Ok(compression::JPEG) => "JPEG",
        Ok(compression::ADOBE_DEFLATE) => "Adobe Deflate",
        Ok(compression::DEFLATE) => "Deflate",
        Ok(compression::ZSTD) => "ZSTD",
        _ => "Unknown",
    }
}

/// Get a coordinate reference system description for an EPSG code
pub fn get_projected_cs_description(code: u32) -> String {
    match code {
        3857 => "WGS 84 / Pseudo-Mercator".to_string(),
        4326 => "WGS 84".to_string(),
        32601..=32660 => format!("WGS 84 / UTM zone {}N", code - 32600),
        32701..=32760 => format!("WGS 84 / UTM zone {}S", code - 32700),
        _ => format!("EPSG:{}", code),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        assert_eq!(get_tag_name(tags::GEO_KEY_DIRECTORY_TAG), "GeoKeyDirectoryTag");
        assert_eq!(get_tag_name(65000), "Unknown-65000");
        assert_eq!(get_key_name(geo_keys::PROJECTED_CS_TYPE), "ProjectedCSTypeGeoKey");
        assert_eq!(get_compression_name(50000), "ZSTD");
        assert!(is_geotiff_tag(tags::MODEL_TIEPOINT_TAG));
        assert!(!is_geotiff_tag(tags::IMAGE_WIDTH));
    }

    #[test]
    fn test_utm_descriptions() {
        assert_eq!(get_projected_cs_description(32654), "WGS 84 / UTM zone 54N");
        assert_eq!(get_projected_cs_description(32733), "WGS 84 / UTM zone 33S");
        assert_eq!(get_projected_cs_description(2193), "EPSG:2193");
    }
}
