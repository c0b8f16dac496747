//! GeoTIFF construction
//!
//! `TiffBuilder` assembles a single-image, little-endian classic TIFF with
//! interleaved samples, optional tiling and compression, and GeoTIFF
//! georeferencing (pixel scale, tiepoint and a GeoKey directory naming the
//! EPSG code). It writes chips in GTiff format and builds test rasters.

use byteorder::{LittleEndian, WriteBytesExt};
use log::debug;
use std::fs;
use std::path::Path;

use crate::compression::CompressionFactory;
use crate::coordinate::GeoTransform;
use crate::tiff::constants::{
    compression, epsg, field_types, geo_keys, header, model_type, photometric, planar_config,
    raster_type, sample_format, tags,
};
use crate::tiff::errors::{TiffError, TiffResult};

/// Sample buffer of a raster being built, band-interleaved by pixel
#[derive(Debug, Clone)]
enum SampleData {
    U8(Vec<u8>),
    U16(Vec<u16>),
}

/// One IFD entry waiting for its final offset
struct PendingEntry {
    tag: u16,
    field_type: u16,
    count: u32,
    /// Little-endian payload
    data: Vec<u8>,
}

impl PendingEntry {
    fn shorts(tag: u16, values: &[u16]) -> Self {
        let mut data = Vec::with_capacity(values.len() * 2);
        for v in values {
            data.extend_from_slice(&v.to_le_bytes());
        }
        PendingEntry { tag, field_type: field_types::SHORT, count: values.len() as u32, data }
    }

    fn longs(tag: u16, values: &[u32]) -> Self {
        let mut data = Vec::with_capacity(values.len() * 4);
        for v in values {
            data.extend_from_slice(&v.to_le_bytes());
        }
        PendingEntry { tag, field_type: field_types::LONG, count: values.len() as u32, data }
    }

    fn doubles(tag: u16, values: &[f64]) -> Self {
        let mut data = Vec::with_capacity(values.len() * 8);
        for v in values {
            data.extend_from_slice(&v.to_le_bytes());
        }
        PendingEntry { tag, field_type: field_types::DOUBLE, count: values.len() as u32, data }
    }

    fn ascii(tag: u16, text: &str) -> Self {
        let mut data = text.as_bytes().to_vec();
        data.push(0);
        PendingEntry { tag, field_type: field_types::ASCII, count: data.len() as u32, data }
    }

    fn is_inline(&self) -> bool {
        self.data.len() <= 4
    }
}

/// Builder for single-image GeoTIFF files
pub struct TiffBuilder {
    width: u32,
    height: u32,
    samples_per_pixel: u16,
    data: Option<SampleData>,
    compression: u16,
    tile_size: Option<u32>,
    georeference: Option<(u32, GeoTransform)>,
    software: Option<String>,
}

impl TiffBuilder {
    /// Create a new builder for an image of the given size
    pub fn new(width: u32, height: u32) -> Self {
        TiffBuilder {
            width,
            height,
            samples_per_pixel: 1,
            data: None,
            compression: compression::NONE,
            tile_size: None,
            georeference: None,
            software: None,
        }
    }

    /// Set 8-bit image data from one buffer per band
    pub fn with_u8_bands(mut self, bands: &[Vec<u8>]) -> TiffResult<Self> {
        let pixels = self.check_bands(bands.len(), bands.iter().map(|b| b.len()))?;
        let mut data = Vec::with_capacity(pixels * bands.len());
        for i in 0..pixels {
            for band in bands {
                data.push(band[i]);
            }
        }
        self.samples_per_pixel = bands.len() as u16;
        self.data = Some(SampleData::U8(data));
        Ok(self)
    }

    /// Set 16-bit image data from one buffer per band
    pub fn with_u16_bands(mut self, bands: &[Vec<u16>]) -> TiffResult<Self> {
        let pixels = self.check_bands(bands.len(), bands.iter().map(|b| b.len()))?;
        let mut data = Vec::with_capacity(pixels * bands.len());
        for i in 0..pixels {
            for band in bands {
                data.push(band[i]);
            }
        }
        self.samples_per_pixel = bands.len() as u16;
        self.data = Some(SampleData::U16(data));
        Ok(self)
    }

    fn check_bands(&self, count: usize, lengths: impl Iterator<Item = usize>) -> TiffResult<usize> {
        let pixels = self.width as usize * self.height as usize;
        if count == 0 {
            return Err(TiffError::GenericError("At least one band is required".to_string()));
        }
        for (index, len) in lengths.enumerate() {
            if len != pixels {
                return Err(TiffError::GenericError(format!(
                    "Band {} has {} samples, expected {}", index + 1, len, pixels
                )));
            }
        }
        Ok(pixels)
    }

    /// Set the compression code (1, 8, 32946 or 50000)
    pub fn compression(mut self, code: u16) -> Self {
        self.compression = code;
        self
    }

    /// Organise the image in square tiles of the given size (multiple of 16)
    pub fn tiled(mut self, tile_size: u32) -> Self {
        self.tile_size = Some(tile_size);
        self
    }

    /// Attach georeferencing
    pub fn georeference(mut self, epsg_code: u32, transform: GeoTransform) -> Self {
        self.georeference = Some((epsg_code, transform));
        self
    }

    /// Record the producing software
    pub fn software(mut self, name: &str) -> Self {
        self.software = Some(name.to_string());
        self
    }

    /// Write the file to disk
    pub fn write<P: AsRef<Path>>(&self, path: P) -> TiffResult<()> {
        let bytes = self.to_bytes()?;
        debug!("Writing {} byte GeoTIFF to {}", bytes.len(), path.as_ref().display());
        fs::write(path, bytes)?;
        Ok(())
    }

    /// Encode the file into memory
    pub fn to_bytes(&self) -> TiffResult<Vec<u8>> {
        let data = self.data.as_ref()
            .ok_or_else(|| TiffError::GenericError("No image data set".to_string()))?;
        if self.width == 0 || self.height == 0 {
            return Err(TiffError::MissingDimensions);
        }
        if let Some(size) = self.tile_size {
            if size == 0 || size % 16 != 0 {
                return Err(TiffError::GenericError(format!("Tile size {} is not a multiple of 16", size)));
            }
        }

        let bits: u16 = match data {
            SampleData::U8(_) => 8,
            SampleData::U16(_) => 16,
        };
        let raw = match data {
            SampleData::U8(values) => values.clone(),
            SampleData::U16(values) => {
                let mut bytes = Vec::with_capacity(values.len() * 2);
                for v in values {
                    bytes.write_u16::<LittleEndian>(*v)?;
                }
                bytes
            }
        };

        let blocks = self.encode_blocks(&raw, bits)?;
        let mut entries = self.build_entries(bits, &blocks);
        entries.sort_by_key(|e| e.tag);

        // Layout: header, IFD, external tag data, image blocks
        let ifd_offset = 8u32;
        let ifd_size = 2 + 12 * entries.len() as u32 + 4;
        let mut cursor = ifd_offset + ifd_size;

        let mut external_offsets = vec![0u32; entries.len()];
        for (index, entry) in entries.iter().enumerate() {
            if !entry.is_inline() {
                cursor += cursor % 2;
                external_offsets[index] = cursor;
                cursor += entry.data.len() as u32;
            }
        }

        let mut block_offsets = Vec::with_capacity(blocks.len());
        for block in &blocks {
            cursor += cursor % 2;
            block_offsets.push(cursor);
            cursor += block.len() as u32;
        }

        let offsets_tag = if self.tile_size.is_some() { tags::TILE_OFFSETS } else { tags::STRIP_OFFSETS };
        for entry in entries.iter_mut() {
            if entry.tag == offsets_tag {
                *entry = PendingEntry::longs(offsets_tag, &block_offsets);
            }
        }

        let mut out = Vec::with_capacity(cursor as usize);
        out.extend_from_slice(&header::LITTLE_ENDIAN_MARKER);
        out.write_u16::<LittleEndian>(header::TIFF_VERSION)?;
        out.write_u32::<LittleEndian>(ifd_offset)?;

        out.write_u16::<LittleEndian>(entries.len() as u16)?;
        for (index, entry) in entries.iter().enumerate() {
            out.write_u16::<LittleEndian>(entry.tag)?;
            out.write_u16::<LittleEndian>(entry.field_type)?;
            out.write_u32::<LittleEndian>(entry.count)?;
            if entry.is_inline() {
                let mut value = [0u8; 4];
                value[..entry.data.len()].copy_from_slice(&entry.data);
                out.extend_from_slice(&value);
            } else {
                out.write_u32::<LittleEndian>(external_offsets[index])?;
            }
        }
        out.write_u32::<LittleEndian>(0)?;

        for (index, entry) in entries.iter().enumerate() {
            if !entry.is_inline() {
                out.resize(external_offsets[index] as usize, 0);
                out.extend_from_slice(&entry.data);
            }
        }
        for (offset, block) in block_offsets.iter().zip(&blocks) {
            out.resize(*offset as usize, 0);
            out.extend_from_slice(block);
        }

        Ok(out)
    }

    /// Split the interleaved image into strips or tiles and compress them
    fn encode_blocks(&self, raw: &[u8], bits: u16) -> TiffResult<Vec<Vec<u8>>> {
        let handler = CompressionFactory::create_handler(self.compression as u64)?;
        let pixel_bytes = self.samples_per_pixel as usize * (bits as usize / 8);
        let row_bytes = self.width as usize * pixel_bytes;
        let mut blocks = Vec::new();

        match self.tile_size {
            None => {
                // One strip per 16 rows keeps strips small without bloating the IFD
                for start_row in (0..self.height as usize).step_by(16) {
                    let end_row = (start_row + 16).min(self.height as usize);
                    blocks.push(handler.compress(&raw[start_row * row_bytes..end_row * row_bytes])?);
                }
            }
            Some(size) => {
                let size = size as usize;
                let tile_row_bytes = size * pixel_bytes;
                for tile_y in (0..self.height as usize).step_by(size) {
                    for tile_x in (0..self.width as usize).step_by(size) {
                        // Tiles are always full size; padding is zero
                        let mut tile = vec![0u8; size * tile_row_bytes];
                        let cols = size.min(self.width as usize - tile_x);
                        for r in 0..size.min(self.height as usize - tile_y) {
                            let src = (tile_y + r) * row_bytes + tile_x * pixel_bytes;
                            let dst = r * tile_row_bytes;
                            tile[dst..dst + cols * pixel_bytes]
                                .copy_from_slice(&raw[src..src + cols * pixel_bytes]);
                        }
                        blocks.push(handler.compress(&tile)?);
                    }
                }
            }
        }

        Ok(blocks)
    }

    fn build_entries(&self, bits: u16, blocks: &[Vec<u8>]) -> Vec<PendingEntry> {
        let spp = self.samples_per_pixel;
        let photometric = if spp == 3 { photometric::RGB } else { photometric::BLACK_IS_ZERO };
        let byte_counts: Vec<u32> = blocks.iter().map(|b| b.len() as u32).collect();
        let placeholder = vec![0u32; blocks.len()];

        let mut entries = vec![
            PendingEntry::longs(tags::IMAGE_WIDTH, &[self.width]),
            PendingEntry::longs(tags::IMAGE_LENGTH, &[self.height]),
            PendingEntry::shorts(tags::BITS_PER_SAMPLE, &vec![bits; spp as usize]),
            PendingEntry::shorts(tags::COMPRESSION, &[self.compression]),
            PendingEntry::shorts(tags::PHOTOMETRIC_INTERPRETATION, &[photometric]),
            PendingEntry::shorts(tags::SAMPLES_PER_PIXEL, &[spp]),
            PendingEntry::shorts(tags::PLANAR_CONFIGURATION, &[planar_config::CHUNKY]),
            PendingEntry::shorts(tags::SAMPLE_FORMAT, &vec![sample_format::UNSIGNED; spp as usize]),
        ];

        match self.tile_size {
            None => {
                entries.push(PendingEntry::longs(tags::ROWS_PER_STRIP, &[16u32.min(self.height)]));
                entries.push(PendingEntry::longs(tags::STRIP_OFFSETS, &placeholder));
                entries.push(PendingEntry::longs(tags::STRIP_BYTE_COUNTS, &byte_counts));
            }
            Some(size) => {
                entries.push(PendingEntry::longs(tags::TILE_WIDTH, &[size]));
                entries.push(PendingEntry::longs(tags::TILE_LENGTH, &[size]));
                entries.push(PendingEntry::longs(tags::TILE_OFFSETS, &placeholder));
                entries.push(PendingEntry::longs(tags::TILE_BYTE_COUNTS, &byte_counts));
            }
        }

        if let Some(software) = &self.software {
            entries.push(PendingEntry::ascii(tags::SOFTWARE, software));
        }

        if let Some((epsg_code, transform)) = &self.georeference {
            entries.push(PendingEntry::doubles(
                tags::MODEL_PIXEL_SCALE_TAG,
                &[transform.pixel_width, transform.pixel_height.abs(), 0.0],
            ));
            entries.push(PendingEntry::doubles(
                tags::MODEL_TIEPOINT_TAG,
                &[0.0, 0.0, 0.0, transform.origin_x, transform.origin_y, 0.0],
            ));
            entries.push(PendingEntry::shorts(tags::GEO_KEY_DIRECTORY_TAG, &geo_key_directory(*epsg_code)));
        }

        entries
    }
}

/// GeoKey directory for an EPSG-coded raster with PixelIsArea semantics
fn geo_key_directory(epsg_code: u32) -> Vec<u16> {
    let code = u16::try_from(epsg_code).unwrap_or(32767);
    let (model, cs_key, unit_key, unit) = if epsg_code == epsg::WGS84 {
        (model_type::GEOGRAPHIC, geo_keys::GEOGRAPHIC_TYPE, geo_keys::GEOG_ANGULAR_UNITS, epsg::ANGULAR_DEGREE)
    } else {
        (model_type::PROJECTED, geo_keys::PROJECTED_CS_TYPE, geo_keys::PROJ_LINEAR_UNITS, epsg::LINEAR_METER)
    };

    let mut keys = vec![
        (geo_keys::GT_MODEL_TYPE, model),
        (geo_keys::GT_RASTER_TYPE, raster_type::PIXEL_IS_AREA),
        (cs_key, code),
        (unit_key, unit),
    ];
    keys.sort_by_key(|(key, _)| *key);

    let mut directory = vec![1, 1, 0, keys.len() as u16];
    for (key, value) in keys {
        directory.extend_from_slice(&[key, 0, 1, value]);
    }
    directory
}
