//! Georeferenced GeoTIFF datasets
//!
//! `GeoRaster` opens the full-resolution image of a GeoTIFF (local or
//! remote), resolves its georeferencing and reads pixel windows of single
//! bands. Tiled and stripped layouts go through the same block reader: a
//! strip is treated as a block spanning the full image width.

use log::{debug, info};
use std::io::{Read, Seek, SeekFrom};
use std::sync::Mutex;

use crate::compression::{CompressionFactory, CompressionHandler};
use crate::coordinate::{BoundingBox, GeoTransform};
use crate::io::seekable::{BoxedReader, SeekableReader};
use crate::io::source::{SourceLocation, SourceOpener};
use crate::tiff::constants::{compression, tags};
use crate::tiff::errors::{TiffError, TiffResult};
use crate::tiff::geo_key_parser::{GeoInfo, GeoKeyParser};
use crate::tiff::ifd::IFD;
use crate::tiff::reader::TiffReader;
use crate::tiff::validation;

use super::layout::SampleLayout;
use super::region::Region;

/// Placement of the compressed blocks of an image
#[derive(Debug, Clone)]
struct BlockGrid {
    block_width: u32,
    block_height: u32,
    blocks_across: u32,
    blocks_down: u32,
    tiled: bool,
    offsets: Vec<u64>,
    byte_counts: Vec<u64>,
}

impl BlockGrid {
    fn from_ifd(
        reader: &TiffReader,
        source: &mut dyn SeekableReader,
        ifd: &IFD,
        width: u32,
        height: u32,
    ) -> TiffResult<Self> {
        let (block_width, block_height, offsets_tag, counts_tag) = if ifd.is_tiled() {
            let tile_width = ifd.get_tag_value(tags::TILE_WIDTH).ok_or(TiffError::TagNotFound(tags::TILE_WIDTH))?;
            let tile_height = ifd.get_tag_value(tags::TILE_LENGTH).ok_or(TiffError::TagNotFound(tags::TILE_LENGTH))?;
            (tile_width as u32, tile_height as u32, tags::TILE_OFFSETS, tags::TILE_BYTE_COUNTS)
        } else {
            // RowsPerStrip defaults to the whole image
            let rows = ifd.get_tag_value(tags::ROWS_PER_STRIP)
                .unwrap_or(height as u64)
                .min(height as u64);
            (width, rows as u32, tags::STRIP_OFFSETS, tags::STRIP_BYTE_COUNTS)
        };

        if block_width == 0 || block_height == 0 {
            return Err(TiffError::UnsupportedLayout(format!(
                "Invalid block size {}x{}", block_width, block_height
            )));
        }

        let offsets = reader.read_tag_values(source, ifd, offsets_tag)?;
        let byte_counts = reader.read_tag_values(source, ifd, counts_tag)?;
        if offsets.len() != byte_counts.len() {
            return Err(TiffError::UnsupportedLayout(format!(
                "{} block offsets but {} byte counts", offsets.len(), byte_counts.len()
            )));
        }

        Ok(BlockGrid {
            block_width,
            block_height,
            blocks_across: width.div_ceil(block_width),
            blocks_down: height.div_ceil(block_height),
            tiled: ifd.is_tiled(),
            offsets,
            byte_counts,
        })
    }

    fn blocks_per_plane(&self) -> usize {
        self.blocks_across as usize * self.blocks_down as usize
    }
}

/// One band of a pixel window
#[derive(Debug, Clone, PartialEq)]
pub struct BandWindow {
    /// Window in source pixel coordinates
    pub region: Region,
    /// Row-major samples
    pub data: Vec<f64>,
}

impl BandWindow {
    /// Sample at a position relative to the window's top-left corner
    pub fn get(&self, col: u32, row: u32) -> Option<f64> {
        if col >= self.region.width || row >= self.region.height {
            return None;
        }
        self.data.get(row as usize * self.region.width as usize + col as usize).copied()
    }

    /// Sample at an absolute source pixel position
    pub fn get_absolute(&self, x: u32, y: u32) -> Option<f64> {
        if x < self.region.x || y < self.region.y {
            return None;
        }
        self.get(x - self.region.x, y - self.region.y)
    }
}

/// A georeferenced GeoTIFF image
pub struct GeoRaster {
    location: SourceLocation,
    source: Mutex<BoxedReader>,
    width: u32,
    height: u32,
    layout: SampleLayout,
    grid: BlockGrid,
    compression: Box<dyn CompressionHandler>,
    geo_info: GeoInfo,
    geotransform: GeoTransform,
    epsg: u32,
    nodata: Option<f64>,
}

impl GeoRaster {
    /// Open a raster source
    pub fn open(location: &SourceLocation, opener: &SourceOpener) -> TiffResult<Self> {
        let source = opener.open(location)?;
        Self::from_reader(location.clone(), source)
    }

    /// Parse a raster from an already opened reader
    pub fn from_reader(location: SourceLocation, mut source: BoxedReader) -> TiffResult<Self> {
        let mut reader = TiffReader::new();
        let tiff = reader.read(source.as_mut())?;
        let ifd = tiff.main_ifd()
            .ok_or_else(|| TiffError::GenericError("No IFDs found in TIFF file".to_string()))?
            .clone();

        let (width, height) = ifd.get_dimensions().ok_or(TiffError::MissingDimensions)?;
        let (width, height) = (width as u32, height as u32);

        let layout = SampleLayout::from_ifd(&reader, source.as_mut(), &ifd)?;
        let grid = BlockGrid::from_ifd(&reader, source.as_mut(), &ifd, width, height)?;
        let compression_code = ifd.get_tag_value(tags::COMPRESSION).unwrap_or(compression::NONE as u64);
        let compression = CompressionFactory::create_handler(compression_code)?;

        let geo_info = GeoKeyParser::extract_geo_info(&reader, source.as_mut(), &ifd)?;
        let geotransform = geo_info.geotransform()
            .ok_or_else(|| TiffError::NotGeoreferenced(location.to_string()))?;
        let epsg = geo_info.epsg()
            .ok_or_else(|| TiffError::NotGeoreferenced(format!("{} has no EPSG code", location)))?;

        let nodata = if ifd.has_tag(tags::GDAL_NODATA) {
            reader.read_ascii(source.as_mut(), &ifd, tags::GDAL_NODATA)?
                .trim()
                .parse::<f64>()
                .ok()
        } else {
            None
        };

        info!("Opened {} ({}x{}, {} bands, EPSG:{}, {})",
              location, width, height, layout.samples_per_pixel, epsg, compression.name());

        Ok(GeoRaster {
            location,
            source: Mutex::new(source),
            width,
            height,
            layout,
            grid,
            compression,
            geo_info,
            geotransform,
            epsg,
            nodata,
        })
    }

    pub fn location(&self) -> &SourceLocation {
        &self.location
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn band_count(&self) -> usize {
        self.layout.samples_per_pixel as usize
    }

    pub fn epsg(&self) -> u32 {
        self.epsg
    }

    pub fn geotransform(&self) -> GeoTransform {
        self.geotransform
    }

    pub fn geo_info(&self) -> &GeoInfo {
        &self.geo_info
    }

    pub fn layout(&self) -> &SampleLayout {
        &self.layout
    }

    /// GDAL_NODATA value, when declared
    pub fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    /// Extent in map coordinates
    pub fn bounds(&self) -> BoundingBox {
        self.geotransform.bounds(self.width as u64, self.height as u64)
    }

    /// Whether the image data is tiled
    pub fn is_tiled(&self) -> bool {
        self.grid.tiled
    }

    /// GDAL data type name of the samples
    pub fn data_type_name(&self) -> &'static str {
        use crate::tiff::constants::sample_format;
        match (self.layout.sample_format, self.layout.bits_per_sample) {
            (sample_format::IEEEFP, 32) => "Float32",
            (sample_format::IEEEFP, _) => "Float64",
            (sample_format::SIGNED, 8) => "Int8",
            (sample_format::SIGNED, 16) => "Int16",
            (sample_format::SIGNED, _) => "Int32",
            (_, 8) => "Byte",
            (_, 16) => "UInt16",
            _ => "UInt32",
        }
    }

    /// Read one band (0-based) over a pixel window
    pub fn read_window(&self, band: usize, region: Region) -> TiffResult<BandWindow> {
        if band >= self.band_count() {
            return Err(TiffError::GenericError(format!(
                "Band {} out of range, {} has {} bands", band + 1, self.location, self.band_count()
            )));
        }
        if region.end_x() > self.width || region.end_y() > self.height {
            return Err(TiffError::GenericError(format!(
                "Window {:?} exceeds image size {}x{}", region, self.width, self.height
            )));
        }

        let fill = self.nodata.unwrap_or(0.0);
        let mut data = vec![fill; region.pixel_count()];
        if region.is_empty() {
            return Ok(BandWindow { region, data });
        }

        let grid = &self.grid;
        let start_bx = region.x / grid.block_width;
        let start_by = region.y / grid.block_height;
        let end_bx = (region.end_x() - 1) / grid.block_width;
        let end_by = (region.end_y() - 1) / grid.block_height;
        debug!("Reading band {} of {} blocks ({},{})..=({},{})",
               band + 1, self.location, start_bx, start_by, end_bx, end_by);

        let spp = self.layout.block_samples_per_pixel();
        let sample_in_pixel = if self.layout.is_planar() { 0 } else { band };
        let plane_offset = if self.layout.is_planar() { band * grid.blocks_per_plane() } else { 0 };

        for by in start_by..=end_by {
            for bx in start_bx..=end_bx {
                let index = plane_offset + (by * grid.blocks_across + bx) as usize;
                let block_top = by * grid.block_height;
                let block_left = bx * grid.block_width;
                let rows = if grid.tiled {
                    grid.block_height
                } else {
                    grid.block_height.min(self.height - block_top)
                };

                let samples = self.read_block(index, rows)?;

                let row_from = region.y.max(block_top);
                let row_to = region.end_y().min(block_top + rows);
                let col_from = region.x.max(block_left);
                let col_to = region.end_x().min(block_left + grid.block_width);

                for y in row_from..row_to {
                    for x in col_from..col_to {
                        let src = ((y - block_top) * grid.block_width + (x - block_left)) as usize * spp
                            + sample_in_pixel;
                        let dst = ((y - region.y) * region.width + (x - region.x)) as usize;
                        if let Some(&value) = samples.get(src) {
                            data[dst] = value;
                        }
                    }
                }
            }
        }

        Ok(BandWindow { region, data })
    }

    /// Read, decompress and decode one block
    fn read_block(&self, index: usize, rows: u32) -> TiffResult<Vec<f64>> {
        let offset = *self.grid.offsets.get(index)
            .ok_or_else(|| TiffError::GenericError(format!("Block index {} out of bounds", index)))?;
        let byte_count = self.grid.byte_counts[index];

        // Sparse blocks have no data
        if offset == 0 || byte_count == 0 {
            let len = self.grid.block_width as usize * rows as usize * self.layout.block_samples_per_pixel();
            return Ok(vec![self.nodata.unwrap_or(0.0); len]);
        }

        validation::validate_tag_size(0, byte_count)?;
        let mut compressed = vec![0u8; byte_count as usize];
        {
            let mut source = self.source.lock()
                .map_err(|_| TiffError::GenericError("Raster source lock poisoned".to_string()))?;
            source.seek(SeekFrom::Start(offset))?;
            source.read_exact(&mut compressed)?;
        }

        let decompressed = self.compression.decompress(&compressed)?;
        self.layout.decode_block(&decompressed, self.grid.block_width as usize, rows as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    use crate::tiff::builder::TiffBuilder;
    use crate::tiff::constants::compression;

    fn open_bytes(bytes: Vec<u8>) -> GeoRaster {
        GeoRaster::from_reader(SourceLocation::parse("memory.tif"), Box::new(Cursor::new(bytes))).unwrap()
    }

    fn gradient(width: u32, height: u32, scale: u16) -> Vec<u16> {
        (0..height).flat_map(|y| (0..width).map(move |x| (y * 100 + x) as u16 * scale)).collect()
    }

    #[test]
    fn test_stripped_window() {
        let bytes = TiffBuilder::new(30, 40)
            .with_u16_bands(&[gradient(30, 40, 1)])
            .unwrap()
            .compression(compression::ADOBE_DEFLATE)
            .georeference(32654, GeoTransform::north_up(300000.0, 4000000.0, 10.0, 10.0))
            .to_bytes()
            .unwrap();
        let raster = open_bytes(bytes);

        assert_eq!(raster.epsg(), 32654);
        assert_eq!(raster.band_count(), 1);
        assert_eq!(raster.data_type_name(), "UInt16");
        assert!(!raster.is_tiled());

        // Window crossing the strip boundary at row 16
        let window = raster.read_window(0, Region::new(5, 14, 4, 4)).unwrap();
        assert_eq!(window.get(0, 0), Some(1405.0));
        assert_eq!(window.get(3, 3), Some(1708.0));
        assert_eq!(window.get_absolute(6, 16), Some(1606.0));
        assert_eq!(window.get(4, 0), None);
    }

    #[test]
    fn test_tiled_multiband_window() {
        let bands = vec![gradient(50, 40, 1), gradient(50, 40, 2), gradient(50, 40, 3)];
        let bytes = TiffBuilder::new(50, 40)
            .with_u16_bands(&bands)
            .unwrap()
            .tiled(16)
            .compression(compression::ZSTD)
            .georeference(32654, GeoTransform::north_up(300000.0, 4000000.0, 10.0, 10.0))
            .to_bytes()
            .unwrap();
        let raster = open_bytes(bytes);
        assert!(raster.is_tiled());
        assert_eq!(raster.band_count(), 3);

        let window = raster.read_window(2, Region::new(14, 30, 20, 10)).unwrap();
        assert_eq!(window.get_absolute(14, 30), Some(3014.0 * 3.0));
        assert_eq!(window.get_absolute(33, 39), Some(3933.0 * 3.0));
        assert!(raster.read_window(3, Region::new(0, 0, 1, 1)).is_err());
        assert!(raster.read_window(0, Region::new(45, 0, 10, 1)).is_err());
    }

    #[test]
    fn test_bounds_and_missing_georeference() {
        let bytes = TiffBuilder::new(20, 10)
            .with_u8_bands(&[vec![1; 200]])
            .unwrap()
            .georeference(32654, GeoTransform::north_up(1000.0, 2000.0, 10.0, 10.0))
            .to_bytes()
            .unwrap();
        let bounds = open_bytes(bytes).bounds();
        assert_eq!((bounds.min_x, bounds.min_y, bounds.max_x, bounds.max_y), (1000.0, 1900.0, 1200.0, 2000.0));

        let plain = TiffBuilder::new(4, 4).with_u8_bands(&[vec![0; 16]]).unwrap().to_bytes().unwrap();
        let result = GeoRaster::from_reader(SourceLocation::parse("plain.tif"), Box::new(Cursor::new(plain)));
        assert!(matches!(result, Err(TiffError::NotGeoreferenced(_))));
    }
}
