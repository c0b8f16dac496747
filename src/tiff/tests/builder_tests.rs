//! Round trips through the GeoTIFF builder and reader

use std::io::Cursor;

use crate::coordinate::GeoTransform;
use crate::tiff::builder::TiffBuilder;
use crate::tiff::constants::{compression, tags};
use crate::tiff::geo_key_parser::GeoKeyParser;
use crate::tiff::reader::TiffReader;

fn transform() -> GeoTransform {
    GeoTransform::north_up(300000.0, 4000000.0, 10.0, 10.0)
}

#[test]
fn test_stripped_geotiff_round_trip() {
    let band: Vec<u16> = (0..40 * 20).map(|i| i as u16).collect();
    let bytes = TiffBuilder::new(40, 20)
        .with_u16_bands(&[band])
        .unwrap()
        .compression(compression::ADOBE_DEFLATE)
        .georeference(32654, transform())
        .to_bytes()
        .unwrap();

    let mut cursor = Cursor::new(bytes);
    let mut reader = TiffReader::new();
    let tiff = reader.read(&mut cursor).unwrap();
    let ifd = &tiff.ifds[0];

    assert_eq!(ifd.get_dimensions(), Some((40, 20)));
    assert_eq!(ifd.get_tag_value(tags::COMPRESSION), Some(8));
    assert_eq!(reader.read_tag_values(&mut cursor, ifd, tags::STRIP_OFFSETS).unwrap().len(), 2);

    let geo = GeoKeyParser::extract_geo_info(&reader, &mut cursor, ifd).unwrap();
    assert_eq!(geo.epsg(), Some(32654));
    assert_eq!(geo.geotransform(), Some(transform()));
}

#[test]
fn test_tiled_rgb_layout() {
    let bands: Vec<Vec<u8>> = (0..3).map(|b| vec![b as u8 * 10; 50 * 30]).collect();
    let bytes = TiffBuilder::new(50, 30)
        .with_u8_bands(&bands)
        .unwrap()
        .tiled(32)
        .to_bytes()
        .unwrap();

    let mut cursor = Cursor::new(bytes);
    let mut reader = TiffReader::new();
    let tiff = reader.read(&mut cursor).unwrap();
    let ifd = &tiff.ifds[0];

    assert!(ifd.is_tiled());
    assert_eq!(ifd.get_samples_per_pixel(), 3);
    assert_eq!(reader.read_tag_values(&mut cursor, ifd, tags::BITS_PER_SAMPLE).unwrap(), vec![8, 8, 8]);
    // 2 x 1 tiles of 32 x 32 pixels
    let counts = reader.read_tag_values(&mut cursor, ifd, tags::TILE_BYTE_COUNTS).unwrap();
    assert_eq!(counts, vec![32 * 32 * 3, 32 * 32 * 3]);

    let geo = GeoKeyParser::extract_geo_info(&reader, &mut cursor, ifd).unwrap();
    assert!(!geo.is_georeferenced());
}

#[test]
fn test_band_size_mismatch_is_rejected() {
    let result = TiffBuilder::new(4, 4).with_u8_bands(&[vec![0; 16], vec![0; 15]]);
    assert!(result.is_err());
    assert!(TiffBuilder::new(4, 4).to_bytes().is_err());
}
