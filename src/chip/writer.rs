//! Chip output files
//!
//! Writes the 8-bit chip image, its `.wld` world file and a PAM
//! `.aux.xml` sidecar naming the coordinate system.

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use log::debug;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::writer::Writer;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::coordinate::CoordinateSystem;
use crate::error::{ChipError, ChipResult};
use crate::tiff::builder::TiffBuilder;
use crate::tiff::constants::compression;

use super::params::OutputFormat;
use super::window::ChipWindow;

/// Path of the world file belonging to an image (extension replaced by `wld`)
pub fn world_file_path(image_path: &Path) -> PathBuf {
    image_path.with_extension("wld")
}

/// Path of the PAM sidecar belonging to an image (`<image>.aux.xml`)
pub fn aux_xml_path(image_path: &Path) -> PathBuf {
    let mut name = image_path.as_os_str().to_os_string();
    name.push(".aux.xml");
    PathBuf::from(name)
}

/// Write the chip image and its sidecars
///
/// `bands` holds one or three row-major 8-bit bands of the window's size.
pub fn write_chip(
    path: &Path,
    window: &ChipWindow,
    bands: &[Vec<u8>],
    format: OutputFormat,
    jpeg_quality: u8,
) -> ChipResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    write_image(path, window, bands, format, jpeg_quality)?;
    write_world_file(&world_file_path(path), window)?;
    write_aux_xml(&aux_xml_path(path), window.epsg)?;
    debug!("Wrote {} with sidecars", path.display());
    Ok(())
}

fn write_image(
    path: &Path,
    window: &ChipWindow,
    bands: &[Vec<u8>],
    format: OutputFormat,
    jpeg_quality: u8,
) -> ChipResult<()> {
    let (width, height) = (window.width, window.height);
    let pixels = width as usize * height as usize;
    if bands.iter().any(|band| band.len() != pixels) {
        return Err(ChipError::InvalidInput(format!("Band buffers do not match {}x{}", width, height)));
    }

    if format == OutputFormat::GTiff {
        TiffBuilder::new(width, height)
            .with_u8_bands(bands)?
            .compression(compression::ADOBE_DEFLATE)
            .georeference(window.epsg, window.geotransform())
            .software(concat!("chipkit ", env!("CARGO_PKG_VERSION")))
            .write(path)?;
        return Ok(());
    }

    let image = match bands.len() {
        1 => GrayImage::from_raw(width, height, bands[0].clone()).map(DynamicImage::ImageLuma8),
        3 => {
            let mut interleaved = Vec::with_capacity(pixels * 3);
            for i in 0..pixels {
                interleaved.extend_from_slice(&[bands[0][i], bands[1][i], bands[2][i]]);
            }
            RgbImage::from_raw(width, height, interleaved).map(DynamicImage::ImageRgb8)
        }
        n => return Err(ChipError::InvalidInput(format!("Chips need 1 or 3 bands, got {}", n))),
    }
    .ok_or_else(|| ChipError::InvalidInput("Band buffer too small".to_string()))?;

    if format == OutputFormat::Jpeg {
        let writer = BufWriter::new(File::create(path)?);
        image.write_with_encoder(JpegEncoder::new_with_quality(writer, jpeg_quality))?;
    } else {
        image.save_with_format(path, ImageFormat::Png)?;
    }
    Ok(())
}

/// Write the six world-file lines
pub fn write_world_file(path: &Path, window: &ChipWindow) -> ChipResult<()> {
    let lines: Vec<String> = window.world_file_params()
        .iter()
        .map(|v| format!("{:.10}", v))
        .collect();
    fs::write(path, lines.join("\n") + "\n")?;
    Ok(())
}

fn xml_error<E: std::fmt::Display>(error: E) -> ChipError {
    ChipError::Io(std::io::Error::new(std::io::ErrorKind::Other, error.to_string()))
}

/// Write a PAM sidecar carrying the SRS as WKT
pub fn write_aux_xml(path: &Path, epsg: u32) -> ChipResult<()> {
    let wkt = CoordinateSystem::from_epsg(epsg).to_wkt();
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    writer.write_event(Event::Start(BytesStart::new("PAMDataset"))).map_err(xml_error)?;
    writer.write_event(Event::Start(BytesStart::new("SRS").with_attributes([("dataAxisToSRSAxisMapping", "1,2")])))
        .map_err(xml_error)?;
    writer.write_event(Event::Text(BytesText::new(&wkt))).map_err(xml_error)?;
    writer.write_event(Event::End(BytesEnd::new("SRS"))).map_err(xml_error)?;
    writer.write_event(Event::End(BytesEnd::new("PAMDataset"))).map_err(xml_error)?;

    let mut xml = writer.into_inner();
    xml.push(b'\n');
    fs::write(path, xml)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinate::Point;
    use tempfile::TempDir;

    fn window() -> ChipWindow {
        ChipWindow::around(Point::new(320000.0, 3985800.0), 32654, 80.0, 8, 8).unwrap()
    }

    #[test]
    fn test_sidecar_paths() {
        let path = Path::new("/out/P1_SENTINEL-2-L2A_2020_03.jpg");
        assert_eq!(world_file_path(path), PathBuf::from("/out/P1_SENTINEL-2-L2A_2020_03.wld"));
        assert_eq!(aux_xml_path(path), PathBuf::from("/out/P1_SENTINEL-2-L2A_2020_03.jpg.aux.xml"));
    }

    #[test]
    fn test_jpeg_chip_with_sidecars() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("chip.jpg");
        let bands = vec![vec![200u8; 64], vec![100u8; 64], vec![1u8; 64]];
        write_chip(&path, &window(), &bands, OutputFormat::Jpeg, 75).unwrap();

        let decoded = image::open(&path).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (8, 8));

        let wld = fs::read_to_string(dir.path().join("nested").join("chip.wld")).unwrap();
        let lines: Vec<&str> = wld.lines().collect();
        // 80 m half-extent over 4 pixels
        assert_eq!(lines, vec![
            "20.0000000000", "0.0000000000", "0.0000000000", "-20.0000000000",
            "319930.0000000000", "3985870.0000000000",
        ]);

        let aux = fs::read_to_string(aux_xml_path(&path)).unwrap();
        assert!(aux.starts_with("<PAMDataset>"));
        assert!(aux.contains("WGS 84 / UTM zone 54N"));
    }

    #[test]
    fn test_png_and_geotiff_chips() {
        let dir = TempDir::new().unwrap();
        let gray = vec![vec![7u8; 64]];

        let png = dir.path().join("chip.png");
        write_chip(&png, &window(), &gray, OutputFormat::Png, 75).unwrap();
        assert_eq!(image::open(&png).unwrap().to_luma8().get_pixel(3, 3).0, [7]);

        let tif = dir.path().join("chip.tif");
        write_chip(&tif, &window(), &gray, OutputFormat::GTiff, 75).unwrap();
        assert!(tif.exists());
        assert!(dir.path().join("chip.wld").exists());
    }

    #[test]
    fn test_band_count_is_checked() {
        let dir = TempDir::new().unwrap();
        let bands = vec![vec![0u8; 64], vec![0u8; 64]];
        let result = write_chip(&dir.path().join("x.jpg"), &window(), &bands, OutputFormat::Jpeg, 75);
        assert!(matches!(result, Err(ChipError::InvalidInput(_))));
    }
}
