//! Chip extraction from a mosaic
//!
//! Projects a WGS84 point into the mosaic's coordinate system, samples a
//! fixed-size window around it, rescales every band to 8 bits and writes
//! the image with its georeferencing sidecars.

use log::{debug, info};
use std::path::Path;

use crate::coordinate::CoordinateTransformer;
use crate::error::{ChipError, ChipResult};
use crate::mosaic::Mosaic;

use super::params::{ChipParams, ScaleMode};
use super::scale::{compute_scale_params, scale_band, ScaleRange};
use super::window::ChipWindow;
use super::writer::write_chip;

/// Extracts georeferenced 8-bit chips from mosaics
#[derive(Default)]
pub struct ChipExtractor {
    transformer: CoordinateTransformer,
}

impl ChipExtractor {
    pub fn new() -> Self {
        ChipExtractor { transformer: CoordinateTransformer::new() }
    }

    /// Extract one chip centred on a WGS84 point
    ///
    /// # Arguments
    /// * `mosaic` - Mosaic with one or three bands
    /// * `lon` - Longitude of the chip centre in degrees
    /// * `lat` - Latitude of the chip centre in degrees
    /// * `output_path` - Image path; the `.wld` and `.aux.xml` sidecars are written beside it
    /// * `params` - Window size, buffer and rescaling
    ///
    /// # Returns
    /// The window that was written, in the mosaic's coordinate system
    pub fn extract_chip(
        &self,
        mosaic: &Mosaic,
        lon: f64,
        lat: f64,
        output_path: &Path,
        params: &ChipParams,
    ) -> ChipResult<ChipWindow> {
        params.validate()?;

        let band_count = mosaic.band_count();
        if band_count != 1 && band_count != 3 {
            return Err(ChipError::InvalidInput(format!(
                "Chips need a 1 or 3 band mosaic, got {} bands", band_count
            )));
        }

        let window = ChipWindow::for_lon_lat(
            &self.transformer,
            lon,
            lat,
            mosaic.epsg(),
            params.buffer_meters,
            params.width_px,
            params.height_px,
        )?;
        debug!("Chip window for ({}, {}): {:?}", lon, lat, window.bounds());

        if !window.bounds().intersects(&mosaic.bounds()) {
            return Err(ChipError::InvalidInput(format!(
                "Point ({}, {}) is outside the mosaic extent", lon, lat
            )));
        }

        let grid = window.sample_grid();
        let samples = (0..band_count)
            .map(|band| mosaic.sample_band(band, &grid))
            .collect::<ChipResult<Vec<_>>>()?;

        let ranges = self.scale_ranges(&samples, params)?;
        let bands: Vec<Vec<u8>> = samples.iter()
            .zip(&ranges)
            .map(|(band, range)| scale_band(band, range, params.gamma))
            .collect();

        write_chip(output_path, &window, &bands, params.format, params.jpeg_quality)?;
        info!("Wrote chip {}", output_path.display());
        Ok(window)
    }

    fn scale_ranges(&self, samples: &[Vec<Option<f64>>], params: &ChipParams) -> ChipResult<Vec<ScaleRange>> {
        match params.scale_mode {
            ScaleMode::Fixed => {
                if params.scale_ranges.len() != samples.len() {
                    return Err(ChipError::InvalidInput(format!(
                        "{} scale ranges configured for {} bands",
                        params.scale_ranges.len(),
                        samples.len()
                    )));
                }
                Ok(params.scale_ranges.clone())
            }
            ScaleMode::Percentile => {
                let valid: Vec<Vec<f64>> = samples.iter()
                    .map(|band| band.iter().flatten().copied().collect())
                    .collect();
                let ranges = compute_scale_params(&valid);
                debug!("Percentile scale ranges: {:?}", ranges);
                Ok(ranges)
            }
        }
    }
}

/// Extract one chip with a default extractor
pub fn extract_chip(
    mosaic: &Mosaic,
    lon: f64,
    lat: f64,
    output_path: &Path,
    params: &ChipParams,
) -> ChipResult<ChipWindow> {
    ChipExtractor::new().extract_chip(mosaic, lon, lat, output_path, params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chip::params::OutputFormat;
    use crate::coordinate::GeoTransform;
    use crate::io::source::SourceOpener;
    use crate::mosaic::MosaicBuilder;
    use crate::tiff::builder::TiffBuilder;
    use tempfile::TempDir;

    // 1 km square in UTM 54N around (139E, 36N)
    const ORIGIN_X: f64 = 319000.0;
    const ORIGIN_Y: f64 = 3986500.0;
    const LON: f64 = 139.0;
    const LAT: f64 = 36.0;

    fn constant_band(dir: &TempDir, name: &str, value: u16) -> String {
        let path = dir.path().join(name);
        TiffBuilder::new(100, 100)
            .with_u16_bands(&[vec![value; 100 * 100]])
            .unwrap()
            .georeference(32654, GeoTransform::north_up(ORIGIN_X, ORIGIN_Y, 10.0, 10.0))
            .write(&path)
            .unwrap();
        path.to_string_lossy().into_owned()
    }

    fn mosaic(dir: &TempDir, values: &[u16]) -> Mosaic {
        let urls: Vec<String> = values.iter()
            .enumerate()
            .map(|(i, v)| constant_band(dir, &format!("B{}.tif", i), *v))
            .collect();
        MosaicBuilder::new(SourceOpener::new(5).unwrap()).build(&urls).unwrap()
    }

    fn small_params(format: OutputFormat) -> ChipParams {
        ChipParams {
            buffer_meters: 200.0,
            width_px: 16,
            height_px: 16,
            format,
            ..ChipParams::default()
        }
    }

    #[test]
    fn test_fixed_ranges_with_gamma() {
        let dir = TempDir::new().unwrap();
        // Each value sits at the middle of its default range
        let mosaic = mosaic(&dir, &[3000, 2500, 1600]);
        let output = dir.path().join("out").join("P1_SENTINEL-2-L2A_2020_03.png");

        let window = extract_chip(&mosaic, LON, LAT, &output, &small_params(OutputFormat::Png)).unwrap();
        assert_eq!(window.x_res, 25.0);
        assert_eq!(window.epsg, 32654);

        let image = image::open(&output).unwrap().to_rgb8();
        assert_eq!(image.dimensions(), (16, 16));
        assert_eq!(image.get_pixel(8, 8).0, [104, 104, 104]);
        assert!(output.with_extension("wld").exists());
    }

    #[test]
    fn test_percentile_constant_band() {
        let dir = TempDir::new().unwrap();
        let mosaic = mosaic(&dir, &[1234]);
        let output = dir.path().join("gray.png");
        let params = ChipParams { scale_mode: ScaleMode::Percentile, ..small_params(OutputFormat::Png) };

        ChipExtractor::new().extract_chip(&mosaic, LON, LAT, &output, &params).unwrap();
        let image = image::open(&output).unwrap().to_luma8();
        assert!(image.pixels().all(|p| p.0 == [1]));
    }

    #[test]
    fn test_percentiles_come_from_the_chip_window() {
        let dir = TempDir::new().unwrap();
        // Bright everywhere except a gradient block under the chip
        let values: Vec<u16> = (0..100 * 100)
            .map(|i| {
                let (row, col) = (i / 100, i % 100);
                if row < 50 || col < 50 { 10000 } else { 100 + col as u16 }
            })
            .collect();
        let path = dir.path().join("gradient.tif");
        TiffBuilder::new(100, 100)
            .with_u16_bands(&[values])
            .unwrap()
            .georeference(32654, GeoTransform::north_up(ORIGIN_X, ORIGIN_Y, 10.0, 10.0))
            .write(&path)
            .unwrap();
        let mosaic = MosaicBuilder::new(SourceOpener::new(5).unwrap())
            .build(&[path.to_string_lossy().into_owned()])
            .unwrap();

        let output = dir.path().join("stretch.png");
        let params = ChipParams { scale_mode: ScaleMode::Percentile, ..small_params(OutputFormat::Png) };
        extract_chip(&mosaic, LON, LAT, &output, &params).unwrap();

        let image = image::open(&output).unwrap().to_luma8();
        // Stretched over the window's own 150-199 values, not the bright surround
        assert!(image.get_pixel(8, 8).0[0] > 50);
        assert!(image.pixels().any(|p| p.0[0] >= 250));
    }

    #[test]
    fn test_point_outside_mosaic() {
        let dir = TempDir::new().unwrap();
        let mosaic = mosaic(&dir, &[1000, 1000, 1000]);
        let output = dir.path().join("far.jpg");

        let result = extract_chip(&mosaic, 141.0, 36.0, &output, &small_params(OutputFormat::Jpeg));
        assert!(matches!(result, Err(ChipError::InvalidInput(_))));
        assert!(!output.exists());
    }

    #[test]
    fn test_band_and_range_counts() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("x.jpg");

        let two_bands = mosaic(&dir, &[1000, 1000]);
        assert!(extract_chip(&two_bands, LON, LAT, &output, &small_params(OutputFormat::Jpeg)).is_err());

        let one_band = mosaic(&dir, &[1000]);
        let result = extract_chip(&one_band, LON, LAT, &output, &small_params(OutputFormat::Jpeg));
        assert!(matches!(result, Err(ChipError::InvalidInput(_))));
    }
}
