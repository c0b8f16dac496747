//! Turning a scene's band assets into a chip

use log::info;
use std::path::Path;

use crate::chip::{ChipExtractor, ChipParams};
use crate::error::ChipResult;
use crate::io::source::SourceOpener;
use crate::mosaic::MosaicBuilder;
use crate::points::PointOfInterest;

/// Renders one chip from band asset references
pub trait ChipRenderer: Send + Sync {
    /// Write the chip for `point` to `output_path`
    ///
    /// `band_urls` are in output band order.
    fn render(&self, band_urls: &[String], point: &PointOfInterest, output_path: &Path) -> ChipResult<()>;
}

/// Builds a temporary mosaic over the assets and extracts the chip from it
pub struct MosaicChipRenderer {
    builder: MosaicBuilder,
    extractor: ChipExtractor,
    params: ChipParams,
}

impl MosaicChipRenderer {
    pub fn new(opener: SourceOpener, params: ChipParams) -> Self {
        MosaicChipRenderer {
            builder: MosaicBuilder::new(opener),
            extractor: ChipExtractor::new(),
            params,
        }
    }

    pub fn params(&self) -> &ChipParams {
        &self.params
    }
}

impl ChipRenderer for MosaicChipRenderer {
    fn render(&self, band_urls: &[String], point: &PointOfInterest, output_path: &Path) -> ChipResult<()> {
        let mosaic = self.builder.build(band_urls)?;
        info!("Built VRT {} for {}", mosaic.path().display(), output_path.display());
        self.extractor.extract_chip(&mosaic, point.lon, point.lat, output_path, &self.params)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chip::OutputFormat;
    use crate::coordinate::GeoTransform;
    use crate::tiff::builder::TiffBuilder;
    use tempfile::TempDir;

    #[test]
    fn test_render_single_band() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("red.tif");
        TiffBuilder::new(100, 100)
            .with_u16_bands(&[vec![1000; 100 * 100]])
            .unwrap()
            .georeference(32654, GeoTransform::north_up(319000.0, 3986500.0, 10.0, 10.0))
            .write(&source)
            .unwrap();

        let params = ChipParams {
            buffer_meters: 100.0,
            width_px: 8,
            height_px: 8,
            format: OutputFormat::Png,
            scale_ranges: vec![[0.0, 2000.0, 1.0, 255.0].into()],
            ..ChipParams::default()
        };
        let renderer = MosaicChipRenderer::new(SourceOpener::new(5).unwrap(), params);
        let point = PointOfInterest::new("p", 139.0, 36.0).unwrap();
        let output = dir.path().join("P_S2_2020_01.png");

        renderer.render(&[source.to_string_lossy().into_owned()], &point, &output).unwrap();
        assert!(output.exists());
        assert!(dir.path().join("P_S2_2020_01.wld").exists());
    }
}
