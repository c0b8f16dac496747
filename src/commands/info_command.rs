//! Raster georeferencing report
//!
//! Prints size, band layout and georeferencing of a GeoTIFF (local or
//! remote) or of a VRT mosaic descriptor.

use clap::ArgMatches;
use log::info;

use crate::commands::command_traits::Command;
use crate::commands::options::string_arg;
use crate::coordinate::{BoundingBox, CoordinateSystem, GeoTransform};
use crate::error::{ChipError, ChipResult};
use crate::io::source::{SourceLocation, SourceOpener};
use crate::mosaic::Mosaic;
use crate::raster::GeoRaster;
use crate::utils::logger::Logger;

/// Command describing one raster source
pub struct InfoCommand<'a> {
    /// Path or URL of the raster
    source: String,
    http_timeout_secs: u64,
    /// Logger for recording operations
    logger: &'a Logger,
}

impl<'a> InfoCommand<'a> {
    /// Create a new info command
    ///
    /// # Arguments
    /// * `args` - Matches of the `info` subcommand
    /// * `logger` - Logger for recording operations
    ///
    /// # Returns
    /// A new InfoCommand instance or an error
    pub fn new(args: &ArgMatches, logger: &'a Logger) -> ChipResult<Self> {
        let source = string_arg(args, "source")
            .ok_or_else(|| ChipError::Config("Missing raster source".to_string()))?
            .to_string();
        Ok(InfoCommand { source, http_timeout_secs: 60, logger })
    }

    fn is_vrt(&self) -> bool {
        self.source.to_ascii_lowercase().ends_with(".vrt")
    }

    /// Report lines for the source
    pub fn describe(&self) -> ChipResult<Vec<String>> {
        let opener = SourceOpener::new(self.http_timeout_secs)?;

        if self.is_vrt() {
            let mosaic = Mosaic::open(&self.source, opener)?;
            let dataset = mosaic.dataset();
            let mut lines = vec![
                format!("VRT: {}", self.source),
                format!("  Size: {}x{}, {} band(s)", dataset.width, dataset.height, dataset.bands.len()),
            ];
            lines.extend(georeferencing_lines(mosaic.epsg(), &mosaic.geotransform(), &mosaic.bounds()));
            for band in &dataset.bands {
                lines.push(format!("  Band {} ({}):", band.band, band.data_type));
                for source in &band.sources {
                    lines.push(format!("    {} band {}", source.filename, source.source_band));
                }
            }
            return Ok(lines);
        }

        let raster = GeoRaster::open(&SourceLocation::parse(&self.source), &opener)?;
        let mut lines = vec![
            format!("GeoTIFF: {}", raster.location()),
            format!(
                "  Size: {}x{}, {} band(s) of {}, {}",
                raster.width(), raster.height(), raster.band_count(), raster.data_type_name(),
                if raster.is_tiled() { "tiled" } else { "stripped" }
            ),
        ];
        lines.extend(georeferencing_lines(raster.epsg(), &raster.geotransform(), &raster.bounds()));
        if let Some(nodata) = raster.nodata() {
            lines.push(format!("  NoData: {}", nodata));
        }
        Ok(lines)
    }
}

fn georeferencing_lines(epsg: u32, gt: &GeoTransform, bounds: &BoundingBox) -> Vec<String> {
    vec![
        format!("  CRS: EPSG:{} ({})", epsg, CoordinateSystem::from_epsg(epsg).description()),
        format!("  Origin: ({}, {})", gt.origin_x, gt.origin_y),
        format!("  Pixel size: ({}, {})", gt.pixel_width, gt.pixel_height),
        format!("  Extent: [{}, {}, {}, {}]", bounds.min_x, bounds.min_y, bounds.max_x, bounds.max_y),
    ]
}

impl<'a> Command for InfoCommand<'a> {
    fn execute(&self) -> ChipResult<()> {
        for line in self.describe()? {
            info!("{}", line);
            self.logger.log(&line)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::cli::build_cli;
    use crate::tiff::builder::TiffBuilder;
    use log::LevelFilter;
    use tempfile::TempDir;

    fn info_command<'a>(source: &str, logger: &'a Logger) -> InfoCommand<'a> {
        let matches = build_cli().try_get_matches_from(["chipkit", "info", source]).unwrap();
        InfoCommand::new(matches.subcommand_matches("info").unwrap(), logger).unwrap()
    }

    #[test]
    fn test_describe_geotiff_and_vrt() {
        let dir = TempDir::new().unwrap();
        let tif = dir.path().join("b.tif");
        TiffBuilder::new(20, 10)
            .with_u16_bands(&[vec![7u16; 200]])
            .unwrap()
            .georeference(32631, GeoTransform::north_up(500000.0, 5000000.0, 10.0, 10.0))
            .write(&tif)
            .unwrap();
        let logger = Logger::console(LevelFilter::Off);

        let lines = info_command(tif.to_str().unwrap(), &logger).describe().unwrap();
        assert!(lines[1].contains("20x10, 1 band(s) of UInt16"));
        assert!(lines.iter().any(|l| l.contains("EPSG:32631")));
        assert!(lines.iter().any(|l| l == "  Extent: [500000, 4999900, 500200, 5000000]"));

        let mosaic = crate::mosaic::build_mosaic(&[tif.to_string_lossy().into_owned()], &SourceOpener::new(5).unwrap()).unwrap();
        let vrt = dir.path().join("copy.vrt");
        std::fs::copy(mosaic.path(), &vrt).unwrap();
        let lines = info_command(vrt.to_str().unwrap(), &logger).describe().unwrap();
        assert!(lines[0].starts_with("VRT: "));
        assert!(lines.iter().any(|l| l.contains("b.tif band 1")));
    }

    #[test]
    fn test_missing_source() {
        let logger = Logger::console(LevelFilter::Off);
        assert!(info_command("/nonexistent/x.tif", &logger).execute().is_err());
    }
}
