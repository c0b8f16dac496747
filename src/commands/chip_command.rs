//! Single chip extraction command

use clap::ArgMatches;
use log::info;
use std::path::PathBuf;

use crate::chip::{extract_chip, ChipParams};
use crate::commands::command_traits::Command;
use crate::commands::options::{apply_chip_overrides, load_config, parse_arg};
use crate::error::{ChipError, ChipResult};
use crate::io::source::SourceOpener;
use crate::mosaic::build_mosaic;
use crate::utils::logger::Logger;

/// Command extracting one chip from explicit band assets
pub struct ChipCommand<'a> {
    /// Band asset references in output band order
    bands: Vec<String>,
    lon: f64,
    lat: f64,
    output: PathBuf,
    params: ChipParams,
    http_timeout_secs: u64,
    /// Logger for recording operations
    logger: &'a Logger,
}

impl<'a> ChipCommand<'a> {
    /// Create a new chip command
    ///
    /// # Arguments
    /// * `args` - Matches of the `chip` subcommand
    /// * `logger` - Logger for recording operations
    ///
    /// # Returns
    /// A new ChipCommand instance or an error
    pub fn new(args: &ArgMatches, logger: &'a Logger) -> ChipResult<Self> {
        let config = load_config(args)?;
        let mut params = config.chip;
        apply_chip_overrides(&mut params, args)?;

        let bands: Vec<String> = args.try_get_many::<String>("band")
            .ok()
            .flatten()
            .map(|values| values.cloned().collect())
            .unwrap_or_default();
        if bands.is_empty() {
            return Err(ChipError::Config("At least one --band is required".to_string()));
        }

        let missing = |name: &str| ChipError::Config(format!("Missing --{}", name));
        let lon = parse_arg::<f64>(args, "lon")?.ok_or_else(|| missing("lon"))?;
        let lat = parse_arg::<f64>(args, "lat")?.ok_or_else(|| missing("lat"))?;
        let output = parse_arg::<PathBuf>(args, "output")?.ok_or_else(|| missing("output"))?;

        Ok(ChipCommand {
            bands,
            lon,
            lat,
            output,
            params,
            http_timeout_secs: config.http_timeout_secs,
            logger,
        })
    }
}

impl<'a> Command for ChipCommand<'a> {
    fn execute(&self) -> ChipResult<()> {
        info!("Extracting chip at ({}, {}) from {} band(s)", self.lon, self.lat, self.bands.len());
        let opener = SourceOpener::new(self.http_timeout_secs)?;
        let mosaic = build_mosaic(&self.bands, &opener)?;
        let window = extract_chip(&mosaic, self.lon, self.lat, &self.output, &self.params)?;

        self.logger.log(&format!(
            "Wrote {} ({}x{} px at {} x {} map units, EPSG:{})",
            self.output.display(), window.width, window.height, window.x_res, window.y_res, window.epsg
        ))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chip::OutputFormat;
    use crate::commands::cli::build_cli;
    use crate::coordinate::GeoTransform;
    use crate::tiff::builder::TiffBuilder;
    use log::LevelFilter;
    use tempfile::TempDir;

    #[test]
    fn test_chip_from_local_band() {
        let dir = TempDir::new().unwrap();
        let band = dir.path().join("band.tif");
        TiffBuilder::new(100, 100)
            .with_u8_bands(&[vec![50u8; 100 * 100]])
            .unwrap()
            .georeference(32654, GeoTransform::north_up(319000.0, 3986500.0, 10.0, 10.0))
            .write(&band)
            .unwrap();
        let output = dir.path().join("chip.png");

        let matches = build_cli().try_get_matches_from([
            "chipkit", "chip",
            "--band", band.to_str().unwrap(),
            "--lon", "139.0", "--lat", "36.0",
            "--output", output.to_str().unwrap(),
            "--format", "png", "--size", "16", "--buffer", "100", "--scale-mode", "percentile",
        ]).unwrap();
        let args = matches.subcommand_matches("chip").unwrap();

        let logger = Logger::console(LevelFilter::Off);
        let command = ChipCommand::new(args, &logger).unwrap();
        assert_eq!(command.params.format, OutputFormat::Png);
        assert_eq!(command.params.width_px, 16);

        command.execute().unwrap();
        assert!(output.exists());
        assert!(dir.path().join("chip.wld").exists());
        assert!(dir.path().join("chip.png.aux.xml").exists());
    }
}
