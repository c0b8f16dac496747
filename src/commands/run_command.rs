//! Batch chip extraction command
//!
//! Loads the points, then extracts one chip per point, year and month
//! using the configured catalog and band assets.

use clap::ArgMatches;
use log::{error, info};
use std::fs;

use crate::catalog::StacClient;
use crate::commands::command_traits::Command;
use crate::commands::options::{apply_run_overrides, flag_arg, load_config};
use crate::config::ChipConfig;
use crate::error::{ChipError, ChipResult};
use crate::io::source::SourceOpener;
use crate::pipeline::{DriverSettings, MosaicChipRenderer, Orchestrator, RunReport, TemporalDriver, WorkerPool};
use crate::points::load_features;
use crate::utils::logger::Logger;

/// Command running the whole point × year × month fan-out
pub struct RunCommand<'a> {
    /// Effective configuration after file and CLI overrides
    config: ChipConfig,
    /// Fail with `RunIncomplete` when any month or unit failed
    strict: bool,
    /// Logger for recording operations
    logger: &'a Logger,
}

impl<'a> RunCommand<'a> {
    /// Create a new run command
    ///
    /// # Arguments
    /// * `args` - Matches of the `run` subcommand
    /// * `logger` - Logger for recording operations
    ///
    /// # Returns
    /// A new RunCommand instance or an error
    pub fn new(args: &ArgMatches, logger: &'a Logger) -> ChipResult<Self> {
        let mut config = load_config(args)?;
        apply_run_overrides(&mut config, args)?;
        Ok(Self::with_config(config, flag_arg(args, "strict"), logger))
    }

    pub fn with_config(config: ChipConfig, strict: bool, logger: &'a Logger) -> Self {
        RunCommand { config, strict, logger }
    }

    pub fn config(&self) -> &ChipConfig {
        &self.config
    }

    fn driver_settings(&self) -> DriverSettings {
        DriverSettings {
            collection: self.config.collection.clone(),
            bands: self.config.bands.clone(),
            cloud_cover_limit: self.config.cloud_cover_limit,
            search_limit: self.config.search_limit,
            output_dir: self.config.output_dir.clone(),
            format: self.config.chip.format,
        }
    }

    /// Load the points and run every unit
    pub fn run(&self) -> ChipResult<RunReport> {
        let config = &self.config;
        config.validate()?;

        let input = config.input.as_ref()
            .ok_or_else(|| ChipError::Config("No input GeoJSON given".to_string()))?;
        let features = load_features(input, &config.id_property, config.limit)?;
        fs::create_dir_all(&config.output_dir)?;

        info!("Searching {} in {} (cloud cover < {}%)", config.collection, config.catalog_url, config.cloud_cover_limit);
        let catalog = StacClient::new(&config.catalog_url, config.http_timeout_secs)?
            .retries(config.max_retries, config.retry_backoff_ms);
        let opener = SourceOpener::new(config.http_timeout_secs)?;
        let renderer = MosaicChipRenderer::new(opener, config.chip.clone());

        let mut pool = WorkerPool::new(config.workers);
        pool.start()?;
        let report = {
            let driver = TemporalDriver::new(&catalog, &renderer, self.driver_settings());
            Orchestrator::new(driver, &pool)
                .progress(config.progress)
                .run(&features, config.years())
        };
        pool.shutdown();
        report
    }
}

impl<'a> Command for RunCommand<'a> {
    fn execute(&self) -> ChipResult<()> {
        match self.run() {
            Ok(report) => {
                self.logger.log(&format!("Run summary: {}", report))?;
                if self.strict && report.has_failures() {
                    return Err(ChipError::RunIncomplete {
                        failed_months: report.failed_months,
                        failed_units: report.failed_units,
                    });
                }
                Ok(())
            }
            Err(e) if self.config.exit_zero_on_error => {
                error!("Run failed: {}", e);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
