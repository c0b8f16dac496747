//! Run configuration
//!
//! `ChipConfig` holds every tunable of a batch run. Values come from the
//! defaults below, optionally a TOML file, then command-line overrides.

use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use crate::catalog::{DEFAULT_CATALOG_URL, DEFAULT_SEARCH_LIMIT};
use crate::chip::{ChipParams, ScaleMode};
use crate::error::{ChipError, ChipResult};

/// Default scene collection
pub const DEFAULT_COLLECTION: &str = "sentinel-2-l2a";

/// Default asset keys, in output band order
pub fn default_bands() -> Vec<String> {
    ["swir16", "nir08", "red"].iter().map(|b| b.to_string()).collect()
}

/// Configuration of a chip extraction run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChipConfig {
    /// STAC API root
    pub catalog_url: String,
    pub collection: String,
    /// Scenes need strictly less cloud cover than this (percent)
    pub cloud_cover_limit: f64,
    /// Maximum number of items collected per search
    pub search_limit: usize,
    /// Asset keys mapped to output bands, in order
    pub bands: Vec<String>,
    pub chip: ChipParams,
    /// First and last year processed (inclusive)
    pub first_year: i32,
    pub last_year: i32,
    /// GeoJSON FeatureCollection of points
    pub input: Option<PathBuf>,
    /// Feature property holding the point identifier
    pub id_property: String,
    pub output_dir: PathBuf,
    /// Keep only the first N input features
    pub limit: Option<usize>,
    /// Worker threads; 0 uses one per core
    pub workers: usize,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub http_timeout_secs: u64,
    /// Exit with status 0 even when the run fails
    pub exit_zero_on_error: bool,
    /// Show a progress bar over work units
    pub progress: bool,
}

impl Default for ChipConfig {
    fn default() -> Self {
        ChipConfig {
            catalog_url: DEFAULT_CATALOG_URL.to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            cloud_cover_limit: 5.0,
            search_limit: DEFAULT_SEARCH_LIMIT,
            bands: default_bands(),
            chip: ChipParams::default(),
            first_year: 2019,
            last_year: 2022,
            input: None,
            id_property: "ID".to_string(),
            output_dir: PathBuf::from("."),
            limit: None,
            workers: 0,
            max_retries: 3,
            retry_backoff_ms: 500,
            http_timeout_secs: 60,
            exit_zero_on_error: false,
            progress: true,
        }
    }
}

impl ChipConfig {
    /// Load a TOML file; missing keys keep their defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> ChipResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| ChipError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        let config = Self::from_toml(&content)
            .map_err(|e| ChipError::Config(format!("{}: {}", path.display(), e)))?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> ChipResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Years to process
    pub fn years(&self) -> RangeInclusive<i32> {
        self.first_year..=self.last_year
    }

    /// Set the year range from `2020` or `2019-2022`
    pub fn set_years(&mut self, range: &str) -> ChipResult<()> {
        let parse = |s: &str| {
            s.trim().parse::<i32>()
                .map_err(|_| ChipError::Config(format!("Invalid year '{}'", s.trim())))
        };
        let (first, last) = match range.split_once('-') {
            Some((first, last)) => (parse(first)?, parse(last)?),
            None => {
                let year = parse(range)?;
                (year, year)
            }
        };
        self.first_year = first;
        self.last_year = last;
        Ok(())
    }

    /// Check the configuration is consistent
    pub fn validate(&self) -> ChipResult<()> {
        if self.collection.trim().is_empty() {
            return Err(ChipError::Config("Collection must not be empty".to_string()));
        }
        if !(self.cloud_cover_limit.is_finite() && self.cloud_cover_limit > 0.0) {
            return Err(ChipError::Config(format!(
                "Cloud cover limit must be positive, got {}", self.cloud_cover_limit
            )));
        }
        if self.search_limit == 0 {
            return Err(ChipError::Config("Search limit must be at least 1".to_string()));
        }
        if self.bands.len() != 1 && self.bands.len() != 3 {
            return Err(ChipError::Config(format!("Expected 1 or 3 bands, got {}", self.bands.len())));
        }
        if !(1000..=9999).contains(&self.first_year) || !(1000..=9999).contains(&self.last_year) {
            return Err(ChipError::Config(format!(
                "Years {}-{} are outside 1000-9999", self.first_year, self.last_year
            )));
        }
        if self.first_year > self.last_year {
            return Err(ChipError::Config(format!(
                "First year {} is after last year {}", self.first_year, self.last_year
            )));
        }
        if self.id_property.is_empty() {
            return Err(ChipError::Config("ID property must not be empty".to_string()));
        }
        if self.chip.scale_mode == ScaleMode::Fixed && self.chip.scale_ranges.len() != self.bands.len() {
            return Err(ChipError::Config(format!(
                "{} scale ranges configured for {} bands",
                self.chip.scale_ranges.len(),
                self.bands.len()
            )));
        }
        self.chip.validate().map_err(|e| ChipError::Config(e.to_string()))
    }
}
