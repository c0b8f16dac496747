//! Month-by-month processing of one point and year
//!
//! Each month is independent: a month without a usable scene is skipped,
//! and a failure is logged and recorded without stopping later months.

use log::{error, info};
use std::path::PathBuf;

use crate::catalog::{select_scene, SceneCandidate, SceneCatalog, SearchRequest, TimeWindow};
use crate::chip::OutputFormat;
use crate::error::{ChipError, ChipResult};
use crate::io::source::SourceLocation;
use crate::points::PointOfInterest;

use super::naming::output_path;
use super::renderer::ChipRenderer;

/// What happened to one month
#[derive(Debug, Clone, PartialEq)]
pub enum MonthOutcome {
    /// Chip written to this path
    Extracted(PathBuf),
    /// No scene under the cloud limit
    Skipped,
    /// Error message with context
    Failed(String),
}

/// Result of one (point, year) unit
#[derive(Debug, Clone, PartialEq)]
pub struct UnitOutcome {
    pub point_id: String,
    pub year: i32,
    /// Outcome per month, January first
    pub months: Vec<(u32, MonthOutcome)>,
}

impl UnitOutcome {
    fn count(&self, predicate: impl Fn(&MonthOutcome) -> bool) -> usize {
        self.months.iter().filter(|(_, outcome)| predicate(outcome)).count()
    }

    pub fn extracted(&self) -> usize {
        self.count(|o| matches!(o, MonthOutcome::Extracted(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, MonthOutcome::Skipped))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, MonthOutcome::Failed(_)))
    }
}

/// Search settings and output layout shared by all units
#[derive(Debug, Clone, PartialEq)]
pub struct DriverSettings {
    pub collection: String,
    /// Asset keys, in output band order
    pub bands: Vec<String>,
    pub cloud_cover_limit: f64,
    pub search_limit: usize,
    pub output_dir: PathBuf,
    pub format: OutputFormat,
}

/// Runs the twelve months of one point and year
pub struct TemporalDriver<'a> {
    catalog: &'a dyn SceneCatalog,
    renderer: &'a dyn ChipRenderer,
    settings: DriverSettings,
}

impl<'a> TemporalDriver<'a> {
    pub fn new(catalog: &'a dyn SceneCatalog, renderer: &'a dyn ChipRenderer, settings: DriverSettings) -> Self {
        TemporalDriver { catalog, renderer, settings }
    }

    pub fn settings(&self) -> &DriverSettings {
        &self.settings
    }

    /// Process months 1 to 12 of `year` for `point`, in order
    pub fn run_point_year(&self, point: &PointOfInterest, year: i32) -> UnitOutcome {
        let months = (1..=12)
            .map(|month| {
                let outcome = match TimeWindow::month(year, month) {
                    Ok(window) => self.run_month(point, &window),
                    Err(e) => Err(e),
                };
                let outcome = outcome.unwrap_or_else(|e| {
                    error!("Point {} {}-{:02} failed: {}", point.id, year, month, e);
                    MonthOutcome::Failed(e.to_string())
                });
                (month, outcome)
            })
            .collect();

        UnitOutcome { point_id: point.id.clone(), year, months }
    }

    fn run_month(&self, point: &PointOfInterest, window: &TimeWindow) -> ChipResult<MonthOutcome> {
        let request = SearchRequest::new(
            &self.settings.collection,
            point.location(),
            *window,
            self.settings.cloud_cover_limit,
        )
        .max_items(self.settings.search_limit);

        let Some(scene) = select_scene(self.catalog, &request)? else {
            info!("No scene under {}% cloud for point {} in {}", self.settings.cloud_cover_limit, point.id, window);
            return Ok(MonthOutcome::Skipped);
        };

        let band_urls = self.band_urls(&scene)?;
        let path = output_path(&self.settings.output_dir, &point.id, &self.settings.collection, window, self.settings.format);
        info!("Creating chip {} from scene {}", path.display(), scene.id);

        self.renderer.render(&band_urls, point, &path)
            .map_err(|e| ChipError::Mosaic(format!("scene {}: {}", scene.id, e)))?;
        Ok(MonthOutcome::Extracted(path))
    }

    /// Asset references of the configured bands, `/vsicurl/` for remote hrefs
    fn band_urls(&self, scene: &SceneCandidate) -> ChipResult<Vec<String>> {
        self.settings.bands.iter()
            .map(|band| {
                scene.asset(band)
                    .map(|href| SourceLocation::parse(href).to_reference())
                    .ok_or_else(|| ChipError::Catalog(format!("Scene {} has no '{}' asset", scene.id, band)))
            })
            .collect()
    }
}
