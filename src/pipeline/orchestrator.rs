//! Fan-out of (point, year) units over the worker pool

use log::{error, info, warn};
use std::collections::HashSet;
use std::fmt;
use std::ops::RangeInclusive;

use crate::error::{ChipError, ChipResult};
use crate::points::{InputFeature, PointOfInterest};
use crate::utils::progress::ProgressTracker;

use super::driver::{TemporalDriver, UnitOutcome};
use super::pool::WorkerPool;

/// Totals of a batch run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// (point, year) units scheduled
    pub units: usize,
    pub extracted: usize,
    /// Months without a scene under the cloud limit
    pub skipped_months: usize,
    pub failed_months: usize,
    /// Units that panicked
    pub failed_units: usize,
    /// Features rejected before scheduling (non-point or duplicate ID)
    pub rejected_points: usize,
}

impl RunReport {
    pub fn has_failures(&self) -> bool {
        self.failed_months > 0 || self.failed_units > 0
    }

    fn add_unit(&mut self, outcome: &UnitOutcome) {
        self.extracted += outcome.extracted();
        self.skipped_months += outcome.skipped();
        self.failed_months += outcome.failed();
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} units: {} chips extracted, {} months skipped, {} months failed, {} units failed, {} points rejected",
            self.units, self.extracted, self.skipped_months, self.failed_months, self.failed_units, self.rejected_points
        )
    }
}

/// Schedules every valid point and year on a worker pool
pub struct Orchestrator<'a> {
    driver: TemporalDriver<'a>,
    pool: &'a WorkerPool,
    progress: bool,
}

impl<'a> Orchestrator<'a> {
    pub fn new(driver: TemporalDriver<'a>, pool: &'a WorkerPool) -> Self {
        Orchestrator { driver, pool, progress: false }
    }

    /// Show a progress bar over units
    pub fn progress(mut self, enabled: bool) -> Self {
        self.progress = enabled;
        self
    }

    /// Keep point features with unique IDs, logging every rejection
    pub fn accept_points(features: &[InputFeature]) -> (Vec<PointOfInterest>, usize) {
        let mut seen = HashSet::new();
        let mut points = Vec::with_capacity(features.len());
        let mut rejected = 0;

        // Only accepted points claim their ID
        for feature in features {
            let point = match feature.to_point() {
                Ok(point) => point,
                Err(e) => {
                    error!("Skipping feature {}: {}", feature.id, e);
                    rejected += 1;
                    continue;
                }
            };
            if !seen.insert(feature.id.as_str()) {
                error!("Duplicate point ID {}, feature skipped", feature.id);
                rejected += 1;
                continue;
            }
            points.push(point);
        }
        (points, rejected)
    }

    /// Run every (point, year) unit and wait for all of them
    pub fn run(&self, features: &[InputFeature], years: RangeInclusive<i32>) -> ChipResult<RunReport> {
        if years.is_empty() {
            return Err(ChipError::InvalidInput(format!(
                "Empty year range {}-{}", years.start(), years.end()
            )));
        }

        let (points, rejected_points) = Self::accept_points(features);
        let units: Vec<(&PointOfInterest, i32)> = points.iter()
            .flat_map(|point| years.clone().map(move |year| (point, year)))
            .collect();

        let mut report = RunReport { units: units.len(), rejected_points, ..RunReport::default() };
        if units.is_empty() {
            warn!("No valid points to process");
            return Ok(report);
        }
        info!("Processing {} points over {} years ({} units)", points.len(), years.clone().count(), units.len());

        let tracker = if self.progress {
            ProgressTracker::new(units.len() as u64, "Extracting chips")
        } else {
            ProgressTracker::hidden(units.len() as u64)
        };

        let labels: Vec<String> = units.iter().map(|(point, year)| format!("{}/{}", point.id, year)).collect();
        let results = self.pool.run_all(units, |(point, year)| {
            let outcome = self.driver.run_point_year(point, year);
            tracker.increment(1);
            outcome
        })?;
        tracker.finish();

        for (label, result) in labels.iter().zip(results) {
            match result {
                Ok(outcome) => report.add_unit(&outcome),
                Err(panic) => {
                    error!("Unit {} panicked: {}", label, panic);
                    report.failed_units += 1;
                }
            }
        }

        info!("{}", report);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{SceneCandidate, SceneCatalog, SearchRequest};
    use crate::chip::OutputFormat;
    use crate::pipeline::driver::DriverSettings;
    use crate::pipeline::renderer::ChipRenderer;
    use crate::points::Geometry;
    use std::collections::BTreeMap;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct OneScenePerMonth;

    impl SceneCatalog for OneScenePerMonth {
        fn search(&self, _request: &SearchRequest) -> ChipResult<Vec<SceneCandidate>> {
            let assets: BTreeMap<String, String> = [("red".to_string(), "/data/red.tif".to_string())].into();
            Ok(vec![SceneCandidate { id: "s".to_string(), cloud_cover: 1.0, assets }])
        }
    }

    #[derive(Default)]
    struct CountingRenderer {
        calls: AtomicUsize,
    }

    impl ChipRenderer for CountingRenderer {
        fn render(&self, _: &[String], point: &PointOfInterest, _: &Path) -> ChipResult<()> {
            if point.id == "boom" {
                panic!("renderer bug");
            }
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn settings() -> DriverSettings {
        DriverSettings {
            collection: "c".to_string(),
            bands: vec!["red".to_string()],
            cloud_cover_limit: 5.0,
            search_limit: 10,
            output_dir: PathBuf::from("/tmp"),
            format: OutputFormat::Png,
        }
    }

    fn point(id: &str) -> InputFeature {
        InputFeature { id: id.to_string(), geometry: Some(Geometry::Point { coordinates: vec![10.0, 20.0] }) }
    }

    fn started_pool() -> WorkerPool {
        let mut pool = WorkerPool::new(3);
        pool.start().unwrap();
        pool
    }

    #[test]
    fn test_every_unit_runs_all_months() {
        let renderer = CountingRenderer::default();
        let pool = started_pool();
        let orchestrator = Orchestrator::new(TemporalDriver::new(&OneScenePerMonth, &renderer, settings()), &pool);

        let features = vec![point("a"), point("b"), point("c")];
        let report = orchestrator.run(&features, 2019..=2020).unwrap();

        assert_eq!(report.units, 6);
        assert_eq!(report.extracted, 72);
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 3 * 2 * 12);
        assert!(!report.has_failures());
    }

    #[test]
    fn test_rejections_and_panics() {
        let renderer = CountingRenderer::default();
        let pool = started_pool();
        let orchestrator = Orchestrator::new(TemporalDriver::new(&OneScenePerMonth, &renderer, settings()), &pool);

        let line = InputFeature {
            id: "line".to_string(),
            geometry: Some(Geometry::LineString { coordinates: vec![vec![0.0, 0.0], vec![1.0, 1.0]] }),
        };
        let features = vec![point("a"), line, point("a"), point("boom")];
        let report = orchestrator.run(&features, 2020..=2020).unwrap();

        assert_eq!(report.rejected_points, 2);
        assert_eq!(report.units, 2);
        assert_eq!(report.extracted, 12);
        assert_eq!(report.failed_units, 1);
        assert!(report.has_failures());
    }

    #[test]
    fn test_rejected_feature_does_not_claim_its_id() {
        let line = InputFeature {
            id: "a".to_string(),
            geometry: Some(Geometry::LineString { coordinates: vec![vec![0.0, 0.0], vec![1.0, 1.0]] }),
        };
        let missing = InputFeature { id: "b".to_string(), geometry: None };

        let (points, rejected) = Orchestrator::accept_points(&[line, point("a"), missing, point("b"), point("a")]);

        let ids: Vec<&str> = points.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(rejected, 3);
    }

    #[test]
    fn test_empty_inputs() {
        let renderer = CountingRenderer::default();
        let pool = started_pool();
        let orchestrator = Orchestrator::new(TemporalDriver::new(&OneScenePerMonth, &renderer, settings()), &pool);

        assert_eq!(orchestrator.run(&[], 2020..=2021).unwrap(), RunReport::default());
        #[allow(clippy::reversed_empty_ranges)]
        let backwards = 2021..=2020;
        assert!(orchestrator.run(&[point("a")], backwards).is_err());
    }
}
