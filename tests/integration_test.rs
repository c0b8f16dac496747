//! End-to-end tests for the chip pipeline
//!
//! A scripted catalog stands in for the STAC service; band assets are small
//! local GeoTIFFs so the mosaic and chip stages run for real.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use tempfile::TempDir;

use chipkit::catalog::{SceneCandidate, SceneCatalog, SearchRequest};
use chipkit::chip::{ChipParams, OutputFormat, ScaleMode};
use chipkit::coordinate::GeoTransform;
use chipkit::io::source::SourceOpener;
use chipkit::pipeline::{ChipRenderer, DriverSettings, MosaicChipRenderer, Orchestrator, TemporalDriver, WorkerPool};
use chipkit::points::{parse_features, PointOfInterest};
use chipkit::tiff::builder::TiffBuilder;
use chipkit::ChipResult;

const BANDS: [&str; 3] = ["swir16", "nir08", "red"];

/// Write one 100x100 UTM 54N band covering (139E, 36N)
fn write_band(dir: &Path, name: &str, value: u16) -> PathBuf {
    let path = dir.join(format!("{}.tif", name));
    TiffBuilder::new(100, 100)
        .with_u16_bands(&[vec![value; 100 * 100]])
        .unwrap()
        .georeference(32654, GeoTransform::north_up(319000.0, 3986500.0, 10.0, 10.0))
        .write(&path)
        .unwrap();
    path
}

/// Offers a clear and a cloudy scene in March, nothing otherwise
struct MarchCatalog {
    clear_assets: BTreeMap<String, String>,
    searches: AtomicUsize,
}

impl SceneCatalog for MarchCatalog {
    fn search(&self, request: &SearchRequest) -> ChipResult<Vec<SceneCandidate>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        if request.window.month != 3 {
            return Ok(vec![]);
        }
        let missing: BTreeMap<String, String> = BANDS.iter()
            .map(|b| (b.to_string(), format!("/nonexistent/{}.tif", b)))
            .collect();
        Ok(vec![
            SceneCandidate { id: "S2_CLOUDY".to_string(), cloud_cover: 10.0, assets: missing },
            SceneCandidate { id: "S2_CLEAR".to_string(), cloud_cover: 3.0, assets: self.clear_assets.clone() },
        ])
    }
}

/// Offers the same scene for every month
struct EveryMonthCatalog;

impl SceneCatalog for EveryMonthCatalog {
    fn search(&self, request: &SearchRequest) -> ChipResult<Vec<SceneCandidate>> {
        let assets = BANDS.iter()
            .map(|b| (b.to_string(), format!("https://data.example/{}/{}.tif", request.window, b)))
            .collect();
        Ok(vec![SceneCandidate { id: format!("S2_{}", request.window), cloud_cover: 1.0, assets }])
    }
}

/// Records render calls without touching any raster
#[derive(Default)]
struct CountingRenderer {
    calls: AtomicUsize,
}

impl ChipRenderer for CountingRenderer {
    fn render(&self, band_urls: &[String], _point: &PointOfInterest, _output_path: &Path) -> ChipResult<()> {
        assert_eq!(band_urls.len(), BANDS.len());
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn settings(output_dir: &Path) -> DriverSettings {
    DriverSettings {
        collection: "sentinel-2-l2a".to_string(),
        bands: BANDS.iter().map(|b| b.to_string()).collect(),
        cloud_cover_limit: 5.0,
        search_limit: 100,
        output_dir: output_dir.to_path_buf(),
        format: OutputFormat::Png,
    }
}

fn points_json(points: &[(&str, f64, f64)]) -> String {
    let features: Vec<String> = points.iter()
        .map(|(id, lon, lat)| format!(
            r#"{{"type":"Feature","properties":{{"id":"{}"}},"geometry":{{"type":"Point","coordinates":[{},{}]}}}}"#,
            id, lon, lat
        ))
        .collect();
    format!(r#"{{"type":"FeatureCollection","features":[{}]}}"#, features.join(","))
}

#[test]
fn test_single_point_year_writes_only_the_clear_march_chip() {
    let data = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();

    let clear_assets = BANDS.iter()
        .zip([900u16, 1800, 700])
        .map(|(band, value)| (band.to_string(), write_band(data.path(), band, value).to_string_lossy().into_owned()))
        .collect();
    let catalog = MarchCatalog { clear_assets, searches: AtomicUsize::new(0) };

    let params = ChipParams {
        buffer_meters: 200.0,
        width_px: 16,
        height_px: 16,
        format: OutputFormat::Png,
        scale_mode: ScaleMode::Fixed,
        ..ChipParams::default()
    };
    let renderer = MosaicChipRenderer::new(SourceOpener::new(5).unwrap(), params);
    let driver = TemporalDriver::new(&catalog, &renderer, settings(output.path()));

    let mut pool = WorkerPool::new(2);
    pool.start().unwrap();

    let features = parse_features(&points_json(&[("P1", 139.0, 36.0)]), "id", None).unwrap();
    let report = Orchestrator::new(driver, &pool)
        .progress(false)
        .run(&features, 2020..=2020)
        .unwrap();

    assert_eq!(catalog.searches.load(Ordering::SeqCst), 12);
    assert_eq!(report.units, 1);
    assert_eq!(report.extracted, 1);
    assert_eq!(report.skipped_months, 11);
    assert!(!report.has_failures());

    let mut names: Vec<String> = fs::read_dir(output.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec![
        "P1_SENTINEL-2-L2A_2020_03.png".to_string(),
        "P1_SENTINEL-2-L2A_2020_03.png.aux.xml".to_string(),
        "P1_SENTINEL-2-L2A_2020_03.wld".to_string(),
    ]);

    let chip = image::open(output.path().join("P1_SENTINEL-2-L2A_2020_03.png")).unwrap().to_rgb8();
    assert_eq!(chip.dimensions(), (16, 16));
    let pixel = chip.get_pixel(8, 8);
    assert!(pixel[1] > pixel[0] && pixel[0] > 0);
}

#[test]
fn test_every_point_year_month_is_attempted() {
    let output = TempDir::new().unwrap();
    let renderer = CountingRenderer::default();
    let driver = TemporalDriver::new(&EveryMonthCatalog, &renderer, settings(output.path()));

    let mut pool = WorkerPool::new(3);
    pool.start().unwrap();

    let features = parse_features(
        &points_json(&[("A", 10.0, 45.0), ("B", -70.5, -33.4), ("A", 11.0, 46.0)]),
        "id",
        None,
    ).unwrap();
    let report = Orchestrator::new(driver, &pool)
        .progress(false)
        .run(&features, 2019..=2021)
        .unwrap();

    // The duplicate "A" is rejected
    assert_eq!(report.rejected_points, 1);
    assert_eq!(report.units, 2 * 3);
    assert_eq!(report.extracted, 2 * 3 * 12);
    assert_eq!(renderer.calls.load(Ordering::SeqCst), 2 * 3 * 12);
}

#[test]
fn test_unreadable_assets_fail_months_without_stopping_the_run() {
    let output = TempDir::new().unwrap();
    let catalog = MarchCatalog { clear_assets: BTreeMap::new(), searches: AtomicUsize::new(0) };
    let renderer = MosaicChipRenderer::new(SourceOpener::new(5).unwrap(), ChipParams::default());
    let driver = TemporalDriver::new(&catalog, &renderer, settings(output.path()));

    let mut pool = WorkerPool::new(1);
    pool.start().unwrap();

    let features = parse_features(&points_json(&[("P1", 139.0, 36.0)]), "id", None).unwrap();
    let report = Orchestrator::new(driver, &pool)
        .progress(false)
        .run(&features, 2020..=2021)
        .unwrap();

    assert_eq!(catalog.searches.load(Ordering::SeqCst), 24);
    assert_eq!(report.extracted, 0);
    assert_eq!(report.failed_months, 2);
    assert_eq!(report.skipped_months, 22);
    assert!(report.has_failures());
    assert_eq!(fs::read_dir(output.path()).unwrap().count(), 0);
}
