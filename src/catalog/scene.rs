//! Scene search and selection
//!
//! `SceneCatalog` is the seam to whatever answers scene searches. The
//! selection rule itself is catalog independent: keep scenes strictly under
//! the cloud limit, then take the least cloudy, earliest-listed one.

use log::{debug, info};
use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::coordinate::Point;
use crate::error::ChipResult;

use super::time_window::TimeWindow;

/// Default cap on the number of items a search may return
pub const DEFAULT_SEARCH_LIMIT: usize = 1000;

/// A scene returned by a catalog search
#[derive(Debug, Clone, PartialEq)]
pub struct SceneCandidate {
    pub id: String,
    /// Cloud cover in percent
    pub cloud_cover: f64,
    /// Asset key (band name) to href
    pub assets: BTreeMap<String, String>,
}

impl SceneCandidate {
    pub fn asset(&self, band: &str) -> Option<&str> {
        self.assets.get(band).map(String::as_str)
    }
}

/// Search for scenes of one collection over a point and a month
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub collection: String,
    /// Region of interest as WGS84 lon/lat
    pub point: Point,
    pub window: TimeWindow,
    /// Scenes must have strictly less cloud cover than this
    pub cloud_cover_limit: f64,
    /// Upper bound on items collected across pages
    pub max_items: usize,
}

impl SearchRequest {
    pub fn new(collection: &str, point: Point, window: TimeWindow, cloud_cover_limit: f64) -> Self {
        SearchRequest {
            collection: collection.to_string(),
            point,
            window,
            cloud_cover_limit,
            max_items: DEFAULT_SEARCH_LIMIT,
        }
    }

    pub fn max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items.max(1);
        self
    }

    /// STAC `/search` request body with the given page size
    pub fn to_body(&self, page_size: usize) -> Value {
        json!({
            "collections": [self.collection],
            "intersects": {
                "type": "Point",
                "coordinates": [self.point.x, self.point.y],
            },
            "datetime": self.window.to_stac_interval(),
            "limit": page_size.min(self.max_items),
            "query": {
                "eo:cloud_cover": { "lt": self.cloud_cover_limit },
            },
        })
    }
}

/// Anything that can answer scene searches
pub trait SceneCatalog: Send + Sync {
    /// All candidates matching the request, in catalog order
    fn search(&self, request: &SearchRequest) -> ChipResult<Vec<SceneCandidate>>;
}

/// Pick the least cloudy candidate strictly under `cloud_cover_limit`
///
/// Ties keep their input order. Returns `None` when nothing qualifies.
pub fn pick_least_cloudy(candidates: Vec<SceneCandidate>, cloud_cover_limit: f64) -> Option<SceneCandidate> {
    let mut eligible: Vec<SceneCandidate> = candidates.into_iter()
        .filter(|c| c.cloud_cover.is_finite() && c.cloud_cover < cloud_cover_limit)
        .collect();
    eligible.sort_by(|a, b| a.cloud_cover.total_cmp(&b.cloud_cover));
    eligible.into_iter().next()
}

/// Search the catalog and select the scene for one month
///
/// An empty result is `Ok(None)`; only catalog failures are errors.
pub fn select_scene(catalog: &dyn SceneCatalog, request: &SearchRequest) -> ChipResult<Option<SceneCandidate>> {
    let candidates = catalog.search(request)?;
    debug!(
        "{} candidates for {} at ({}, {}) in {}",
        candidates.len(), request.collection, request.point.x, request.point.y, request.window
    );

    let selected = pick_least_cloudy(candidates, request.cloud_cover_limit);
    if let Some(scene) = &selected {
        info!("Selected scene {} ({}% cloud) for {}", scene.id, scene.cloud_cover, request.window);
    }
    Ok(selected)
}
