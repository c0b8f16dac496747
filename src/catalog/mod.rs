//! Scene discovery
//!
//! STAC catalog search and least-cloudy scene selection over calendar
//! month windows.

mod time_window;
mod scene;
mod stac;

pub use time_window::TimeWindow;
pub use scene::{pick_least_cloudy, select_scene, SceneCandidate, SceneCatalog, SearchRequest, DEFAULT_SEARCH_LIMIT};
pub use stac::{parse_search_page, NextPage, SearchPage, StacClient, DEFAULT_CATALOG_URL};
