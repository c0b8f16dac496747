pub mod io;
pub mod tiff;
pub mod utils;
pub mod compression;
pub mod coordinate;
pub mod raster;
pub mod mosaic;
pub mod chip;
pub mod catalog;
pub mod points;
pub mod pipeline;
pub mod config;
pub mod commands;
pub mod error;

pub use error::{ChipError, ChipResult};
pub use config::ChipConfig;
pub use catalog::{select_scene, SceneCandidate, SceneCatalog, SearchRequest, StacClient, TimeWindow};
pub use mosaic::{build_mosaic, Mosaic, MosaicBuilder};
pub use chip::{compute_scale_params, extract_chip, ChipExtractor, ChipParams, ChipWindow};
pub use pipeline::{ChipRenderer, MosaicChipRenderer, Orchestrator, RunReport, TemporalDriver, WorkerPool};
pub use points::{load_features, Geometry, InputFeature, PointOfInterest};
pub use coordinate::{BoundingBox, Point, CoordinateTransformer, CoordinateSystem};
