//! Points of interest
//!
//! Reads GeoJSON feature collections into identified features and accepts
//! single points as chip centres.

mod geometry;
mod loader;

pub use geometry::{Geometry, InputFeature, PointOfInterest, Position};
pub use loader::{load_features, parse_features};
