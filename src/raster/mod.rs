//! Georeferenced raster access
//!
//! Windowed band reads from GeoTIFF sources, built on the TIFF parser and
//! the compression strategies.

mod region;
mod layout;
mod dataset;

pub use region::Region;
pub use layout::SampleLayout;
pub use dataset::{BandWindow, GeoRaster};
