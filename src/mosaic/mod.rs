//! Virtual mosaics over band assets
//!
//! A mosaic stacks the band assets of one scene into a single multi-band
//! dataset described by a GDAL-compatible VRT file.

mod vrt;
mod builder;

pub use vrt::{PixelRect, VrtBand, VrtDataset, VrtSource};
pub use builder::{build_mosaic, Mosaic, MosaicBuilder, SampleGrid};
