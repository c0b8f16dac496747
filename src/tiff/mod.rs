//! TIFF file format parsing module
//!
//! This module provides structures and functions for reading
//! TIFF and BigTIFF format files, and for writing single-image GeoTIFFs.

pub mod errors;
pub mod ifd;
pub(crate) mod types;
pub mod reader;
#[cfg(test)]
mod tests;
pub mod geotags;
pub mod builder;
pub(crate) mod constants;
pub mod geo_key_parser;
pub(crate) mod validation;

pub use crate::io::byte_order::{BigEndianHandler, ByteOrder, ByteOrderHandler, LittleEndianHandler};
pub use errors::{TiffError, TiffResult};
pub use ifd::{IFD, IFDEntry};
pub use reader::TiffReader;
pub use types::TIFF;
pub use geotags::{GeoKeyEntry, get_key_name, get_projected_cs_description, get_tag_name, is_geotiff_tag};
pub use builder::TiffBuilder;
pub use geo_key_parser::{GeoInfo, GeoKeyParser};
