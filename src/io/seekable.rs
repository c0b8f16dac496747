//! Seekable reader trait
//!
//! Raster sources are read through a single trait object regardless of
//! whether the bytes come from a local file or from HTTP range requests.

use std::io::{Read, Seek};

/// Trait for readers that can both read and seek
pub trait SeekableReader: Read + Seek + Send + Sync {}

impl<T: Read + Seek + Send + Sync> SeekableReader for T {}

/// Owned reader over any raster source
pub type BoxedReader = Box<dyn SeekableReader>;
