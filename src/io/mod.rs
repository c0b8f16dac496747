//! I/O layer for raster sources
//!
//! Local files and remote (HTTP range request) sources are both exposed as
//! `SeekableReader`s, so the TIFF parser never knows where bytes come from.

pub mod seekable;
pub mod byte_order;
pub mod remote;
pub mod source;

pub use byte_order::{ByteOrder, ByteOrderHandler};
pub use remote::RemoteReader;
pub use seekable::{BoxedReader, SeekableReader};
pub use source::{SourceLocation, SourceOpener};
