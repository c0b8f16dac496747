//! Pipeline-level error types
//!
//! `TiffError` covers the raster format layer; everything above it (catalog
//! queries, point ingestion, configuration, chip writing) reports through
//! `ChipError`.

use std::fmt;
use std::io;

use crate::tiff::errors::TiffError;

/// Errors raised by the chip extraction pipeline
#[derive(Debug)]
pub enum ChipError {
    /// Filesystem I/O error
    Io(io::Error),
    /// Raster format error (GeoTIFF or VRT)
    Tiff(TiffError),
    /// HTTP transport error
    Http(reqwest::Error),
    /// The scene catalog answered with an unusable response
    Catalog(String),
    /// JSON (de)serialization error
    Json(serde_json::Error),
    /// Invalid configuration value
    Config(String),
    /// Input feature with a geometry other than a single point
    InvalidGeometry { id: String, kind: String },
    /// Coordinate transformation failure
    Projection(String),
    /// Mosaic construction failure
    Mosaic(String),
    /// Image encoding failure
    Image(image::ImageError),
    /// Invalid caller input (time window, chip parameters, point data)
    InvalidInput(String),
    /// A batch run finished with isolated failures and strict mode was requested
    RunIncomplete { failed_months: usize, failed_units: usize },
}

impl fmt::Display for ChipError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChipError::Io(e) => write!(f, "I/O error: {}", e),
            ChipError::Tiff(e) => write!(f, "{}", e),
            ChipError::Http(e) => write!(f, "HTTP error: {}", e),
            ChipError::Catalog(msg) => write!(f, "Catalog error: {}", msg),
            ChipError::Json(e) => write!(f, "JSON error: {}", e),
            ChipError::Config(msg) => write!(f, "Configuration error: {}", msg),
            ChipError::InvalidGeometry { id, kind } => {
                write!(f, "Feature {} has a {} geometry, expected Point", id, kind)
            }
            ChipError::Projection(msg) => write!(f, "Projection error: {}", msg),
            ChipError::Mosaic(msg) => write!(f, "Mosaic error: {}", msg),
            ChipError::Image(e) => write!(f, "Image error: {}", e),
            ChipError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            ChipError::RunIncomplete { failed_months, failed_units } => write!(
                f,
                "Run finished with {} failed months and {} failed units",
                failed_months, failed_units
            ),
        }
    }
}

impl std::error::Error for ChipError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ChipError::Io(e) => Some(e),
            ChipError::Tiff(e) => Some(e),
            ChipError::Http(e) => Some(e),
            ChipError::Json(e) => Some(e),
            ChipError::Image(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ChipError {
    fn from(error: io::Error) -> Self {
        ChipError::Io(error)
    }
}

impl From<TiffError> for ChipError {
    fn from(error: TiffError) -> Self {
        ChipError::Tiff(error)
    }
}

impl From<reqwest::Error> for ChipError {
    fn from(error: reqwest::Error) -> Self {
        ChipError::Http(error)
    }
}

impl From<serde_json::Error> for ChipError {
    fn from(error: serde_json::Error) -> Self {
        ChipError::Json(error)
    }
}

impl From<image::ImageError> for ChipError {
    fn from(error: image::ImageError) -> Self {
        ChipError::Image(error)
    }
}

impl From<toml::de::Error> for ChipError {
    fn from(error: toml::de::Error) -> Self {
        ChipError::Config(error.to_string())
    }
}

/// Result type for pipeline operations
pub type ChipResult<T> = Result<T, ChipError>;
