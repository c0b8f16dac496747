//! Raster source locations
//!
//! Band assets are referenced by URI. `SourceLocation` classifies a
//! reference as a local path or a remote object and `SourceOpener` turns it
//! into a `SeekableReader`.

use log::debug;
use reqwest::blocking::Client;
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::time::Duration;

use crate::io::remote::RemoteReader;
use crate::io::seekable::BoxedReader;
use crate::tiff::errors::{TiffError, TiffResult};

/// Prefix marking a remotely read source (GDAL virtual file system syntax)
pub const VSICURL_PREFIX: &str = "/vsicurl/";

/// Where a raster source lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    /// File on the local filesystem
    Local(PathBuf),
    /// HTTP(S) object read with range requests
    Remote(String),
}

impl SourceLocation {
    /// Classify an asset reference
    ///
    /// Accepts `/vsicurl/`-prefixed URLs, plain `http(s)://` URLs, `s3://`
    /// URIs (mapped to the public virtual-hosted endpoint) and local paths.
    pub fn parse(reference: &str) -> Self {
        let reference = reference.trim();
        let stripped = reference.strip_prefix(VSICURL_PREFIX).unwrap_or(reference);

        if stripped.starts_with("http://") || stripped.starts_with("https://") {
            return SourceLocation::Remote(stripped.to_string());
        }

        if let Some(rest) = stripped.strip_prefix("s3://") {
            let (bucket, key) = rest.split_once('/').unwrap_or((rest, ""));
            return SourceLocation::Remote(format!("https://{}.s3.amazonaws.com/{}", bucket, key));
        }

        let path = stripped.strip_prefix("file://").unwrap_or(stripped);
        SourceLocation::Local(PathBuf::from(path))
    }

    /// Reference as handed to the mosaic descriptor (`/vsicurl/` for remote)
    pub fn to_reference(&self) -> String {
        match self {
            SourceLocation::Local(path) => path.to_string_lossy().into_owned(),
            SourceLocation::Remote(url) => format!("{}{}", VSICURL_PREFIX, url),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, SourceLocation::Remote(_))
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceLocation::Local(path) => write!(f, "{}", path.display()),
            SourceLocation::Remote(url) => write!(f, "{}", url),
        }
    }
}

/// Opens raster sources, sharing one HTTP client across remote reads
#[derive(Clone)]
pub struct SourceOpener {
    client: Client,
}

impl SourceOpener {
    /// Create an opener with the given HTTP timeout
    pub fn new(timeout_secs: u64) -> TiffResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .user_agent(concat!("chipkit/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TiffError::GenericError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(SourceOpener { client })
    }

    /// Create an opener around an existing client
    pub fn with_client(client: Client) -> Self {
        SourceOpener { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Open a source for reading
    pub fn open(&self, location: &SourceLocation) -> TiffResult<BoxedReader> {
        debug!("Opening raster source {}", location);
        match location {
            SourceLocation::Local(path) => {
                let file = File::open(path)?;
                Ok(Box::new(BufReader::with_capacity(1024 * 1024, file)))
            }
            SourceLocation::Remote(url) => {
                let reader = RemoteReader::open(url, self.client.clone())?;
                Ok(Box::new(reader))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vsicurl_prefix_is_stripped() {
        let location = SourceLocation::parse("/vsicurl/https://example.com/B04.tif");
        assert_eq!(location, SourceLocation::Remote("https://example.com/B04.tif".to_string()));
        assert_eq!(location.to_reference(), "/vsicurl/https://example.com/B04.tif");
    }

    #[test]
    fn test_s3_uri_maps_to_https() {
        let location = SourceLocation::parse("s3://sentinel-cogs/tiles/B04.tif");
        assert_eq!(
            location,
            SourceLocation::Remote("https://sentinel-cogs.s3.amazonaws.com/tiles/B04.tif".to_string())
        );
    }

    #[test]
    fn test_plain_path_is_local() {
        let location = SourceLocation::parse("/data/B04.tif");
        assert_eq!(location, SourceLocation::Local(PathBuf::from("/data/B04.tif")));
        assert!(!location.is_remote());
    }
}
