//! Remote raster access over HTTP range requests
//!
//! `RemoteReader` presents a remote object as a `Read + Seek` stream. Small
//! reads (TIFF headers, IFDs, tag arrays) are served from a cache of
//! fixed-size blocks; large reads (compressed tiles) are fetched directly
//! with one range request each. This is the equivalent of GDAL's `/vsicurl/`
//! handler for the subset of access patterns the TIFF reader needs.

use log::{debug, trace};
use reqwest::blocking::Client;
use reqwest::header::{CONTENT_RANGE, RANGE};
use reqwest::StatusCode;
use std::collections::HashMap;
use std::io::{self, Read, Seek, SeekFrom};

/// Default cache block size (16 KiB)
pub const DEFAULT_BLOCK_SIZE: u64 = 16 * 1024;

/// Seekable reader over an HTTP(S) object
pub struct RemoteReader {
    url: String,
    client: Client,
    position: u64,
    length: Option<u64>,
    block_size: u64,
    blocks: HashMap<u64, Vec<u8>>,
    /// Whole body, when the server ignored the Range header
    whole: Option<Vec<u8>>,
}

impl RemoteReader {
    /// Open a remote object, fetching the first block to learn its length
    pub fn open(url: &str, client: Client) -> io::Result<Self> {
        Self::with_block_size(url, client, DEFAULT_BLOCK_SIZE)
    }

    pub fn with_block_size(url: &str, client: Client, block_size: u64) -> io::Result<Self> {
        let mut reader = RemoteReader {
            url: url.to_string(),
            client,
            position: 0,
            length: None,
            block_size: block_size.max(1),
            blocks: HashMap::new(),
            whole: None,
        };
        reader.load_block(0)?;
        debug!("Opened remote source {} ({:?} bytes)", url, reader.length);
        Ok(reader)
    }

    /// URL this reader was opened on
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Object length in bytes, when the server reported it
    pub fn len(&self) -> Option<u64> {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == Some(0)
    }

    /// Issue a range request for `[start, end]` (inclusive)
    fn fetch_range(&mut self, start: u64, end: u64) -> io::Result<Vec<u8>> {
        trace!("GET {} bytes={}-{}", self.url, start, end);
        let response = self
            .client
            .get(&self.url)
            .header(RANGE, format!("bytes={}-{}", start, end))
            .send()
            .map_err(to_io_error)?;

        let status = response.status();
        match status {
            StatusCode::PARTIAL_CONTENT => {
                if self.length.is_none() {
                    self.length = response
                        .headers()
                        .get(CONTENT_RANGE)
                        .and_then(|v| v.to_str().ok())
                        .and_then(parse_content_range_total);
                }
                let body = response.bytes().map_err(to_io_error)?;
                Ok(body.to_vec())
            }
            StatusCode::OK => {
                // Range not honoured: keep the whole object and serve from it
                let body = response.bytes().map_err(to_io_error)?.to_vec();
                self.length = Some(body.len() as u64);
                let end = (end + 1).min(body.len() as u64) as usize;
                let start = (start as usize).min(end);
                let slice = body[start..end].to_vec();
                self.whole = Some(body);
                Ok(slice)
            }
            StatusCode::RANGE_NOT_SATISFIABLE => {
                if self.length.is_none() {
                    self.length = response
                        .headers()
                        .get(CONTENT_RANGE)
                        .and_then(|v| v.to_str().ok())
                        .and_then(parse_content_range_total);
                }
                Ok(Vec::new())
            }
            StatusCode::NOT_FOUND => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} not found", self.url),
            )),
            other => Err(io::Error::new(
                io::ErrorKind::Other,
                format!("GET {} failed with HTTP {}", self.url, other),
            )),
        }
    }

    fn load_block(&mut self, index: u64) -> io::Result<()> {
        if self.whole.is_some() || self.blocks.contains_key(&index) {
            return Ok(());
        }
        let start = index * self.block_size;
        let end = start + self.block_size - 1;
        let data = self.fetch_range(start, end)?;
        if self.whole.is_none() {
            self.blocks.insert(index, data);
        }
        Ok(())
    }

    fn remaining(&self) -> Option<u64> {
        self.length.map(|len| len.saturating_sub(self.position))
    }
}

impl Read for RemoteReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let wanted = match self.remaining() {
            Some(0) => return Ok(0),
            Some(rest) => (buf.len() as u64).min(rest) as usize,
            None => buf.len(),
        };

        if let Some(whole) = &self.whole {
            let start = self.position as usize;
            let n = wanted.min(whole.len().saturating_sub(start));
            buf[..n].copy_from_slice(&whole[start..start + n]);
            self.position += n as u64;
            return Ok(n);
        }

        if wanted as u64 >= self.block_size {
            let start = self.position;
            let data = self.fetch_range(start, start + wanted as u64 - 1)?;
            let n = data.len().min(wanted);
            buf[..n].copy_from_slice(&data[..n]);
            self.position += n as u64;
            return Ok(n);
        }

        let index = self.position / self.block_size;
        self.load_block(index)?;
        // The block fetch may have switched us to whole-object mode
        if self.whole.is_some() {
            return self.read(buf);
        }
        let block = match self.blocks.get(&index) {
            Some(block) => block,
            None => return Ok(0),
        };
        let offset = (self.position - index * self.block_size) as usize;
        if offset >= block.len() {
            return Ok(0);
        }
        let n = wanted.min(block.len() - offset);
        buf[..n].copy_from_slice(&block[offset..offset + n]);
        self.position += n as u64;
        Ok(n)
    }
}

impl Seek for RemoteReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => offset as i128,
            SeekFrom::Current(delta) => self.position as i128 + delta as i128,
            SeekFrom::End(delta) => {
                let length = self.length.ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::Unsupported,
                        format!("length of {} is unknown", self.url),
                    )
                })?;
                length as i128 + delta as i128
            }
        };
        if target < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek to a negative position",
            ));
        }
        self.position = target as u64;
        Ok(self.position)
    }
}

/// Extract the total length from a `Content-Range: bytes a-b/total` header
pub fn parse_content_range_total(value: &str) -> Option<u64> {
    value.rsplit('/').next()?.trim().parse::<u64>().ok()
}

fn to_io_error(error: reqwest::Error) -> io::Error {
    if error.is_timeout() {
        io::Error::new(io::ErrorKind::TimedOut, error)
    } else {
        io::Error::new(io::ErrorKind::Other, error)
    }
}
