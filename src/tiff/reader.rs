//! TIFF file reader implementation
//!
//! This module implements the TIFF/BigTIFF file reader that uses the
//! Strategy pattern to handle different byte orders. The reader works on
//! any `SeekableReader`, so the same code parses local files and remote
//! objects read through HTTP range requests.

use log::{debug, warn};
use std::io::{Read, SeekFrom};

use crate::io::byte_order::{ByteOrder, ByteOrderHandler};
use crate::io::seekable::SeekableReader;
use crate::tiff::constants::{field_types, header};
use crate::tiff::errors::{TiffError, TiffResult};
use crate::tiff::ifd::{IFD, IFDEntry};
use crate::tiff::types::TIFF;
use crate::tiff::validation;

/// Upper bound on the IFD chain length
const MAX_IFDS: usize = 100;

/// Reader for TIFF and BigTIFF files
pub struct TiffReader {
    /// Current byte order handler
    byte_order_handler: Option<Box<dyn ByteOrderHandler>>,
    /// Byte order of the current file
    byte_order: Option<ByteOrder>,
    /// Whether currently reading BigTIFF format
    is_big_tiff: bool,
}

impl Default for TiffReader {
    fn default() -> Self {
        Self::new()
    }
}

impl TiffReader {
    /// Creates a new TIFF reader
    pub fn new() -> Self {
        TiffReader {
            byte_order_handler: None,
            byte_order: None,
            is_big_tiff: false,
        }
    }

    /// Returns the byte order handler, failing if no header was read yet
    fn handler(&self) -> TiffResult<&dyn ByteOrderHandler> {
        self.byte_order_handler
            .as_deref()
            .ok_or_else(|| TiffError::GenericError("Byte order not yet determined".to_string()))
    }

    /// Reads a TIFF file from the given reader
    ///
    /// 1. Detect byte order (little/big endian)
    /// 2. Check for TIFF or BigTIFF format
    /// 3. Read all IFDs (Image File Directories)
    pub fn read(&mut self, reader: &mut dyn SeekableReader) -> TiffResult<TIFF> {
        reader.seek(SeekFrom::Start(0))?;

        let byte_order = ByteOrder::detect(reader)?;
        debug!("Detected byte order: {}", byte_order.name());
        let handler = byte_order.create_handler();

        let version = handler.read_u16(reader)?;
        let is_big_tiff = match version {
            header::BIG_TIFF_VERSION => {
                validation::validate_bigtiff_header(reader, handler.as_ref())?;
                true
            }
            header::TIFF_VERSION => false,
            _ => return Err(TiffError::UnsupportedVersion(version)),
        };
        debug!("TIFF version {} ({})", version, if is_big_tiff { "BigTIFF" } else { "TIFF" });

        self.byte_order_handler = Some(handler);
        self.byte_order = Some(byte_order);
        self.is_big_tiff = is_big_tiff;

        let first_ifd_offset = self.read_offset(reader)?;
        debug!("First IFD offset: {}", first_ifd_offset);

        let file_size = validation::get_file_size(reader)?;
        validation::validate_ifd_offset(first_ifd_offset, file_size)?;

        let mut tiff = TIFF::new(is_big_tiff, byte_order);
        tiff.ifds = self.read_ifd_chain(reader, first_ifd_offset, file_size)?;

        if tiff.ifds.is_empty() {
            return Err(TiffError::GenericError("No IFDs found in TIFF file".to_string()));
        }

        debug!("Read {} IFDs", tiff.ifds.len());
        Ok(tiff)
    }

    /// Reads an offset field (4 bytes in TIFF, 8 in BigTIFF)
    fn read_offset(&self, reader: &mut dyn SeekableReader) -> TiffResult<u64> {
        let handler = self.handler()?;
        if self.is_big_tiff {
            Ok(handler.read_u64(reader)?)
        } else {
            Ok(handler.read_u32(reader)? as u64)
        }
    }

    /// Reads a chain of IFDs starting from the given offset
    fn read_ifd_chain(
        &self,
        reader: &mut dyn SeekableReader,
        first_ifd_offset: u64,
        file_size: u64,
    ) -> TiffResult<Vec<IFD>> {
        let mut ifds = Vec::new();
        let mut ifd_offset = first_ifd_offset;

        while ifd_offset != 0 && ifds.len() < MAX_IFDS {
            if ifd_offset >= file_size {
                warn!("IFD offset {} exceeds file size {}, stopping IFD chain", ifd_offset, file_size);
                break;
            }

            let ifd = match self.read_ifd(reader, ifd_offset, ifds.len()) {
                Ok(ifd) => ifd,
                Err(e) if ifds.is_empty() => return Err(e),
                Err(e) => {
                    warn!("Error reading IFD {}: {}", ifds.len(), e);
                    break;
                }
            };

            // The next-IFD offset follows the entries directly
            let next_ifd_offset = match self.read_offset(reader) {
                Ok(offset) => offset,
                Err(e) => {
                    warn!("Error reading next IFD offset: {}", e);
                    ifds.push(ifd);
                    break;
                }
            };

            if next_ifd_offset != 0 && (next_ifd_offset >= file_size || next_ifd_offset < 8) {
                warn!("Invalid next IFD offset: {}, stopping IFD chain", next_ifd_offset);
                ifds.push(ifd);
                break;
            }

            ifds.push(ifd);
            ifd_offset = next_ifd_offset;
        }

        Ok(ifds)
    }

    /// Reads an IFD from the reader
    ///
    /// An IFD consists of a count followed by a series of entries, each
    /// describing one aspect of the image.
    pub fn read_ifd(&self, reader: &mut dyn SeekableReader, offset: u64, number: usize) -> TiffResult<IFD> {
        reader.seek(SeekFrom::Start(offset))?;

        let handler = self.handler()?;
        let entry_count = if self.is_big_tiff {
            handler.read_u64(reader)?
        } else {
            handler.read_u16(reader)? as u64
        };
        debug!("IFD #{} at {} has {} entries", number, offset, entry_count);

        let byte_order = self.byte_order
            .ok_or_else(|| TiffError::GenericError("Byte order not yet determined".to_string()))?;
        let mut ifd = IFD::new(number, offset, byte_order, self.is_big_tiff);

        // Read the whole entry table at once; remote sources pay per request
        let entry_size = if self.is_big_tiff { 20 } else { 12 };
        let table_len = entry_count
            .checked_mul(entry_size)
            .ok_or_else(|| TiffError::GenericError(format!("Invalid IFD entry count: {}", entry_count)))?;
        validation::validate_tag_size(0, table_len)?;
        let mut table = vec![0u8; table_len as usize];
        reader.read_exact(&mut table)?;

        for chunk in table.chunks_exact(entry_size as usize) {
            ifd.add_entry(self.decode_entry(chunk)?);
        }

        Ok(ifd)
    }

    /// Decodes one IFD entry from its on-disk bytes
    fn decode_entry(&self, bytes: &[u8]) -> TiffResult<IFDEntry> {
        let handler = self.handler()?;
        let tag = handler.u16_from(&bytes[0..2]);
        let field_type = handler.u16_from(&bytes[2..4]);
        let mut raw_value = [0u8; 8];

        let (count, value_offset) = if self.is_big_tiff {
            raw_value.copy_from_slice(&bytes[12..20]);
            (handler.u64_from(&bytes[4..12]), handler.u64_from(&bytes[12..20]))
        } else {
            raw_value[..4].copy_from_slice(&bytes[8..12]);
            (handler.u32_from(&bytes[4..8]) as u64, handler.u32_from(&bytes[8..12]) as u64)
        };

        Ok(IFDEntry::new(tag, field_type, count, value_offset, raw_value))
    }

    /// Reads the raw payload bytes of an entry, inline or at its offset
    fn read_entry_bytes(&self, reader: &mut dyn SeekableReader, entry: &IFDEntry) -> TiffResult<Vec<u8>> {
        let byte_len = entry.byte_len();
        validation::validate_tag_size(entry.tag, byte_len)?;

        if entry.is_value_inline(self.is_big_tiff) {
            return Ok(entry.raw_value[..byte_len as usize].to_vec());
        }

        reader.seek(SeekFrom::Start(entry.value_offset))?;
        let mut buffer = vec![0u8; byte_len as usize];
        reader.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    /// Reads a tag's values as a vector of u64
    ///
    /// Works for all integer field types, inline or external.
    pub fn read_tag_values(&self, reader: &mut dyn SeekableReader, ifd: &IFD, tag: u16) -> TiffResult<Vec<u64>> {
        let entry = ifd.get_entry(tag).ok_or(TiffError::TagNotFound(tag))?;
        let bytes = self.read_entry_bytes(reader, entry)?;
        let handler = self.handler()?;

        let values = match entry.field_type {
            field_types::BYTE | field_types::SBYTE | field_types::UNDEFINED => {
                bytes.iter().map(|&b| b as u64).collect()
            }
            field_types::SHORT | field_types::SSHORT => {
                bytes.chunks_exact(2).map(|c| handler.u16_from(c) as u64).collect()
            }
            field_types::LONG | field_types::SLONG => {
                bytes.chunks_exact(4).map(|c| handler.u32_from(c) as u64).collect()
            }
            field_types::LONG8 | field_types::SLONG8 | field_types::IFD8 => {
                bytes.chunks_exact(8).map(|c| handler.u64_from(c)).collect()
            }
            other => return Err(TiffError::UnsupportedFieldType(other)),
        };

        Ok(values)
    }

    /// Reads a tag's values as a vector of f64
    ///
    /// Accepts DOUBLE, FLOAT, RATIONAL and the integer field types.
    pub fn read_tag_f64_values(&self, reader: &mut dyn SeekableReader, ifd: &IFD, tag: u16) -> TiffResult<Vec<f64>> {
        let entry = ifd.get_entry(tag).ok_or(TiffError::TagNotFound(tag))?;

        match entry.field_type {
            field_types::DOUBLE => {
                let bytes = self.read_entry_bytes(reader, entry)?;
                let handler = self.handler()?;
                Ok(bytes.chunks_exact(8).map(|c| handler.f64_from(c)).collect())
            }
            field_types::FLOAT => {
                let bytes = self.read_entry_bytes(reader, entry)?;
                let handler = self.handler()?;
                Ok(bytes.chunks_exact(4)
                    .map(|c| f32::from_bits(handler.u32_from(c)) as f64)
                    .collect())
            }
            field_types::RATIONAL => {
                let bytes = self.read_entry_bytes(reader, entry)?;
                let handler = self.handler()?;
                Ok(bytes.chunks_exact(8)
                    .map(|c| {
                        let num = handler.u32_from(&c[0..4]) as f64;
                        let den = handler.u32_from(&c[4..8]) as f64;
                        if den == 0.0 { 0.0 } else { num / den }
                    })
                    .collect())
            }
            _ => Ok(self.read_tag_values(reader, ifd, tag)?
                .into_iter()
                .map(|v| v as f64)
                .collect()),
        }
    }

    /// Reads an ASCII tag, trimming the trailing NUL terminator
    pub fn read_ascii(&self, reader: &mut dyn SeekableReader, ifd: &IFD, tag: u16) -> TiffResult<String> {
        let entry = ifd.get_entry(tag).ok_or(TiffError::TagNotFound(tag))?;
        if entry.field_type != field_types::ASCII {
            return Err(TiffError::UnsupportedFieldType(entry.field_type));
        }
        let mut bytes = self.read_entry_bytes(reader, entry)?;
        while bytes.last() == Some(&0) {
            bytes.pop();
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Returns whether the current file is a BigTIFF
    pub fn is_big_tiff(&self) -> bool {
        self.is_big_tiff
    }

    /// Byte order of the current file, once a header has been read
    pub fn byte_order(&self) -> Option<ByteOrder> {
        self.byte_order
    }
}
