//! TIFF validation utilities
//!
//! Bounds checks applied while walking a possibly malformed or truncated
//! file, local or remote.

use log::{debug, error, warn};
use std::io::SeekFrom;

use crate::io::byte_order::ByteOrderHandler;
use crate::io::seekable::SeekableReader;
use crate::tiff::constants::header;
use crate::tiff::errors::{TiffError, TiffResult};

/// Largest tag payload accepted (256 MiB)
pub const MAX_TAG_BYTES: u64 = 256 * 1024 * 1024;

/// Validates an IFD offset to ensure it's within reasonable bounds
pub fn validate_ifd_offset(offset: u64, file_size: u64) -> TiffResult<()> {
    if offset >= file_size || offset < 8 {
        return Err(TiffError::GenericError(format!(
            "Invalid IFD offset: {} (file size: {})",
            offset, file_size
        )));
    }

    Ok(())
}

/// Gets the file size for validation purposes
///
/// Returns `u64::MAX` when the source cannot report its length.
pub fn get_file_size(reader: &mut dyn SeekableReader) -> TiffResult<u64> {
    let current_position = reader.stream_position()?;
    let file_size = match reader.seek(SeekFrom::End(0)) {
        Ok(size) => size,
        Err(e) => {
            warn!("Could not determine file size: {}", e);
            u64::MAX
        }
    };
    reader.seek(SeekFrom::Start(current_position))?;

    Ok(file_size)
}

/// Validates the BigTIFF header
///
/// After the version number (43) BigTIFF stores the offset size (8) and a
/// reserved zero.
pub fn validate_bigtiff_header(
    reader: &mut dyn SeekableReader,
    byte_order_handler: &dyn ByteOrderHandler,
) -> TiffResult<()> {
    let offset_size = byte_order_handler.read_u16(reader)?;
    let zeros = byte_order_handler.read_u16(reader)?;

    debug!("BigTIFF offset size: {}, reserved: {}", offset_size, zeros);

    if offset_size != header::BIGTIFF_OFFSET_SIZE || zeros != 0 {
        error!("Invalid BigTIFF header: offset_size={}, zeros={}", offset_size, zeros);
        return Err(TiffError::InvalidBigTIFFHeader);
    }

    Ok(())
}

/// Validates the payload size of a tag before allocating for it
pub fn validate_tag_size(tag: u16, byte_len: u64) -> TiffResult<()> {
    if byte_len > MAX_TAG_BYTES {
        return Err(TiffError::GenericError(format!(
            "Tag {} declares {} bytes of data, limit is {}",
            tag, byte_len, MAX_TAG_BYTES
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_ifd_offset_bounds() {
        assert!(validate_ifd_offset(8, 100).is_ok());
        assert!(validate_ifd_offset(4, 100).is_err());
        assert!(validate_ifd_offset(100, 100).is_err());
    }

    #[test]
    fn test_file_size_keeps_position() {
        let mut cursor = Cursor::new(vec![0u8; 64]);
        cursor.set_position(10);
        assert_eq!(get_file_size(&mut cursor).unwrap(), 64);
        assert_eq!(cursor.position(), 10);
    }

    #[test]
    fn test_tag_size_limit() {
        assert!(validate_tag_size(273, 1024).is_ok());
        assert!(validate_tag_size(273, MAX_TAG_BYTES + 1).is_err());
    }
}
