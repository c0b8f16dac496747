//! Byte order handling for TIFF sources
//!
//! Strategy pattern over little-endian and big-endian files. Handlers read
//! header fields from a stream and decode sample words from decompressed
//! buffers.

use byteorder::{BigEndian, ByteOrder as WordOrder, LittleEndian, ReadBytesExt};
use std::io::Result;

use crate::io::seekable::SeekableReader;
use crate::tiff::errors::{TiffError, TiffResult};

/// Byte order of a TIFF file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Little-endian byte order (II)
    LittleEndian,
    /// Big-endian byte order (MM)
    BigEndian,
}

impl ByteOrder {
    /// Detects the byte order from the first two bytes of the header
    pub fn detect(reader: &mut dyn SeekableReader) -> TiffResult<Self> {
        let marker = reader.read_u16::<LittleEndian>()?;
        match marker {
            0x4949 => Ok(ByteOrder::LittleEndian),
            0x4D4D => Ok(ByteOrder::BigEndian),
            _ => Err(TiffError::InvalidByteOrder(marker)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ByteOrder::LittleEndian => "Little Endian (II)",
            ByteOrder::BigEndian => "Big Endian (MM)",
        }
    }

    /// Creates the handler for this byte order
    pub fn create_handler(&self) -> Box<dyn ByteOrderHandler> {
        match self {
            ByteOrder::LittleEndian => Box::new(LittleEndianHandler),
            ByteOrder::BigEndian => Box::new(BigEndianHandler),
        }
    }
}

/// Trait for byte order handling strategies
pub trait ByteOrderHandler: Send + Sync {
    fn read_u16(&self, reader: &mut dyn SeekableReader) -> Result<u16>;
    fn read_u32(&self, reader: &mut dyn SeekableReader) -> Result<u32>;
    fn read_u64(&self, reader: &mut dyn SeekableReader) -> Result<u64>;
    fn read_f64(&self, reader: &mut dyn SeekableReader) -> Result<f64>;

    /// Decode a u16 from the first two bytes of `buf`
    fn u16_from(&self, buf: &[u8]) -> u16;
    /// Decode a u32 from the first four bytes of `buf`
    fn u32_from(&self, buf: &[u8]) -> u32;
    /// Decode a u64 from the first eight bytes of `buf`
    fn u64_from(&self, buf: &[u8]) -> u64;
    /// Decode an f64 from the first eight bytes of `buf`
    fn f64_from(&self, buf: &[u8]) -> f64;
}

/// Little-endian byte order handler
pub struct LittleEndianHandler;

impl ByteOrderHandler for LittleEndianHandler {
    fn read_u16(&self, reader: &mut dyn SeekableReader) -> Result<u16> {
        reader.read_u16::<LittleEndian>()
    }

    fn read_u32(&self, reader: &mut dyn SeekableReader) -> Result<u32> {
        reader.read_u32::<LittleEndian>()
    }

    fn read_u64(&self, reader: &mut dyn SeekableReader) -> Result<u64> {
        reader.read_u64::<LittleEndian>()
    }

    fn read_f64(&self, reader: &mut dyn SeekableReader) -> Result<f64> {
        reader.read_f64::<LittleEndian>()
    }

    fn u16_from(&self, buf: &[u8]) -> u16 {
        LittleEndian::read_u16(buf)
    }

    fn u32_from(&self, buf: &[u8]) -> u32 {
        LittleEndian::read_u32(buf)
    }

    fn u64_from(&self, buf: &[u8]) -> u64 {
        LittleEndian::read_u64(buf)
    }

    fn f64_from(&self, buf: &[u8]) -> f64 {
        LittleEndian::read_f64(buf)
    }
}

/// Big-endian byte order handler
pub struct BigEndianHandler;

impl ByteOrderHandler for BigEndianHandler {
    fn read_u16(&self, reader: &mut dyn SeekableReader) -> Result<u16> {
        reader.read_u16::<BigEndian>()
    }

    fn read_u32(&self, reader: &mut dyn SeekableReader) -> Result<u32> {
        reader.read_u32::<BigEndian>()
    }

    fn read_u64(&self, reader: &mut dyn SeekableReader) -> Result<u64> {
        reader.read_u64::<BigEndian>()
    }

    fn read_f64(&self, reader: &mut dyn SeekableReader) -> Result<f64> {
        reader.read_f64::<BigEndian>()
    }

    fn u16_from(&self, buf: &[u8]) -> u16 {
        BigEndian::read_u16(buf)
    }

    fn u32_from(&self, buf: &[u8]) -> u32 {
        BigEndian::read_u32(buf)
    }

    fn u64_from(&self, buf: &[u8]) -> u64 {
        BigEndian::read_u64(buf)
    }

    fn f64_from(&self, buf: &[u8]) -> f64 {
        BigEndian::read_f64(buf)
    }
}
