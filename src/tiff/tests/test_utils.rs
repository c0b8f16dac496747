use std::io::Cursor;
use byteorder::{BigEndian, ByteOrder as _, LittleEndian, WriteBytesExt};

/// Little-endian TIFF with inline LONG dimensions and an external DOUBLE array
pub fn create_test_tiff_buffer() -> Cursor<Vec<u8>> {
    let mut buffer = Vec::new();

    // Header
    buffer.write_u16::<LittleEndian>(0x4949).unwrap(); // II
    buffer.write_u16::<LittleEndian>(42).unwrap();
    buffer.write_u32::<LittleEndian>(8).unwrap();      // IFD offset

    // IFD at 8 with 3 entries; payload follows at 8 + 2 + 36 + 4 = 50
    buffer.write_u16::<LittleEndian>(3).unwrap();

    buffer.write_u16::<LittleEndian>(256).unwrap();    // ImageWidth
    buffer.write_u16::<LittleEndian>(4).unwrap();      // LONG
    buffer.write_u32::<LittleEndian>(1).unwrap();
    buffer.write_u32::<LittleEndian>(800).unwrap();

    buffer.write_u16::<LittleEndian>(257).unwrap();    // ImageLength
    buffer.write_u16::<LittleEndian>(4).unwrap();      // LONG
    buffer.write_u32::<LittleEndian>(1).unwrap();
    buffer.write_u32::<LittleEndian>(600).unwrap();

    buffer.write_u16::<LittleEndian>(33550).unwrap();  // ModelPixelScale
    buffer.write_u16::<LittleEndian>(12).unwrap();     // DOUBLE
    buffer.write_u32::<LittleEndian>(3).unwrap();
    buffer.write_u32::<LittleEndian>(50).unwrap();

    buffer.write_u32::<LittleEndian>(0).unwrap();      // No next IFD

    for v in [10.0, 10.0, 0.0] {
        buffer.write_f64::<LittleEndian>(v).unwrap();
    }

    Cursor::new(buffer)
}

/// Big-endian TIFF whose SHORT values and SHORT pair sit inline
pub fn create_big_endian_tiff_buffer() -> Cursor<Vec<u8>> {
    let mut buffer = Vec::new();

    buffer.write_u16::<BigEndian>(0x4D4D).unwrap(); // MM
    buffer.write_u16::<BigEndian>(42).unwrap();
    buffer.write_u32::<BigEndian>(8).unwrap();

    buffer.write_u16::<BigEndian>(3).unwrap();

    // ImageWidth as SHORT: value sits in the first two bytes of the field
    buffer.write_u16::<BigEndian>(256).unwrap();
    buffer.write_u16::<BigEndian>(3).unwrap();
    buffer.write_u32::<BigEndian>(1).unwrap();
    buffer.write_u16::<BigEndian>(300).unwrap();
    buffer.write_u16::<BigEndian>(0).unwrap();

    buffer.write_u16::<BigEndian>(257).unwrap();
    buffer.write_u16::<BigEndian>(3).unwrap();
    buffer.write_u32::<BigEndian>(1).unwrap();
    buffer.write_u16::<BigEndian>(200).unwrap();
    buffer.write_u16::<BigEndian>(0).unwrap();

    // BitsPerSample: two inline SHORTs
    buffer.write_u16::<BigEndian>(258).unwrap();
    buffer.write_u16::<BigEndian>(3).unwrap();
    buffer.write_u32::<BigEndian>(2).unwrap();
    buffer.write_u16::<BigEndian>(16).unwrap();
    buffer.write_u16::<BigEndian>(8).unwrap();

    buffer.write_u32::<BigEndian>(0).unwrap();

    Cursor::new(buffer)
}

/// Little-endian BigTIFF with two IFDs, the second an overview
pub fn create_test_bigtiff_buffer() -> Cursor<Vec<u8>> {
    let mut buffer = Vec::new();

    buffer.write_u16::<LittleEndian>(0x4949).unwrap();
    buffer.write_u16::<LittleEndian>(43).unwrap();     // BigTIFF version
    buffer.write_u16::<LittleEndian>(8).unwrap();      // Offset size
    buffer.write_u16::<LittleEndian>(0).unwrap();      // Reserved
    buffer.write_u64::<LittleEndian>(16).unwrap();     // IFD offset

    // IFD 0 at 16: 8 + 2*20 + 8 = 56 bytes, so IFD 1 starts at 72
    write_bigtiff_ifd(&mut buffer, &[(256, 1024), (257, 768)], 72);
    write_bigtiff_ifd(&mut buffer, &[(254, 1), (256, 512), (257, 384)], 0);

    Cursor::new(buffer)
}

fn write_bigtiff_ifd(buffer: &mut Vec<u8>, entries: &[(u16, u64)], next: u64) {
    buffer.write_u64::<LittleEndian>(entries.len() as u64).unwrap();
    for &(tag, value) in entries {
        buffer.write_u16::<LittleEndian>(tag).unwrap();
        buffer.write_u16::<LittleEndian>(16).unwrap(); // LONG8
        buffer.write_u64::<LittleEndian>(1).unwrap();
        buffer.write_u64::<LittleEndian>(value).unwrap();
    }
    buffer.write_u64::<LittleEndian>(next).unwrap();
}

/// Raw 8-byte value field holding a little-endian u32
pub fn raw_le(value: u32) -> [u8; 8] {
    let mut raw = [0u8; 8];
    LittleEndian::write_u32(&mut raw, value);
    raw
}
