//! Image File Directory (IFD) structures and methods
//!
//! IFDs hold the metadata of one image in a TIFF file as a series of tag
//! entries. Each entry keeps the raw bytes of its value field so values that
//! fit inline can be decoded in the file's byte order.

use std::collections::HashMap;
use std::fmt;
use log::trace;

use crate::io::byte_order::ByteOrder;
use crate::tiff::constants::{field_types, tags};
use crate::tiff::geotags;

/// Represents an entry in an Image File Directory (IFD)
#[derive(Debug, Clone)]
pub struct IFDEntry {
    /// TIFF tag identifier
    pub tag: u16,
    /// Field type
    pub field_type: u16,
    /// Number of values
    pub count: u64,
    /// Value field interpreted as an offset
    pub value_offset: u64,
    /// Raw value field as stored in the file (4 or 8 significant bytes)
    pub raw_value: [u8; 8],
}

impl IFDEntry {
    /// Creates a new IFD entry
    pub fn new(tag: u16, field_type: u16, count: u64, value_offset: u64, raw_value: [u8; 8]) -> Self {
        Self {
            tag,
            field_type,
            count,
            value_offset,
            raw_value,
        }
    }

    /// Size in bytes of a single value of this entry's type
    pub fn get_field_type_size(&self) -> usize {
        field_type_size(self.field_type)
    }

    /// Total size in bytes of the entry's values
    pub fn byte_len(&self) -> u64 {
        self.get_field_type_size() as u64 * self.count
    }

    /// Determines if the value is stored inline in the value field
    /// rather than at the offset location
    pub fn is_value_inline(&self, is_big_tiff: bool) -> bool {
        let inline_size = if is_big_tiff { 8 } else { 4 };
        self.byte_len() <= inline_size
    }

    /// Decodes the first value of an inline integer entry
    pub fn inline_scalar(&self, byte_order: ByteOrder, is_big_tiff: bool) -> Option<u64> {
        if self.count == 0 || !self.is_value_inline(is_big_tiff) {
            return None;
        }
        let handler = byte_order.create_handler();
        let raw = &self.raw_value;
        match self.field_type {
            field_types::BYTE | field_types::SBYTE | field_types::UNDEFINED => Some(raw[0] as u64),
            field_types::SHORT | field_types::SSHORT => Some(handler.u16_from(raw) as u64),
            field_types::LONG | field_types::SLONG => Some(handler.u32_from(raw) as u64),
            field_types::LONG8 | field_types::SLONG8 | field_types::IFD8 => Some(handler.u64_from(raw)),
            _ => None,
        }
    }

    /// Returns a human-readable description of this entry
    pub fn description(&self) -> String {
        format!("Tag: {} ({}), Type: {} ({}), Count: {}, Value/Offset: {}",
                self.tag, geotags::get_tag_name(self.tag),
                self.field_type, geotags::get_field_type_name(self.field_type),
                self.count, self.value_offset)
    }
}

/// Size in bytes of one value of a TIFF field type
pub fn field_type_size(field_type: u16) -> usize {
    match field_type {
        field_types::BYTE | field_types::ASCII | field_types::SBYTE | field_types::UNDEFINED => 1,
        field_types::SHORT | field_types::SSHORT => 2,
        field_types::LONG | field_types::SLONG | field_types::FLOAT => 4,
        field_types::RATIONAL | field_types::SRATIONAL | field_types::DOUBLE => 8,
        field_types::LONG8 | field_types::SLONG8 | field_types::IFD8 => 8,
        _ => 1,
    }
}

/// Represents an Image File Directory (IFD) in a TIFF file
#[derive(Debug, Clone)]
pub struct IFD {
    /// Entries in this IFD, in file order
    pub entries: Vec<IFDEntry>,
    /// IFD number (0-based)
    pub number: usize,
    /// Offset to this IFD in the file
    pub offset: u64,
    /// Byte order of the owning file
    pub byte_order: ByteOrder,
    /// Whether the owning file is a BigTIFF
    pub is_big_tiff: bool,
    /// Index into `entries` by tag
    tag_map: HashMap<u16, usize>,
}

impl IFD {
    /// Creates a new empty IFD
    pub fn new(number: usize, offset: u64, byte_order: ByteOrder, is_big_tiff: bool) -> Self {
        Self {
            entries: Vec::new(),
            number,
            offset,
            byte_order,
            is_big_tiff,
            tag_map: HashMap::new(),
        }
    }

    /// Adds an entry to this IFD
    pub fn add_entry(&mut self, entry: IFDEntry) {
        trace!("Adding entry to IFD #{}: {}", self.number, entry.description());
        self.tag_map.insert(entry.tag, self.entries.len());
        self.entries.push(entry);
    }

    /// Gets a scalar tag value
    ///
    /// Only inline integer values are returned; array tags must be read
    /// through the `TiffReader`.
    pub fn get_tag_value(&self, tag: u16) -> Option<u64> {
        self.get_entry(tag)?.inline_scalar(self.byte_order, self.is_big_tiff)
    }

    /// Checks if this IFD has a specific tag
    pub fn has_tag(&self, tag: u16) -> bool {
        self.tag_map.contains_key(&tag)
    }

    /// Gets an IFD entry by tag
    pub fn get_entry(&self, tag: u16) -> Option<&IFDEntry> {
        self.tag_map.get(&tag).and_then(|&index| self.entries.get(index))
    }

    /// Gets the dimensions of the image described by this IFD
    pub fn get_dimensions(&self) -> Option<(u64, u64)> {
        let width = self.get_tag_value(tags::IMAGE_WIDTH)?;
        let height = self.get_tag_value(tags::IMAGE_LENGTH)?;
        Some((width, height))
    }

    /// Returns number of samples per pixel (default 1 if not specified)
    pub fn get_samples_per_pixel(&self) -> u64 {
        self.get_tag_value(tags::SAMPLES_PER_PIXEL).unwrap_or(1)
    }

    /// Whether the image data is organised in tiles rather than strips
    pub fn is_tiled(&self) -> bool {
        self.has_tag(tags::TILE_WIDTH) && self.has_tag(tags::TILE_OFFSETS)
    }

    /// Whether this IFD is a reduced-resolution overview
    pub fn is_overview(&self) -> bool {
        self.get_tag_value(tags::NEW_SUBFILE_TYPE)
            .map(|v| v & 1 == 1)
            .unwrap_or(false)
    }

    /// Gets the number of entries in this IFD
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

impl fmt::Display for IFD {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "IFD #{} (offset: {})", self.number, self.offset)?;
        writeln!(f, "  Number of entries: {}", self.entries.len())?;

        if let Some((width, height)) = self.get_dimensions() {
            writeln!(f, "  Dimensions: {}x{}", width, height)?;
        }

        writeln!(f, "  Samples per pixel: {}", self.get_samples_per_pixel())?;

        writeln!(f, "  Tags:")?;
        for entry in &self.entries {
            let value_display = match entry.inline_scalar(self.byte_order, self.is_big_tiff) {
                Some(value) if entry.tag == tags::COMPRESSION => {
                    format!("{} ({})", value, geotags::get_compression_name(value))
                }
                Some(value) if entry.count == 1 => value.to_string(),
                _ => format!("{} values at {}", entry.count, entry.value_offset),
            };

            writeln!(f, "    {} ({}): {} [{}]",
                     entry.tag, geotags::get_tag_name(entry.tag), value_display,
                     geotags::get_field_type_name(entry.field_type))?;
        }

        Ok(())
    }
}
