//! Sample layout of a TIFF image
//!
//! Describes how samples are packed inside a decompressed strip or tile
//! (bit depth, numeric format, interleaving, predictor) and turns raw block
//! bytes into sample values.

use log::debug;

use crate::io::byte_order::ByteOrder;
use crate::io::seekable::SeekableReader;
use crate::tiff::constants::{planar_config, predictor, sample_format, tags};
use crate::tiff::errors::{TiffError, TiffResult};
use crate::tiff::ifd::IFD;
use crate::tiff::reader::TiffReader;

/// Sample packing of one image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleLayout {
    pub bits_per_sample: u16,
    pub sample_format: u16,
    pub samples_per_pixel: u16,
    pub planar_configuration: u16,
    pub predictor: u16,
    pub byte_order: ByteOrder,
}

impl SampleLayout {
    /// Read the layout tags of an IFD
    pub fn from_ifd(reader: &TiffReader, source: &mut dyn SeekableReader, ifd: &IFD) -> TiffResult<Self> {
        let samples_per_pixel = ifd.get_samples_per_pixel() as u16;

        let bits = if ifd.has_tag(tags::BITS_PER_SAMPLE) {
            reader.read_tag_values(source, ifd, tags::BITS_PER_SAMPLE)?
        } else {
            vec![1]
        };
        let bits_per_sample = bits[0] as u16;
        if bits.iter().any(|&b| b != bits[0]) {
            return Err(TiffError::UnsupportedLayout(format!("Mixed bits per sample: {:?}", bits)));
        }

        let format = if ifd.has_tag(tags::SAMPLE_FORMAT) {
            reader.read_tag_values(source, ifd, tags::SAMPLE_FORMAT)?
                .first()
                .copied()
                .unwrap_or(sample_format::UNSIGNED as u64) as u16
        } else {
            sample_format::UNSIGNED
        };

        let byte_order = reader.byte_order()
            .ok_or_else(|| TiffError::GenericError("Byte order not yet determined".to_string()))?;

        let layout = SampleLayout {
            bits_per_sample,
            sample_format: format,
            samples_per_pixel,
            planar_configuration: ifd.get_tag_value(tags::PLANAR_CONFIGURATION)
                .unwrap_or(planar_config::CHUNKY as u64) as u16,
            predictor: ifd.get_tag_value(tags::PREDICTOR).unwrap_or(predictor::NONE as u64) as u16,
            byte_order,
        };
        layout.validate()?;
        debug!("Sample layout: {:?}", layout);
        Ok(layout)
    }

    fn validate(&self) -> TiffResult<()> {
        let supported = match self.sample_format {
            sample_format::UNSIGNED | sample_format::SIGNED => matches!(self.bits_per_sample, 8 | 16 | 32),
            sample_format::IEEEFP => matches!(self.bits_per_sample, 32 | 64),
            _ => false,
        };
        if !supported {
            return Err(TiffError::UnsupportedLayout(format!(
                "{}-bit samples with sample format {}", self.bits_per_sample, self.sample_format
            )));
        }
        if self.samples_per_pixel == 0 {
            return Err(TiffError::UnsupportedLayout("Zero samples per pixel".to_string()));
        }
        match self.predictor {
            predictor::NONE => Ok(()),
            predictor::HORIZONTAL_DIFFERENCING if self.sample_format != sample_format::IEEEFP => Ok(()),
            other => Err(TiffError::UnsupportedLayout(format!(
                "Predictor {} for sample format {}", other, self.sample_format
            ))),
        }
    }

    /// Bytes per stored sample
    pub fn bytes_per_sample(&self) -> usize {
        self.bits_per_sample as usize / 8
    }

    /// Whether each band is stored in its own set of blocks
    pub fn is_planar(&self) -> bool {
        self.planar_configuration == planar_config::PLANAR && self.samples_per_pixel > 1
    }

    /// Samples per pixel inside one block
    pub fn block_samples_per_pixel(&self) -> usize {
        if self.is_planar() { 1 } else { self.samples_per_pixel as usize }
    }

    /// Decode a decompressed block into sample values
    ///
    /// `block_width` is the stored row length in pixels. Rows missing from a
    /// short buffer decode as zero.
    pub fn decode_block(&self, bytes: &[u8], block_width: usize, rows: usize) -> TiffResult<Vec<f64>> {
        let spp = self.block_samples_per_pixel();
        let row_len = block_width * spp;
        let bps = self.bytes_per_sample();
        let available = (bytes.len() / bps).min(row_len * rows);

        if self.sample_format == sample_format::IEEEFP {
            let mut values = vec![0.0; row_len * rows];
            let handler = self.byte_order.create_handler();
            for (i, value) in values.iter_mut().enumerate().take(available) {
                let chunk = &bytes[i * bps..(i + 1) * bps];
                *value = if bps == 4 {
                    f32::from_bits(handler.u32_from(chunk)) as f64
                } else {
                    handler.f64_from(chunk)
                };
            }
            return Ok(values);
        }

        let mut raw = vec![0u64; row_len * rows];
        let handler = self.byte_order.create_handler();
        for (i, value) in raw.iter_mut().enumerate().take(available) {
            let chunk = &bytes[i * bps..(i + 1) * bps];
            *value = match bps {
                1 => chunk[0] as u64,
                2 => handler.u16_from(chunk) as u64,
                _ => handler.u32_from(chunk) as u64,
            };
        }

        if self.predictor == predictor::HORIZONTAL_DIFFERENCING {
            apply_horizontal_predictor(&mut raw, row_len, spp, self.bits_per_sample);
        }

        let signed = self.sample_format == sample_format::SIGNED;
        Ok(raw.into_iter()
            .map(|v| if signed { sign_extend(v, self.bits_per_sample) as f64 } else { v as f64 })
            .collect())
    }
}

/// Undo horizontal differencing on integer samples, row by row
///
/// Each sample is stored as the difference from the same sample of the
/// previous pixel; sums wrap at the sample bit width.
pub fn apply_horizontal_predictor(data: &mut [u64], row_len: usize, samples_per_pixel: usize, bits: u16) {
    let mask = if bits >= 64 { u64::MAX } else { (1u64 << bits) - 1 };
    for row in data.chunks_mut(row_len) {
        for i in samples_per_pixel..row.len() {
            row[i] = row[i].wrapping_add(row[i - samples_per_pixel]) & mask;
        }
    }
}

fn sign_extend(value: u64, bits: u16) -> i64 {
    let shift = 64 - bits as u32;
    ((value << shift) as i64) >> shift
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(bits: u16, format: u16, spp: u16, pred: u16) -> SampleLayout {
        SampleLayout {
            bits_per_sample: bits,
            sample_format: format,
            samples_per_pixel: spp,
            planar_configuration: planar_config::CHUNKY,
            predictor: pred,
            byte_order: ByteOrder::LittleEndian,
        }
    }

    #[test]
    fn test_decode_u16_with_predictor() {
        // Row of 4 pixels: 1000, 1010, 1005, 65535 as differences
        let diffs: [u16; 4] = [1000, 10, 65531, 64530];
        let bytes: Vec<u8> = diffs.iter().flat_map(|d| d.to_le_bytes()).collect();
        let decoded = layout(16, sample_format::UNSIGNED, 1, predictor::HORIZONTAL_DIFFERENCING)
            .decode_block(&bytes, 4, 1)
            .unwrap();
        assert_eq!(decoded, vec![1000.0, 1010.0, 1005.0, 65535.0]);
    }

    #[test]
    fn test_predictor_per_sample_channel() {
        // Two RGB pixels, second stored as differences per channel
        let bytes = [10u8, 20, 30, 1, 2, 3];
        let decoded = layout(8, sample_format::UNSIGNED, 3, predictor::HORIZONTAL_DIFFERENCING)
            .decode_block(&bytes, 2, 1)
            .unwrap();
        assert_eq!(decoded, vec![10.0, 20.0, 30.0, 11.0, 22.0, 33.0]);
    }

    #[test]
    fn test_decode_signed_and_float() {
        let bytes: Vec<u8> = [-5i16, 7].iter().flat_map(|v| v.to_le_bytes()).collect();
        let decoded = layout(16, sample_format::SIGNED, 1, predictor::NONE).decode_block(&bytes, 2, 1).unwrap();
        assert_eq!(decoded, vec![-5.0, 7.0]);

        let bytes: Vec<u8> = [0.25f32, -1.5].iter().flat_map(|v| v.to_le_bytes()).collect();
        let decoded = layout(32, sample_format::IEEEFP, 1, predictor::NONE).decode_block(&bytes, 2, 1).unwrap();
        assert_eq!(decoded, vec![0.25, -1.5]);
    }

    #[test]
    fn test_short_block_pads_with_zero() {
        let decoded = layout(8, sample_format::UNSIGNED, 1, predictor::NONE).decode_block(&[1, 2, 3], 2, 2).unwrap();
        assert_eq!(decoded, vec![1.0, 2.0, 3.0, 0.0]);
    }

    #[test]
    fn test_unsupported_layouts() {
        assert!(layout(12, sample_format::UNSIGNED, 1, predictor::NONE).validate().is_err());
        assert!(layout(32, sample_format::IEEEFP, 1, 3).validate().is_err());
        assert!(layout(16, sample_format::UNSIGNED, 1, predictor::HORIZONTAL_DIFFERENCING).validate().is_ok());
    }
}
