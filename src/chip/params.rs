//! Chip extraction parameters

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ChipError, ChipResult};

use super::scale::ScaleRange;

/// Image format of a chip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Jpeg,
    Png,
    #[serde(rename = "gtiff")]
    GTiff,
}

impl OutputFormat {
    /// File extension written for this format
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
            OutputFormat::GTiff => "tif",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = ChipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(OutputFormat::Jpeg),
            "png" => Ok(OutputFormat::Png),
            "gtiff" | "tif" | "tiff" => Ok(OutputFormat::GTiff),
            other => Err(ChipError::Config(format!("Unknown output format: {}", other))),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputFormat::Jpeg => "JPEG",
            OutputFormat::Png => "PNG",
            OutputFormat::GTiff => "GTiff",
        };
        write!(f, "{}", name)
    }
}

/// How per-band rescale ranges are chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScaleMode {
    /// Configured ranges, positional per band
    #[default]
    Fixed,
    /// 2nd/98th percentile of each band over the chip window
    ///
    /// Statistics cover the sampled window only, never the full mosaic
    /// band, so a chip reads no more of a remote scene than it writes.
    Percentile,
}

impl FromStr for ScaleMode {
    type Err = ChipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fixed" => Ok(ScaleMode::Fixed),
            "percentile" => Ok(ScaleMode::Percentile),
            other => Err(ChipError::Config(format!("Unknown scale mode: {}", other))),
        }
    }
}

/// Default rescale ranges for the SWIR1, NIR and red bands of Sentinel-2 L2A
pub fn default_scale_ranges() -> Vec<ScaleRange> {
    vec![
        ScaleRange::new(600.0, 5400.0, 1.0, 255.0),
        ScaleRange::new(700.0, 4300.0, 1.0, 255.0),
        ScaleRange::new(400.0, 2800.0, 1.0, 255.0),
    ]
}

/// Spatial and radiometric parameters of one chip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChipParams {
    /// Half-extent of the chip on the ground, in projected units
    pub buffer_meters: f64,
    pub width_px: u32,
    pub height_px: u32,
    /// Exponent applied to the normalized value during rescaling
    pub gamma: f64,
    pub format: OutputFormat,
    pub jpeg_quality: u8,
    pub scale_mode: ScaleMode,
    pub scale_ranges: Vec<ScaleRange>,
}

impl Default for ChipParams {
    fn default() -> Self {
        ChipParams {
            buffer_meters: 4000.0,
            width_px: 256,
            height_px: 256,
            gamma: 1.3,
            format: OutputFormat::Jpeg,
            jpeg_quality: 75,
            scale_mode: ScaleMode::Fixed,
            scale_ranges: default_scale_ranges(),
        }
    }
}

impl ChipParams {
    /// Check the parameters are usable
    pub fn validate(&self) -> ChipResult<()> {
        if !(self.buffer_meters.is_finite() && self.buffer_meters > 0.0) {
            return Err(ChipError::InvalidInput(format!("Buffer must be positive, got {}", self.buffer_meters)));
        }
        if self.width_px == 0 || self.height_px == 0 {
            return Err(ChipError::InvalidInput(format!(
                "Chip size must be positive, got {}x{}", self.width_px, self.height_px
            )));
        }
        if !(self.gamma.is_finite() && self.gamma > 0.0) {
            return Err(ChipError::InvalidInput(format!("Gamma must be positive, got {}", self.gamma)));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ChipError::InvalidInput(format!("JPEG quality must be 1-100, got {}", self.jpeg_quality)));
        }
        if self.scale_mode == ScaleMode::Fixed {
            for range in &self.scale_ranges {
                range.validate()?;
            }
        }
        Ok(())
    }
}
