//! Radiometric rescaling to 8 bits
//!
//! Each band is mapped from a source range onto `[dst_min, dst_max]` with a
//! gamma exponent. Output value 0 is reserved for pixels without data.

use serde::{Deserialize, Serialize};

use crate::error::{ChipError, ChipResult};

/// Lower and upper percentile used for adaptive ranges
pub const LOW_PERCENTILE: f64 = 2.0;
pub const HIGH_PERCENTILE: f64 = 98.0;

/// Linear rescale of one band, `[src_min, src_max, dst_min, dst_max]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct ScaleRange {
    pub src_min: f64,
    pub src_max: f64,
    pub dst_min: f64,
    pub dst_max: f64,
}

impl From<[f64; 4]> for ScaleRange {
    fn from(v: [f64; 4]) -> Self {
        ScaleRange::new(v[0], v[1], v[2], v[3])
    }
}

impl From<ScaleRange> for [f64; 4] {
    fn from(r: ScaleRange) -> Self {
        [r.src_min, r.src_max, r.dst_min, r.dst_max]
    }
}

impl ScaleRange {
    pub fn new(src_min: f64, src_max: f64, dst_min: f64, dst_max: f64) -> Self {
        ScaleRange { src_min, src_max, dst_min, dst_max }
    }

    pub fn validate(&self) -> ChipResult<()> {
        let values = [self.src_min, self.src_max, self.dst_min, self.dst_max];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ChipError::InvalidInput(format!("Non-finite scale range {:?}", values)));
        }
        if !(0.0..=255.0).contains(&self.dst_min) || !(0.0..=255.0).contains(&self.dst_max) {
            return Err(ChipError::InvalidInput(format!("Output range {:?} exceeds 8 bits", values)));
        }
        Ok(())
    }

    /// Rescale one value
    ///
    /// The normalized value is clamped to [0, 1] before the exponent is
    /// applied. A zero-width source range maps everything to `dst_min`.
    pub fn apply(&self, value: f64, gamma: f64) -> u8 {
        let span = self.src_max - self.src_min;
        let scaled = if span == 0.0 {
            self.dst_min
        } else {
            let ratio = ((value - self.src_min) / span).clamp(0.0, 1.0);
            self.dst_min + (self.dst_max - self.dst_min) * ratio.powf(gamma)
        };
        scaled.round().clamp(0.0, 255.0) as u8
    }
}

/// Rescale a band of samples, writing 0 where there is no data
pub fn scale_band(samples: &[Option<f64>], range: &ScaleRange, gamma: f64) -> Vec<u8> {
    samples.iter()
        .map(|sample| match sample {
            Some(value) if value.is_finite() => range.apply(*value, gamma),
            _ => 0,
        })
        .collect()
}

/// Percentile of sorted values with linear interpolation between ranks
///
/// `q` is in percent. Returns `None` for an empty slice.
pub fn percentile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let rank = (q.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// 2nd/98th percentile scale ranges, one per band
///
/// Non-finite values are ignored. An empty band yields `[0, 1, 1, 255]` and
/// a range collapsing to one value is widened to `[min, min + 1]`.
pub fn compute_scale_params(bands: &[Vec<f64>]) -> Vec<ScaleRange> {
    bands.iter()
        .map(|band| {
            let mut values: Vec<f64> = band.iter().copied().filter(|v| v.is_finite()).collect();
            values.sort_by(f64::total_cmp);

            match (percentile(&values, LOW_PERCENTILE), percentile(&values, HIGH_PERCENTILE)) {
                (Some(min), Some(max)) if max > min => ScaleRange::new(min, max, 1.0, 255.0),
                (Some(min), Some(_)) => ScaleRange::new(min, min + 1.0, 1.0, 255.0),
                _ => ScaleRange::new(0.0, 1.0, 1.0, 255.0),
            }
        })
        .collect()
}
