//! Chip extraction
//!
//! Window geometry, radiometric scaling and output writing for single
//! georeferenced image chips.

mod params;
mod scale;
mod window;
mod writer;
mod extractor;

pub use params::{default_scale_ranges, ChipParams, OutputFormat, ScaleMode};
pub use scale::{compute_scale_params, percentile, scale_band, ScaleRange, HIGH_PERCENTILE, LOW_PERCENTILE};
pub use window::ChipWindow;
pub use writer::{aux_xml_path, world_file_path, write_chip};
pub use extractor::{extract_chip, ChipExtractor};
