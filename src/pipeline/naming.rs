//! Output file naming
//!
//! Chips are named `{ID}_{COLLECTION}_{YEAR}_{MM}` in upper case, so a rerun
//! overwrites the same files and concurrent units never collide.

use lazy_static::lazy_static;
use regex::Regex;
use std::path::{Path, PathBuf};

use crate::catalog::TimeWindow;
use crate::chip::OutputFormat;

lazy_static! {
    /// Characters that are not safe in a file name component
    static ref UNSAFE_CHARS: Regex = Regex::new(r"[^A-Za-z0-9._-]+").expect("static regex");
}

fn component(value: &str) -> String {
    UNSAFE_CHARS.replace_all(value.trim(), "_").to_uppercase()
}

/// File stem of the chip for one point and month
pub fn output_stem(point_id: &str, collection: &str, window: &TimeWindow) -> String {
    format!(
        "{}_{}_{}_{:02}",
        component(point_id),
        component(collection),
        window.year,
        window.month
    )
}

/// Full output path of a chip
pub fn output_path(
    output_dir: &Path,
    point_id: &str,
    collection: &str,
    window: &TimeWindow,
    format: OutputFormat,
) -> PathBuf {
    output_dir.join(format!("{}.{}", output_stem(point_id, collection, window), format.extension()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stem_is_upper_case() {
        let window = TimeWindow::month(2020, 3).unwrap();
        assert_eq!(output_stem("p1", "sentinel-2-l2a", &window), "P1_SENTINEL-2-L2A_2020_03");
    }

    #[test]
    fn test_unsafe_characters_are_replaced() {
        let window = TimeWindow::month(2021, 11).unwrap();
        assert_eq!(output_stem("farm 7/north", "s2", &window), "FARM_7_NORTH_S2_2021_11");
    }

    #[test]
    fn test_output_path() {
        let window = TimeWindow::month(2019, 1).unwrap();
        let path = output_path(Path::new("/data/chips"), "17", "sentinel-2-l2a", &window, OutputFormat::Jpeg);
        assert_eq!(path, PathBuf::from("/data/chips/17_SENTINEL-2-L2A_2019_01.jpg"));
    }
}
