//! Unit tests for the TIFF layer

mod test_utils;
mod builder_tests;
