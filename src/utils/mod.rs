//! Utility modules for common functionality
//!
//! Logging and progress reporting shared by the commands and the pipeline.

pub mod logger;
pub mod progress;
