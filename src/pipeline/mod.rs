//! Batch chip extraction
//!
//! The temporal driver walks the twelve months of one point and year; the
//! orchestrator fans (point, year) units out over a worker pool.

mod naming;
mod renderer;
mod driver;
mod pool;
mod orchestrator;

pub use naming::{output_path, output_stem};
pub use renderer::{ChipRenderer, MosaicChipRenderer};
pub use driver::{DriverSettings, MonthOutcome, TemporalDriver, UnitOutcome};
pub use pool::WorkerPool;
pub use orchestrator::{Orchestrator, RunReport};
