//! Statistical helpers and process memory sampling shared by the cache
//! monitor and the benchmark harness.

pub mod memory;
pub mod statistics;

pub use memory::{MemorySnapshot, MemoryTracker};
pub use statistics::{DistributionSummary, OutlierReport, StatisticalCalculator};
