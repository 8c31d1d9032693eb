//! Building blocks for the `perfsmoke` binary: run configuration, the virtual
//! caller loop, whole-run metric aggregation, and summary/results reporting.

pub mod metrics;
pub mod model;
pub mod report;
pub mod worker;
