#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod stats;

pub mod catalog;
pub mod codec;
pub mod dedup;
pub mod domain;
pub mod line_source;

pub mod pipeline {
    pub mod batch;
    pub mod dispatch;
    pub mod merge;
    pub mod worker;
}

pub mod sink;

pub mod run;

// Re-exports: stable API surface
pub use catalog::catalog;
pub use config::{AggregatorConfig, SinkConfig};
pub use dedup::{DedupSet, LineFingerprint};
pub use domain::{AggregatedResult, FileDescriptor, WorkerRecord};
pub use run::Aggregator;
pub use stats::RunSummary;
