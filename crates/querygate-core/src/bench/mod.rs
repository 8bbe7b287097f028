//! Benchmark harness: drives a hosted pipeline over a labeled dataset,
//! scores the answers against a reference database and applies release gates.

pub mod client;
pub mod dataset;
pub mod oracle;
pub mod runner;
pub mod summary;

pub use client::{ApiResponse, HttpPipelineClient, PipelineClient, RunOptions};
pub use dataset::load_cases;
pub use oracle::ReferenceDb;
pub use runner::{
    run_benchmark, BenchOptions, BenchOutcome, BenchmarkHarness, HarnessSettings, Progress,
    PublishStatus,
};
pub use summary::{summarize, ReleaseGates, Summary};
