pub mod bench;
pub mod budget;
pub mod catalog;
pub mod config;
pub mod context;
pub mod embeddings;
pub mod errors;
pub mod metrics_api;
pub mod model;
pub mod pipeline;
pub mod providers;
pub mod rag;
pub mod report;
pub mod sql;
pub mod storage;

pub use context::PipelineContext;
pub use errors::{GateError, GateResult};
