//! pf-core: error taxonomy, typed configuration, resolution, and run
//! reporting for the postforge pipeline.
//!
//! This crate is the foundational dependency for the other pf-* crates. It
//! performs no I/O beyond reading configuration documents.

pub mod config;
pub mod error;
pub mod report;
pub mod resolve;

// Re-export the most commonly used items at the crate root.
pub use config::{PipelineConfig, SafetyProfile};
pub use error::{Error, Result};
pub use report::{AgentPayload, AgentReport, AgentState, ProcessingLogRecord, RunResult};
pub use resolve::{resolve, ResolvedConfig};
