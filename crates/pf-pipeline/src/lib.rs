//! pf-pipeline: the agent sequence behind postforge.
//!
//! Five agents process a video in a fixed order: backup, audio
//! normalization, caption generation, video enhancement, thumbnail
//! extraction. [`Pipeline`] drives one run end to end; a failed agent is
//! recorded and the remaining agents still execute, so one broken stage
//! costs its own output and nothing else.

pub mod agent;
pub mod agents;
pub mod dry_run;
pub mod log_writer;
pub mod orchestrator;
pub mod registry;

pub use agent::{run_agent, Agent, AgentContext, Handoff};
pub use agents::{AudioAgent, BackupAgent, CaptionsAgent, ThumbnailsAgent, VideoAgent};
pub use dry_run::{run_checks, DryRunReport};
pub use log_writer::write_processing_log;
pub use orchestrator::Pipeline;
pub use registry::{AgentFactory, AgentRegistry};
