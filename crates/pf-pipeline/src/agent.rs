//! The [`Agent`] trait defines a single pipeline stage.
//!
//! Each agent validates its preconditions and executes its work against an
//! explicit [`AgentContext`]; nothing is smuggled through orchestrator
//! state, so every agent is independently invocable. [`run_agent`] is the
//! containment boundary: failures become failed reports, never panics or
//! propagated errors.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, warn};

use pf_core::report::round2;
use pf_core::{AgentPayload, AgentReport, PipelineConfig};

/// Declared outputs of earlier stages, consumed by later ones.
#[derive(Debug, Clone, Default)]
pub struct Handoff {
    /// Normalized audio track produced by the audio stage.
    pub audio_track: Option<PathBuf>,
    /// Subtitle file produced by the caption stage.
    pub captions_srt: Option<PathBuf>,
}

/// Context passed to every agent during validation and execution.
#[derive(Debug, Clone)]
pub struct AgentContext {
    /// The raw input video. Agents never mutate it in place.
    pub input_path: PathBuf,
    /// Directory all side effects are confined to.
    pub output_dir: PathBuf,
    /// Effective configuration for this run.
    pub config: Arc<PipelineConfig>,
    /// Tool registry for looking up external tool paths.
    pub tools: Arc<pf_av::ToolRegistry>,
    /// Outputs of earlier stages.
    pub handoff: Handoff,
}

impl AgentContext {
    /// Create a new context with an empty handoff.
    pub fn new(
        input_path: PathBuf,
        output_dir: PathBuf,
        config: Arc<PipelineConfig>,
        tools: Arc<pf_av::ToolRegistry>,
    ) -> Self {
        Self {
            input_path,
            output_dir,
            config,
            tools,
            handoff: Handoff::default(),
        }
    }

    /// Builder: attach prior stages' outputs.
    pub fn with_handoff(mut self, handoff: Handoff) -> Self {
        self.handoff = handoff;
        self
    }
}

/// A single stage in the processing pipeline.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Stable stage name used to key reports and logs (e.g. "audio").
    fn name(&self) -> &'static str;

    /// Check preconditions (input, required tools) without mutating
    /// anything.
    async fn validate(&self, ctx: &AgentContext) -> pf_core::Result<()>;

    /// Perform the stage's work.
    async fn execute(&self, ctx: &AgentContext) -> pf_core::Result<AgentPayload>;
}

/// Run one agent through the report envelope.
///
/// The invocation moves `Pending → Running → {Succeeded, Failed}`; an error
/// from `validate` or `execute` never propagates past this boundary, it
/// becomes a failed [`AgentReport`]. Elapsed wall-clock time is recorded
/// regardless of outcome.
pub async fn run_agent(agent: &dyn Agent, ctx: &AgentContext) -> AgentReport {
    let name = agent.name();
    debug!(agent = name, "agent running");
    let started = Instant::now();

    let outcome = match agent.validate(ctx).await {
        Ok(()) => agent.execute(ctx).await,
        Err(e) => Err(e),
    };
    let elapsed = round2(started.elapsed().as_secs_f64());

    match outcome {
        Ok(payload) => {
            debug!(agent = name, elapsed_secs = elapsed, "agent succeeded");
            AgentReport::succeeded(name, elapsed, payload)
        }
        Err(e) => {
            warn!(agent = name, elapsed_secs = elapsed, error = %e, "agent failed");
            // Already-attributed errors pass through unchanged.
            let message = match e {
                e @ pf_core::Error::AgentExecution { .. } => e.to_string(),
                e => pf_core::Error::agent(name, e.to_string()).to_string(),
            };
            AgentReport::failed(name, elapsed, message)
        }
    }
}
