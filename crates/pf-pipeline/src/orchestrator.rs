//! Sequential pipeline orchestration.
//!
//! One [`Pipeline`] per input video. A run resolves configuration, executes
//! the registered agents in order, threads stage outputs through the
//! handoff, and always comes back with a [`RunResult`]: failures are
//! collected, never raised.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{error, info, warn};

use pf_av::ToolRegistry;
use pf_core::report::round2;
use pf_core::{AgentPayload, ProcessingLogRecord, RunResult, SafetyProfile};

use crate::agent::{run_agent, AgentContext, Handoff};
use crate::dry_run::{self, DryRunReport};
use crate::log_writer::write_processing_log;
use crate::registry::AgentRegistry;

/// Orchestrates one video through the agent sequence.
pub struct Pipeline {
    base_config: Option<PathBuf>,
    override_config: Option<PathBuf>,
    profile: SafetyProfile,
    tools: Arc<ToolRegistry>,
    registry: AgentRegistry,
}

impl Pipeline {
    /// A pipeline with the standard agents and tools discovered from PATH.
    pub fn new() -> Self {
        Self {
            base_config: None,
            override_config: None,
            profile: SafetyProfile::default(),
            tools: Arc::new(ToolRegistry::discover()),
            registry: AgentRegistry::standard(),
        }
    }

    /// Builder: base configuration file.
    pub fn with_base_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_config = Some(path.into());
        self
    }

    /// Builder: override configuration file, merged over the base.
    pub fn with_override_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.override_config = Some(path.into());
        self
    }

    /// Builder: safety profile applied at resolution time.
    pub fn with_profile(mut self, profile: SafetyProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Builder: replace the discovered tool registry.
    pub fn with_tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = tools;
        self
    }

    /// Builder: replace the agent registry.
    pub fn with_registry(mut self, registry: AgentRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// The tool registry this pipeline consults.
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Run the pipeline over `input`.
    ///
    /// Never returns an error: a configuration failure yields a result with
    /// one error message and no executed agents; agent failures are
    /// contained per stage and later stages still run.
    pub async fn process(
        &self,
        input: &Path,
        output_dir: Option<&Path>,
        overrides: Option<&Value>,
    ) -> RunResult {
        let started = Instant::now();
        info!(input = %input.display(), "pipeline run starting");

        let resolved = match pf_core::resolve(
            self.base_config.as_deref(),
            self.override_config.as_deref(),
            overrides,
            self.profile,
        ) {
            Ok(resolved) => resolved,
            Err(e) => {
                error!(error = %e, "configuration resolution failed");
                return aborted_result(e.to_string(), started);
            }
        };
        let config = Arc::new(resolved.config);

        let output_dir = output_dir
            .map(Path::to_path_buf)
            .unwrap_or_else(|| default_output_dir(input));
        if let Err(e) = std::fs::create_dir_all(&output_dir) {
            let message = format!(
                "cannot create output directory {}: {e}",
                output_dir.display()
            );
            error!("{message}");
            return aborted_result(message, started);
        }

        let mut handoff = Handoff::default();
        let mut reports = Vec::new();
        let mut error_messages = Vec::new();

        for agent in self.registry.build() {
            if agent.name() == "video" && handoff.audio_track.is_none() {
                warn!("no normalized audio to mux, the enhanced video keeps its original track");
            }

            let ctx = AgentContext::new(
                input.to_path_buf(),
                output_dir.clone(),
                config.clone(),
                self.tools.clone(),
            )
            .with_handoff(handoff.clone());

            let report = run_agent(agent.as_ref(), &ctx).await;

            match &report.payload {
                Some(AgentPayload::Audio { output_path, .. }) => {
                    handoff.audio_track = Some(output_path.clone());
                }
                Some(AgentPayload::Captions { srt_path, .. }) => {
                    handoff.captions_srt = Some(srt_path.clone());
                }
                _ => {}
            }
            if let Some(message) = &report.error {
                error_messages.push(message.clone());
            }
            reports.push(report);
        }

        let mut final_video_path = None;
        let mut captions_srt_path = None;
        let mut thumbnail_paths = Vec::new();
        for report in &reports {
            match &report.payload {
                Some(AgentPayload::Video { output_path, .. }) => {
                    final_video_path = Some(output_path.clone());
                }
                Some(AgentPayload::Captions { srt_path, .. }) => {
                    captions_srt_path = Some(srt_path.clone());
                }
                Some(AgentPayload::Thumbnails { paths, .. }) => {
                    thumbnail_paths = paths.clone();
                }
                _ => {}
            }
        }

        let total_time_secs = round2(started.elapsed().as_secs_f64());
        let record = ProcessingLogRecord::new(resolved.config_path, total_time_secs, &reports);
        // A log-write failure is reported but cannot fail agents that
        // already ran, so it stays out of error_messages.
        let processing_log_path = match write_processing_log(&record, &output_dir) {
            Ok(path) => Some(path),
            Err(e) => {
                error!(error = %e, "processing log could not be written");
                None
            }
        };

        if error_messages.is_empty() {
            info!(total_secs = total_time_secs, "pipeline run complete");
        } else {
            warn!(
                failures = error_messages.len(),
                total_secs = total_time_secs,
                "pipeline run finished with failures"
            );
        }

        RunResult {
            final_video_path,
            captions_srt_path,
            thumbnail_paths,
            processing_log_path,
            total_time_secs,
            error_messages,
            reports,
        }
    }

    /// Pre-flight checks for `input` without touching the filesystem.
    pub async fn dry_run(
        &self,
        input: &Path,
        output_dir: Option<&Path>,
        overrides: Option<&Value>,
    ) -> DryRunReport {
        let config_valid = pf_core::resolve(
            self.base_config.as_deref(),
            self.override_config.as_deref(),
            overrides,
            self.profile,
        )
        .is_ok();
        let output_dir = output_dir
            .map(Path::to_path_buf)
            .unwrap_or_else(|| default_output_dir(input));
        dry_run::run_checks(input, &output_dir, config_valid, &self.tools).await
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// `{input parent}/{input stem}_output`.
fn default_output_dir(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    input
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(format!("{stem}_output"))
}

fn aborted_result(message: String, started: Instant) -> RunResult {
    RunResult {
        final_video_path: None,
        captions_srt_path: None,
        thumbnail_paths: Vec::new(),
        processing_log_path: None,
        total_time_secs: round2(started.elapsed().as_secs_f64()),
        error_messages: vec![message],
        reports: Vec::new(),
    }
}
