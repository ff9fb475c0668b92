//! Run reporting types.
//!
//! One [`AgentReport`] per agent invocation, a closed [`AgentPayload`]
//! enumeration instead of free-form per-agent output maps, the caller-facing
//! [`RunResult`] bundle, and the durable [`ProcessingLogRecord`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use uuid::Uuid;

/// Lifecycle of one agent invocation.
///
/// Terminal states are final; there are no intra-agent retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// Agent-specific output, one variant per agent kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentPayload {
    /// `backup_path` is `None` when backups are disabled by configuration.
    Backup {
        backup_path: Option<PathBuf>,
        total_backups: usize,
        evicted: usize,
    },
    /// Loudness stats are the measured input values reported by the
    /// normalizer, absent when the tool did not emit them.
    Audio {
        output_path: PathBuf,
        input_loudness_lufs: Option<f64>,
        input_true_peak_db: Option<f64>,
        input_loudness_range_lu: Option<f64>,
    },
    Captions {
        srt_path: PathBuf,
        entry_count: usize,
        word_count: usize,
    },
    Video {
        output_path: PathBuf,
        encoder: String,
        lut_applied: bool,
        audio_muxed: bool,
        captions_burned: bool,
    },
    /// `scores` and `timestamps` are index-aligned with `paths`.
    Thumbnails {
        paths: Vec<PathBuf>,
        scores: Vec<f64>,
        timestamps: Vec<f64>,
    },
}

/// Outcome envelope for one agent invocation. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentReport {
    pub agent: String,
    pub success: bool,
    /// Wall-clock seconds, rounded to two decimals, reported regardless of
    /// outcome.
    pub elapsed_secs: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<AgentPayload>,
}

impl AgentReport {
    /// Report for a successful invocation.
    pub fn succeeded(agent: impl Into<String>, elapsed_secs: f64, payload: AgentPayload) -> Self {
        Self {
            agent: agent.into(),
            success: true,
            elapsed_secs,
            error: None,
            payload: Some(payload),
        }
    }

    /// Report for a failed invocation.
    pub fn failed(agent: impl Into<String>, elapsed_secs: f64, error: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            success: false,
            elapsed_secs,
            error: Some(error.into()),
            payload: None,
        }
    }

    /// Terminal state this report represents.
    pub fn state(&self) -> AgentState {
        if self.success {
            AgentState::Succeeded
        } else {
            AgentState::Failed
        }
    }
}

/// Result bundle for one pipeline run, returned by value to the caller.
///
/// `error_messages` is empty exactly when every executed agent succeeded;
/// callers must check it rather than expect an all-or-nothing outcome.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub final_video_path: Option<PathBuf>,
    pub captions_srt_path: Option<PathBuf>,
    pub thumbnail_paths: Vec<PathBuf>,
    pub processing_log_path: Option<PathBuf>,
    pub total_time_secs: f64,
    /// One entry per failed agent, in execution order.
    pub error_messages: Vec<String>,
    /// Full per-agent reports, in execution order.
    pub reports: Vec<AgentReport>,
}

impl RunResult {
    pub fn success(&self) -> bool {
        self.error_messages.is_empty()
    }
}

/// Durable record of one pipeline run. Append-only: one file per run,
/// never mutated after write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingLogRecord {
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub config_path: Option<PathBuf>,
    pub total_time_seconds: f64,
    pub success: bool,
    pub agent_results: BTreeMap<String, AgentReport>,
}

impl ProcessingLogRecord {
    /// Build a record from the reports of one run.
    pub fn new(
        config_path: Option<PathBuf>,
        total_time_seconds: f64,
        reports: &[AgentReport],
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            config_path,
            total_time_seconds,
            success: reports.iter().all(|r| r.success),
            agent_results: reports
                .iter()
                .map(|r| (r.agent.clone(), r.clone()))
                .collect(),
        }
    }
}

/// Round to two decimal places, the precision recorded in reports and logs.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
