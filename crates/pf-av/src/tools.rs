//! External tool detection.
//!
//! The [`ToolRegistry`] discovers and caches the locations of the external
//! CLI tools the pipeline shells out to (ffmpeg, ffprobe, whisper) and
//! provides lookup and availability probing for the rest of the workspace.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use crate::command::ToolCommand;

/// Known tool names that the registry manages.
pub const KNOWN_TOOLS: &[&str] = &["ffmpeg", "ffprobe", "whisper"];

/// A discovered external tool.
#[derive(Debug, Clone)]
pub struct ToolHandle {
    /// Tool name (e.g. "ffmpeg").
    pub name: String,
    /// Resolved path to the executable.
    pub path: PathBuf,
}

/// Availability and version of one known tool, for display.
#[derive(Debug, Clone)]
pub struct ToolStatus {
    pub name: String,
    pub available: bool,
    /// First line of the tool's version output, when it answered.
    pub version: Option<String>,
    /// Discovered location, present even when the probe failed.
    pub path: Option<PathBuf>,
}

/// Registry holding discovered tool locations.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolHandle>,
}

impl ToolRegistry {
    /// Discover the known tools by searching `PATH`.
    ///
    /// Tools that are not found are omitted; agents that need them fail
    /// individually through [`ToolRegistry::require`] rather than blocking
    /// registry construction.
    pub fn discover() -> Self {
        let mut registry = Self::default();
        for &name in KNOWN_TOOLS {
            match which::which(name) {
                Ok(path) => {
                    debug!(tool = name, path = %path.display(), "tool discovered");
                    registry.insert(name, path);
                }
                Err(_) => debug!(tool = name, "tool not found on PATH"),
            }
        }
        registry
    }

    /// Register (or replace) a tool at an explicit path.
    pub fn insert(&mut self, name: impl Into<String>, path: PathBuf) {
        let name = name.into();
        self.tools.insert(name.clone(), ToolHandle { name, path });
    }

    /// Look up a tool, or fail with [`pf_core::Error::ToolUnavailable`].
    pub fn require(&self, name: &str) -> pf_core::Result<&ToolHandle> {
        self.tools.get(name).ok_or_else(|| {
            pf_core::Error::tool_unavailable(name, "not found; is it installed and in PATH?")
        })
    }

    /// Whether a tool was discovered.
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Invoke a tool's no-op probe form (`-version`, `--help`) with a
    /// bounded timeout and return the first output line.
    ///
    /// This is the availability check used by dry runs: failure or timeout
    /// means "unavailable", never a hang.
    pub async fn probe(&self, name: &str, timeout: Duration) -> pf_core::Result<String> {
        let handle = self.require(name)?;
        let output = ToolCommand::new(handle.path.clone())
            .arg(probe_arg(name))
            .timeout(timeout)
            .execute()
            .await?;
        Ok(output
            .stdout
            .lines()
            .next()
            .unwrap_or_default()
            .to_string())
    }

    /// Probe every known tool and report availability plus its version line.
    pub async fn check_all(&self, timeout: Duration) -> Vec<ToolStatus> {
        let mut statuses = Vec::with_capacity(KNOWN_TOOLS.len());
        for &name in KNOWN_TOOLS {
            let path = self.tools.get(name).map(|handle| handle.path.clone());
            let (available, version) = match self.probe(name, timeout).await {
                Ok(line) => (true, (!line.is_empty()).then_some(line)),
                Err(_) => (false, None),
            };
            statuses.push(ToolStatus {
                name: name.to_string(),
                available,
                version,
                path,
            });
        }
        statuses
    }
}

/// Probe argument per tool: ffmpeg and ffprobe answer `-version`, whisper
/// only has `--help`.
fn probe_arg(name: &str) -> &'static str {
    match name {
        "ffmpeg" | "ffprobe" => "-version",
        _ => "--help",
    }
}
