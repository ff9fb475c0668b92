//! Media duration probing via ffprobe.

use std::path::Path;
use std::time::Duration;

use crate::command::ToolCommand;
use crate::tools::ToolRegistry;
use pf_core::{Error, Result};

/// Bound on the duration query; interrogating a local file is fast.
const DURATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Query a file's duration in seconds.
pub async fn media_duration(registry: &ToolRegistry, input: &Path) -> Result<f64> {
    let ffprobe = registry.require("ffprobe")?;
    let output = ToolCommand::new(ffprobe.path.clone())
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(input.display().to_string())
        .timeout(DURATION_TIMEOUT)
        .execute()
        .await?;

    parse_duration(&output.stdout)
}

fn parse_duration(stdout: &str) -> Result<f64> {
    let line = stdout
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or_else(|| Error::parse("ffprobe duration", "empty output"))?;

    let duration: f64 = line
        .parse()
        .map_err(|e| Error::parse("ffprobe duration", format!("`{line}`: {e}")))?;

    if !duration.is_finite() || duration <= 0.0 {
        return Err(Error::parse(
            "ffprobe duration",
            format!("non-positive duration {duration}"),
        ));
    }
    Ok(duration)
}
