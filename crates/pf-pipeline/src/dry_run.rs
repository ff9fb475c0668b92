//! Pre-flight validation without side effects.
//!
//! Every check is observational: files are opened read-only at most, tools
//! are probed with their version flag, and nothing is created on disk. The
//! report lists each check individually so a failing environment is
//! diagnosable in one pass.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use pf_av::ToolRegistry;

/// How long a tool probe may take before it counts as unavailable.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of a dry run: one boolean per named check.
#[derive(Debug, Clone)]
pub struct DryRunReport {
    /// Check name to pass/fail, ordered by name.
    pub checks: BTreeMap<String, bool>,
    /// True when every check passed.
    pub all_passed: bool,
}

impl DryRunReport {
    fn from_checks(checks: BTreeMap<String, bool>) -> Self {
        let all_passed = checks.values().all(|&passed| passed);
        Self { checks, all_passed }
    }
}

/// Run all pre-flight checks and report per-check results.
///
/// `config_valid` is supplied by the caller, which has already attempted
/// configuration resolution; a resolution failure is reported here rather
/// than aborting the dry run.
pub async fn run_checks(
    input: &Path,
    output_dir: &Path,
    config_valid: bool,
    tools: &ToolRegistry,
) -> DryRunReport {
    let mut checks = BTreeMap::new();

    checks.insert("input_exists".to_string(), input.is_file());
    checks.insert("input_readable".to_string(), file_is_readable(input));
    checks.insert("config_valid".to_string(), config_valid);
    checks.insert(
        "output_dir_writable".to_string(),
        dir_is_writable(output_dir),
    );
    for tool in pf_av::KNOWN_TOOLS {
        let available = tools.probe(tool, PROBE_TIMEOUT).await.is_ok();
        checks.insert(format!("{tool}_available"), available);
    }

    DryRunReport::from_checks(checks)
}

fn file_is_readable(path: &Path) -> bool {
    std::fs::File::open(path).is_ok()
}

/// Whether `dir` (or, if it does not exist yet, its nearest existing
/// ancestor) accepts writes. Judged from permission metadata only; no
/// probe file is created.
fn dir_is_writable(dir: &Path) -> bool {
    let mut candidate = dir;
    loop {
        match std::fs::metadata(candidate) {
            Ok(meta) => return meta.is_dir() && !meta.permissions().readonly(),
            Err(_) => match candidate.parent() {
                Some(parent) if parent != candidate => candidate = parent,
                _ => return false,
            },
        }
    }
}
