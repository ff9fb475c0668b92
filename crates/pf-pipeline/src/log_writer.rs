//! Atomic persistence of the processing log.
//!
//! The record is serialized into a temporary file in the destination
//! directory and renamed into place, so a crash mid-write never leaves a
//! truncated log behind.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use pf_core::{Error, ProcessingLogRecord};

/// Subdirectory of the output directory that holds processing logs.
const LOGS_DIR: &str = "logs";

/// Write `record` under `{output_dir}/logs/` and return the log path.
///
/// The filename embeds the record's timestamp
/// (`processing_log_20250114_153042.json`), so successive runs never
/// clobber each other.
pub fn write_processing_log(
    record: &ProcessingLogRecord,
    output_dir: &Path,
) -> pf_core::Result<PathBuf> {
    let logs_dir = output_dir.join(LOGS_DIR);
    std::fs::create_dir_all(&logs_dir)
        .map_err(|e| Error::log_write(format!("cannot create {}: {e}", logs_dir.display())))?;

    let filename = format!(
        "processing_log_{}.json",
        record.timestamp.format("%Y%m%d_%H%M%S")
    );
    let final_path = logs_dir.join(filename);

    let json = serde_json::to_string_pretty(record)
        .map_err(|e| Error::log_write(format!("cannot serialize record: {e}")))?;

    // Stage in the same directory so the rename stays on one filesystem.
    let mut staged = tempfile::NamedTempFile::new_in(&logs_dir)
        .map_err(|e| Error::log_write(format!("cannot create staging file: {e}")))?;
    staged
        .write_all(json.as_bytes())
        .map_err(|e| Error::log_write(format!("cannot write staging file: {e}")))?;
    staged
        .persist(&final_path)
        .map_err(|e| Error::log_write(format!("cannot move log into place: {e}")))?;

    debug!(path = %final_path.display(), "processing log written");
    Ok(final_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pf_core::{AgentPayload, AgentReport};

    fn sample_record() -> ProcessingLogRecord {
        let reports = vec![
            AgentReport::succeeded(
                "backup",
                0.12,
                AgentPayload::Backup {
                    backup_path: Some(PathBuf::from("/tmp/b/a.mp4")),
                    total_backups: 1,
                    evicted: 0,
                },
            ),
            AgentReport::failed("audio", 1.5, "Tool error [ffmpeg]: exited with status 1"),
        ];
        ProcessingLogRecord::new(Some(PathBuf::from("conf.json")), 1.62, &reports)
    }

    #[test]
    fn writes_a_parseable_log_with_timestamped_name() {
        let dir = tempfile::tempdir().unwrap();
        let record = sample_record();

        let path = write_processing_log(&record, dir.path()).unwrap();

        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("processing_log_"));
        assert!(name.ends_with(".json"));
        assert_eq!(path.parent().unwrap(), dir.path().join("logs"));

        let parsed: ProcessingLogRecord =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed.run_id, record.run_id);
        assert!(!parsed.success);
        assert_eq!(parsed.agent_results.len(), 2);
        assert!(parsed.agent_results.contains_key("audio"));
    }

    #[test]
    fn creates_the_logs_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!dir.path().join("logs").exists());
        write_processing_log(&sample_record(), dir.path()).unwrap();
        assert!(dir.path().join("logs").is_dir());
    }

    #[test]
    fn failure_leaves_no_partial_log() {
        let dir = tempfile::tempdir().unwrap();
        // Occupy the logs path with a file so create_dir_all fails.
        std::fs::write(dir.path().join("logs"), b"not a directory").unwrap();

        let err = write_processing_log(&sample_record(), dir.path()).unwrap_err();
        assert!(matches!(err, Error::LogWrite { .. }));

        // Nothing was staged next to the blocker.
        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("logs")]);
    }

    #[test]
    fn successive_runs_do_not_clobber() {
        let dir = tempfile::tempdir().unwrap();
        let first = sample_record();
        let mut second = sample_record();
        // Force a distinct timestamp so the filenames differ.
        second.timestamp = first.timestamp + chrono::Duration::seconds(1);

        let p1 = write_processing_log(&first, dir.path()).unwrap();
        let p2 = write_processing_log(&second, dir.path()).unwrap();
        assert_ne!(p1, p2);
        assert!(p1.exists() && p2.exists());
    }
}
