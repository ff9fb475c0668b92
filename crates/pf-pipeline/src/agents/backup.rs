//! Backup stage: timestamped copy of the input plus retention enforcement.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use pf_core::config::BackupConfig;
use pf_core::AgentPayload;

use crate::agent::{Agent, AgentContext};

/// One file in the backup directory.
#[derive(Debug, Clone, PartialEq)]
pub struct BackupEntry {
    /// The file this backup was taken from. Known only for backups created
    /// in the current run; scanned entries carry `None` because the
    /// timestamped filename does not record provenance.
    pub original_path: Option<PathBuf>,
    /// Location of the copy.
    pub backup_path: PathBuf,
    /// Modification time of the copy, used for retention ordering.
    pub created_at: DateTime<Utc>,
}

/// Copies the input aside before any other stage touches it.
pub struct BackupAgent;

#[async_trait]
impl Agent for BackupAgent {
    fn name(&self) -> &'static str {
        "backup"
    }

    async fn validate(&self, ctx: &AgentContext) -> pf_core::Result<()> {
        super::ensure_input_file(self.name(), &ctx.input_path)
    }

    async fn execute(&self, ctx: &AgentContext) -> pf_core::Result<AgentPayload> {
        let policy = &ctx.config.backup;
        if !policy.enabled {
            debug!("backup disabled, skipping");
            return Ok(AgentPayload::Backup {
                backup_path: None,
                total_backups: 0,
                evicted: 0,
            });
        }

        let backup_dir = resolve_backup_dir(&ctx.output_dir, &policy.backup_dir);
        std::fs::create_dir_all(&backup_dir)?;

        let entry = create_backup(&ctx.input_path, &backup_dir)?;
        info!(backup = %entry.backup_path.display(), "backup created");

        let entries = list_backups(&backup_dir)?;
        let evictions = select_evictions(&entries, Utc::now(), policy);
        let mut evicted = 0;
        for path in &evictions {
            match std::fs::remove_file(path) {
                Ok(()) => {
                    debug!(path = %path.display(), "evicted expired backup");
                    evicted += 1;
                }
                Err(e) => warn!(path = %path.display(), error = %e, "could not evict backup"),
            }
        }
        if evicted > 0 {
            info!(evicted, "retention policy applied");
        }

        Ok(AgentPayload::Backup {
            backup_path: Some(entry.backup_path),
            total_backups: entries.len() - evicted,
            evicted,
        })
    }
}

/// Relative backup directories live under the output directory; absolute
/// ones are used as given.
fn resolve_backup_dir(output_dir: &Path, configured: &Path) -> PathBuf {
    if configured.is_absolute() {
        configured.to_path_buf()
    } else {
        output_dir.join(configured)
    }
}

fn create_backup(input: &Path, backup_dir: &Path) -> pf_core::Result<BackupEntry> {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("backup");
    let suffix = input
        .extension()
        .and_then(|s| s.to_str())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default();
    let created_at = Utc::now();
    let name = format!("{stem}_{}{suffix}", created_at.format("%Y%m%d_%H%M%S"));
    let backup_path = backup_dir.join(name);

    std::fs::copy(input, &backup_path)?;

    Ok(BackupEntry {
        original_path: Some(input.to_path_buf()),
        backup_path,
        created_at,
    })
}

/// All regular files in the backup directory, timestamped by mtime.
fn list_backups(backup_dir: &Path) -> pf_core::Result<Vec<BackupEntry>> {
    let mut entries = Vec::new();
    for dir_entry in std::fs::read_dir(backup_dir)? {
        let dir_entry = dir_entry?;
        let meta = dir_entry.metadata()?;
        if !meta.is_file() {
            continue;
        }
        let created_at = meta
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        entries.push(BackupEntry {
            original_path: None,
            backup_path: dir_entry.path(),
            created_at,
        });
    }
    Ok(entries)
}

/// Decide which backups the retention policy removes.
///
/// Entries older than `retention_days` go first; if more than `max_count`
/// remain after that, the oldest of the remainder go too. Returned paths
/// are ordered oldest first. Ties on timestamp break by path so the
/// selection is deterministic.
pub fn select_evictions(
    entries: &[BackupEntry],
    now: DateTime<Utc>,
    policy: &BackupConfig,
) -> Vec<PathBuf> {
    let mut sorted: Vec<&BackupEntry> = entries.iter().collect();
    sorted.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.backup_path.cmp(&b.backup_path))
    });

    let cutoff = now - Duration::days(i64::from(policy.retention_days));
    let (expired, fresh): (Vec<&BackupEntry>, Vec<&BackupEntry>) =
        sorted.into_iter().partition(|e| e.created_at < cutoff);

    let mut evictions: Vec<PathBuf> = expired
        .into_iter()
        .map(|e| e.backup_path.clone())
        .collect();
    let max_count = policy.max_count;
    if fresh.len() > max_count {
        evictions.extend(
            fresh[..fresh.len() - max_count]
                .iter()
                .map(|e| e.backup_path.clone()),
        );
    }
    evictions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::run_agent;
    use pf_core::PipelineConfig;
    use std::sync::Arc;

    fn entry(name: &str, age_days: i64, now: DateTime<Utc>) -> BackupEntry {
        BackupEntry {
            original_path: None,
            backup_path: PathBuf::from(name),
            created_at: now - Duration::days(age_days),
        }
    }

    fn policy(retention_days: u32, max_count: usize) -> BackupConfig {
        BackupConfig {
            retention_days,
            max_count,
            ..BackupConfig::default()
        }
    }

    #[test]
    fn nothing_is_evicted_under_both_limits() {
        let now = Utc::now();
        let entries = vec![entry("a", 1, now), entry("b", 2, now)];
        assert!(select_evictions(&entries, now, &policy(7, 10)).is_empty());
    }

    #[test]
    fn age_expired_entries_are_evicted() {
        let now = Utc::now();
        let entries = vec![entry("old", 10, now), entry("fresh", 1, now)];
        let evicted = select_evictions(&entries, now, &policy(7, 10));
        assert_eq!(evicted, vec![PathBuf::from("old")]);
    }

    #[test]
    fn count_overflow_evicts_oldest_first() {
        let now = Utc::now();
        // Five fresh entries, max three kept.
        let entries: Vec<_> = (1..=5).map(|d| entry(&format!("e{d}"), d, now)).collect();
        let evicted = select_evictions(&entries, now, &policy(30, 3));
        // e5 is oldest, e4 next.
        assert_eq!(evicted, vec![PathBuf::from("e5"), PathBuf::from("e4")]);
    }

    #[test]
    fn count_limit_applies_after_age_eviction() {
        let now = Utc::now();
        let entries = vec![
            entry("expired", 20, now),
            entry("c", 3, now),
            entry("b", 2, now),
            entry("a", 1, now),
        ];
        let evicted = select_evictions(&entries, now, &policy(7, 2));
        assert_eq!(evicted, vec![PathBuf::from("expired"), PathBuf::from("c")]);
    }

    #[test]
    fn exactly_max_count_entries_survive() {
        // With N entries and max K < N, exactly N - K oldest are removed.
        let now = Utc::now();
        let entries: Vec<_> = (1..=9i64)
            .map(|d| entry(&format!("e{d}"), d, now))
            .collect();
        let evicted = select_evictions(&entries, now, &policy(30, 4));
        assert_eq!(evicted.len(), 5);
    }

    fn agent_ctx(dir: &Path, config: PipelineConfig) -> AgentContext {
        let input = dir.join("movie.mp4");
        std::fs::write(&input, b"video bytes").unwrap();
        AgentContext::new(
            input,
            dir.join("out"),
            Arc::new(config),
            Arc::new(pf_av::ToolRegistry::default()),
        )
    }

    #[tokio::test]
    async fn disabled_backup_succeeds_without_copying() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = PipelineConfig::default();
        config.backup.enabled = false;
        let ctx = agent_ctx(dir.path(), config);

        let report = run_agent(&BackupAgent, &ctx).await;
        assert!(report.success);
        match report.payload.unwrap() {
            AgentPayload::Backup { backup_path, .. } => assert!(backup_path.is_none()),
            other => panic!("unexpected payload: {other:?}"),
        }
        assert!(!ctx.output_dir.exists());
    }

    #[tokio::test]
    async fn backup_copies_input_with_timestamped_name() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = agent_ctx(dir.path(), PipelineConfig::default());

        let report = run_agent(&BackupAgent, &ctx).await;
        assert!(report.success, "error: {:?}", report.error);

        let backup_path = match report.payload.unwrap() {
            AgentPayload::Backup { backup_path, .. } => backup_path.unwrap(),
            other => panic!("unexpected payload: {other:?}"),
        };
        let name = backup_path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("movie_"), "name: {name}");
        assert!(name.ends_with(".mp4"));
        assert_eq!(backup_path.parent().unwrap(), ctx.output_dir.join(".backups"));
        assert_eq!(std::fs::read(&backup_path).unwrap(), b"video bytes");
        // The input itself is untouched.
        assert_eq!(std::fs::read(&ctx.input_path).unwrap(), b"video bytes");
    }

    #[tokio::test]
    async fn retention_prunes_to_max_count() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = PipelineConfig::default();
        config.backup.max_count = 1;
        let ctx = agent_ctx(dir.path(), config);

        let backups = ctx.output_dir.join(".backups");
        std::fs::create_dir_all(&backups).unwrap();
        std::fs::write(backups.join("movie_20200101_000000.mp4"), b"old").unwrap();
        std::fs::write(backups.join("movie_20200102_000000.mp4"), b"older").unwrap();

        let report = run_agent(&BackupAgent, &ctx).await;
        assert!(report.success, "error: {:?}", report.error);

        let survivors = std::fs::read_dir(&backups).unwrap().count();
        assert_eq!(survivors, 1);
        match report.payload.unwrap() {
            AgentPayload::Backup {
                total_backups,
                evicted,
                ..
            } => {
                assert_eq!(total_backups, 1);
                assert_eq!(evicted, 2);
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_input_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = AgentContext::new(
            dir.path().join("absent.mp4"),
            dir.path().join("out"),
            Arc::new(PipelineConfig::default()),
            Arc::new(pf_av::ToolRegistry::default()),
        );
        let report = run_agent(&BackupAgent, &ctx).await;
        assert!(!report.success);
        assert!(report.error.unwrap().contains("input file not found"));
    }
}
