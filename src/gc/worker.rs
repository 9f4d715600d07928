//! The garbage collection job and its schedule loop.

use std::{path::PathBuf, sync::Arc};

use chrono::Utc;
use cron::Schedule;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::{
    db::{BackupRepo, DbError},
    gc::sweep::{SweepError, SweepOutcome, sweep_orphans},
};

/// Results from a single reconciliation run.
#[derive(Debug)]
pub struct GcRunResult {
    /// Size of the live identifier set at the start of the run.
    pub live_identifiers: usize,
    /// Sweep counters.
    pub sweep: SweepOutcome,
}

/// Run-level failures. Either phase aborts the run; per-file deletion
/// failures never surface here.
#[derive(Debug, Error)]
pub enum GcError {
    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Sweep(#[from] SweepError),
}

/// A reconciliation job against one backup directory.
///
/// The repository is an injected capability rather than ambient state, so
/// tests substitute an in-memory data source. The internal guard ensures
/// at most one run executes at a time; an overlapping trigger is skipped.
pub struct GcJob {
    repo: Arc<dyn BackupRepo>,
    backup_dir: PathBuf,
    running: Mutex<()>,
}

impl GcJob {
    pub fn new(repo: Arc<dyn BackupRepo>, backup_dir: PathBuf) -> Self {
        Self {
            repo,
            backup_dir,
            running: Mutex::new(()),
        }
    }

    /// Run one reconciliation pass: load the live set, then sweep.
    ///
    /// The sweep never starts unless the live set loaded completely — a
    /// query failure aborts before any filesystem access, since treating it
    /// as "zero live backups" would delete every valid archive.
    pub async fn run(&self) -> Result<GcRunResult, GcError> {
        tracing::info!("starting backup cleanup run");

        let live = self.repo.live_backup_uuids().await?;
        tracing::info!(live = live.len(), "loaded live backup identifiers");

        let sweep = sweep_orphans(&self.backup_dir, &live).await?;

        Ok(GcRunResult {
            live_identifiers: live.len(),
            sweep,
        })
    }

    /// Triggered entry point used by the scheduler and the startup run.
    ///
    /// Run-level failures are logged and swallowed: the process stays up
    /// and the next trigger retries independently. Returns whether a run
    /// actually executed (an overlapping trigger is skipped with a warning).
    pub async fn trigger(&self) -> bool {
        let Ok(_guard) = self.running.try_lock() else {
            tracing::warn!("previous cleanup run still in progress, skipping this trigger");
            return false;
        };

        match self.run().await {
            Ok(result) if result.sweep.has_deletions() => {
                tracing::info!(
                    live = result.live_identifiers,
                    deleted = result.sweep.deleted,
                    skipped = result.sweep.skipped_invalid,
                    failed = result.sweep.delete_failures,
                    "backup cleanup run completed"
                );
            }
            Ok(result) => {
                tracing::info!(
                    live = result.live_identifiers,
                    skipped = result.sweep.skipped_invalid,
                    "backup cleanup run completed, no orphaned archives"
                );
            }
            Err(e) => {
                tracing::error!(error = %e, "backup cleanup run failed");
            }
        }
        true
    }
}

/// Run the job on every fire of the cron schedule, forever.
///
/// The caller is expected to have already performed the eager startup run.
pub async fn start_gc_worker(job: Arc<GcJob>, schedule: Schedule) {
    tracing::info!("scheduled cleanup task started");

    loop {
        let Some(next) = schedule.upcoming(Utc).next() else {
            // A finite schedule (e.g. a fixed date already passed) has
            // nothing left to fire.
            tracing::warn!("cron schedule has no upcoming fire times, stopping worker");
            return;
        };

        let wait = (next - Utc::now())
            .to_std()
            .unwrap_or(std::time::Duration::ZERO);
        tracing::debug!(next = %next, "waiting for next scheduled run");
        tokio::time::sleep(wait).await;

        job.trigger().await;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use async_trait::async_trait;
    use tempfile::TempDir;
    use tokio::sync::Notify;

    use super::*;
    use crate::db::DbResult;

    const LIVE_UUID: &str = "a1b2c3d4-e5f6-4a1b-8c2d-1234567890ab";
    const ORPHAN_UUID: &str = "ffffffff-ffff-ffff-ffff-ffffffffffff";

    struct FakeRepo {
        uuids: HashSet<String>,
    }

    impl FakeRepo {
        fn with(uuids: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                uuids: uuids.iter().map(|u| u.to_string()).collect(),
            })
        }
    }

    #[async_trait]
    impl BackupRepo for FakeRepo {
        async fn live_backup_uuids(&self) -> DbResult<HashSet<String>> {
            Ok(self.uuids.clone())
        }
    }

    struct FailingRepo;

    #[async_trait]
    impl BackupRepo for FailingRepo {
        async fn live_backup_uuids(&self) -> DbResult<HashSet<String>> {
            Err(DbError::Query(sqlx::Error::PoolTimedOut))
        }
    }

    /// Blocks inside the query until released, to hold the run guard open.
    struct BlockingRepo {
        entered: Arc<Notify>,
        release: Arc<Notify>,
    }

    #[async_trait]
    impl BackupRepo for BlockingRepo {
        async fn live_backup_uuids(&self) -> DbResult<HashSet<String>> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(HashSet::new())
        }
    }

    fn touch(dir: &TempDir, name: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, b"archive").unwrap();
        path
    }

    #[tokio::test]
    async fn run_loads_live_set_then_sweeps() {
        let dir = TempDir::new().unwrap();
        let kept = touch(&dir, &format!("{LIVE_UUID}.tar.gz"));
        let orphan = touch(&dir, &format!("{ORPHAN_UUID}.tar.gz"));

        let job = GcJob::new(FakeRepo::with(&[LIVE_UUID]), dir.path().to_path_buf());
        let result = job.run().await.unwrap();

        assert_eq!(result.live_identifiers, 1);
        assert_eq!(result.sweep.deleted, 1);
        assert!(kept.exists());
        assert!(!orphan.exists());
    }

    #[tokio::test]
    async fn query_failure_aborts_before_any_deletion() {
        let dir = TempDir::new().unwrap();
        let orphan = touch(&dir, &format!("{ORPHAN_UUID}.tar.gz"));

        let job = GcJob::new(Arc::new(FailingRepo), dir.path().to_path_buf());
        let err = job.run().await.unwrap_err();

        assert!(matches!(err, GcError::Db(DbError::Query(_))));
        assert!(orphan.exists());
    }

    #[tokio::test]
    async fn missing_directory_surfaces_as_run_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("gone");

        let job = GcJob::new(FakeRepo::with(&[]), missing);
        let err = job.run().await.unwrap_err();

        assert!(matches!(err, GcError::Sweep(SweepError::MissingDirectory(_))));
    }

    #[tokio::test]
    async fn trigger_swallows_run_errors() {
        let dir = TempDir::new().unwrap();
        let job = GcJob::new(Arc::new(FailingRepo), dir.path().to_path_buf());
        // A failed run still counts as an executed trigger.
        assert!(job.trigger().await);
    }

    #[tokio::test]
    async fn overlapping_trigger_is_skipped() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let dir = TempDir::new().unwrap();

        let repo = Arc::new(BlockingRepo {
            entered: entered.clone(),
            release: release.clone(),
        });
        let job = Arc::new(GcJob::new(repo, dir.path().to_path_buf()));

        let first = {
            let job = job.clone();
            tokio::spawn(async move { job.trigger().await })
        };

        // Wait until the first run holds the guard inside the query.
        entered.notified().await;
        assert!(!job.trigger().await);

        release.notify_one();
        assert!(first.await.unwrap());

        // With the guard free again, a new trigger runs. The stored permit
        // lets the blocking query return immediately.
        release.notify_one();
        assert!(job.trigger().await);
    }
}
