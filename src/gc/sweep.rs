//! Directory sweep that deletes orphaned backup archives.
//!
//! A file is deleted only when its name is `<uuid>.tar.gz` with a
//! syntactically canonical UUID and that UUID has no live database record.
//! Anything else in the directory is left alone: wrong extensions are never
//! considered, malformed names are logged and skipped.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Fixed archive extension; matching is on the basename suffix only,
/// single directory level, non-recursive.
pub const ARCHIVE_SUFFIX: &str = ".tar.gz";

/// Canonical lowercase 8-4-4-4-12 hyphenated hex form.
static UUID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
        .expect("static pattern")
});

/// Whether `candidate` is a canonical UUID, compared case-insensitively.
fn is_valid_uuid(candidate: &str) -> bool {
    UUID_PATTERN.is_match(&candidate.to_lowercase())
}

/// Counters from a single sweep.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepOutcome {
    /// Archive-suffixed entries found in the directory.
    pub files_found: u64,
    /// Entries skipped because the stripped name is not a canonical UUID.
    pub skipped_invalid: u64,
    /// Archives kept because their identifier is live.
    pub kept_live: u64,
    /// Orphaned archives successfully deleted.
    pub deleted: u64,
    /// Orphaned archives whose deletion failed; the sweep continued.
    pub delete_failures: u64,
}

impl SweepOutcome {
    pub fn has_deletions(&self) -> bool {
        self.deleted > 0
    }
}

/// Directory-level sweep failures. Per-file deletion failures are not
/// errors; they are counted in [`SweepOutcome::delete_failures`].
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("backup directory does not exist: {0}")]
    MissingDirectory(PathBuf),

    #[error("failed to read backup directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Sweep `dir` and delete every well-formed archive whose identifier is
/// absent from `live`.
///
/// The directory listing is completed before any deletion: a listing
/// failure aborts the run without touching the filesystem.
pub async fn sweep_orphans(
    dir: &Path,
    live: &HashSet<String>,
) -> Result<SweepOutcome, SweepError> {
    let entries = list_archives(dir).await?;

    let mut outcome = SweepOutcome {
        files_found: entries.len() as u64,
        ..Default::default()
    };
    tracing::info!(count = entries.len(), path = %dir.display(), "found backup archives");

    for (name, path) in entries {
        // `list_archives` only yields names with the suffix.
        let stripped = name
            .strip_suffix(ARCHIVE_SUFFIX)
            .expect("listing yields suffixed names");
        let uuid = stripped.to_lowercase();

        if !is_valid_uuid(&uuid) {
            tracing::info!(file = %name, candidate = %uuid, "skipping file with non-standard uuid name");
            outcome.skipped_invalid += 1;
            continue;
        }

        if live.contains(&uuid) {
            outcome.kept_live += 1;
            continue;
        }

        tracing::info!(file = %name, uuid = %uuid, "found orphaned backup archive");
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(file = %name, "deleted orphaned backup archive");
                outcome.deleted += 1;
            }
            Err(e) => {
                tracing::error!(file = %name, error = %e, "failed to delete orphaned backup archive");
                outcome.delete_failures += 1;
            }
        }
    }

    tracing::info!(
        found = outcome.files_found,
        skipped = outcome.skipped_invalid,
        kept = outcome.kept_live,
        deleted = outcome.deleted,
        failed = outcome.delete_failures,
        "cleanup sweep completed"
    );
    Ok(outcome)
}

/// List archive-suffixed entries directly inside `dir`, in directory order.
///
/// The listing is materialized in full so that an enumeration error never
/// leaves a half-swept directory behind.
async fn list_archives(dir: &Path) -> Result<Vec<(String, PathBuf)>, SweepError> {
    match tokio::fs::metadata(dir).await {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => return Err(SweepError::MissingDirectory(dir.to_path_buf())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(SweepError::MissingDirectory(dir.to_path_buf()));
        }
        Err(e) => {
            return Err(SweepError::ReadDir {
                path: dir.to_path_buf(),
                source: e,
            });
        }
    }

    let mut read_dir = tokio::fs::read_dir(dir).await.map_err(|e| SweepError::ReadDir {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut entries = Vec::new();
    loop {
        let entry = read_dir.next_entry().await.map_err(|e| SweepError::ReadDir {
            path: dir.to_path_buf(),
            source: e,
        })?;
        let Some(entry) = entry else { break };

        let name = entry.file_name().to_string_lossy().into_owned();
        if name.ends_with(ARCHIVE_SUFFIX) {
            entries.push((name, entry.path()));
        }
    }

    Ok(entries)
}
