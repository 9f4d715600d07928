use std::collections::HashSet;

use async_trait::async_trait;

use crate::db::error::DbResult;

/// Read-only view of the panel's backup records.
///
/// Injected into the garbage collector so tests can substitute an in-memory
/// implementation for the live database.
#[async_trait]
pub trait BackupRepo: Send + Sync {
    /// Identifiers of every backup record whose soft-deletion timestamp is
    /// null, as of query time.
    ///
    /// Identifiers are lowercased and duplicates collapse. A query failure
    /// must propagate as an error — it is never an empty set, since the
    /// caller would otherwise delete every archive on disk.
    async fn live_backup_uuids(&self) -> DbResult<HashSet<String>>;
}

/// Normalize raw identifier rows into the live set: lowercase each entry and
/// collapse duplicates.
pub(crate) fn collect_live_set(rows: Vec<String>) -> HashSet<String> {
    rows.into_iter().map(|uuid| uuid.to_lowercase()).collect()
}
