//! Backup garbage collection.
//!
//! One run rebuilds the live identifier set from the database, then sweeps
//! the backup directory and deletes archives with no live record. The two
//! phases are strictly sequential: the sweep never starts from a partial
//! live set.

mod sweep;
mod worker;

pub use sweep::{SweepError, SweepOutcome, sweep_orphans};
pub use worker::{GcError, GcJob, GcRunResult, start_gc_worker};
