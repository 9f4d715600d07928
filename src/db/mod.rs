//! Read-only access to the panel's backup records.

mod error;
mod mysql;
mod repos;

pub use error::{DbError, DbResult};
pub use mysql::MysqlBackupRepo;
pub use repos::BackupRepo;
