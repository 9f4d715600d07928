use std::{collections::HashSet, time::Duration};

use async_trait::async_trait;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};

use crate::{
    config::DatabaseConfig,
    db::{
        error::{DbError, DbResult},
        repos::{BackupRepo, collect_live_set},
    },
};

/// Backup repository backed by the panel's MySQL database.
pub struct MysqlBackupRepo {
    pool: MySqlPool,
}

impl MysqlBackupRepo {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Establish a connection pool against the configured database.
    ///
    /// Fails fast: the first connection is acquired eagerly so a bad host or
    /// credential surfaces at startup rather than on the first scheduled run.
    pub async fn connect(config: &DatabaseConfig) -> DbResult<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect(&config.url())
            .await
            .map_err(DbError::Connect)?;

        tracing::info!(
            host = %config.host,
            port = config.port,
            database = %config.database,
            "database connection established"
        );
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl BackupRepo for MysqlBackupRepo {
    async fn live_backup_uuids(&self) -> DbResult<HashSet<String>> {
        let rows: Vec<String> =
            sqlx::query_scalar("SELECT uuid FROM backups WHERE deleted_at IS NULL")
                .fetch_all(&self.pool)
                .await
                .map_err(DbError::Query)?;

        Ok(collect_live_set(rows))
    }
}
