use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("failed to connect to database: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("failed to query backup records: {0}")]
    Query(#[source] sqlx::Error),
}

pub type DbResult<T> = Result<T, DbError>;
