//! Failures of the bundle metadata store

use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("bundle {0} not found")]
    BundleNotFound(Uuid),

    #[error("bundle already recorded (constraint {0})")]
    DuplicateBundle(String),

    #[error("cannot reach the metadata database: {0}")]
    Connection(String),

    #[error("metadata schema migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("stored bundle {id} is unreadable: {reason}")]
    CorruptRow { id: Uuid, reason: String },

    #[error("bundle size {0} does not fit the size column")]
    SizeOutOfRange(u64),

    #[error("metadata query failed: {0}")]
    Query(#[source] sqlx::Error),
}

impl DbError {
    pub fn corrupt_row(id: Uuid, reason: impl Into<String>) -> Self {
        Self::CorruptRow {
            id,
            reason: reason.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::BundleNotFound(_))
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
                // unique_violation: ids are generated, so this means a replayed insert
                Self::DuplicateBundle(db_err.constraint().unwrap_or("unknown").to_string())
            }
            sqlx::Error::PoolTimedOut => Self::Connection("connection pool timed out".to_string()),
            sqlx::Error::PoolClosed => Self::Connection("connection pool is closed".to_string()),
            sqlx::Error::Io(io_err) => Self::Connection(io_err.to_string()),
            sqlx::Error::Tls(tls_err) => Self::Connection(format!("TLS error: {}", tls_err)),
            other => Self::Query(other),
        }
    }
}

pub type DbResult<T> = std::result::Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundle_not_found() {
        let id = Uuid::parse_str("0190a6b2-7c4e-7d3a-9b1f-2c3d4e5f6a7b").unwrap();
        let err = DbError::BundleNotFound(id);
        assert!(err.is_not_found());
        assert_eq!(
            err.to_string(),
            "bundle 0190a6b2-7c4e-7d3a-9b1f-2c3d4e5f6a7b not found"
        );
    }

    #[test]
    fn test_pool_errors_are_connection_errors() {
        let err: DbError = sqlx::Error::PoolTimedOut.into();
        assert!(err.is_connection());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_other_sqlx_errors_are_query_errors() {
        let err: DbError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, DbError::Query(_)));
    }
}
