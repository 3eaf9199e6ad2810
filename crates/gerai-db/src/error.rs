//! # Database Error Types
//!
//! Errors for ledger and repository operations. Wraps sqlx errors with
//! context and carries the ledger's domain failures (unit conflicts,
//! mismatched reservations) so callers can react per the error taxonomy.

use thiserror::Error;

use gerai_core::{CoreError, ErrorKind};

/// Database and ledger operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// One or more requested units were not `available` at reservation time.
    /// Lists exactly which ones so the caller can drop them and retry.
    #[error("units unavailable for reservation: {unit_ids:?}")]
    UnitUnavailable { unit_ids: Vec<String> },

    /// Commit/release touched a unit whose reservation_ref does not match
    /// the order.
    #[error("unit {unit_id} is not reserved by order {order_id}")]
    UnitNotReserved { unit_id: String, order_id: String },

    /// A conditional update observed a stale status. The caller raced
    /// another writer and should re-read.
    #[error("unit {unit_id} changed concurrently, expected status {expected}")]
    StaleStatus { unit_id: String, expected: String },

    /// Business rule violation bubbled up from gerai-core.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation (duplicate IMEI, duplicate order code).
    #[error("duplicate {field}: already exists")]
    UniqueViolation { field: String },

    /// Foreign key constraint violation.
    #[error("foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// Database connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Classification per the workspace error taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DbError::UnitUnavailable { .. }
            | DbError::StaleStatus { .. }
            | DbError::UniqueViolation { .. } => ErrorKind::Conflict,

            DbError::UnitNotReserved { .. } | DbError::NotFound { .. } => ErrorKind::InvalidState,

            DbError::Core(core) => core.kind(),

            DbError::ForeignKeyViolation { .. } => ErrorKind::Invalid,

            DbError::ConnectionFailed(_) | DbError::PoolExhausted => ErrorKind::Transient,

            DbError::MigrationFailed(_) | DbError::QueryFailed(_) | DbError::Internal(_) => {
                ErrorKind::Integrity
            }
        }
    }
}

/// Convert sqlx errors to DbError.
///
/// SQLite reports constraint failures only through the message text, so the
/// mapping sniffs for the two kinds we rely on.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation { field }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Unit Tests
// =============================================================================
