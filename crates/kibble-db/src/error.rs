//! # Storage Errors
//!
//! Every failure that comes out of SQLite or the pool is folded into
//! [`DbError`] before it leaves a repository.
//!
//! ```text
//! sqlx::Error ──► DbError ──► CheckoutError::StorageFailure
//!                   │
//!                   └── constraint text classified into
//!                       Unique / ForeignKey / Constraint
//! ```

use thiserror::Error;

/// Failure of a storage operation.
#[derive(Debug, Error)]
pub enum DbError {
    /// A row the caller asked for does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A UNIQUE index rejected the write (e.g. a second cart row for the
    /// same user and product).
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// A cart line or order item points at a product or order that is gone.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// A CHECK constraint or an immutability trigger aborted the statement.
    ///
    /// Negative stock, a zero quantity and edits to a placed order all land here.
    #[error("Constraint violation: {message}")]
    ConstraintViolation { message: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// BEGIN/COMMIT failed, or a compare-and-set found the row changed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// `acquire()` timed out with every connection checked out.
    #[error("Connection pool exhausted")]
    PoolExhausted,

    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Wraps a failure from `begin()` / `commit()`.
    pub fn transaction(err: sqlx::Error) -> Self {
        DbError::TransactionFailed(err.to_string())
    }
}

const UNIQUE_PREFIX: &str = "UNIQUE constraint failed: ";

/// Sorts a SQLite error message into a constraint kind.
///
/// Trigger aborts carry their own text, so "immutable" is matched
/// alongside CHECK failures.
fn classify(message: &str) -> DbError {
    if let Some(idx) = message.find(UNIQUE_PREFIX) {
        return DbError::UniqueViolation {
            field: message[idx + UNIQUE_PREFIX.len()..].to_string(),
            value: "unknown".to_string(),
        };
    }

    let message = message.to_string();
    if message.contains("FOREIGN KEY constraint failed") {
        DbError::ForeignKeyViolation { message }
    } else if message.contains("CHECK constraint failed") || message.contains("immutable") {
        DbError::ConstraintViolation { message }
    } else {
        DbError::QueryFailed(message)
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Record", "unknown"),
            sqlx::Error::Database(db_err) => classify(db_err.message()),
            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("pool closed".to_string()),
            other => DbError::Internal(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

pub type DbResult<T> = Result<T, DbError>;
