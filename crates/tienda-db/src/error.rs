//! Storage errors.
//!
//! Everything a repository can fail with ends up here. SQLite failures are
//! classified by constraint kind; rules broken inside an open transaction
//! (stock ran out, coupon exhausted) ride along as [`DbError::Domain`], and
//! dropping the transaction on the way out rolls the writes back.
//!
//! ```text
//! sqlx::Error ─────────┐
//!                      ├──► DbError ──► ApiError
//! CoreError ───────────┘
//! ```

use sqlx::error::ErrorKind;
use thiserror::Error;
use tienda_core::CoreError;

#[derive(Debug, Error)]
pub enum DbError {
    /// No row for the requested key.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A UNIQUE index rejected the write (coupon codes, idempotency keys).
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// A CHECK clause fired, e.g. stock below zero.
    #[error("Constraint violation: {message}")]
    CheckViolation { message: String },

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// A JSON column held something we cannot decode (or encode).
    #[error("Corrupt {column} data: {message}")]
    CorruptData { column: String, message: String },

    #[error("Connection pool exhausted")]
    PoolExhausted,

    #[error(transparent)]
    Domain(#[from] CoreError),

    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    pub(crate) fn corrupt(column: &str, err: impl std::fmt::Display) -> Self {
        Self::CorruptData {
            column: column.to_owned(),
            message: err.to_string(),
        }
    }
}

/// SQLite reports the offending columns after the colon, as in
/// `UNIQUE constraint failed: coupons.code`.
fn constraint_target(message: &str) -> &str {
    message
        .split_once(": ")
        .map(|(_, target)| target)
        .unwrap_or("unknown")
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        let db_err = match err {
            sqlx::Error::Database(db_err) => db_err,
            sqlx::Error::RowNotFound => return Self::not_found("Record", "unknown"),
            sqlx::Error::PoolTimedOut => return Self::PoolExhausted,
            sqlx::Error::PoolClosed => return Self::ConnectionFailed("pool closed".into()),
            other => return Self::Internal(other.to_string()),
        };

        let message = db_err.message().to_owned();
        match db_err.kind() {
            ErrorKind::UniqueViolation => Self::duplicate(constraint_target(&message), "unknown"),
            ErrorKind::ForeignKeyViolation => Self::ForeignKeyViolation { message },
            ErrorKind::CheckViolation => Self::CheckViolation { message },
            _ => Self::QueryFailed(message),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Self::MigrationFailed(err.to_string())
    }
}

pub type DbResult<T> = Result<T, DbError>;
