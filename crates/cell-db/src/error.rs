//! # Database Error Types
//!
//! ## Where These Go
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  sqlx::Error / MigrateError                                             │
//! │       │ From                                                            │
//! │       ▼                                                                 │
//! │  DbError ─────────┬──► ConfigResolver: every variant → errorFallback   │
//! │                   │                                                     │
//! │                   └──► GatewayError (CRUD cells)                       │
//! │                          is_unavailable()  → StoreUnavailable (503)    │
//! │                          NotFound          → NotFound (404)            │
//! │                          UniqueViolation   → Validation (400)          │
//! │                          ForeignKey        → Validation (400)          │
//! │                          anything else     → Internal (500)            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

/// Errors from the SQLite store.
#[derive(Debug, Error)]
pub enum DbError {
    // =========================================================================
    // Row Errors
    // =========================================================================
    /// No row for the given id within the tenant.
    ///
    /// ## When This Occurs
    /// - Lookup by id found nothing
    /// - An UPDATE or DELETE matched zero rows
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A UNIQUE index rejected the write.
    ///
    /// ## When This Occurs
    /// - A second group with the same name in one tenant
    /// - Adding a customer to a group twice
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// A row references a parent that does not exist.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// A TEXT column that should hold a decimal or enum did not parse.
    #[error("Invalid stored data in {column}: '{value}'")]
    InvalidData { column: String, value: String },

    // =========================================================================
    // Store Errors
    // =========================================================================
    /// Could not open the database, or the pool was closed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Every pooled connection stayed busy past the acquire timeout.
    #[error("Connection pool exhausted")]
    PoolExhausted,

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// SQLite rejected the statement.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// I/O, protocol or driver failure.
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

    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// True when the store cannot serve requests at all. Row and constraint
    /// errors are the caller's problem and return false.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            DbError::ConnectionFailed(_) | DbError::PoolExhausted | DbError::Internal(_)
        )
    }
}

/// Column named by a SQLite constraint message.
///
/// `"UNIQUE constraint failed: b2b_groups.tenant_id, b2b_groups.name"`
/// yields `name`: the last column is the one the caller chose.
fn constraint_column(message: &str) -> String {
    message
        .rsplit(", ")
        .next()
        .and_then(|qualified| qualified.rsplit('.').next())
        .map(|column| column.trim().to_string())
        .filter(|column| !column.is_empty())
        .unwrap_or_else(|| "value".to_string())
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Record", "unknown"),
            sqlx::Error::Database(db_err) => {
                let message = db_err.message();

                if let Some(columns) = message.strip_prefix("UNIQUE constraint failed: ") {
                    DbError::duplicate(constraint_column(columns), "unknown")
                } else if message.starts_with("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: message.to_string(),
                    }
                } else {
                    DbError::QueryFailed(message.to_string())
                }
            }
            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("pool is closed".to_string()),
            other => DbError::Internal(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}
