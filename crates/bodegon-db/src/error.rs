//! # Database Error Types
//!
//! Error types for ledger database operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  SQLite Error (sqlx::Error)                                         │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  DbError (this module) ← Adds context and categorization            │
//! │       ▲                                                             │
//! │       │                                                             │
//! │  LedgerError (bodegon-core) ← Business rule violations flow in      │
//! │                               through the transparent variant       │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Engines surface business failures (`LedgerError`) and storage failures
//! (everything else) through the same `DbResult`, so one `?` chain carries
//! an operation from validation to commit.

use thiserror::Error;

use bodegon_core::{LedgerError, ValidationError};

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// A business rule violation raised by the ledger engines.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Entity not found in the database.
    #[error("{entity} no encontrado: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Unique constraint violation (duplicate barcode, warehouse name, ...).
    #[error("Registro duplicado: {field}")]
    UniqueViolation { field: String },

    /// Foreign key constraint violation.
    #[error("Referencia inválida: {message}")]
    ForeignKeyViolation { message: String },

    /// Database connection failed.
    #[error("Fallo de conexión: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Fallo de migración: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Fallo de consulta: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Pool de conexiones agotado")]
    PoolExhausted,

    /// Internal database error.
    #[error("Error interno de base de datos: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and id.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        DbError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<ValidationError> for DbError {
    fn from(err: ValidationError) -> Self {
        DbError::Ledger(LedgerError::Validation(err))
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Registro",
                id: "desconocido".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // SQLite constraint messages:
                //   "UNIQUE constraint failed: <table>.<column>"
                //   "FOREIGN KEY constraint failed"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("desconocido")
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

            sqlx::Error::PoolClosed => {
                DbError::ConnectionFailed("el pool está cerrado".to_string())
            }

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
