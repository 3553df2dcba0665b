use thiserror::Error;

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A unique constraint rejected the write.
    #[error("Unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    /// A referenced row does not exist.
    #[error("Foreign key constraint violated: {constraint}")]
    ForeignKeyViolation { constraint: String },

    /// A check constraint (e.g. non-negative stock) rejected the write.
    #[error("Check constraint violated: {constraint}")]
    CheckViolation { constraint: String },

    /// A quantity does not fit the database column.
    #[error("Quantity out of range: {0}")]
    QuantityOutOfRange(u32),

    /// A stored value could not be decoded into its domain type.
    #[error("Decode error: {0}")]
    Decode(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StorageError {
    /// Returns true if this is a violation of the named unique constraint.
    pub fn is_unique_violation(&self, name: &str) -> bool {
        matches!(self, StorageError::UniqueViolation { constraint } if constraint == name)
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        use sqlx::error::ErrorKind;

        if let sqlx::Error::Database(ref db_err) = e {
            let constraint = db_err.constraint().unwrap_or_default().to_string();
            let mapped = match db_err.kind() {
                ErrorKind::UniqueViolation => StorageError::UniqueViolation { constraint },
                ErrorKind::ForeignKeyViolation => StorageError::ForeignKeyViolation { constraint },
                ErrorKind::CheckViolation => StorageError::CheckViolation { constraint },
                _ => return StorageError::Database(e),
            };
            tracing::debug!(error = %mapped, "constraint violation");
            return mapped;
        }
        StorageError::Database(e)
    }
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
