use thiserror::Error;

use crate::{ExpectedVersion, Sku, Version};

/// Errors that can occur when interacting with the product store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A conditional write lost the race: the stored version is not the one
    /// the writer read. `actual` is `None` when no record exists.
    #[error(
        "Concurrency conflict for product {sku}: expected {expected}, found {}",
        display_actual(.actual)
    )]
    ConcurrencyConflict {
        sku: Sku,
        expected: ExpectedVersion,
        actual: Option<Version>,
    },

    /// The record was rejected before reaching storage.
    #[error("Invalid record for product {sku}: {reason}")]
    InvalidRecord { sku: Sku, reason: String },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Returns true if this error is a lost optimistic-concurrency race.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::ConcurrencyConflict { .. })
    }
}

fn display_actual(actual: &Option<Version>) -> String {
    match actual {
        Some(version) => format!("version {version}"),
        None => "no record".to_string(),
    }
}

/// Result type for product store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_message_names_both_versions() {
        let err = StoreError::ConcurrencyConflict {
            sku: Sku::from("LAMP"),
            expected: ExpectedVersion::Exact(Version::new(3)),
            actual: Some(Version::new(4)),
        };
        assert_eq!(
            err.to_string(),
            "Concurrency conflict for product LAMP: expected version 3, found version 4"
        );
        assert!(err.is_conflict());
    }

    #[test]
    fn conflict_message_without_record() {
        let err = StoreError::ConcurrencyConflict {
            sku: Sku::from("LAMP"),
            expected: ExpectedVersion::Exact(Version::new(2)),
            actual: None,
        };
        assert!(err.to_string().ends_with("found no record"));
    }
}
