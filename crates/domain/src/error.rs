//! Domain error types.

use std::time::Duration;

use common::Sku;
use product_store::StoreError;
use thiserror::Error;

use crate::model::AllocationError;

/// Errors that can occur while running an allocation use case.
#[derive(Debug, Error)]
pub enum DomainError {
    /// No product is known for the requested sku.
    #[error("Invalid sku {0}")]
    InvalidSku(Sku),

    /// The sku exists but no batch can satisfy the requested quantity.
    #[error("Out of stock for sku {0}")]
    OutOfStock(Sku),

    /// Quantities must be positive.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    /// The product aggregate rejected the change.
    #[error("Allocation error: {0}")]
    Allocation(AllocationError),

    /// An error occurred in the product store, including lost
    /// optimistic-concurrency races.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A stored document could not be turned back into a product.
    #[error("Corrupt record for product {sku}: {reason}")]
    CorruptRecord { sku: Sku, reason: String },

    /// A read-mutate-write attempt did not finish in time.
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

impl DomainError {
    /// Returns true if the write lost an optimistic-concurrency race.
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, DomainError::Store(e) if e.is_conflict())
    }

    /// Returns true if re-running the whole use case may succeed.
    pub fn is_retryable(&self) -> bool {
        self.is_concurrency_conflict() || matches!(self, DomainError::Timeout(_))
    }

    /// Returns true if the error was caused by the caller's input.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            DomainError::InvalidSku(_)
                | DomainError::OutOfStock(_)
                | DomainError::InvalidQuantity { .. }
                | DomainError::Allocation(_)
        )
    }
}

impl From<AllocationError> for DomainError {
    fn from(e: AllocationError) -> Self {
        match e {
            AllocationError::OutOfStock { sku } => DomainError::OutOfStock(sku),
            other => DomainError::Allocation(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use product_store::{ExpectedVersion, Version};

    use super::*;

    #[test]
    fn out_of_stock_maps_to_its_own_variant() {
        let err: DomainError = AllocationError::OutOfStock {
            sku: Sku::from("LAMP"),
        }
        .into();
        assert!(matches!(err, DomainError::OutOfStock(ref sku) if sku.as_str() == "LAMP"));
        assert_eq!(err.to_string(), "Out of stock for sku LAMP");
    }

    #[test]
    fn conflicts_and_timeouts_are_retryable() {
        let conflict = DomainError::Store(StoreError::ConcurrencyConflict {
            sku: Sku::from("LAMP"),
            expected: ExpectedVersion::Exact(Version::first()),
            actual: Some(Version::new(2)),
        });
        assert!(conflict.is_concurrency_conflict());
        assert!(conflict.is_retryable());
        assert!(DomainError::Timeout(Duration::from_millis(5)).is_retryable());
        assert!(!DomainError::InvalidSku(Sku::from("X")).is_retryable());
    }

    #[test]
    fn client_errors() {
        assert!(DomainError::InvalidSku(Sku::from("X")).is_client_error());
        assert!(DomainError::InvalidQuantity { quantity: 0 }.is_client_error());
        assert!(!DomainError::Timeout(Duration::from_millis(5)).is_client_error());
    }

    #[test]
    fn invalid_sku_message() {
        let err = DomainError::InvalidSku(Sku::from("NONEXISTENT-SKU"));
        assert_eq!(err.to_string(), "Invalid sku NONEXISTENT-SKU");
    }
}
