use async_trait::async_trait;

use crate::{ProductRecord, Result, Sku, StoreError, Version};

/// Precondition attached to a product write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// No record may exist yet for the sku.
    Absent,
    /// The stored record must be at exactly this version.
    Exact(Version),
}

impl std::fmt::Display for ExpectedVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExpectedVersion::Absent => f.write_str("no record"),
            ExpectedVersion::Exact(version) => write!(f, "version {version}"),
        }
    }
}

/// Core trait for product storage backends.
///
/// Implementations persist whole product documents keyed by sku and must
/// perform [`put`](ProductStore::put) as a single compare-and-swap: of any
/// number of writers holding the same expected version, at most one
/// succeeds and the rest fail with [`StoreError::ConcurrencyConflict`].
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Loads the stored document for `sku`, if any.
    async fn get(&self, sku: &Sku) -> Result<Option<ProductRecord>>;

    /// Replaces the stored document for `record.sku`, provided the stored
    /// version matches `expected`.
    ///
    /// Returns the version now stored, which is `record.version`.
    async fn put(&self, record: ProductRecord, expected: ExpectedVersion) -> Result<Version>;

    /// Returns every stored document, ordered by sku.
    async fn list(&self) -> Result<Vec<ProductRecord>>;

    /// Returns the stored version for `sku`, or `None` if nothing is stored.
    async fn version(&self, sku: &Sku) -> Result<Option<Version>>;
}

/// Extension trait providing convenience methods for product stores.
#[async_trait]
pub trait ProductStoreExt: ProductStore {
    /// Checks whether a document is stored for `sku`.
    async fn exists(&self, sku: &Sku) -> Result<bool> {
        Ok(self.version(sku).await?.is_some())
    }
}

// Blanket implementation for all ProductStore implementations
impl<T: ProductStore + ?Sized> ProductStoreExt for T {}

/// Checks a record before it is written.
///
/// Every batch and allocated line must belong to the record's sku, and the
/// version must advance past the expected version (or be at least
/// [`Version::first`] for a new product).
pub fn validate_record_for_put(record: &ProductRecord, expected: ExpectedVersion) -> Result<()> {
    let invalid = |reason: String| StoreError::InvalidRecord {
        sku: record.sku.clone(),
        reason,
    };

    match expected {
        ExpectedVersion::Absent if record.version < Version::first() => {
            return Err(invalid(format!(
                "new product must start at version {} or later, got {}",
                Version::first(),
                record.version
            )));
        }
        ExpectedVersion::Exact(current) if record.version <= current => {
            return Err(invalid(format!(
                "version must advance past {current}, got {}",
                record.version
            )));
        }
        _ => {}
    }

    for batch in &record.batches {
        if batch.sku != record.sku {
            return Err(invalid(format!(
                "batch {} belongs to sku {}",
                batch.reference, batch.sku
            )));
        }
        if let Some(line) = batch.allocations.iter().find(|line| line.sku != record.sku) {
            return Err(invalid(format!(
                "batch {} holds a line for sku {}",
                batch.reference, line.sku
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BatchRecord, BatchReference, OrderId, OrderLineRecord};

    fn record(version: i64) -> ProductRecord {
        ProductRecord::new(
            "CHAIR",
            Version::new(version),
            vec![BatchRecord {
                reference: BatchReference::from("b1"),
                sku: Sku::from("CHAIR"),
                purchased_quantity: 10,
                eta: None,
                allocations: vec![],
            }],
        )
    }

    #[test]
    fn new_record_at_first_version_is_valid() {
        assert!(validate_record_for_put(&record(1), ExpectedVersion::Absent).is_ok());
    }

    #[test]
    fn new_record_at_initial_version_is_rejected() {
        let err = validate_record_for_put(&record(0), ExpectedVersion::Absent).unwrap_err();
        assert!(matches!(err, StoreError::InvalidRecord { .. }));
    }

    #[test]
    fn update_must_advance_the_version() {
        let expected = ExpectedVersion::Exact(Version::new(3));
        assert!(validate_record_for_put(&record(4), expected).is_ok());
        assert!(validate_record_for_put(&record(5), expected).is_ok());
        assert!(validate_record_for_put(&record(3), expected).is_err());
        assert!(validate_record_for_put(&record(2), expected).is_err());
    }

    #[test]
    fn foreign_batch_is_rejected() {
        let mut rec = record(1);
        rec.batches[0].sku = Sku::from("TABLE");
        let err = validate_record_for_put(&rec, ExpectedVersion::Absent).unwrap_err();
        assert!(err.to_string().contains("batch b1 belongs to sku TABLE"));
    }

    #[test]
    fn foreign_line_is_rejected() {
        let mut rec = record(1);
        rec.batches[0].allocations.push(OrderLineRecord {
            order_id: OrderId::from("o1"),
            sku: Sku::from("TABLE"),
            quantity: 1,
        });
        assert!(validate_record_for_put(&rec, ExpectedVersion::Absent).is_err());
    }

    #[test]
    fn expected_version_display() {
        assert_eq!(ExpectedVersion::Absent.to_string(), "no record");
        assert_eq!(
            ExpectedVersion::Exact(Version::new(2)).to_string(),
            "version 2"
        );
    }
}
