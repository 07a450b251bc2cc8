//! Unit of work around the product aggregate.

use std::collections::HashSet;

use product_store::{
    BatchRecord, ExpectedVersion, OrderLineRecord, ProductRecord, ProductStore, Sku, Version,
};

use crate::error::DomainError;
use crate::model::{Batch, OrderLine, Product};

/// Loads and saves whole [`Product`] aggregates.
///
/// The backend is injected: an [`InMemoryProductStore`] in tests, a
/// [`PostgresProductStore`] in production. The only supported update
/// pattern is `get`, mutate, `add`; `add` fails with a concurrency
/// conflict if the stored product moved on since it was read.
///
/// [`InMemoryProductStore`]: product_store::InMemoryProductStore
/// [`PostgresProductStore`]: product_store::PostgresProductStore
pub struct ProductRepository<S: ProductStore> {
    store: S,
}

impl<S: ProductStore> ProductRepository<S> {
    /// Creates a repository over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Loads the product for `sku`, or `None` if there is none.
    #[tracing::instrument(skip(self), fields(sku = %sku))]
    pub async fn get(&self, sku: &Sku) -> Result<Option<Product>, DomainError> {
        self.store
            .get(sku)
            .await?
            .map(Product::try_from)
            .transpose()
    }

    /// Writes the complete current state of `product`.
    ///
    /// The write is conditioned on the stored version still being the one
    /// the product was read at (or on nothing being stored for a new
    /// product). A product without changes is not written.
    #[tracing::instrument(skip(self, product), fields(sku = %product.sku(), version = %product.version()))]
    pub async fn add(&self, product: &mut Product) -> Result<Version, DomainError> {
        if !product.has_changes() {
            return Ok(product.version());
        }

        let expected = match product.persisted_version() {
            Some(version) => ExpectedVersion::Exact(version),
            None => ExpectedVersion::Absent,
        };

        let version = self
            .store
            .put(ProductRecord::from(&*product), expected)
            .await?;
        product.mark_persisted();

        tracing::debug!(%expected, %version, "product committed");
        Ok(version)
    }

    /// Loads every stored product, ordered by sku.
    pub async fn list(&self) -> Result<Vec<Product>, DomainError> {
        self.store
            .list()
            .await?
            .into_iter()
            .map(Product::try_from)
            .collect()
    }
}

impl From<&OrderLine> for OrderLineRecord {
    fn from(line: &OrderLine) -> Self {
        OrderLineRecord {
            order_id: line.order_id().clone(),
            sku: line.sku().clone(),
            quantity: line.quantity(),
        }
    }
}

impl From<&Batch> for BatchRecord {
    fn from(batch: &Batch) -> Self {
        let mut allocations: Vec<OrderLineRecord> =
            batch.allocations().map(OrderLineRecord::from).collect();
        // Set order is arbitrary; keep documents stable between writes.
        allocations.sort();

        BatchRecord {
            reference: batch.reference().clone(),
            sku: batch.sku().clone(),
            purchased_quantity: batch.purchased_quantity(),
            eta: batch.eta(),
            allocations,
        }
    }
}

impl From<&Product> for ProductRecord {
    fn from(product: &Product) -> Self {
        ProductRecord::new(
            product.sku().clone(),
            product.version(),
            product.batches().iter().map(BatchRecord::from).collect(),
        )
    }
}

impl TryFrom<ProductRecord> for Product {
    type Error = DomainError;

    fn try_from(record: ProductRecord) -> Result<Self, Self::Error> {
        let corrupt = |reason: String| DomainError::CorruptRecord {
            sku: record.sku.clone(),
            reason,
        };

        let mut batches = Vec::with_capacity(record.batches.len());
        let mut allocated = HashSet::new();
        for stored in &record.batches {
            let batch = Batch::new(
                stored.reference.clone(),
                stored.sku.clone(),
                stored.purchased_quantity,
                stored.eta,
            )
            .with_allocations(
                stored
                    .allocations
                    .iter()
                    .map(|l| OrderLine::new(l.order_id.clone(), l.sku.clone(), l.quantity)),
            );

            if !batch.is_consistent() {
                return Err(corrupt(format!(
                    "batch {} holds foreign lines or more than it purchased",
                    stored.reference
                )));
            }
            // A line lives in at most one batch of the product.
            for line in batch.allocations() {
                if !allocated.insert(line.clone()) {
                    return Err(corrupt(format!(
                        "order {} is allocated to more than one batch",
                        line.order_id()
                    )));
                }
            }
            batches.push(batch);
        }

        Product::restore(record.sku.clone(), batches, record.version)
            .map_err(|e| corrupt(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use product_store::{BatchReference, InMemoryProductStore, OrderId, StoreError};

    use super::*;

    fn eta() -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(2021, 4, 20)
    }

    fn sample_product() -> Product {
        let mut product = Product::new(
            "RUSTY-SOAPDISH",
            vec![
                Batch::new("b1", "RUSTY-SOAPDISH", 100, eta()),
                Batch::new("b2", "RUSTY-SOAPDISH", 20, None),
            ],
        )
        .unwrap();
        product
            .allocate(OrderLine::new("order999", "RUSTY-SOAPDISH", 15))
            .unwrap();
        product
            .allocate(OrderLine::new("order1000", "RUSTY-SOAPDISH", 3))
            .unwrap();
        product
    }

    #[tokio::test]
    async fn round_trip_reproduces_the_aggregate() {
        let repo = ProductRepository::new(InMemoryProductStore::new());
        let mut product = sample_product();

        repo.add(&mut product).await.unwrap();
        let loaded = repo.get(product.sku()).await.unwrap().unwrap();

        assert_eq!(loaded.sku(), product.sku());
        assert_eq!(loaded.version(), product.version());
        assert_eq!(loaded.batches(), product.batches());
        assert_eq!(loaded.persisted_version(), Some(product.version()));
    }

    #[tokio::test]
    async fn get_unknown_sku_returns_none() {
        let repo = ProductRepository::new(InMemoryProductStore::new());
        assert!(repo.get(&Sku::from("NOPE")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn add_marks_the_product_persisted() {
        let repo = ProductRepository::new(InMemoryProductStore::new());
        let mut product = sample_product();
        assert!(product.has_changes());

        let version = repo.add(&mut product).await.unwrap();

        assert_eq!(version, product.version());
        assert!(!product.has_changes());
    }

    #[tokio::test]
    async fn unchanged_product_is_not_rewritten() {
        let store = InMemoryProductStore::new();
        let repo = ProductRepository::new(store.clone());
        let mut product = sample_product();
        repo.add(&mut product).await.unwrap();

        let mut loaded = repo.get(product.sku()).await.unwrap().unwrap();
        let version = repo.add(&mut loaded).await.unwrap();

        assert_eq!(version, product.version());
    }

    #[tokio::test]
    async fn stale_writer_gets_a_conflict() {
        let repo = ProductRepository::new(InMemoryProductStore::new());
        let mut product = sample_product();
        repo.add(&mut product).await.unwrap();

        let mut first = repo.get(product.sku()).await.unwrap().unwrap();
        let mut second = repo.get(product.sku()).await.unwrap().unwrap();
        first
            .allocate(OrderLine::new("o-a", "RUSTY-SOAPDISH", 1))
            .unwrap();
        second
            .allocate(OrderLine::new("o-b", "RUSTY-SOAPDISH", 1))
            .unwrap();

        repo.add(&mut first).await.unwrap();
        let err = repo.add(&mut second).await.unwrap_err();

        assert!(err.is_concurrency_conflict());
        let stored = repo.get(product.sku()).await.unwrap().unwrap();
        assert_eq!(stored.version(), first.version());
    }

    #[tokio::test]
    async fn creating_a_product_twice_conflicts() {
        let repo = ProductRepository::new(InMemoryProductStore::new());
        let mut one = Product::new("LAMP", vec![Batch::new("b1", "LAMP", 1, None)]).unwrap();
        let mut two = Product::new("LAMP", vec![Batch::new("b2", "LAMP", 1, None)]).unwrap();

        repo.add(&mut one).await.unwrap();
        let err = repo.add(&mut two).await.unwrap_err();

        assert!(matches!(
            err,
            DomainError::Store(StoreError::ConcurrencyConflict { .. })
        ));
    }

    #[test]
    fn allocations_are_written_in_a_stable_order() {
        let record = ProductRecord::from(&sample_product());
        let b2 = record
            .batches
            .iter()
            .find(|b| b.reference == BatchReference::from("b2"))
            .unwrap();

        let orders: Vec<_> = b2.allocations.iter().map(|l| l.order_id.as_str()).collect();
        assert_eq!(orders, vec!["order1000", "order999"]);
    }

    #[test]
    fn overallocated_record_is_corrupt() {
        let record = ProductRecord::new(
            "LAMP",
            Version::first(),
            vec![BatchRecord {
                reference: BatchReference::from("b1"),
                sku: Sku::from("LAMP"),
                purchased_quantity: 1,
                eta: None,
                allocations: vec![OrderLineRecord {
                    order_id: OrderId::from("o1"),
                    sku: Sku::from("LAMP"),
                    quantity: 2,
                }],
            }],
        );

        let err = Product::try_from(record).unwrap_err();
        assert!(matches!(err, DomainError::CorruptRecord { .. }));
    }

    #[test]
    fn record_with_duplicate_batches_is_corrupt() {
        let batch = BatchRecord {
            reference: BatchReference::from("b1"),
            sku: Sku::from("LAMP"),
            purchased_quantity: 1,
            eta: None,
            allocations: vec![],
        };
        let record = ProductRecord::new("LAMP", Version::first(), vec![batch.clone(), batch]);

        let err = Product::try_from(record).unwrap_err();
        assert!(err.to_string().contains("Duplicate batch reference b1"));
    }

    #[test]
    fn line_held_by_two_batches_is_corrupt() {
        let line = OrderLineRecord {
            order_id: OrderId::from("o1"),
            sku: Sku::from("LAMP"),
            quantity: 1,
        };
        let batch = |reference: &str| BatchRecord {
            reference: BatchReference::from(reference),
            sku: Sku::from("LAMP"),
            purchased_quantity: 10,
            eta: None,
            allocations: vec![line.clone()],
        };
        let record = ProductRecord::new("LAMP", Version::first(), vec![batch("b1"), batch("b2")]);

        let err = Product::try_from(record).unwrap_err();
        assert!(matches!(err, DomainError::CorruptRecord { .. }));
        assert!(err.to_string().contains("order o1 is allocated to more than one batch"));
    }
}
