use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    ProductRecord, Result, Sku, StoreError, Version,
    store::{ExpectedVersion, ProductStore, validate_record_for_put},
};

/// In-memory product store for tests and local runs.
///
/// Clones share the same underlying map. The version check and the write
/// happen under one write lock, which makes `put` a compare-and-swap.
#[derive(Clone, Default)]
pub struct InMemoryProductStore {
    products: Arc<RwLock<HashMap<Sku, ProductRecord>>>,
}

impl InMemoryProductStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored products.
    pub async fn len(&self) -> usize {
        self.products.read().await.len()
    }

    /// Returns true if nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.products.read().await.is_empty()
    }

    /// Removes every stored product.
    pub async fn clear(&self) {
        self.products.write().await.clear();
    }
}

#[async_trait]
impl ProductStore for InMemoryProductStore {
    async fn get(&self, sku: &Sku) -> Result<Option<ProductRecord>> {
        Ok(self.products.read().await.get(sku).cloned())
    }

    async fn put(&self, record: ProductRecord, expected: ExpectedVersion) -> Result<Version> {
        validate_record_for_put(&record, expected)?;

        let mut products = self.products.write().await;
        let actual = products.get(&record.sku).map(|stored| stored.version);

        let matches = match expected {
            ExpectedVersion::Absent => actual.is_none(),
            ExpectedVersion::Exact(version) => actual == Some(version),
        };
        if !matches {
            metrics::counter!("store_conflicts_total").increment(1);
            return Err(StoreError::ConcurrencyConflict {
                sku: record.sku,
                expected,
                actual,
            });
        }

        let version = record.version;
        products.insert(record.sku.clone(), record);
        metrics::counter!("store_writes_total").increment(1);

        Ok(version)
    }

    async fn list(&self) -> Result<Vec<ProductRecord>> {
        let products = self.products.read().await;
        let mut records: Vec<_> = products.values().cloned().collect();
        records.sort_by(|a, b| a.sku.cmp(&b.sku));
        Ok(records)
    }

    async fn version(&self, sku: &Sku) -> Result<Option<Version>> {
        Ok(self.products.read().await.get(sku).map(|r| r.version))
    }
}
