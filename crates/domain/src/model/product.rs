use common::{BatchReference, Sku};
use product_store::Version;

use super::{AllocationError, Batch, OrderLine};
use crate::events::DomainEvent;

/// Product aggregate root.
///
/// Groups every batch of one sku and is the unit of consistency: it is
/// loaded, mutated and written back as a whole, guarded by its version.
#[derive(Debug, Clone)]
pub struct Product {
    sku: Sku,
    batches: Vec<Batch>,

    /// Advances by one on every mutation.
    version: Version,

    /// Version this aggregate was read from storage at, `None` if never stored.
    persisted_version: Option<Version>,

    /// Events raised since the last drain, in production order.
    events: Vec<DomainEvent>,
}

impl Product {
    /// Creates a new product at [`Version::first`].
    pub fn new(sku: impl Into<Sku>, batches: Vec<Batch>) -> Result<Self, AllocationError> {
        let mut product = Self {
            sku: sku.into(),
            batches: Vec::with_capacity(batches.len()),
            version: Version::first(),
            persisted_version: None,
            events: Vec::new(),
        };
        for batch in batches {
            product.insert_batch(batch)?;
        }
        Ok(product)
    }

    /// Rebuilds a product read from storage at `version`.
    pub fn restore(
        sku: impl Into<Sku>,
        batches: Vec<Batch>,
        version: Version,
    ) -> Result<Self, AllocationError> {
        let mut product = Self::new(sku, batches)?;
        product.version = version;
        product.persisted_version = Some(version);
        Ok(product)
    }

    pub fn sku(&self) -> &Sku {
        &self.sku
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn persisted_version(&self) -> Option<Version> {
        self.persisted_version
    }

    /// Returns true if the aggregate changed since it was read or created.
    pub fn has_changes(&self) -> bool {
        self.persisted_version != Some(self.version)
    }

    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    pub fn batch(&self, reference: &BatchReference) -> Option<&Batch> {
        self.batches.iter().find(|b| b.reference() == reference)
    }

    /// Total quantity still available across all batches.
    pub fn available_quantity(&self) -> u64 {
        self.batches
            .iter()
            .map(|b| u64::from(b.available_quantity()))
            .sum()
    }

    pub fn pending_events(&self) -> &[DomainEvent] {
        &self.events
    }

    /// Removes and returns the pending events.
    pub fn take_events(&mut self) -> Vec<DomainEvent> {
        std::mem::take(&mut self.events)
    }

    pub(crate) fn mark_persisted(&mut self) {
        self.persisted_version = Some(self.version);
    }

    /// Allocates `line` to the batch that will be available soonest.
    ///
    /// If the line is already held by one of the batches, that batch is
    /// returned and nothing changes. When no batch can take the line an
    /// out-of-stock event is recorded, the batches and version are left
    /// untouched and [`AllocationError::OutOfStock`] is returned.
    pub fn allocate(&mut self, line: OrderLine) -> Result<BatchReference, AllocationError> {
        if let Some(holder) = self.batches.iter().find(|b| b.is_allocated(&line)) {
            return Ok(holder.reference().clone());
        }

        let chosen = self
            .batches
            .iter_mut()
            .filter(|b| b.can_allocate(&line))
            .min_by(|a, b| Batch::selection_order(a, b));

        match chosen {
            Some(batch) => {
                batch.allocate(line);
                self.version = self.version.next();
                Ok(batch.reference().clone())
            }
            None => {
                let sku = line.sku().clone();
                self.events.push(DomainEvent::out_of_stock(sku.clone()));
                Err(AllocationError::OutOfStock { sku })
            }
        }
    }

    /// Frees `line` from whichever batch holds it.
    ///
    /// Returns the reference of that batch, or `None` if no batch held it.
    pub fn deallocate(&mut self, line: &OrderLine) -> Option<BatchReference> {
        let batch = self.batches.iter_mut().find(|b| b.is_allocated(line))?;
        batch.deallocate(line);
        self.version = self.version.next();
        Some(batch.reference().clone())
    }

    /// Registers a new batch of stock for this product.
    ///
    /// Batches for another sku and reused references are rejected.
    pub fn add_batch(&mut self, batch: Batch) -> Result<(), AllocationError> {
        self.insert_batch(batch)?;
        self.version = self.version.next();
        Ok(())
    }

    fn insert_batch(&mut self, batch: Batch) -> Result<(), AllocationError> {
        if *batch.sku() != self.sku {
            return Err(AllocationError::SkuMismatch {
                product: self.sku.clone(),
                other: batch.sku().clone(),
            });
        }
        if self.batch(batch.reference()).is_some() {
            return Err(AllocationError::DuplicateBatch {
                reference: batch.reference().clone(),
            });
        }
        self.batches.push(batch);
        Ok(())
    }
}
