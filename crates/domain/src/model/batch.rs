use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::NaiveDate;
use common::{BatchReference, Sku};

use super::OrderLine;

/// A purchased lot of stock for one sku.
///
/// A batch without an eta is already in the warehouse; one with an eta is
/// still in transit. The sum of allocated line quantities never exceeds
/// the purchased quantity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    reference: BatchReference,
    sku: Sku,
    purchased_quantity: u32,
    eta: Option<NaiveDate>,
    allocations: HashSet<OrderLine>,
}

impl Batch {
    pub fn new(
        reference: impl Into<BatchReference>,
        sku: impl Into<Sku>,
        purchased_quantity: u32,
        eta: Option<NaiveDate>,
    ) -> Self {
        Self {
            reference: reference.into(),
            sku: sku.into(),
            purchased_quantity,
            eta,
            allocations: HashSet::new(),
        }
    }

    /// Replaces the allocation set wholesale.
    ///
    /// Used when rebuilding a batch from storage; no capacity check is
    /// performed, see [`Batch::is_consistent`].
    pub fn with_allocations(mut self, lines: impl IntoIterator<Item = OrderLine>) -> Self {
        self.allocations = lines.into_iter().collect();
        self
    }

    pub fn reference(&self) -> &BatchReference {
        &self.reference
    }

    pub fn sku(&self) -> &Sku {
        &self.sku
    }

    pub fn purchased_quantity(&self) -> u32 {
        self.purchased_quantity
    }

    pub fn eta(&self) -> Option<NaiveDate> {
        self.eta
    }

    /// Lines currently allocated to this batch, in no particular order.
    pub fn allocations(&self) -> impl Iterator<Item = &OrderLine> {
        self.allocations.iter()
    }

    pub fn is_allocated(&self, line: &OrderLine) -> bool {
        self.allocations.contains(line)
    }

    pub fn allocated_quantity(&self) -> u32 {
        self.allocations.iter().map(OrderLine::quantity).sum()
    }

    pub fn available_quantity(&self) -> u32 {
        self.purchased_quantity
            .saturating_sub(self.allocated_quantity())
    }

    /// True if every line matches the sku and the allocations fit.
    pub fn is_consistent(&self) -> bool {
        self.allocations.iter().all(|line| *line.sku() == self.sku)
            && self
                .allocations
                .iter()
                .map(|line| u64::from(line.quantity()))
                .sum::<u64>()
                <= u64::from(self.purchased_quantity)
    }

    pub fn can_allocate(&self, line: &OrderLine) -> bool {
        *line.sku() == self.sku && self.available_quantity() >= line.quantity()
    }

    /// Allocates `line` if it fits; otherwise leaves the batch untouched.
    ///
    /// Returns true if the line is allocated to this batch afterwards.
    /// Allocating a line that is already held is a no-op.
    pub fn allocate(&mut self, line: OrderLine) -> bool {
        if self.is_allocated(&line) {
            return true;
        }
        if !self.can_allocate(&line) {
            return false;
        }
        self.allocations.insert(line)
    }

    /// Frees `line`. Returns false if it was not allocated here.
    pub fn deallocate(&mut self, line: &OrderLine) -> bool {
        self.allocations.remove(line)
    }

    /// Order in which batches are considered for allocation.
    ///
    /// Batches without an eta come first, then ascending eta; ties are
    /// broken by reference so the choice is reproducible.
    pub fn selection_order(a: &Batch, b: &Batch) -> Ordering {
        let by_eta = match (a.eta, b.eta) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(left), Some(right)) => left.cmp(&right),
        };
        by_eta.then_with(|| a.reference.cmp(&b.reference))
    }
}
