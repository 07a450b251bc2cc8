use common::{OrderId, Sku};
use serde::{Deserialize, Serialize};

/// A customer order's request for a quantity of one sku.
///
/// Order lines are values: two lines with the same order id, sku and
/// quantity are the same line. A line is never split across batches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderLine {
    order_id: OrderId,
    sku: Sku,
    quantity: u32,
}

impl OrderLine {
    /// Creates a new order line.
    ///
    /// Quantities are validated at the use-case boundary, not here.
    pub fn new(order_id: impl Into<OrderId>, sku: impl Into<Sku>, quantity: u32) -> Self {
        Self {
            order_id: order_id.into(),
            sku: sku.into(),
            quantity,
        }
    }

    pub fn order_id(&self) -> &OrderId {
        &self.order_id
    }

    pub fn sku(&self) -> &Sku {
        &self.sku
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn equal_lines_are_one_set_member() {
        let mut lines = HashSet::new();
        lines.insert(OrderLine::new("o1", "LAMP", 2));
        lines.insert(OrderLine::new("o1", "LAMP", 2));
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn lines_differing_in_quantity_are_distinct() {
        assert_ne!(
            OrderLine::new("o1", "LAMP", 2),
            OrderLine::new("o1", "LAMP", 3)
        );
    }
}
