//! Allocation domain model.

mod batch;
mod order_line;
mod product;

pub use batch::Batch;
pub use order_line::OrderLine;
pub use product::Product;

use common::{BatchReference, Sku};
use thiserror::Error;

/// Errors raised by the product aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocationError {
    /// No batch can take the requested line.
    #[error("Out of stock for sku {sku}")]
    OutOfStock { sku: Sku },

    /// A batch or line for another sku was offered to this product.
    #[error("Sku mismatch: product {product} cannot hold {other}")]
    SkuMismatch { product: Sku, other: Sku },

    /// The product already has a batch with this reference.
    #[error("Duplicate batch reference {reference}")]
    DuplicateBatch { reference: BatchReference },
}
