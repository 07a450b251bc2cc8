//! Shared identifier types used across the allocation crates.

mod types;

pub use types::{BatchReference, OrderId, Sku};
