//! Storage for product aggregates.
//!
//! A product is stored as one document keyed by its sku, together with a
//! version counter. Writes are conditional on that version, which is how
//! concurrent allocations against the same sku are kept from overwriting
//! each other.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod record;
pub mod store;
pub mod version;

pub use common::{BatchReference, OrderId, Sku};
pub use error::{Result, StoreError};
pub use memory::InMemoryProductStore;
pub use postgres::PostgresProductStore;
pub use record::{BatchRecord, OrderLineRecord, ProductRecord};
pub use store::{ExpectedVersion, ProductStore, ProductStoreExt};
pub use version::Version;
