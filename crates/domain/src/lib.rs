//! Domain layer for stock allocation.
//!
//! This crate provides:
//! - The allocation model: order lines, batches and the `Product` aggregate
//! - Domain events and an explicit `EventDispatcher`
//! - `ProductRepository`, a unit of work with optimistic concurrency
//! - `AllocationService`, the use cases driven by the API

pub mod commands;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod model;
pub mod notifications;
pub mod repository;
pub mod service;

pub use commands::{AddBatch, Allocate, Deallocate};
pub use common::{BatchReference, OrderId, Sku};
pub use dispatcher::{DispatchError, EventDispatcher, EventHandler, HandlerError};
pub use error::DomainError;
pub use events::{DomainEvent, EventKind, OutOfStockEvent};
pub use model::{AllocationError, Batch, OrderLine, Product};
pub use notifications::{
    DEFAULT_STOCK_RECIPIENT, InMemoryNotifier, LogNotifier, Notifier, OutOfStockNotification,
};
pub use repository::ProductRepository;
pub use service::{AllocationService, RetryPolicy};
