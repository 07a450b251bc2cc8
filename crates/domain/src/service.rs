//! Allocation use cases.

use std::time::Duration;

use common::{BatchReference, Sku};
use product_store::ProductStore;

use crate::commands::{AddBatch, Allocate, Deallocate};
use crate::dispatcher::EventDispatcher;
use crate::error::DomainError;
use crate::events::DomainEvent;
use crate::model::Product;
use crate::repository::ProductRepository;

/// How [`AllocationService::allocate_with_retry`] retries lost races.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt; grows linearly after that.
    pub base_delay: Duration,
    /// Upper bound for a single read-mutate-write attempt.
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(25),
            timeout: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-indexed).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

/// Entry point for every allocation use case.
///
/// Each call is one unit of work: the product is loaded, mutated and written
/// back through the repository, then the events it raised are handed to the
/// dispatcher.
pub struct AllocationService<S: ProductStore> {
    repository: ProductRepository<S>,
    dispatcher: EventDispatcher,
    retry: RetryPolicy,
}

impl<S: ProductStore> AllocationService<S> {
    /// Creates a service over `store` with the default retry policy.
    pub fn new(store: S, dispatcher: EventDispatcher) -> Self {
        Self {
            repository: ProductRepository::new(store),
            dispatcher,
            retry: RetryPolicy::default(),
        }
    }

    /// Replaces the retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn repository(&self) -> &ProductRepository<S> {
        &self.repository
    }

    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Registers a batch, creating the product on its first batch.
    #[tracing::instrument(skip(self), fields(sku = %cmd.sku, reference = %cmd.reference))]
    pub async fn add_batch(&self, cmd: AddBatch) -> Result<(), DomainError> {
        cmd.validate()?;

        let mut product = match self.repository.get(&cmd.sku).await? {
            Some(mut product) => {
                product.add_batch(cmd.batch())?;
                product
            }
            None => Product::new(cmd.sku.clone(), vec![cmd.batch()])?,
        };

        let version = self.repository.add(&mut product).await?;
        tracing::info!(%version, "batch added");
        Ok(())
    }

    /// Makes one attempt at allocating an order line.
    ///
    /// An out-of-stock outcome is not persisted; its event is still
    /// dispatched before the error is returned.
    #[tracing::instrument(skip(self), fields(order_id = %cmd.order_id, sku = %cmd.sku))]
    pub async fn allocate(&self, cmd: Allocate) -> Result<BatchReference, DomainError> {
        let (result, events) = self.allocate_once(&cmd).await;
        self.publish(events).await;
        result
    }

    /// Allocates, re-running the whole unit of work after a lost race or a
    /// timed-out attempt.
    ///
    /// Only the read-mutate-write sequence is bounded by
    /// [`RetryPolicy::timeout`]; events of the final attempt are dispatched
    /// once, after the retries are over. Gives up after
    /// [`RetryPolicy::max_attempts`] and returns the last error. Re-running is
    /// safe because a line that already landed in a batch is reported as
    /// allocated there.
    #[tracing::instrument(skip(self), fields(order_id = %cmd.order_id, sku = %cmd.sku))]
    pub async fn allocate_with_retry(&self, cmd: Allocate) -> Result<BatchReference, DomainError> {
        let mut attempt = 1;
        let (result, events) = loop {
            let outcome = match tokio::time::timeout(self.retry.timeout, self.allocate_once(&cmd))
                .await
            {
                Ok(outcome) => outcome,
                Err(_) => (Err(DomainError::Timeout(self.retry.timeout)), Vec::new()),
            };

            match outcome {
                (Err(e), _) if e.is_retryable() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(attempt, ?delay, error = %e, "allocation attempt failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                outcome => break outcome,
            }
        };

        self.publish(events).await;
        result
    }

    /// Load, allocate and commit. Returns the outcome together with the
    /// events the product raised, which the caller dispatches.
    async fn allocate_once(
        &self,
        cmd: &Allocate,
    ) -> (Result<BatchReference, DomainError>, Vec<DomainEvent>) {
        if let Err(e) = cmd.validate() {
            return (Err(e), Vec::new());
        }

        let mut product = match self.load(&cmd.sku).await {
            Ok(product) => product,
            Err(e) => return (Err(e), Vec::new()),
        };

        let reference = match product.allocate(cmd.line()) {
            Ok(reference) => reference,
            Err(e) => {
                metrics::counter!("allocation_out_of_stock_total").increment(1);
                tracing::info!("out of stock");
                return (Err(e.into()), product.take_events());
            }
        };

        if let Err(e) = self.repository.add(&mut product).await {
            if e.is_concurrency_conflict() {
                metrics::counter!("allocation_conflicts_total").increment(1);
            }
            return (Err(e), Vec::new());
        }

        metrics::counter!("allocations_total").increment(1);
        tracing::info!(batch = %reference, version = %product.version(), "line allocated");

        (Ok(reference), product.take_events())
    }

    /// Frees an order line. Returns the batch that held it, if any.
    #[tracing::instrument(skip(self), fields(order_id = %cmd.order_id, sku = %cmd.sku))]
    pub async fn deallocate(&self, cmd: Deallocate) -> Result<Option<BatchReference>, DomainError> {
        cmd.validate()?;

        let mut product = self.load(&cmd.sku).await?;
        let freed = product.deallocate(&cmd.line());

        if freed.is_some() {
            self.repository.add(&mut product).await?;
            tracing::info!(batch = ?freed, "line deallocated");
        }
        Ok(freed)
    }

    /// Lists every product.
    #[tracing::instrument(skip(self))]
    pub async fn products(&self) -> Result<Vec<Product>, DomainError> {
        self.repository.list().await
    }

    /// Looks up a single product.
    pub async fn product(&self, sku: &Sku) -> Result<Option<Product>, DomainError> {
        self.repository.get(sku).await
    }

    async fn load(&self, sku: &Sku) -> Result<Product, DomainError> {
        self.repository
            .get(sku)
            .await?
            .ok_or_else(|| DomainError::InvalidSku(sku.clone()))
    }

    /// Hands drained events to the dispatcher.
    ///
    /// Runs after the outcome is decided, so a failing handler is logged
    /// and does not change the result of the use case.
    async fn publish(&self, events: Vec<DomainEvent>) {
        if events.is_empty() {
            return;
        }

        match self.dispatcher.handle(&events).await {
            Ok(delivered) => tracing::debug!(delivered, "events dispatched"),
            Err(e) => {
                metrics::counter!("domain_event_dispatch_failures_total", "event_type" => e.event_type)
                    .increment(1);
                tracing::error!(error = %e, "event dispatch failed");
            }
        }
    }
}
