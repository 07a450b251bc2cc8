//! Out-of-stock notifications to the operations team.
//!
//! Message delivery itself is an external collaborator behind
//! [`Notifier`]; this module only turns events into messages.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use crate::dispatcher::{EventHandler, HandlerError};
use crate::events::DomainEvent;

/// Default recipient of out-of-stock notifications.
pub const DEFAULT_STOCK_RECIPIENT: &str = "stock@made.com";

/// Sends a message to a recipient (e-mail, chat, pager...).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, to: &str, message: &str) -> Result<(), HandlerError>;
}

/// Notifier that only writes the message to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, to: &str, message: &str) -> Result<(), HandlerError> {
        tracing::warn!(to, message, "notification");
        Ok(())
    }
}

#[derive(Debug, Default)]
struct InMemoryNotifierState {
    sent: Vec<(String, String)>,
    fail_on_send: bool,
}

/// In-memory notifier for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotifier {
    state: Arc<Mutex<InMemoryNotifierState>>,
}

impl InMemoryNotifier {
    /// Creates a new in-memory notifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the notifier to fail on every send.
    pub fn set_fail_on_send(&self, fail: bool) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .fail_on_send = fail;
    }

    /// Returns every `(recipient, message)` pair sent so far.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .sent
            .clone()
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn send(&self, to: &str, message: &str) -> Result<(), HandlerError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.fail_on_send {
            return Err(HandlerError::Notification(format!(
                "could not reach {to}"
            )));
        }
        state.sent.push((to.to_string(), message.to_string()));
        Ok(())
    }
}

/// Tells the stock team when a sku runs out.
pub struct OutOfStockNotification<N: Notifier> {
    notifier: N,
    recipient: String,
}

impl<N: Notifier> OutOfStockNotification<N> {
    /// Creates a handler sending to [`DEFAULT_STOCK_RECIPIENT`].
    pub fn new(notifier: N) -> Self {
        Self::with_recipient(notifier, DEFAULT_STOCK_RECIPIENT)
    }

    pub fn with_recipient(notifier: N, recipient: impl Into<String>) -> Self {
        Self {
            notifier,
            recipient: recipient.into(),
        }
    }
}

#[async_trait]
impl<N: Notifier> EventHandler for OutOfStockNotification<N> {
    fn name(&self) -> &'static str {
        "out_of_stock_notification"
    }

    async fn handle(&self, event: &DomainEvent) -> Result<(), HandlerError> {
        match event {
            DomainEvent::OutOfStock(e) => {
                self.notifier
                    .send(&self.recipient, &format!("Out of stock for {}", e.sku))
                    .await
            }
        }
    }
}
