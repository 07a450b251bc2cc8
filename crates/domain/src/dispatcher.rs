//! Delivery of domain events to registered handlers.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::events::{DomainEvent, EventKind};

/// Error reported by an event handler.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The notification collaborator could not deliver a message.
    #[error("Notification failed: {0}")]
    Notification(String),

    /// Any other handler failure.
    #[error("{0}")]
    Other(String),
}

/// A handler failed while events were being dispatched.
///
/// Events after the failing delivery were not dispatched.
#[derive(Debug, Error)]
#[error("Handler {handler} failed on {event_type} event: {source}")]
pub struct DispatchError {
    pub handler: &'static str,
    pub event_type: &'static str,
    pub source: HandlerError,
}

/// Something that reacts to a domain event.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Returns the name of this handler, used in logs and errors.
    fn name(&self) -> &'static str;

    /// Handles a single event.
    async fn handle(&self, event: &DomainEvent) -> Result<(), HandlerError>;
}

/// Routes domain events to the handlers registered for their kind.
///
/// Events are delivered in the order given; for each event, handlers run
/// one after another in registration order. The first failure stops the
/// dispatch and is returned to the caller.
#[derive(Clone, Default)]
pub struct EventDispatcher {
    handlers: HashMap<EventKind, Vec<Arc<dyn EventHandler>>>,
}

impl EventDispatcher {
    /// Creates a dispatcher with no handlers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for events of `kind`.
    pub fn register(&mut self, kind: EventKind, handler: Arc<dyn EventHandler>) {
        self.handlers.entry(kind).or_default().push(handler);
    }

    /// Builder-style variant of [`register`](Self::register).
    pub fn with_handler(mut self, kind: EventKind, handler: Arc<dyn EventHandler>) -> Self {
        self.register(kind, handler);
        self
    }

    /// Returns the number of handlers registered for `kind`.
    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers.get(&kind).map_or(0, Vec::len)
    }

    /// Dispatches `events`, returning how many deliveries were made.
    #[tracing::instrument(skip(self, events), fields(events = events.len()))]
    pub async fn handle(&self, events: &[DomainEvent]) -> Result<usize, DispatchError> {
        let mut delivered = 0;

        for event in events {
            let Some(handlers) = self.handlers.get(&event.kind()) else {
                tracing::debug!(event_type = event.event_type(), "no handlers registered");
                continue;
            };

            for handler in handlers {
                handler
                    .handle(event)
                    .await
                    .map_err(|source| DispatchError {
                        handler: handler.name(),
                        event_type: event.event_type(),
                        source,
                    })?;

                delivered += 1;
                metrics::counter!("domain_events_dispatched_total", "event_type" => event.event_type())
                    .increment(1);
                tracing::debug!(
                    handler = handler.name(),
                    event_type = event.event_type(),
                    "event delivered"
                );
            }
        }

        Ok(delivered)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// Records every delivery into a shared log.
    struct RecordingHandler {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    impl RecordingHandler {
        fn new(name: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Arc<Self> {
            Arc::new(Self {
                name,
                log: log.clone(),
                fail: false,
            })
        }

        fn failing(name: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Arc<Self> {
            Arc::new(Self {
                name,
                log: log.clone(),
                fail: true,
            })
        }
    }

    #[async_trait]
    impl EventHandler for RecordingHandler {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn handle(&self, event: &DomainEvent) -> Result<(), HandlerError> {
            let DomainEvent::OutOfStock(e) = event;
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:{}", self.name, e.sku));
            if self.fail {
                return Err(HandlerError::Other("boom".to_string()));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn delivers_in_event_then_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = EventDispatcher::new()
            .with_handler(EventKind::OutOfStock, RecordingHandler::new("first", &log))
            .with_handler(EventKind::OutOfStock, RecordingHandler::new("second", &log));

        let delivered = dispatcher
            .handle(&[
                DomainEvent::out_of_stock("A"),
                DomainEvent::out_of_stock("B"),
            ])
            .await
            .unwrap();

        assert_eq!(delivered, 4);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["first:A", "second:A", "first:B", "second:B"]
        );
    }

    #[tokio::test]
    async fn events_without_handlers_are_skipped() {
        let dispatcher = EventDispatcher::new();
        let delivered = dispatcher
            .handle(&[DomainEvent::out_of_stock("A")])
            .await
            .unwrap();
        assert_eq!(delivered, 0);
        assert_eq!(dispatcher.handler_count(EventKind::OutOfStock), 0);
    }

    #[tokio::test]
    async fn first_failure_stops_dispatch() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = EventDispatcher::new()
            .with_handler(EventKind::OutOfStock, RecordingHandler::failing("broken", &log))
            .with_handler(EventKind::OutOfStock, RecordingHandler::new("after", &log));

        let err = dispatcher
            .handle(&[
                DomainEvent::out_of_stock("A"),
                DomainEvent::out_of_stock("B"),
            ])
            .await
            .unwrap_err();

        assert_eq!(err.handler, "broken");
        assert_eq!(err.event_type, "OutOfStock");
        assert_eq!(*log.lock().unwrap(), vec!["broken:A"]);
        assert_eq!(
            err.to_string(),
            "Handler broken failed on OutOfStock event: boom"
        );
    }
}
