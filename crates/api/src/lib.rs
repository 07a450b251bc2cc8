//! HTTP API server with observability for the allocation service.
//!
//! Provides REST endpoints for registering batches and allocating order
//! lines, with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use domain::{
    AllocationService, EventDispatcher, EventKind, LogNotifier, OutOfStockNotification,
};
use metrics_exporter_prometheus::PrometheusHandle;
use product_store::ProductStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use routes::allocations::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: ProductStore + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/batches", post(routes::allocations::add_batch::<S>))
        .route("/add-batch", post(routes::allocations::add_batch::<S>))
        .route("/allocate", post(routes::allocations::allocate::<S>))
        .route("/deallocate", post(routes::allocations::deallocate::<S>))
        .route("/products", get(routes::allocations::list::<S>))
        .route("/products/{sku}", get(routes::allocations::get::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state: the allocation service over `store`, with
/// out-of-stock notices sent to the configured recipient.
pub fn create_state<S: ProductStore + 'static>(store: S, config: &Config) -> Arc<AppState<S>> {
    let notification =
        OutOfStockNotification::with_recipient(LogNotifier, config.out_of_stock_notify.clone());
    let dispatcher =
        EventDispatcher::new().with_handler(EventKind::OutOfStock, Arc::new(notification));

    let service =
        AllocationService::new(store, dispatcher).with_retry_policy(config.retry_policy());

    Arc::new(AppState { service })
}
