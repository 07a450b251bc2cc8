//! Batch, allocation and product endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::NaiveDate;
use domain::{
    AddBatch, Allocate, AllocationService, Batch, BatchReference, Deallocate, Product, Sku,
};
use product_store::ProductStore;
use product_store::record::eta_format;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: ProductStore> {
    pub service: AllocationService<S>,
}

// -- Request types --

#[derive(Deserialize)]
pub struct AddBatchRequest {
    pub reference: String,
    pub sku: String,
    pub quantity: u32,
    /// `YYYY-MM-DD` or an RFC 3339 timestamp; absent for warehouse stock.
    #[serde(default, deserialize_with = "eta_format::deserialize")]
    pub eta: Option<NaiveDate>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineRequest {
    pub order_id: String,
    pub sku: String,
    pub quantity: u32,
}

impl OrderLineRequest {
    fn record_on(&self, span: &tracing::Span) {
        span.record("order_id", self.order_id.as_str());
        span.record("sku", self.sku.as_str());
    }
}

// -- Response types --

#[derive(Serialize)]
pub struct AllocatedResponse {
    pub batchref: String,
}

#[derive(Serialize)]
pub struct DeallocatedResponse {
    pub batchref: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductResponse {
    pub sku: String,
    pub version: i64,
    pub available_quantity: u64,
    pub batches: Vec<BatchResponse>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    pub reference: String,
    pub purchased_quantity: u32,
    pub available_quantity: u32,
    pub eta: Option<NaiveDate>,
    pub allocations: Vec<AllocationResponse>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationResponse {
    pub order_id: String,
    pub quantity: u32,
}

impl From<&Batch> for BatchResponse {
    fn from(batch: &Batch) -> Self {
        let mut allocations: Vec<AllocationResponse> = batch
            .allocations()
            .map(|line| AllocationResponse {
                order_id: line.order_id().to_string(),
                quantity: line.quantity(),
            })
            .collect();
        allocations.sort_by(|a, b| a.order_id.cmp(&b.order_id));

        Self {
            reference: batch.reference().to_string(),
            purchased_quantity: batch.purchased_quantity(),
            available_quantity: batch.available_quantity(),
            eta: batch.eta(),
            allocations,
        }
    }
}

impl From<&Product> for ProductResponse {
    fn from(product: &Product) -> Self {
        let mut batches: Vec<&Batch> = product.batches().iter().collect();
        batches.sort_by(|a, b| Batch::selection_order(a, b));

        Self {
            sku: product.sku().to_string(),
            version: product.version().as_i64(),
            available_quantity: product.available_quantity(),
            batches: batches.into_iter().map(BatchResponse::from).collect(),
        }
    }
}

// -- Handlers --

/// POST /batches: register a batch of stock.
#[tracing::instrument(skip_all, fields(sku, reference))]
pub async fn add_batch<S: ProductStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    payload: Result<Json<AddBatchRequest>, JsonRejection>,
) -> Result<(StatusCode, &'static str), ApiError> {
    let Json(req) = payload?;
    let span = tracing::Span::current();
    span.record("sku", req.sku.as_str());
    span.record("reference", req.reference.as_str());

    state
        .service
        .add_batch(AddBatch::new(req.reference, req.sku, req.quantity, req.eta))
        .await?;

    Ok((StatusCode::CREATED, "OK"))
}

/// POST /allocate: allocate an order line to the best batch.
#[tracing::instrument(skip_all, fields(order_id, sku))]
pub async fn allocate<S: ProductStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    payload: Result<Json<OrderLineRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AllocatedResponse>), ApiError> {
    let Json(req) = payload?;
    req.record_on(&tracing::Span::current());

    let reference = state
        .service
        .allocate_with_retry(Allocate::new(req.order_id, req.sku, req.quantity))
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(AllocatedResponse {
            batchref: reference.into_inner(),
        }),
    ))
}

/// POST /deallocate: free a previously allocated order line.
#[tracing::instrument(skip_all, fields(order_id, sku))]
pub async fn deallocate<S: ProductStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    payload: Result<Json<OrderLineRequest>, JsonRejection>,
) -> Result<Json<DeallocatedResponse>, ApiError> {
    let Json(req) = payload?;
    req.record_on(&tracing::Span::current());

    let freed = state
        .service
        .deallocate(Deallocate::new(req.order_id, req.sku, req.quantity))
        .await?;

    Ok(Json(DeallocatedResponse {
        batchref: freed.map(BatchReference::into_inner),
    }))
}

/// GET /products: list all products with their batches.
#[tracing::instrument(skip(state))]
pub async fn list<S: ProductStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<ProductResponse>>, ApiError> {
    let products = state.service.products().await?;
    Ok(Json(products.iter().map(ProductResponse::from).collect()))
}

/// GET /products/{sku}: get a single product.
#[tracing::instrument(skip(state))]
pub async fn get<S: ProductStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(sku): Path<String>,
) -> Result<Json<ProductResponse>, ApiError> {
    let sku = Sku::from(sku);
    let product = state
        .service
        .product(&sku)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Product {sku} not found")))?;

    Ok(Json(ProductResponse::from(&product)))
}
