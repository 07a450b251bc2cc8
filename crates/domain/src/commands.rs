//! Use-case inputs.

use chrono::NaiveDate;
use common::{BatchReference, OrderId, Sku};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::model::{Batch, OrderLine};

fn positive(quantity: u32) -> Result<(), DomainError> {
    if quantity == 0 {
        return Err(DomainError::InvalidQuantity { quantity });
    }
    Ok(())
}

/// Register a new batch of stock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddBatch {
    pub reference: BatchReference,
    pub sku: Sku,
    pub quantity: u32,
    pub eta: Option<NaiveDate>,
}

impl AddBatch {
    pub fn new(
        reference: impl Into<BatchReference>,
        sku: impl Into<Sku>,
        quantity: u32,
        eta: Option<NaiveDate>,
    ) -> Self {
        Self {
            reference: reference.into(),
            sku: sku.into(),
            quantity,
            eta,
        }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        positive(self.quantity)
    }

    pub fn batch(&self) -> Batch {
        Batch::new(
            self.reference.clone(),
            self.sku.clone(),
            self.quantity,
            self.eta,
        )
    }
}

/// Allocate an order line to a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Allocate {
    pub order_id: OrderId,
    pub sku: Sku,
    pub quantity: u32,
}

impl Allocate {
    pub fn new(order_id: impl Into<OrderId>, sku: impl Into<Sku>, quantity: u32) -> Self {
        Self {
            order_id: order_id.into(),
            sku: sku.into(),
            quantity,
        }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        positive(self.quantity)
    }

    pub fn line(&self) -> OrderLine {
        OrderLine::new(self.order_id.clone(), self.sku.clone(), self.quantity)
    }
}

/// Free a previously allocated order line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deallocate {
    pub order_id: OrderId,
    pub sku: Sku,
    pub quantity: u32,
}

impl Deallocate {
    pub fn new(order_id: impl Into<OrderId>, sku: impl Into<Sku>, quantity: u32) -> Self {
        Self {
            order_id: order_id.into(),
            sku: sku.into(),
            quantity,
        }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        positive(self.quantity)
    }

    pub fn line(&self) -> OrderLine {
        OrderLine::new(self.order_id.clone(), self.sku.clone(), self.quantity)
    }
}
