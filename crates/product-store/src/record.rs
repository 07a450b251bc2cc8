//! Serialized representation of a product aggregate.
//!
//! A product is stored as a single document: every batch with its full
//! allocation set plus the product version. Writes always replace the whole
//! document, never individual batches.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{BatchReference, OrderId, Sku, Version};

/// One allocated order line, stored as the (order id, sku, quantity) triple.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OrderLineRecord {
    pub order_id: OrderId,
    pub sku: Sku,
    pub quantity: u32,
}

/// A stored batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BatchRecord {
    pub reference: BatchReference,
    pub sku: Sku,
    pub purchased_quantity: u32,

    /// Day-precision arrival date, or `"NONE"` for stock already in the warehouse.
    #[serde(with = "eta_format")]
    pub eta: Option<NaiveDate>,

    #[serde(default)]
    pub allocations: Vec<OrderLineRecord>,
}

/// The stored document for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProductRecord {
    pub sku: Sku,
    pub version: Version,
    #[serde(default)]
    pub batches: Vec<BatchRecord>,
}

impl ProductRecord {
    /// Creates a record for `sku` at `version`.
    pub fn new(sku: impl Into<Sku>, version: Version, batches: Vec<BatchRecord>) -> Self {
        Self {
            sku: sku.into(),
            version,
            batches,
        }
    }

    /// Serializes the record into the JSON document that backends persist.
    pub fn to_document(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }

    /// Parses a persisted JSON document.
    pub fn from_document(document: serde_json::Value) -> serde_json::Result<Self> {
        serde_json::from_value(document)
    }
}

/// Serde adapter for batch arrival dates.
///
/// Dates are written as `YYYY-MM-DD`; a missing date is written as the
/// literal `"NONE"`. Reading also accepts `null` and full RFC 3339
/// timestamps, which are truncated to their calendar date.
pub mod eta_format {
    use chrono::{DateTime, NaiveDate};
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    /// Sentinel stored for batches without an arrival date.
    pub const NONE: &str = "NONE";

    const DATE_FORMAT: &str = "%Y-%m-%d";

    pub fn serialize<S: Serializer>(eta: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error> {
        match eta {
            Some(date) => serializer.collect_str(&date.format(DATE_FORMAT)),
            None => serializer.serialize_str(NONE),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NaiveDate>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw.as_deref() {
            None | Some(NONE) => Ok(None),
            Some(value) => parse(value).map(Some).map_err(D::Error::custom),
        }
    }

    /// Parses a stored eta value into a calendar date.
    pub fn parse(value: &str) -> Result<NaiveDate, String> {
        NaiveDate::parse_from_str(value, DATE_FORMAT)
            .or_else(|_| DateTime::parse_from_rfc3339(value).map(|ts| ts.date_naive()))
            .map_err(|e| format!("invalid eta {value:?}: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn soapdish_batch(eta: Option<NaiveDate>) -> BatchRecord {
        BatchRecord {
            reference: BatchReference::from("batch-1"),
            sku: Sku::from("RUSTY-SOAPDISH"),
            purchased_quantity: 100,
            eta,
            allocations: vec![OrderLineRecord {
                order_id: OrderId::from("order999"),
                sku: Sku::from("RUSTY-SOAPDISH"),
                quantity: 15,
            }],
        }
    }

    #[test]
    fn batch_document_layout() {
        let batch = soapdish_batch(NaiveDate::from_ymd_opt(2021, 4, 20));

        let value = serde_json::to_value(&batch).unwrap();

        assert_eq!(
            value,
            json!({
                "Reference": "batch-1",
                "Sku": "RUSTY-SOAPDISH",
                "PurchasedQuantity": 100,
                "Eta": "2021-04-20",
                "Allocations": [
                    { "OrderId": "order999", "Sku": "RUSTY-SOAPDISH", "Quantity": 15 }
                ]
            })
        );
    }

    #[test]
    fn missing_eta_is_stored_as_none_sentinel() {
        let value = serde_json::to_value(soapdish_batch(None)).unwrap();
        assert_eq!(value["Eta"], json!("NONE"));

        let back: BatchRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back.eta, None);
    }

    #[test]
    fn timestamp_eta_is_truncated_to_the_day() {
        let value = json!({
            "Reference": "b1",
            "Sku": "LAMP",
            "PurchasedQuantity": 5,
            "Eta": "2021-04-20T17:45:00Z"
        });

        let batch: BatchRecord = serde_json::from_value(value).unwrap();

        assert_eq!(batch.eta, NaiveDate::from_ymd_opt(2021, 4, 20));
        assert!(batch.allocations.is_empty());
    }

    #[test]
    fn null_eta_reads_as_absent() {
        let value = json!({
            "Reference": "b1",
            "Sku": "LAMP",
            "PurchasedQuantity": 5,
            "Eta": null
        });

        let batch: BatchRecord = serde_json::from_value(value).unwrap();
        assert_eq!(batch.eta, None);
    }

    #[test]
    fn garbage_eta_is_rejected() {
        let value = json!({
            "Reference": "b1",
            "Sku": "LAMP",
            "PurchasedQuantity": 5,
            "Eta": "next tuesday"
        });

        let err = serde_json::from_value::<BatchRecord>(value).unwrap_err();
        assert!(err.to_string().contains("invalid eta"));
    }

    #[test]
    fn product_document_carries_version() {
        let record = ProductRecord::new("RUSTY-SOAPDISH", Version::new(4), vec![soapdish_batch(None)]);

        let document = record.to_document().unwrap();
        assert_eq!(document["Version"], json!(4));
        assert_eq!(document["Sku"], json!("RUSTY-SOAPDISH"));

        assert_eq!(ProductRecord::from_document(document).unwrap(), record);
    }
}
