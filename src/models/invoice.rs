// models/invoice.rs
use chrono::{DateTime, Utc};
use mongodb::bson;
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

pub const INVOICES_COLLECTION: &str = "invoices";

/// Invoice record captured when a transaction reconciles to `paid` and the
/// gateway exposes an invoice reference. At most one record exists per
/// (payment_id, invoice_id) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    pub payment_id: String,
    pub gateway_id: String,
    pub invoice_id: String,

    // Opaque snapshot of the gateway invoice entity
    pub payload: bson::Document,

    pub short_url: Option<String>,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct InvoiceUrlResponse {
    pub payment_id: String,
    pub invoice_id: String,
    pub invoice_url: Option<String>,
}
