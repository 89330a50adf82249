// models/transaction.rs
use chrono::{DateTime, Utc};
use mongodb::bson;
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

pub const TRANSACTIONS_COLLECTION: &str = "transactions";

/// One payment-link transaction. `payment_id` is generated locally and never
/// changes; `gateway_id` is the identifier the gateway issues for the link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentTransaction {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    pub payment_id: String,
    pub gateway_id: String,

    pub amount: f64,
    pub amount_minor: i64,
    pub currency: String,
    pub contact: String,

    // Gateway-defined status string, stored opaquely. Advanced only by the
    // reconciler, never regressed.
    pub status: String,

    pub short_url: String,
    pub expire_by: i64,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    pub amount: f64,
    pub contact: String,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreatePaymentResponse {
    pub payment_id: String,
    pub payment_url: String,
    pub gateway_id: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct PaymentStatusResponse {
    pub payment_id: String,
    pub gateway_id: String,
    pub status: String,
    pub amount: f64,
    pub contact: String,
}

/// Data the checkout frontend needs to render the payment page.
#[derive(Debug, Serialize)]
pub struct PaymentPageResponse {
    pub payment_id: String,
    pub gateway_id: String,
    pub amount: f64,
    pub currency: String,
    pub status: String,
    pub payment_url: String,
    pub expire_by: i64,
}

#[derive(Debug, Serialize)]
pub struct CallbackResponse {
    pub payment_id: String,
    pub status: String,
    pub success: bool,
}
