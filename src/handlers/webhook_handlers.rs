// handlers/webhook_handlers.rs
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::Json,
};
use hmac::{Hmac, Mac};
use mongodb::{bson::doc, Collection};
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;
use tracing::{info, warn};

use crate::errors::{AppError, Result};
use crate::models::invoice::{Invoice, InvoiceUrlResponse, INVOICES_COLLECTION};
use crate::models::transaction::{PaymentTransaction, TRANSACTIONS_COLLECTION};
use crate::services::reconciler::{self, ReconcileKey};
use crate::state::AppState;

const SIGNATURE_HEADER: &str = "x-razorpay-signature";

#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    #[serde(default)]
    pub event: Option<String>,
    pub payload: WebhookPayload,
}

#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    pub payment_link: PaymentLinkWrapper,
}

#[derive(Debug, Deserialize)]
pub struct PaymentLinkWrapper {
    pub entity: PaymentLinkEvent,
}

#[derive(Debug, Deserialize)]
pub struct PaymentLinkEvent {
    pub id: String,
    pub status: String,
}

/// Asynchronous status push from the gateway. Matches the transaction by
/// gateway id and runs it through the reconciler. The body is taken raw so
/// the signature covers exactly the bytes the gateway signed.
pub async fn gateway_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<serde_json::Value>> {
    if let Some(secret) = &state.config.gateway_webhook_secret {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or(AppError::InvalidSignature)?;

        if !verify_webhook_signature(body.as_bytes(), signature, secret) {
            warn!("Webhook rejected: bad signature");
            return Err(AppError::InvalidSignature);
        }
    }

    let event: WebhookEvent = serde_json::from_str(&body)
        .map_err(|e| AppError::MalformedWebhook(e.to_string()))?;

    let entity = &event.payload.payment_link.entity;
    info!(
        "Webhook {} for gateway link {}: status {}",
        event.event.as_deref().unwrap_or("unknown"),
        entity.id,
        entity.status
    );

    match reconciler::reconcile(
        &state.db,
        &state.gateway,
        ReconcileKey::GatewayId(&entity.id),
        &entity.status,
    )
    .await
    {
        Ok(_) => {}
        Err(AppError::TransactionNotFound) => {
            // Ack anyway or the gateway redelivers a webhook we can never match
            warn!("Webhook for unknown gateway link {}", entity.id);
        }
        Err(e) => return Err(e),
    }

    Ok(Json(json!({ "status": "success" })))
}

/// Invoice URL lookup for a paid transaction.
pub async fn get_invoice_url(
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
) -> Result<Json<InvoiceUrlResponse>> {
    let transactions: Collection<PaymentTransaction> = state.db.collection(TRANSACTIONS_COLLECTION);
    transactions
        .find_one(doc! { "payment_id": &payment_id })
        .await?
        .ok_or(AppError::TransactionNotFound)?;

    let invoices: Collection<Invoice> = state.db.collection(INVOICES_COLLECTION);
    let invoice = invoices
        .find_one(doc! { "payment_id": &payment_id })
        .await?
        .ok_or(AppError::InvoiceNotFound)?;

    Ok(Json(InvoiceUrlResponse {
        payment_id,
        invoice_id: invoice.invoice_id,
        invoice_url: invoice.short_url,
    }))
}

/// HMAC-SHA256 over the raw body, hex-encoded, constant-time comparison.
pub fn verify_webhook_signature(body: &[u8], signature_hex: &str, secret: &str) -> bool {
    type HmacSha256 = Hmac<Sha256>;

    let Ok(expected) = hex::decode(signature_hex.trim()) else {
        return false;
    };

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(body: &[u8], secret: &str) -> String {
        type HmacSha256 = Hmac<Sha256>;
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    const SECRET: &str = "whsec_test123";

    #[test]
    fn valid_signature_is_accepted() {
        let body = br#"{"event":"payment_link.paid"}"#;
        let signature = sign(body, SECRET);
        assert!(verify_webhook_signature(body, &signature, SECRET));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let body = br#"{"event":"payment_link.paid"}"#;
        let signature = sign(body, "some_other_secret");
        assert!(!verify_webhook_signature(body, &signature, SECRET));
    }

    #[test]
    fn tampered_body_is_rejected() {
        let body = br#"{"event":"payment_link.paid"}"#;
        let signature = sign(body, SECRET);
        let tampered = br#"{"event":"payment_link.paid","hacked":true}"#;
        assert!(!verify_webhook_signature(tampered, &signature, SECRET));
    }

    #[test]
    fn non_hex_signature_is_rejected() {
        let body = br#"{}"#;
        assert!(!verify_webhook_signature(body, "not-hex!!", SECRET));
    }

    #[test]
    fn event_parses_with_extra_fields() {
        let body = r#"{
            "entity": "event",
            "event": "payment_link.paid",
            "contains": ["payment_link"],
            "payload": {
                "payment_link": {
                    "entity": {
                        "id": "plink_FL5Gp6eb2Wy1Ab",
                        "status": "paid",
                        "amount": 1000,
                        "reference_id": "9c1e3f60"
                    }
                }
            },
            "created_at": 1592134971
        }"#;

        let event: WebhookEvent = serde_json::from_str(body).unwrap();
        assert_eq!(event.event.as_deref(), Some("payment_link.paid"));
        assert_eq!(event.payload.payment_link.entity.id, "plink_FL5Gp6eb2Wy1Ab");
        assert_eq!(event.payload.payment_link.entity.status, "paid");
    }

    #[test]
    fn event_without_payment_link_fails_to_parse() {
        let body = r#"{"event": "refund.processed", "payload": {"refund": {"entity": {}}}}"#;
        assert!(serde_json::from_str::<WebhookEvent>(body).is_err());
    }
}
