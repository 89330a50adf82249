// services/gateway.rs
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as base64, Engine as _};
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::config::AppConfig;
use crate::errors::{AppError, Result};

/// Payment-link creation request, wire format of the gateway's
/// `POST /v1/payment_links` endpoint.
#[derive(Debug, Serialize)]
pub struct PaymentLinkRequest {
    pub amount: i64,
    pub currency: String,
    pub accept_partial: bool,
    pub expire_by: i64,
    pub reference_id: String,
    pub description: String,
    pub customer: LinkCustomer,
    pub notify: LinkNotify,
    pub reminder_enable: bool,
    pub notes: LinkNotes,
    pub callback_url: String,
    pub callback_method: String,
}

#[derive(Debug, Serialize)]
pub struct LinkCustomer {
    pub contact: String,
}

#[derive(Debug, Serialize)]
pub struct LinkNotify {
    pub sms: bool,
    pub email: bool,
}

#[derive(Debug, Serialize)]
pub struct LinkNotes {
    pub contact: String,
}

/// Payment-link entity as returned by create and fetch.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentLinkEntity {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub short_url: String,
    #[serde(default)]
    pub amount: i64,
}

/// Gateway invoice entity. Only the fields the service interprets are typed;
/// everything else rides along opaquely.
#[derive(Debug, Clone, Deserialize)]
pub struct InvoiceEntity {
    pub id: String,
    #[serde(default)]
    pub short_url: Option<String>,
    #[serde(flatten)]
    pub rest: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct InvoiceListResponse {
    #[serde(default)]
    items: Vec<InvoiceEntity>,
}

#[derive(Debug, Clone)]
pub struct GatewayService {
    config: AppConfig,
    client: Client,
}

impl GatewayService {
    pub fn new(config: AppConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        GatewayService { config, client }
    }

    fn auth_header(&self) -> String {
        let auth_string = format!(
            "{}:{}",
            self.config.gateway_key_id, self.config.gateway_key_secret
        );
        format!("Basic {}", base64.encode(auth_string))
    }

    pub async fn create_payment_link(
        &self,
        payment_id: &str,
        amount: f64,
        contact: &str,
        description: Option<&str>,
        expire_by: i64,
    ) -> Result<PaymentLinkEntity> {
        info!("Creating payment link for {} - INR {}", contact, amount);

        let link_request = PaymentLinkRequest {
            amount: to_minor_units(amount),
            currency: "INR".to_string(),
            accept_partial: false,
            expire_by,
            reference_id: payment_id.to_string(),
            description: description.unwrap_or("Payment for order").to_string(),
            customer: LinkCustomer {
                contact: contact.to_string(),
            },
            notify: LinkNotify {
                sms: true,
                email: false,
            },
            reminder_enable: true,
            notes: LinkNotes {
                contact: contact.to_string(),
            },
            callback_url: self.config.callback_url(payment_id),
            callback_method: "get".to_string(),
        };

        let url = format!("{}/v1/payment_links", self.config.gateway_base_url());

        let response = self
            .client
            .post(&url)
            .header(header::AUTHORIZATION, self.auth_header())
            .header(header::CONTENT_TYPE, "application/json")
            .json(&link_request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await?;
            error!("Payment link creation failed: {} - {}", status, body);
            return Err(AppError::gateway(format!(
                "Link creation failed: {}",
                status
            )));
        }

        let link: PaymentLinkEntity = response.json().await?;
        info!("Payment link created: {}", link.id);
        Ok(link)
    }

    pub async fn fetch_payment_link(&self, gateway_id: &str) -> Result<PaymentLinkEntity> {
        let url = format!(
            "{}/v1/payment_links/{}",
            self.config.gateway_base_url(),
            gateway_id
        );

        let response = self
            .client
            .get(&url)
            .header(header::AUTHORIZATION, self.auth_header())
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await?;
            error!("Payment link fetch failed: {} - {}", status, body);
            return Err(AppError::gateway(format!("Link fetch failed: {}", status)));
        }

        Ok(response.json().await?)
    }

    /// Invoices the gateway has issued against a payment link. Empty when the
    /// link has not been paid or the gateway exposes no invoice for it.
    pub async fn fetch_invoices(&self, gateway_id: &str) -> Result<Vec<InvoiceEntity>> {
        let url = format!(
            "{}/v1/invoices?payment_link_id={}",
            self.config.gateway_base_url(),
            gateway_id
        );

        let response = self
            .client
            .get(&url)
            .header(header::AUTHORIZATION, self.auth_header())
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await?;
            error!("Invoice fetch failed: {} - {}", status, body);
            return Err(AppError::gateway(format!(
                "Invoice fetch failed: {}",
                status
            )));
        }

        let list: InvoiceListResponse = response.json().await?;
        Ok(list.items)
    }
}

/// Convert a major-unit amount to the gateway's integer minor units
/// (rupees -> paise).
pub fn to_minor_units(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minor_units_rounds_to_paise() {
        assert_eq!(to_minor_units(10.0), 1000);
        assert_eq!(to_minor_units(99.99), 9999);
        // Binary float artifacts must not truncate a paisa away
        assert_eq!(to_minor_units(0.29), 29);
        assert_eq!(to_minor_units(123.45), 12345);
    }

    #[test]
    fn link_entity_deserializes_gateway_response() {
        let body = r#"{
            "id": "plink_FL5Gp6eb2Wy1Ab",
            "status": "created",
            "short_url": "https://rzp.io/i/abc123",
            "amount": 1000,
            "currency": "INR",
            "accept_partial": false
        }"#;

        let link: PaymentLinkEntity = serde_json::from_str(body).unwrap();
        assert_eq!(link.id, "plink_FL5Gp6eb2Wy1Ab");
        assert_eq!(link.status, "created");
        assert_eq!(link.short_url, "https://rzp.io/i/abc123");
        assert_eq!(link.amount, 1000);
    }

    #[test]
    fn invoice_entity_keeps_unknown_fields() {
        let body = r#"{
            "id": "inv_EOzSVJT0dcDIvu",
            "short_url": "https://rzp.io/i/inv123",
            "status": "paid",
            "amount_paid": 1000
        }"#;

        let invoice: InvoiceEntity = serde_json::from_str(body).unwrap();
        assert_eq!(invoice.id, "inv_EOzSVJT0dcDIvu");
        assert_eq!(invoice.short_url.as_deref(), Some("https://rzp.io/i/inv123"));
        assert!(invoice.rest["status"] == "paid");
        assert!(invoice.rest["amount_paid"] == 1000);
    }

    #[test]
    fn invoice_list_tolerates_missing_items() {
        let list: InvoiceListResponse = serde_json::from_str(r#"{"count": 0}"#).unwrap();
        assert!(list.items.is_empty());
    }
}
