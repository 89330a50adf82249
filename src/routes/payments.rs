use axum::{
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::json;

use crate::handlers::payment_handlers;
use crate::handlers::webhook_handlers;
use crate::state::AppState;

pub fn payment_routes() -> Router<AppState> {
    Router::new()
        // Health
        .route("/health", get(payments_health))

        // Payment lifecycle
        .route("/create", post(payment_handlers::create_payment))
        .route("/", get(payment_handlers::list_recent_payments))
        .route("/:payment_id", get(payment_handlers::get_payment_page))
        .route("/:payment_id/status", get(payment_handlers::check_payment_status))

        // Gateway signals
        .route("/:payment_id/callback", get(payment_handlers::payment_callback))
        .route("/webhook", post(webhook_handlers::gateway_webhook))

        // Invoices
        .route("/:payment_id/invoice", get(webhook_handlers::get_invoice_url))
}

async fn payments_health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "payments",
        "timestamp": Utc::now().to_rfc3339(),
        "features": ["payment-links", "status-check", "callback", "webhook", "invoices"]
    }))
}
