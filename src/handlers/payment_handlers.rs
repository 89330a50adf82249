// handlers/payment_handlers.rs
use axum::{
    extract::{Path, State},
    response::Json,
};
use chrono::{Duration, Utc};
use futures_util::TryStreamExt;
use mongodb::{bson::doc, Collection};
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::{AppError, Result};
use crate::models::transaction::{
    CallbackResponse, CreatePaymentRequest, CreatePaymentResponse, PaymentPageResponse,
    PaymentStatusResponse, PaymentTransaction, TRANSACTIONS_COLLECTION,
};
use crate::services::reconciler;
use crate::state::AppState;

// Payment links expire half an hour after creation
const LINK_EXPIRY_MINUTES: i64 = 30;

pub async fn create_payment(
    State(state): State<AppState>,
    Json(payload): Json<CreatePaymentRequest>,
) -> Result<Json<CreatePaymentResponse>> {
    info!("Creating payment for contact {}", payload.contact);

    if payload.amount <= 0.0 {
        return Err(AppError::invalid_data("Amount must be greater than 0"));
    }
    if payload.contact.trim().is_empty() {
        return Err(AppError::invalid_data("Contact is required"));
    }

    let payment_id = Uuid::new_v4().to_string();
    let expire_by = (Utc::now() + Duration::minutes(LINK_EXPIRY_MINUTES)).timestamp();

    let link = state
        .gateway
        .create_payment_link(
            &payment_id,
            payload.amount,
            payload.contact.trim(),
            payload.description.as_deref(),
            expire_by,
        )
        .await?;

    let transaction = PaymentTransaction {
        id: None,
        payment_id: payment_id.clone(),
        gateway_id: link.id.clone(),
        amount: payload.amount,
        amount_minor: crate::services::gateway::to_minor_units(payload.amount),
        currency: "INR".to_string(),
        contact: payload.contact.trim().to_string(),
        status: link.status.clone(),
        short_url: link.short_url.clone(),
        expire_by,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };

    let collection: Collection<PaymentTransaction> = state.db.collection(TRANSACTIONS_COLLECTION);
    collection.insert_one(&transaction).await?;

    info!("Payment {} created, gateway link {}", payment_id, link.id);

    Ok(Json(CreatePaymentResponse {
        payment_id,
        payment_url: link.short_url,
        gateway_id: link.id,
        status: link.status,
    }))
}

/// JSON view of the payment page. The status is refreshed from the gateway
/// opportunistically; when the gateway is unreachable the stored record is
/// served as-is.
pub async fn get_payment_page(
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
) -> Result<Json<PaymentPageResponse>> {
    let transaction = find_transaction(&state, &payment_id).await?;

    let transaction = match reconciler::refresh_from_gateway(&state.db, &state.gateway, &transaction).await
    {
        Ok(refreshed) => refreshed,
        Err(e) => {
            warn!("Status refresh failed for {}: {}", payment_id, e);
            transaction
        }
    };

    Ok(Json(PaymentPageResponse {
        payment_id: transaction.payment_id,
        gateway_id: transaction.gateway_id,
        amount: transaction.amount,
        currency: transaction.currency,
        status: transaction.status,
        payment_url: transaction.short_url,
        expire_by: transaction.expire_by,
    }))
}

pub async fn check_payment_status(
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
) -> Result<Json<PaymentStatusResponse>> {
    let transaction = find_transaction(&state, &payment_id).await?;

    // Synchronous check: a gateway failure here surfaces as a 502
    let transaction =
        reconciler::refresh_from_gateway(&state.db, &state.gateway, &transaction).await?;

    Ok(Json(PaymentStatusResponse {
        payment_id: transaction.payment_id,
        gateway_id: transaction.gateway_id,
        status: transaction.status,
        amount: transaction.amount,
        contact: transaction.contact,
    }))
}

/// Browser redirect target registered with the gateway at link creation. The
/// refresh is best-effort; the customer gets an answer either way.
pub async fn payment_callback(
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
) -> Result<Json<CallbackResponse>> {
    info!("Callback hit for payment {}", payment_id);

    let transaction = find_transaction(&state, &payment_id).await?;

    let transaction = match reconciler::refresh_from_gateway(&state.db, &state.gateway, &transaction).await
    {
        Ok(refreshed) => refreshed,
        Err(e) => {
            warn!("Callback refresh failed for {}: {}", payment_id, e);
            transaction
        }
    };

    let success = transaction.status == "paid";
    Ok(Json(CallbackResponse {
        payment_id: transaction.payment_id,
        status: transaction.status,
        success,
    }))
}

pub async fn list_recent_payments(
    State(state): State<AppState>,
) -> Result<Json<Vec<PaymentTransaction>>> {
    let collection: Collection<PaymentTransaction> = state.db.collection(TRANSACTIONS_COLLECTION);

    let cursor = collection.find(doc! {}).await?;
    let mut transactions: Vec<PaymentTransaction> = cursor.try_collect().await?;

    transactions.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let recent: Vec<PaymentTransaction> = transactions.into_iter().take(20).collect();
    Ok(Json(recent))
}

async fn find_transaction(state: &AppState, payment_id: &str) -> Result<PaymentTransaction> {
    let collection: Collection<PaymentTransaction> = state.db.collection(TRANSACTIONS_COLLECTION);

    collection
        .find_one(doc! { "payment_id": payment_id })
        .await?
        .ok_or(AppError::TransactionNotFound)
}
