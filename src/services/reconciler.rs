// services/reconciler.rs
//
// Transaction status reconciliation. All three status signals (status check,
// browser callback, webhook push) funnel through `reconcile`, which is the
// only code allowed to advance a stored transaction's status.

use chrono::Utc;
use mongodb::bson::{self, doc};
use mongodb::{Collection, Database};
use tracing::{error, info, warn};

use crate::errors::{AppError, Result};
use crate::models::invoice::{Invoice, INVOICES_COLLECTION};
use crate::models::transaction::{PaymentTransaction, TRANSACTIONS_COLLECTION};
use crate::services::gateway::{GatewayService, InvoiceEntity};

/// How a reconciliation signal identifies its transaction. Status checks and
/// callbacks know the local payment_id; webhooks only carry the gateway's id.
#[derive(Debug, Clone, Copy)]
pub enum ReconcileKey<'a> {
    PaymentId(&'a str),
    GatewayId(&'a str),
}

/// What a reconciliation signal should do to the stored record.
#[derive(Debug, PartialEq, Eq)]
pub struct ReconcilePlan {
    pub next_status: Option<String>,
    pub fetch_invoices: bool,
}

/// Coarse ordering over gateway status strings. Unrecognized strings slot in
/// above `created` so an opaque gateway state can still advance a fresh link,
/// but can never displace a terminal one.
fn status_rank(status: &str) -> u8 {
    match status {
        "created" => 0,
        "expired" | "cancelled" => 2,
        "paid" => 3,
        _ => 1,
    }
}

/// Pure reconciliation decision: given the stored status, the incoming status
/// and whether an invoice is already on record, decide what to write.
///
/// `paid` is terminal. Lower-ranked statuses never overwrite higher-ranked
/// ones; equal ranks may overwrite so one opaque gateway string can replace
/// another. Invoice retrieval is planned whenever the signal says `paid` and
/// no invoice is stored yet, so a fetch that failed on a previous delivery
/// gets retried on the next one.
pub fn plan(current_status: &str, incoming_status: &str, invoice_exists: bool) -> ReconcilePlan {
    let next_status = if current_status != "paid"
        && incoming_status != current_status
        && status_rank(incoming_status) >= status_rank(current_status)
    {
        Some(incoming_status.to_string())
    } else {
        None
    };

    ReconcilePlan {
        next_status,
        fetch_invoices: incoming_status == "paid" && !invoice_exists,
    }
}

/// Apply a trusted status signal to the stored transaction. Returns the
/// transaction as it stands after the update.
///
/// Invoice retrieval failures are logged and swallowed: the status update
/// stands and the caller's response is unaffected.
pub async fn reconcile(
    db: &Database,
    gateway: &GatewayService,
    key: ReconcileKey<'_>,
    source_status: &str,
) -> Result<PaymentTransaction> {
    let transactions: Collection<PaymentTransaction> = db.collection(TRANSACTIONS_COLLECTION);
    let invoices: Collection<Invoice> = db.collection(INVOICES_COLLECTION);

    let filter = match key {
        ReconcileKey::PaymentId(id) => doc! { "payment_id": id },
        ReconcileKey::GatewayId(id) => doc! { "gateway_id": id },
    };

    let mut transaction = transactions
        .find_one(filter)
        .await?
        .ok_or(AppError::TransactionNotFound)?;

    let invoice_exists = invoices
        .find_one(doc! { "payment_id": &transaction.payment_id })
        .await?
        .is_some();

    let plan = plan(&transaction.status, source_status, invoice_exists);

    if let Some(next_status) = &plan.next_status {
        let now = Utc::now();
        transactions
            .update_one(
                doc! { "payment_id": &transaction.payment_id },
                doc! { "$set": {
                    "status": next_status,
                    "updated_at": bson::DateTime::from_chrono(now),
                }},
            )
            .await?;

        info!(
            "Reconciled {}: {} -> {}",
            transaction.payment_id, transaction.status, next_status
        );

        transaction.status = next_status.clone();
        transaction.updated_at = now;
    }

    if plan.fetch_invoices {
        match gateway.fetch_invoices(&transaction.gateway_id).await {
            Ok(entities) => {
                for entity in entities {
                    store_invoice(&invoices, &transaction, entity).await?;
                }
            }
            Err(e) => {
                // Never surfaced to the caller; the next paid signal retries.
                error!(
                    "Invoice fetch failed for {}: {}",
                    transaction.payment_id, e
                );
            }
        }
    }

    Ok(transaction)
}

/// Fetch the link's current status from the gateway and reconcile with it.
pub async fn refresh_from_gateway(
    db: &Database,
    gateway: &GatewayService,
    transaction: &PaymentTransaction,
) -> Result<PaymentTransaction> {
    let link = gateway.fetch_payment_link(&transaction.gateway_id).await?;
    reconcile(
        db,
        gateway,
        ReconcileKey::PaymentId(&transaction.payment_id),
        &link.status,
    )
    .await
}

/// Upsert guarded on (payment_id, invoice_id): a duplicate webhook delivery
/// matches the existing document and `$setOnInsert` writes nothing.
async fn store_invoice(
    invoices: &Collection<Invoice>,
    transaction: &PaymentTransaction,
    entity: InvoiceEntity,
) -> Result<()> {
    let payload = bson::to_document(&entity.rest)?;

    let filter = doc! {
        "payment_id": &transaction.payment_id,
        "invoice_id": &entity.id,
    };

    let update = doc! {
        "$setOnInsert": {
            "payment_id": &transaction.payment_id,
            "gateway_id": &transaction.gateway_id,
            "invoice_id": &entity.id,
            "payload": payload,
            "short_url": entity.short_url.as_deref(),
            "created_at": bson::DateTime::from_chrono(Utc::now()),
        }
    };

    let result = invoices.update_one(filter, update).upsert(true).await?;

    if result.upserted_id.is_some() {
        info!(
            "Stored invoice {} for {}",
            entity.id, transaction.payment_id
        );
    } else {
        warn!(
            "Invoice {} for {} already on record, skipping",
            entity.id, transaction.payment_id
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn created_advances_to_paid_and_fetches_invoices() {
        let plan = plan("created", "paid", false);
        assert_eq!(plan.next_status.as_deref(), Some("paid"));
        assert!(plan.fetch_invoices);
    }

    #[test]
    fn paid_twice_fetches_invoices_exactly_once() {
        // First delivery: advance and fetch
        let first = plan("created", "paid", false);
        assert!(first.fetch_invoices);

        // Duplicate webhook after the invoice landed: no write, no fetch
        let second = plan("paid", "paid", true);
        assert_eq!(second.next_status, None);
        assert!(!second.fetch_invoices);
    }

    #[test]
    fn paid_never_regresses() {
        for earlier in ["created", "partially_paid", "expired", "cancelled"] {
            let plan = plan("paid", earlier, true);
            assert_eq!(plan.next_status, None, "paid must not regress to {}", earlier);
        }
    }

    #[test]
    fn terminal_statuses_resist_lower_ranks() {
        assert_eq!(plan("expired", "created", false).next_status, None);
        assert_eq!(plan("cancelled", "partially_paid", false).next_status, None);
    }

    #[test]
    fn expired_can_still_become_paid() {
        // Gateway-side late settlement: paid outranks everything
        let plan = plan("expired", "paid", false);
        assert_eq!(plan.next_status.as_deref(), Some("paid"));
        assert!(plan.fetch_invoices);
    }

    #[test]
    fn unknown_gateway_status_is_stored_opaquely() {
        let plan = plan("created", "under_review", false);
        assert_eq!(plan.next_status.as_deref(), Some("under_review"));
        assert!(!plan.fetch_invoices);
    }

    #[test]
    fn unknown_status_does_not_displace_terminal() {
        assert_eq!(plan("expired", "under_review", false).next_status, None);
        assert_eq!(plan("paid", "under_review", true).next_status, None);
    }

    #[test]
    fn equal_rank_opaque_statuses_may_overwrite() {
        let plan = plan("under_review", "on_hold", false);
        assert_eq!(plan.next_status.as_deref(), Some("on_hold"));
    }

    #[test]
    fn same_status_is_a_no_op() {
        let plan = plan("created", "created", false);
        assert_eq!(plan.next_status, None);
        assert!(!plan.fetch_invoices);
    }

    #[test]
    fn paid_without_invoice_retries_the_fetch() {
        // Earlier invoice fetch failed; the repeated paid signal retries it
        let plan = plan("paid", "paid", false);
        assert_eq!(plan.next_status, None);
        assert!(plan.fetch_invoices);
    }
}
