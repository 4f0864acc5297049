//! Persistence submission of routed batches

use tracing::{debug, error};

use super::error::{ImportError, SubmitStage};
use super::router::RoutedBatches;
use crate::services::guest_store::ImportWriter;
use crate::types::GuestCategory;

/// Issue the writes in dependency order: guests, then revenue, then payments,
/// VIP before regular at each step. Empty batches are skipped. The first failure
/// aborts the remaining writes and the writer is dropped uncommitted.
pub async fn submit(writer: &mut dyn ImportWriter, batches: &RoutedBatches) -> Result<(), ImportError> {
    for category in GuestCategory::ALL {
        let guests = &batches.get(category).guests;
        if !guests.is_empty() {
            let stage = SubmitStage::Guests(category);
            debug!("Upserting {} guests into {}", guests.len(), category.guest_table());
            writer
                .upsert_guests(category, guests)
                .await
                .map_err(|e| persistence_error(stage, e))?;
        }
    }

    for category in GuestCategory::ALL {
        let revenue = &batches.get(category).revenue;
        if !revenue.is_empty() {
            let stage = SubmitStage::Revenue(category);
            debug!("Upserting {} revenue rows into {}", revenue.len(), category.revenue_table());
            writer
                .upsert_revenue(category, revenue)
                .await
                .map_err(|e| persistence_error(stage, e))?;
        }
    }

    for category in GuestCategory::ALL {
        let payments = &batches.get(category).payments;
        if !payments.is_empty() {
            let stage = SubmitStage::Payments(category);
            debug!("Inserting {} payments into {}", payments.len(), category.payment_table());
            writer
                .insert_payments(category, payments)
                .await
                .map_err(|e| persistence_error(stage, e))?;
        }
    }

    writer
        .commit()
        .await
        .map_err(|e| persistence_error(SubmitStage::Commit, e))
}

fn persistence_error(stage: SubmitStage, err: anyhow::Error) -> ImportError {
    error!("{}: {:#}", stage, err);
    ImportError::Persistence {
        stage,
        message: err.to_string(),
    }
}
