//! Reconciliation scanner
//!
//! Two bulk passes over both record families:
//!
//! - **On demand** (manual trigger): records with `synced == false`, up to 100
//!   per family, normalized into one batch and posted to `/firebase/sync`.
//!   Records are not marked afterwards.
//! - **Scheduled** (interval trigger): records with `synced != true`, up to 50
//!   per family, stamped `synced=true` in one atomic write. Nothing is
//!   delivered.
//!
//! The passes select different records on purpose: a record that was never
//! attempted (no `synced` field) is only picked up by the scheduled pass.

use prato_common::events::{PassMode, SyncEvent};
use prato_common::records::{RecordKey, StoredRecord, UnsyncedPredicate};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::SyncError;
use crate::normalizer::{normalize_batch, Event};
use crate::AppState;

/// Per-family page size of the on-demand pass
pub const ON_DEMAND_LIMIT: u32 = 100;

/// Per-family page size of the scheduled pass
pub const SCHEDULED_LIMIT: u32 = 50;

/// Result of an on-demand pass, returned as the manual sync response body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchOutcome {
    pub message: String,
    /// Events the API reports as processed
    pub processed: u64,
    /// Events sent
    pub total: usize,
}

/// Candidate records of both families, generated first
async fn scan(
    state: &AppState,
    predicate: UnsyncedPredicate,
    limit: u32,
) -> Result<Vec<StoredRecord>, SyncError> {
    let generated = state.store.unsynced_generated(predicate, limit).await?;
    let favorited = state.store.unsynced_favorited(predicate, limit).await?;

    Ok(generated
        .into_iter()
        .map(StoredRecord::from)
        .chain(favorited.into_iter().map(StoredRecord::from))
        .collect())
}

/// Deliver every explicitly unsynced record in one batch
pub async fn run_on_demand_pass(state: &AppState) -> Result<BatchOutcome, SyncError> {
    let records = scan(state, UnsyncedPredicate::ExplicitlyFalse, ON_DEMAND_LIMIT).await?;

    if records.is_empty() {
        info!("On-demand sync: no events to sync");
        complete(state, PassMode::OnDemand, 0, 0);
        return Ok(BatchOutcome {
            message: "No events to sync".to_string(),
            processed: 0,
            total: 0,
        });
    }

    let event = normalize_batch(&records, state.clock.as_ref());
    let total = match &event {
        Event::Batched(events) => events.len(),
        Event::Single(_) => 1,
    };

    let response = state.client.send(&event).await?;
    let processed = match response.processed() {
        Some(processed) => processed,
        None => {
            warn!(body = %response.0, "Batch response has no numeric processed count");
            0
        }
    };

    info!(processed, total, "On-demand sync delivered batch");
    complete(state, PassMode::OnDemand, processed, total);

    Ok(BatchOutcome {
        message: "Sync completed".to_string(),
        processed,
        total,
    })
}

/// Stamp every not-yet-synced record as synced; returns the stamped count
pub async fn run_scheduled_pass(state: &AppState) -> Result<usize, SyncError> {
    let records = scan(state, UnsyncedPredicate::NotTrue, SCHEDULED_LIMIT).await?;
    let keys: Vec<RecordKey> = records.iter().map(StoredRecord::key).collect();

    let stamped = state.store.stamp_synced(&keys).await?;

    info!(stamped, "Scheduled sync stamped records");
    complete(state, PassMode::Scheduled, stamped as u64, keys.len());

    Ok(stamped)
}

fn complete(state: &AppState, mode: PassMode, processed: u64, total: usize) {
    state
        .event_bus
        .emit_lossy(SyncEvent::ReconciliationCompleted {
            mode,
            processed,
            total,
            timestamp: state.clock.now(),
        });
}
