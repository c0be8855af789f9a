//! Per-record sync triggers
//!
//! Every record written to the store is announced on the event bus as
//! `RecordCreated`. The dispatcher picks those up and runs one sync task per
//! record: load, normalize, deliver, mark.
//!
//! Failures are marked on the record and returned to the caller. Nothing is
//! retried here; the record stays `synced=false` until a later pass.

use prato_common::events::SyncEvent;
use prato_common::records::{RecordKey, StoredRecord};
use prato_common::{DocumentPath, Error};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::delivery::DeliveryError;
use crate::error::SyncError;
use crate::normalizer::{normalize_single, Event};
use crate::AppState;

/// Sync a newly generated recipe; returns the remote identifier
pub async fn on_recipe_generated(state: &AppState, id: &str) -> Result<String, SyncError> {
    let record = state
        .store
        .get_generated(id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Record not found: recipes_generated/{id}")))?;

    sync_record(state, record.into()).await
}

/// Sync a newly favorited item; returns the remote identifier
pub async fn on_recipe_favorited(
    state: &AppState,
    path: &DocumentPath,
) -> Result<String, SyncError> {
    let record = state
        .store
        .get_favorited(path)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Record not found: {path}")))?;

    sync_record(state, record.into()).await
}

/// Run the trigger matching the record's family
pub async fn on_record_created(state: &AppState, key: &RecordKey) -> Result<String, SyncError> {
    match key {
        RecordKey::Generated(id) => on_recipe_generated(state, id).await,
        RecordKey::Favorited(path) => on_recipe_favorited(state, path).await,
    }
}

async fn sync_record(state: &AppState, record: StoredRecord) -> Result<String, SyncError> {
    let key = record.key();
    let event = normalize_single(&record, state.clock.as_ref());

    debug!(record = %key, endpoint = event.endpoint(), "Delivering record");

    let remote_id = match deliver(state, &event).await {
        Ok(remote_id) => remote_id,
        Err(e) => {
            // A failed marker write is logged by the marker; the delivery error wins
            let _ = state.marker.mark_failure(&key, &e.to_string()).await;
            return Err(e.into());
        }
    };

    if let Err(write_err) = state.marker.mark_success(&key, &remote_id).await {
        let _ = state
            .marker
            .mark_failure(&key, &write_err.to_string())
            .await;
        return Err(SyncError::Write(write_err));
    }

    Ok(remote_id)
}

async fn deliver(state: &AppState, event: &Event) -> Result<String, DeliveryError> {
    let response = state.client.send(event).await?;
    response
        .recipe_id()
        .ok_or_else(|| DeliveryError::Parse("response has no recipe_id".to_string()))
}

/// Spawn the dispatcher task
///
/// Subscribes to the creation channel before returning, so records created
/// after this call are seen. Each `RecordCreated` gets its own task;
/// completion order is not guaranteed.
pub fn spawn_trigger_dispatcher(
    state: AppState,
    cancel_token: CancellationToken,
) -> JoinHandle<()> {
    let rx = state.event_bus.subscribe_created();
    tokio::spawn(run_trigger_dispatcher(state, rx, cancel_token))
}

async fn run_trigger_dispatcher(
    state: AppState,
    mut rx: broadcast::Receiver<SyncEvent>,
    cancel_token: CancellationToken,
) {
    info!("Trigger dispatcher started");

    loop {
        let received = tokio::select! {
            _ = cancel_token.cancelled() => break,
            received = rx.recv() => received,
        };

        match received {
            Ok(SyncEvent::RecordCreated { key, .. }) => {
                let state = state.clone();
                tokio::spawn(async move {
                    if let Err(e) = on_record_created(&state, &key).await {
                        warn!(
                            family = key.family().as_str(),
                            record = %key,
                            error = %e,
                            "Record sync trigger failed"
                        );
                    }
                });
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                // Only creation notices share this channel, so lag means an insert
                // burst outran the dispatcher
                warn!(
                    skipped,
                    "Trigger dispatcher lagged, creation notices dropped; \
                     those records wait for a reconciliation pass"
                );
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }

    info!("Trigger dispatcher stopped");
}
