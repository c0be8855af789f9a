//! Sync state marker
//!
//! Writes the outcome of a delivery attempt back onto the record. Only the
//! status field group is touched; every other field stays as the writer left
//! it.

use prato_common::events::{EventBus, SyncEvent};
use prato_common::records::RecordKey;
use prato_common::Result;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::db::RecordStore;

#[derive(Clone)]
pub struct SyncStateMarker {
    store: Arc<dyn RecordStore>,
    event_bus: EventBus,
}

impl SyncStateMarker {
    pub fn new(store: Arc<dyn RecordStore>, event_bus: EventBus) -> Self {
        Self { store, event_bus }
    }

    /// `synced=true`, `syncedAt=now`, `recipeId=remote_id`
    ///
    /// Favorited items also get `listId` from their path.
    pub async fn mark_success(&self, key: &RecordKey, remote_id: &str) -> Result<()> {
        match self.store.write_success(key, remote_id).await {
            Ok(timestamp) => {
                info!(
                    family = key.family().as_str(),
                    record = %key,
                    recipe_id = %remote_id,
                    "Record synced"
                );
                self.event_bus.emit_lossy(SyncEvent::RecordSynced {
                    key: key.clone(),
                    recipe_id: remote_id.to_string(),
                    timestamp,
                });
                Ok(())
            }
            Err(e) => {
                error!(record = %key, error = %e, "Failed to mark record synced");
                Err(e)
            }
        }
    }

    /// `synced=false`, `syncError=message`, `lastSyncAttempt=now`
    pub async fn mark_failure(&self, key: &RecordKey, message: &str) -> Result<()> {
        match self.store.write_failure(key, message).await {
            Ok(timestamp) => {
                warn!(
                    family = key.family().as_str(),
                    record = %key,
                    error = %message,
                    "Record sync failed"
                );
                self.event_bus.emit_lossy(SyncEvent::RecordSyncFailed {
                    key: key.clone(),
                    error: message.to_string(),
                    timestamp,
                });
                Ok(())
            }
            Err(e) => {
                error!(record = %key, error = %e, "Failed to mark record sync failure");
                Err(e)
            }
        }
    }
}
