//! Event types for the Prato event system
//!
//! Provides the shared event definitions and the EventBus. The record store
//! publishes `RecordCreated` on every insert; that is the trigger the relay
//! reacts to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::records::RecordKey;

/// Kind of reconciliation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassMode {
    /// Manual batch delivery (`synced == false`, up to 100 per family)
    OnDemand,
    /// Interval stamp without delivery (`synced != true`, up to 50 per family)
    Scheduled,
}

/// Prato event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SyncEvent {
    /// A record was written by an external actor
    ///
    /// Triggers:
    /// - Trigger dispatcher: run the per-record sync
    RecordCreated {
        key: RecordKey,
        timestamp: DateTime<Utc>,
    },

    /// A record was delivered and marked synced
    RecordSynced {
        key: RecordKey,
        /// Remote identifier now stored on the record
        recipe_id: String,
        timestamp: DateTime<Utc>,
    },

    /// A per-record delivery attempt failed and was marked on the record
    RecordSyncFailed {
        key: RecordKey,
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// A reconciliation pass finished
    ReconciliationCompleted {
        mode: PassMode,
        /// Records acknowledged (on-demand) or stamped (scheduled)
        processed: u64,
        /// Candidate records found by the scan
        total: usize,
        timestamp: DateTime<Utc>,
    },
}

impl SyncEvent {
    pub fn event_type(&self) -> &str {
        match self {
            SyncEvent::RecordCreated { .. } => "RecordCreated",
            SyncEvent::RecordSynced { .. } => "RecordSynced",
            SyncEvent::RecordSyncFailed { .. } => "RecordSyncFailed",
            SyncEvent::ReconciliationCompleted { .. } => "ReconciliationCompleted",
        }
    }
}

/// Central event distribution bus
///
/// Two `tokio::broadcast` channels:
/// - every event goes to [`EventBus::subscribe`] receivers
/// - `RecordCreated` is also copied to [`EventBus::subscribe_created`]
///   receivers, so a burst of status events cannot push creation notices out
///   of the trigger dispatcher's buffer
///
/// Publishing never blocks; a slow receiver sees `Lagged`.
///
/// # Examples
///
/// ```
/// use prato_common::events::{EventBus, SyncEvent};
/// use prato_common::records::RecordKey;
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
/// let mut created_rx = event_bus.subscribe_created();
///
/// event_bus.emit_lossy(SyncEvent::RecordCreated {
///     key: RecordKey::Generated("doc1".to_string()),
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert_eq!(rx.try_recv().unwrap().event_type(), "RecordCreated");
/// assert_eq!(created_rx.try_recv().unwrap().event_type(), "RecordCreated");
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SyncEvent>,
    created_tx: broadcast::Sender<SyncEvent>,
}

impl EventBus {
    /// Creates a new EventBus; `capacity` applies to each channel
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        let (created_tx, _) = broadcast::channel(capacity);
        Self { tx, created_tx }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.tx.subscribe()
    }

    /// Subscribe to future `RecordCreated` events only
    pub fn subscribe_created(&self) -> broadcast::Receiver<SyncEvent> {
        self.created_tx.subscribe()
    }

    /// Emit an event, ignoring whether anyone is listening
    pub fn emit_lossy(&self, event: SyncEvent) {
        if matches!(event, SyncEvent::RecordCreated { .. }) {
            let _ = self.created_tx.send(event.clone());
        }
        let _ = self.tx.send(event);
    }
}
