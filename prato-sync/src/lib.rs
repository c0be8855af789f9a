//! prato-sync library - recipe sync relay
//!
//! Watches the record store for newly written recipes, pushes each one to the
//! downstream recipe API and writes the outcome back onto the record. Bulk
//! reconciliation passes (manual and scheduled) catch whatever the per-record
//! triggers missed.

use axum::Router;
use prato_common::events::EventBus;
use prato_common::Clock;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod db;
pub mod delivery;
pub mod error;
pub mod marker;
pub mod normalizer;
pub mod scanner;
pub mod scheduler;
pub mod triggers;

use db::RecordStore;
use delivery::DeliveryClient;
use marker::SyncStateMarker;

/// Shared handles passed to HTTP handlers, triggers and passes
#[derive(Clone)]
pub struct AppState {
    /// Document store
    pub store: Arc<dyn RecordStore>,
    /// Downstream recipe API
    pub client: DeliveryClient,
    /// Fallback timestamps for records without their own
    pub clock: Arc<dyn Clock>,
    pub event_bus: EventBus,
    pub marker: SyncStateMarker,
}

impl AppState {
    pub fn new(
        store: Arc<dyn RecordStore>,
        client: DeliveryClient,
        clock: Arc<dyn Clock>,
        event_bus: EventBus,
    ) -> Self {
        let marker = SyncStateMarker::new(store.clone(), event_bus.clone());
        Self {
            store,
            client,
            clock,
            event_bus,
            marker,
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::sync_routes())
        .merge(api::record_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
