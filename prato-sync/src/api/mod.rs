//! HTTP API handlers for prato-sync

pub mod health;
pub mod records;
pub mod sync;

pub use health::health_routes;
pub use records::record_routes;
pub use sync::sync_routes;
