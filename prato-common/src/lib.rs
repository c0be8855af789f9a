//! # Prato Common Library
//!
//! Shared code for the Prato sync services including:
//! - Record models for both record families (generated, favorited)
//! - Document paths for nested favorited items
//! - Event types (SyncEvent enum) and the EventBus
//! - Clock capability
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod path;
pub mod records;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{Error, Result};
pub use path::DocumentPath;
