//! Document paths for nested records
//!
//! Favorited recipes live at `users/{userId}/favoriteLists/{listId}/items/{itemId}`.
//! The owning user and list are read back out of the path rather than the record
//! payload.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Error, Result};

/// Root collection of per-user documents
pub const USERS_ROOT: &str = "users";
/// Collection holding a user's favorite lists
pub const FAVORITE_LISTS_COLLECTION: &str = "favoriteLists";
/// Collection-group name shared by every favorited item
pub const ITEMS_COLLECTION: &str = "items";
/// Sentinel user id for paths outside `users/`
pub const UNKNOWN_USER: &str = "unknown";

/// Slash-separated path of a stored document
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentPath(String);

impl DocumentPath {
    /// Wrap a raw path, dropping leading/trailing slashes
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        Self(path.trim_matches('/').to_string())
    }

    /// Path of a favorited item under a user's list
    pub fn favorite_item(user_id: &str, list_id: &str, item_id: &str) -> Self {
        Self(format!(
            "{USERS_ROOT}/{user_id}/{FAVORITE_LISTS_COLLECTION}/{list_id}/{ITEMS_COLLECTION}/{item_id}"
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> Vec<&str> {
        self.0.split('/').collect()
    }

    /// Last segment (the document key)
    pub fn document_id(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or_default()
    }

    /// Name of the collection directly containing the document
    pub fn collection(&self) -> Option<&str> {
        let segments = self.segments();
        if segments.len() < 2 {
            return None;
        }
        Some(segments[segments.len() - 2])
    }

    /// Owning user: the segment after `users`, or [`UNKNOWN_USER`]
    pub fn user_id(&self) -> &str {
        let segments = self.segments();
        if segments.len() >= 2 && segments[0] == USERS_ROOT {
            segments[1]
        } else {
            UNKNOWN_USER
        }
    }

    /// Owning favorite list, when the path has the full nested shape
    pub fn list_id(&self) -> Option<&str> {
        let segments = self.segments();
        if segments.len() >= 4
            && segments[0] == USERS_ROOT
            && segments[2] == FAVORITE_LISTS_COLLECTION
        {
            Some(segments[3])
        } else {
            None
        }
    }

    /// Check the path names a document: `collection/doc` pairs, no empty segments
    pub fn validate_document(&self) -> Result<()> {
        let segments = self.segments();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(Error::InvalidInput(format!(
                "Document path has an empty segment: '{}'",
                self.0
            )));
        }
        if segments.len() % 2 != 0 {
            return Err(Error::InvalidInput(format!(
                "Document path must alternate collection/document: '{}'",
                self.0
            )));
        }
        Ok(())
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentPath {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}
