//! Stored record models
//!
//! Both record families share the same sync lifecycle:
//! `NEW (no synced field) → UNSYNCED(false) ⇄ SYNCED(true)`.
//! There is no terminal failure state; every unsynced record stays eligible
//! for retry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::path::DocumentPath;

/// The two kinds of record tracked for sync
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordFamily {
    /// Top-level `recipes_generated` documents
    Generated,
    /// Items nested under `users/{userId}/favoriteLists/{listId}/items`
    Favorited,
}

impl RecordFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordFamily::Generated => "generated",
            RecordFamily::Favorited => "favorited",
        }
    }
}

/// Location of one stored record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "family", content = "key", rename_all = "snake_case")]
pub enum RecordKey {
    /// Document id in `recipes_generated`
    Generated(String),
    /// Full storage path of a favorited item
    Favorited(DocumentPath),
}

impl RecordKey {
    pub fn family(&self) -> RecordFamily {
        match self {
            RecordKey::Generated(_) => RecordFamily::Generated,
            RecordKey::Favorited(_) => RecordFamily::Favorited,
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKey::Generated(id) => write!(f, "recipes_generated/{id}"),
            RecordKey::Favorited(path) => write!(f, "{path}"),
        }
    }
}

/// Sync status fields written in place on every record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    /// Tri-state: absent, `false` (needs sync) or `true`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synced: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synced_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_attempt: Option<DateTime<Utc>>,
    /// Identifier assigned by the remote API once synced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipe_id: Option<String>,
}

/// Which records a reconciliation pass treats as unsynced
///
/// The two passes disagree about records with no `synced` field yet. The
/// store translates each variant into its own query filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsyncedPredicate {
    /// `synced == false`; absent field does not match
    ExplicitlyFalse,
    /// `synced != true`; absent field matches
    NotTrue,
}

/// A recipe generated for a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedRecipe {
    pub id: String,
    pub recipe_name: String,
    pub query: Option<String>,
    pub full_recipe: Option<String>,
    pub user_id: String,
    pub created_at: Option<DateTime<Utc>>,
    pub calories: Option<i64>,
    pub image_url: Option<String>,
    pub preparation_time: Option<i64>,
    pub servings: Option<i64>,
    #[serde(flatten)]
    pub status: SyncStatus,
}

/// A recipe a user saved into one of their favorite lists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoritedRecipe {
    pub path: DocumentPath,
    pub name: Option<String>,
    /// Alternate name field written by older clients
    pub recipe_name: Option<String>,
    pub response: Option<String>,
    /// Alternate body field written by older clients
    pub full_recipe: Option<String>,
    pub added_at: Option<DateTime<Utc>>,
    pub query: Option<String>,
    pub image_url: Option<String>,
    /// Owning list, copied from the path once synced
    pub list_id: Option<String>,
    #[serde(flatten)]
    pub status: SyncStatus,
}

/// A record of either family, as read from the store
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StoredRecord {
    Generated(GeneratedRecipe),
    Favorited(FavoritedRecipe),
}

impl StoredRecord {
    pub fn key(&self) -> RecordKey {
        match self {
            StoredRecord::Generated(r) => RecordKey::Generated(r.id.clone()),
            StoredRecord::Favorited(r) => RecordKey::Favorited(r.path.clone()),
        }
    }
}

impl From<GeneratedRecipe> for StoredRecord {
    fn from(record: GeneratedRecipe) -> Self {
        StoredRecord::Generated(record)
    }
}

impl From<FavoritedRecipe> for StoredRecord {
    fn from(record: FavoritedRecipe) -> Self {
        StoredRecord::Favorited(record)
    }
}

/// Fields supplied by the writer of a new generated recipe
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGeneratedRecipe {
    #[serde(default)]
    pub id: Option<String>,
    pub recipe_name: String,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub full_recipe: Option<String>,
    pub user_id: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub calories: Option<i64>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub preparation_time: Option<i64>,
    #[serde(default)]
    pub servings: Option<i64>,
    /// Writers may pre-seed `synced: false`; usually absent
    #[serde(default)]
    pub synced: Option<bool>,
}

impl NewGeneratedRecipe {
    pub fn into_record(self, id: String) -> GeneratedRecipe {
        GeneratedRecipe {
            id,
            recipe_name: self.recipe_name,
            query: self.query,
            full_recipe: self.full_recipe,
            user_id: self.user_id,
            created_at: self.created_at,
            calories: self.calories,
            image_url: self.image_url,
            preparation_time: self.preparation_time,
            servings: self.servings,
            status: SyncStatus {
                synced: self.synced,
                ..SyncStatus::default()
            },
        }
    }
}

/// Fields supplied by the writer of a new favorited item
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFavoritedRecipe {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub recipe_name: Option<String>,
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub full_recipe: Option<String>,
    #[serde(default)]
    pub added_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub synced: Option<bool>,
}

impl NewFavoritedRecipe {
    pub fn into_record(self, path: DocumentPath) -> FavoritedRecipe {
        FavoritedRecipe {
            path,
            name: self.name,
            recipe_name: self.recipe_name,
            response: self.response,
            full_recipe: self.full_recipe,
            added_at: self.added_at,
            query: self.query,
            image_url: self.image_url,
            list_id: None,
            status: SyncStatus {
                synced: self.synced,
                ..SyncStatus::default()
            },
        }
    }
}
