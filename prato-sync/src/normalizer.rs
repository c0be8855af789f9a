//! Event normalizer
//!
//! Turns a stored record into the payload the downstream API expects. The
//! same logical event has two wire shapes:
//!
//! - **Single**: one record per call, posted by the record-created triggers.
//!   Optional text fields default to `""`, optional numbers to `null`.
//! - **Batched**: `{event_type, user_id, timestamp, data}` entries posted as
//!   one array by the on-demand reconciliation pass. `data` carries only a
//!   few fields and applies no defaults.
//!
//! Normalization never fails. Empty strings count as missing when walking a
//! fallback chain, zero counts as missing for numeric fields, and a missing
//! timestamp becomes "now" from the injected clock.

use prato_common::clock::iso8601;
use prato_common::records::{FavoritedRecipe, GeneratedRecipe, StoredRecord};
use prato_common::Clock;
use serde::Serialize;

/// Name used when a favorited item carries neither `name` nor `recipeName`
pub const DEFAULT_FAVORITE_NAME: &str = "Receita Favorita";

/// Single generated-recipe endpoint
pub const RECIPE_GENERATED_ENDPOINT: &str = "/firebase/recipe-generated";
/// Single favorited-recipe endpoint
pub const RECIPE_FAVORITED_ENDPOINT: &str = "/firebase/recipe-favorited";
/// Batch endpoint
pub const SYNC_ENDPOINT: &str = "/firebase/sync";

/// Body of `POST /firebase/recipe-generated`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedPayload {
    pub recipe_name: String,
    pub query: String,
    pub full_recipe: String,
    pub user_id: String,
    pub created_at: String,
    pub calories: Option<i64>,
    pub image_url: Option<String>,
    pub preparation_time: Option<i64>,
    pub servings: Option<i64>,
}

/// Body of `POST /firebase/recipe-favorited`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoritedPayload {
    pub name: String,
    pub response: String,
    pub added_at: String,
    pub user_id: String,
    pub query: String,
    pub image_url: Option<String>,
}

/// Per-record payload
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SinglePayload {
    Generated(GeneratedPayload),
    Favorited(FavoritedPayload),
}

/// `event_type` discriminator of a canonical event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    RecipeGenerate,
    SaveRecipe,
}

/// Event-specific part of a canonical event
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EventData {
    RecipeGenerate {
        #[serde(rename = "recipeName")]
        recipe_name: String,
        query: Option<String>,
        #[serde(rename = "fullRecipe")]
        full_recipe: Option<String>,
    },
    SaveRecipe {
        name: Option<String>,
        response: Option<String>,
    },
}

/// Entry of the `/firebase/sync` batch array
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalEvent {
    pub event_type: EventType,
    pub user_id: String,
    pub timestamp: String,
    pub data: EventData,
}

/// Outbound payload in either shape
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Event {
    Single(SinglePayload),
    Batched(Vec<CanonicalEvent>),
}

impl Event {
    /// Endpoint suffix this payload is posted to
    pub fn endpoint(&self) -> &'static str {
        match self {
            Event::Single(SinglePayload::Generated(_)) => RECIPE_GENERATED_ENDPOINT,
            Event::Single(SinglePayload::Favorited(_)) => RECIPE_FAVORITED_ENDPOINT,
            Event::Batched(_) => SYNC_ENDPOINT,
        }
    }
}

/// First non-empty value of a fallback chain
fn first_present<'a>(candidates: &[&'a Option<String>]) -> Option<&'a str> {
    candidates
        .iter()
        .copied()
        .filter_map(Option::as_deref)
        .find(|s| !s.is_empty())
}

fn nonzero(value: Option<i64>) -> Option<i64> {
    value.filter(|v| *v != 0)
}

fn present(value: &Option<String>) -> Option<String> {
    first_present(&[value]).map(str::to_string)
}

fn timestamp_or_now(
    value: Option<chrono::DateTime<chrono::Utc>>,
    clock: &dyn Clock,
) -> String {
    iso8601(value.unwrap_or_else(|| clock.now()))
}

/// Single-shape payload of a generated recipe
pub fn single_generated(record: &GeneratedRecipe, clock: &dyn Clock) -> GeneratedPayload {
    GeneratedPayload {
        recipe_name: record.recipe_name.clone(),
        query: present(&record.query).unwrap_or_default(),
        full_recipe: present(&record.full_recipe).unwrap_or_default(),
        user_id: record.user_id.clone(),
        created_at: timestamp_or_now(record.created_at, clock),
        calories: nonzero(record.calories),
        image_url: present(&record.image_url),
        preparation_time: nonzero(record.preparation_time),
        servings: nonzero(record.servings),
    }
}

/// Single-shape payload of a favorited item; `userId` comes from the path
pub fn single_favorited(record: &FavoritedRecipe, clock: &dyn Clock) -> FavoritedPayload {
    FavoritedPayload {
        name: first_present(&[&record.name, &record.recipe_name])
            .unwrap_or(DEFAULT_FAVORITE_NAME)
            .to_string(),
        response: first_present(&[&record.response, &record.full_recipe])
            .unwrap_or_default()
            .to_string(),
        added_at: timestamp_or_now(record.added_at, clock),
        user_id: record.path.user_id().to_string(),
        query: present(&record.query).unwrap_or_default(),
        image_url: present(&record.image_url),
    }
}

/// Batch-shape event of a generated recipe
pub fn batched_generated(record: &GeneratedRecipe, clock: &dyn Clock) -> CanonicalEvent {
    CanonicalEvent {
        event_type: EventType::RecipeGenerate,
        user_id: record.user_id.clone(),
        timestamp: timestamp_or_now(record.created_at, clock),
        data: EventData::RecipeGenerate {
            recipe_name: record.recipe_name.clone(),
            query: record.query.clone(),
            full_recipe: record.full_recipe.clone(),
        },
    }
}

/// Batch-shape event of a favorited item; `user_id` comes from the path
pub fn batched_favorited(record: &FavoritedRecipe, clock: &dyn Clock) -> CanonicalEvent {
    CanonicalEvent {
        event_type: EventType::SaveRecipe,
        user_id: record.path.user_id().to_string(),
        timestamp: timestamp_or_now(record.added_at, clock),
        data: EventData::SaveRecipe {
            name: first_present(&[&record.name, &record.recipe_name]).map(str::to_string),
            response: first_present(&[&record.response, &record.full_recipe])
                .map(str::to_string),
        },
    }
}

/// Single-shape payload of any record
pub fn normalize_single(record: &StoredRecord, clock: &dyn Clock) -> Event {
    match record {
        StoredRecord::Generated(r) => {
            Event::Single(SinglePayload::Generated(single_generated(r, clock)))
        }
        StoredRecord::Favorited(r) => {
            Event::Single(SinglePayload::Favorited(single_favorited(r, clock)))
        }
    }
}

/// Batch-shape events of a scanned page, generated first
pub fn normalize_batch(records: &[StoredRecord], clock: &dyn Clock) -> Event {
    Event::Batched(
        records
            .iter()
            .map(|record| match record {
                StoredRecord::Generated(r) => batched_generated(r, clock),
                StoredRecord::Favorited(r) => batched_favorited(r, clock),
            })
            .collect(),
    )
}
