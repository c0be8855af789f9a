//! Record ingest and read-back endpoints
//!
//! Stand-in for the external writers (app clients) that create records. Every
//! insert is announced on the event bus, which fires the per-record trigger.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use prato_common::records::{
    FavoritedRecipe, GeneratedRecipe, NewFavoritedRecipe, NewGeneratedRecipe,
};
use prato_common::DocumentPath;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct CreatedGenerated {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct CreatedFavorited {
    pub path: DocumentPath,
}

/// POST /records/generated
///
/// The id is optional; a UUID v4 is assigned when it is missing or empty.
pub async fn create_generated(
    State(state): State<AppState>,
    Json(new): Json<NewGeneratedRecipe>,
) -> ApiResult<(StatusCode, Json<CreatedGenerated>)> {
    let id = match new.id.as_deref() {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => Uuid::new_v4().to_string(),
    };
    if id.contains('/') {
        return Err(ApiError::BadRequest(format!("Invalid record id: {id}")));
    }

    let record = new.into_record(id.clone());
    state.store.insert_generated(&record).await?;

    info!(id = %id, "Generated recipe stored");
    Ok((StatusCode::CREATED, Json(CreatedGenerated { id })))
}

/// GET /records/generated/:id
pub async fn get_generated(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<GeneratedRecipe>> {
    state
        .store
        .get_generated(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("recipes_generated/{id}")))
}

/// POST /users/:user_id/favoriteLists/:list_id/items/:item_id
pub async fn create_favorited(
    State(state): State<AppState>,
    Path((user_id, list_id, item_id)): Path<(String, String, String)>,
    Json(new): Json<NewFavoritedRecipe>,
) -> ApiResult<(StatusCode, Json<CreatedFavorited>)> {
    let path = DocumentPath::favorite_item(&user_id, &list_id, &item_id);
    path.validate_document().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let record = new.into_record(path.clone());
    state.store.insert_favorited(&record).await?;

    info!(path = %path, "Favorited recipe stored");
    Ok((StatusCode::CREATED, Json(CreatedFavorited { path })))
}

/// GET /users/:user_id/favoriteLists/:list_id/items/:item_id
pub async fn get_favorited(
    State(state): State<AppState>,
    Path((user_id, list_id, item_id)): Path<(String, String, String)>,
) -> ApiResult<Json<FavoritedRecipe>> {
    let path = DocumentPath::favorite_item(&user_id, &list_id, &item_id);
    state
        .store
        .get_favorited(&path)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(path.to_string()))
}

/// Build record routes
pub fn record_routes() -> Router<AppState> {
    Router::new()
        .route("/records/generated", post(create_generated))
        .route("/records/generated/:id", get(get_generated))
        .route(
            "/users/:user_id/favoriteLists/:list_id/items/:item_id",
            post(create_favorited).get(get_favorited),
        )
}
