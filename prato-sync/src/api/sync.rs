//! Manual sync endpoint

use axum::{extract::State, routing::post, Json, Router};
use tracing::error;

use crate::error::ApiResult;
use crate::scanner::{run_on_demand_pass, BatchOutcome};
use crate::AppState;

/// POST /syncManual
///
/// Runs one on-demand reconciliation pass. Any failure is a 500 carrying the
/// error message. Other methods are rejected with 405 by the router before
/// the store is touched.
pub async fn sync_manual(State(state): State<AppState>) -> ApiResult<Json<BatchOutcome>> {
    let outcome = run_on_demand_pass(&state).await.map_err(|e| {
        error!(error = %e, "Manual sync failed");
        e
    })?;

    Ok(Json(outcome))
}

/// Build manual sync routes
pub fn sync_routes() -> Router<AppState> {
    Router::new().route("/syncManual", post(sync_manual))
}
