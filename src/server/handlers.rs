//! Request handlers for the dashboard API

use std::sync::Arc;

use axum::{
    extract::{Multipart, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::data::Dataset;
use crate::quadrant;
use crate::training::{self, ModelKind};

use super::error::{ApiError, Result};
use super::state::AppState;

async fn require_login(state: &AppState) -> Result<()> {
    if !state.session.read().await.authenticated {
        return Err(ApiError::Unauthorized(
            "Log in before using the dashboard".to_string(),
        ));
    }
    Ok(())
}

// ============================================================================
// Identity gate
// ============================================================================

#[derive(Deserialize)]
pub struct LoginRequest {
    email: String,
}

/// Validate the address, forward it to the signup webhook, and open the
/// session once the webhook answers 200. A webhook rejection is a failed
/// login; a webhook outage is reported as such.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<serde_json::Value>> {
    let address = state.gate.validate(&request.email)?;
    if !state.gate.notify(&address).await? {
        return Err(ApiError::Unauthorized(
            "Login failed. The signup service did not accept this address.".to_string(),
        ));
    }

    let mut session = state.session.write().await;
    session.log_in(address.clone());
    info!(session = %session.id, "login accepted");

    Ok(Json(json!({
        "success": true,
        "email": address,
        "session": session.id,
    })))
}

// ============================================================================
// Data
// ============================================================================

/// Upload and normalize a Search Console CSV export
pub async fn upload_data(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>> {
    require_login(&state).await?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        let file_name = field.file_name().unwrap_or("export.csv").to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;

        info!(file = %file_name, bytes = data.len(), "received upload");

        if !file_name.ends_with(".csv") {
            return Err(ApiError::BadRequest(
                "Unsupported file format. Upload the Search Console CSV export.".to_string(),
            ));
        }

        let dataset = Dataset::from_csv_bytes(&data)?;
        let rows = dataset.len();
        let columns = dataset.column_names();

        let mut session = state.session.write().await;
        session.cache_upload(dataset);

        return Ok(Json(json!({
            "success": true,
            "rows": rows,
            "columns": columns,
        })));
    }

    Err(ApiError::BadRequest("No file uploaded".to_string()))
}

#[derive(Deserialize)]
pub struct PreviewQuery {
    rows: Option<usize>,
}

/// First N rows of the cached dataset, predictions included once trained
pub async fn get_data_preview(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PreviewQuery>,
) -> Result<Json<serde_json::Value>> {
    require_login(&state).await?;

    let session = state.session.read().await;
    let dataset = session
        .dataset
        .as_ref()
        .ok_or_else(|| ApiError::NotFound("No dataset uploaded".to_string()))?;

    let limit = query.rows.unwrap_or(10).min(100);
    let rows = dataset.preview(limit)?;

    Ok(Json(json!({
        "rows": rows.len(),
        "total_rows": dataset.len(),
        "data": rows,
    })))
}

// ============================================================================
// Analysis
// ============================================================================

#[derive(Deserialize)]
pub struct TrainRequest {
    model: String,
}

/// Train the selected model on the cached dataset and score every row.
/// Unknown model tags are rejected before any work happens.
pub async fn start_training(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TrainRequest>,
) -> Result<Json<serde_json::Value>> {
    require_login(&state).await?;

    let kind: ModelKind = request.model.parse().map_err(ApiError::from)?;

    let dataset = {
        let session = state.session.read().await;
        session
            .dataset
            .as_ref()
            .ok_or_else(|| ApiError::NotFound("No dataset uploaded".to_string()))?
            .clone()
    };

    // Fitting blocks; keep it off the async workers
    let outcome = tokio::task::spawn_blocking(move || -> crate::error::Result<_> {
        let (model, metrics) = training::train_with_metrics(&dataset, kind)?;
        let predictions = model.predict(&dataset.feature_matrix()?)?;
        let scored = dataset.with_predicted_clicks(&predictions)?;
        Ok((scored, model, metrics))
    })
    .await
    .map_err(|e| ApiError::Internal(format!("training task failed: {e}")))?;
    let (scored, model, metrics) = outcome?;

    let mut session = state.session.write().await;
    session.cache_training(scored, kind, model, metrics.mse);
    info!(model = %kind, mse = metrics.mse, "training complete");

    Ok(Json(json!({
        "success": true,
        "model": kind.as_str(),
        "mse": metrics.mse,
        "rmse": metrics.rmse,
        "mae": metrics.mae,
        "r2": metrics.r2,
        "test_rows": metrics.n_samples,
    })))
}

/// Four-way quadrant report over the cached dataset
pub async fn get_quadrants(State(state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>> {
    require_login(&state).await?;

    let session = state.session.read().await;
    let dataset = session
        .dataset
        .as_ref()
        .ok_or_else(|| ApiError::NotFound("No dataset uploaded".to_string()))?;

    let report = quadrant::classify(dataset)?;

    Ok(Json(json!({
        "mean_ctr": report.mean_ctr,
        "mean_position": report.mean_position,
        "total": report.total(),
        "buckets": report.buckets,
    })))
}

// ============================================================================
// Session
// ============================================================================

pub async fn get_session(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let session = state.session.read().await;
    Json(json!({
        "session": session.id,
        "created_at": session.created_at.to_rfc3339(),
        "authenticated": session.authenticated,
        "email": session.email,
        "rows": session.dataset.as_ref().map(|d| d.len()),
        "model": session.outcome.as_ref().map(|o| o.kind.as_str()),
        "mse": session.outcome.as_ref().map(|o| o.mse),
    }))
}

/// Drop the cached dataset and model, keeping the login
pub async fn reset_session(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let mut session = state.session.write().await;
    session.reset();
    info!(session = %session.id, "session reset");
    Json(json!({ "success": true }))
}

// ============================================================================
// System
// ============================================================================

pub async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
