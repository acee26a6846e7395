//! HTTP request handlers
//!
//! Triggers forward to the engine handle and answer with the
//! post-transition snapshot. Dashboard reads answer 409 until the show has
//! reached `dashboard`.

use crate::api::server::AppContext;
use crate::playback::events::EngineSnapshot;
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::NaiveDate;
use reel_common::dataset::{gallery_refs, Message, Meta, TimelineEntry};
use reel_common::{Dataset, Stage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
    git_hash: String,
    build_timestamp: String,
    build_profile: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct AuthRequest {
    passphrase: String,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    meta: Meta,
    timeline: Vec<TimelineEntry>,
    quotes: Vec<Message>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    q: String,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    query: String,
    count: usize,
    results: Vec<Message>,
}

#[derive(Debug, Deserialize)]
pub struct OnThisDayQuery {
    date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OnThisDayResponse {
    date: NaiveDate,
    count: usize,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
pub struct GalleryResponse {
    images: Vec<String>,
}

type ApiError = (StatusCode, Json<StatusResponse>);

fn api_error(code: StatusCode, status: impl Into<String>) -> ApiError {
    (
        code,
        Json(StatusResponse {
            status: status.into(),
        }),
    )
}

fn engine_error(e: crate::Error) -> ApiError {
    warn!("Engine unavailable: {}", e);
    api_error(StatusCode::SERVICE_UNAVAILABLE, format!("error: {}", e))
}

// ============================================================================
// Health
// ============================================================================

/// GET /health - Liveness plus build identification
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "reel-player".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: env!("GIT_HASH").to_string(),
        build_timestamp: env!("BUILD_TIMESTAMP").to_string(),
        build_profile: env!("BUILD_PROFILE").to_string(),
    })
}

// ============================================================================
// Engine State and Triggers
// ============================================================================

/// GET /state - Current engine snapshot
pub async fn get_state(
    State(ctx): State<AppContext>,
) -> Result<Json<EngineSnapshot>, ApiError> {
    ctx.engine.snapshot().await.map(Json).map_err(engine_error)
}

/// POST /auth - Verify the passphrase and leave `password`
pub async fn authenticate(
    State(ctx): State<AppContext>,
    Json(req): Json<AuthRequest>,
) -> Result<Json<EngineSnapshot>, ApiError> {
    if !ctx.gate.verify(&req.passphrase) {
        info!("Passphrase rejected");
        return Err(api_error(StatusCode::UNAUTHORIZED, "invalid passphrase"));
    }

    info!("Passphrase accepted");
    ctx.engine.authenticate().await.map(Json).map_err(engine_error)
}

/// POST /start - Begin the narrative from `ready`
pub async fn start(State(ctx): State<AppContext>) -> Result<Json<EngineSnapshot>, ApiError> {
    ctx.engine.start().await.map(Json).map_err(engine_error)
}

/// POST /skip - Complete the current stage now
pub async fn skip(State(ctx): State<AppContext>) -> Result<Json<EngineSnapshot>, ApiError> {
    ctx.engine.skip().await.map(Json).map_err(engine_error)
}

/// POST /advance - Active segment finished
pub async fn advance(State(ctx): State<AppContext>) -> Result<Json<EngineSnapshot>, ApiError> {
    ctx.engine.advance().await.map(Json).map_err(engine_error)
}

// ============================================================================
// Assets
// ============================================================================

/// GET /assets/:id - Serve a preloaded asset
pub async fn get_asset(
    State(ctx): State<AppContext>,
    Path(id): Path<u64>,
) -> Result<Response, ApiError> {
    let Some(handle) = ctx.engine.assets().get_by_id(id) else {
        return Err(api_error(StatusCode::NOT_FOUND, format!("no asset {}", id)));
    };

    debug!(id, source_ref = %handle.source_ref, bytes = handle.bytes.len(), "Serving asset");

    let content_type = handle
        .content_type
        .clone()
        .unwrap_or_else(|| "application/octet-stream".to_string());

    Ok((
        [(header::CONTENT_TYPE, content_type)],
        Body::from(handle.bytes.clone()),
    )
        .into_response())
}

// ============================================================================
// Dashboard
// ============================================================================

/// Dataset for dashboard reads, or 409 before the dashboard is reached
async fn dashboard_dataset(ctx: &AppContext) -> Result<Arc<Dataset>, ApiError> {
    let stage = ctx.state.get_stage().await;
    if stage != Stage::Dashboard {
        return Err(api_error(
            StatusCode::CONFLICT,
            format!("dashboard not available in stage {}", stage),
        ));
    }

    ctx.state
        .get_dataset()
        .await
        .ok_or_else(|| api_error(StatusCode::CONFLICT, "dataset unavailable"))
}

/// GET /dashboard/summary - Meta, timeline and quotes
pub async fn dashboard_summary(
    State(ctx): State<AppContext>,
) -> Result<Json<SummaryResponse>, ApiError> {
    let dataset = dashboard_dataset(&ctx).await?;

    Ok(Json(SummaryResponse {
        meta: dataset.meta.clone(),
        timeline: dataset.wrapped.timeline.clone(),
        quotes: dataset.quotes().into_iter().cloned().collect(),
    }))
}

/// GET /dashboard/search?q= - Case-insensitive message search
pub async fn dashboard_search(
    State(ctx): State<AppContext>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResponse>, ApiError> {
    let dataset = dashboard_dataset(&ctx).await?;

    let results: Vec<Message> = dataset
        .search(
            &query.q,
            ctx.dashboard.search_min_chars,
            ctx.dashboard.search_limit,
        )
        .into_iter()
        .cloned()
        .collect();

    Ok(Json(SearchResponse {
        query: query.q,
        count: results.len(),
        results,
    }))
}

/// GET /dashboard/on-this-day?date=YYYY-MM-DD - Same month and day, any year
///
/// Defaults to today (local time).
pub async fn dashboard_on_this_day(
    State(ctx): State<AppContext>,
    Query(query): Query<OnThisDayQuery>,
) -> Result<Json<OnThisDayResponse>, ApiError> {
    let dataset = dashboard_dataset(&ctx).await?;

    let date = match query.date.as_deref() {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| {
            api_error(StatusCode::BAD_REQUEST, format!("invalid date '{}': {}", raw, e))
        })?,
        None => chrono::Local::now().date_naive(),
    };

    let messages: Vec<Message> = dataset.on_this_day(date).into_iter().cloned().collect();

    Ok(Json(OnThisDayResponse {
        date,
        count: messages.len(),
        messages,
    }))
}

/// GET /dashboard/gallery - Gallery image references
pub async fn dashboard_gallery(
    State(ctx): State<AppContext>,
) -> Result<Json<GalleryResponse>, ApiError> {
    dashboard_dataset(&ctx).await?;

    Ok(Json(GalleryResponse {
        images: gallery_refs(
            &ctx.dashboard.gallery_dir,
            ctx.dashboard.gallery_count,
            &ctx.dashboard.gallery_extension,
        ),
    }))
}
