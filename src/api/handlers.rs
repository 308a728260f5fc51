use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    error::{AppError, AppResult, EngineResult},
    models::{Participant, VenueRecommendation},
    services::{validation, Recommender},
};

use super::AppState;

// Request/Response types

#[derive(Debug, Deserialize)]
pub struct VenueQuery {
    pub category: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VenueResponse {
    pub user_id: i64,
    pub category: String,
    pub venues: Vec<VenueRecommendation>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SimilarUsersResponse {
    pub user_id: i64,
    pub similar_users: Vec<u32>,
}

#[derive(Debug, Deserialize)]
pub struct MeetingPointRequest {
    pub participants: Vec<Participant>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MeetingPointResponse {
    pub latitude: f64,
    pub longitude: f64,
    pub venue_id: String,
    pub category: String,
    pub shared_category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CategoryMatchQuery {
    pub q: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CategoryMatchResponse {
    pub category: String,
}

/// Runs an engine call on the blocking pool
///
/// Clustering and similarity are CPU-bound and must not stall the runtime.
async fn run_engine<T, F>(state: &AppState, call: F) -> AppResult<T>
where
    T: Send + 'static,
    F: FnOnce(&Recommender) -> EngineResult<T> + Send + 'static,
{
    let recommender = Arc::clone(&state.recommender);
    tokio::task::spawn_blocking(move || call(&recommender))
        .await
        .map_err(|e| AppError::Internal(format!("engine task failed: {}", e)))?
        .map_err(AppError::from)
}

fn resolve_category(recommender: &Recommender, input: Option<&str>) -> AppResult<String> {
    Ok(validation::check_category_name(
        recommender.dataset(),
        input.unwrap_or_default(),
    )?)
}

// Handlers

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Unvisited venues in categories similar to the requested one
pub async fn recommend_venues(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Query(query): Query<VenueQuery>,
) -> AppResult<Json<VenueResponse>> {
    let category = resolve_category(&state.recommender, query.category.as_deref())?;

    let venues = run_engine(&state, {
        let category = category.clone();
        move |engine| engine.recommend_venues(user_id, &category)
    })
    .await?;

    Ok(Json(VenueResponse {
        user_id,
        category,
        venues,
    }))
}

/// Users with the most similar category visits
pub async fn similar_users(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> AppResult<Json<SimilarUsersResponse>> {
    let similar_users =
        run_engine(&state, move |engine| engine.recommend_similar_users(user_id)).await?;

    Ok(Json(SimilarUsersResponse {
        user_id,
        similar_users,
    }))
}

/// Meeting place for a party of five
pub async fn meeting_point(
    State(state): State<AppState>,
    Json(request): Json<MeetingPointRequest>,
) -> AppResult<Json<MeetingPointResponse>> {
    let point = run_engine(&state, move |engine| {
        engine.recommend_meeting_point(&request.participants)
    })
    .await?;

    Ok(Json(MeetingPointResponse {
        latitude: point.location.latitude,
        longitude: point.location.longitude,
        venue_id: point.venue_id,
        category: point.category_name,
        shared_category: point.shared_category,
    }))
}

/// Resolves free text to a known category name
pub async fn match_category(
    State(state): State<AppState>,
    Query(query): Query<CategoryMatchQuery>,
) -> AppResult<Json<CategoryMatchResponse>> {
    let category = resolve_category(&state.recommender, query.q.as_deref())?;
    Ok(Json(CategoryMatchResponse { category }))
}
