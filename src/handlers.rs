use crate::error::ApiError;
use crate::models::{HealthResponse, RecommendationsQuery, SearchQuery, TrackResponse};
use crate::state::AppState;
use axum::{
    Json, Router,
    extract::{Query, State, rejection::QueryRejection},
    routing::get,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/search", get(search_tracks))
        .route("/recommendations", get(get_recommendations))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        message: "SoundMap API is running".to_string(),
    })
}

pub async fn search_tracks(
    State(state): State<Arc<AppState>>,
    params: Result<Query<SearchQuery>, QueryRejection>,
) -> Result<Json<Vec<TrackResponse>>, ApiError> {
    let Query(params) = params.map_err(invalid_query)?;
    let term = params.query.unwrap_or_default();

    let tracks = state.service.search(&term, params.limit).await?;
    Ok(Json(tracks.into_iter().map(TrackResponse::from).collect()))
}

pub async fn get_recommendations(
    State(state): State<Arc<AppState>>,
    params: Result<Query<RecommendationsQuery>, QueryRejection>,
) -> Result<Json<Vec<TrackResponse>>, ApiError> {
    let Query(params) = params.map_err(invalid_query)?;

    let tracks = state.service.recommend(params.limit).await?;
    Ok(Json(tracks.into_iter().map(TrackResponse::from).collect()))
}

fn invalid_query(rejection: QueryRejection) -> ApiError {
    ApiError::InvalidRequest(rejection.body_text())
}
