//! Uncached movie search and lookup.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use super::error::ApiError;
use super::AppState;
use crate::upstream::{Movie, MoviePage, UpstreamError};

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    q: Option<String>,
    #[serde(default)]
    page: Option<String>,
}

/// `GET /v1/search/movies?q=&page=`
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<MoviePage>, ApiError> {
    let query = params
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::field("q", "is required"))?;

    let page = match params.page.as_deref().filter(|p| !p.is_empty()) {
        None => None,
        Some(raw) => match raw.parse::<u32>() {
            Ok(n) if (1..=1000).contains(&n) => Some(n),
            _ => return Err(ApiError::field("page", "must be between 1 and 1000")),
        },
    };

    Ok(Json(state.movies.search(query, page).await?))
}

/// `GET /v1/movies/{id}`
pub async fn movie(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Movie>, ApiError> {
    let id = id
        .parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| ApiError::field("id", "must be a positive integer"))?;

    match state.movies.movie(id).await {
        Ok(movie) => Ok(Json(movie)),
        Err(UpstreamError::Status(StatusCode::NOT_FOUND)) => Err(ApiError::NotFound),
        Err(e) => Err(e.into()),
    }
}
