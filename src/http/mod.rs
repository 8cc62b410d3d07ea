//! HTTP surface: routes, shared state and error responses.

pub mod error;
pub mod feed;
pub mod movies;

use axum::body::Bytes;
use axum::extract::FromRef;
use axum::routing::get;
use axum::{Json, Router};
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

use crate::cache::ExpiringCache;
use crate::upstream::MovieClient;
use crate::verifier::{Authenticated, Principal, Verifier};

pub use error::ApiError;
pub use feed::{FeedConfig, FeedQuery};

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub verifier: Arc<Verifier>,
    pub movies: Arc<MovieClient>,
    pub feed_cache: Arc<ExpiringCache<String, Bytes>>,
}

impl AppState {
    pub fn new(verifier: Verifier, movies: MovieClient, feed: &FeedConfig) -> Self {
        let feed_cache = ExpiringCache::new(Duration::from_secs(feed.cache_ttl_secs))
            .with_max_entries(feed.max_entries);

        Self {
            verifier: Arc::new(verifier),
            movies: Arc::new(movies),
            feed_cache: Arc::new(feed_cache),
        }
    }
}

impl FromRef<AppState> for Arc<Verifier> {
    fn from_ref(state: &AppState) -> Self {
        state.verifier.clone()
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/feed", get(feed::feed))
        .route("/v1/search/movies", get(movies::search))
        .route("/v1/movies/{id}", get(movies::movie))
        .route("/v1/me", get(me))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

/// `GET /v1/me`
async fn me(Authenticated(principal): Authenticated) -> Json<Principal> {
    Json(principal)
}
