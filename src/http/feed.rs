//! Cached movie feed.
//!
//! Responses are cached as serialized bodies under a canonical form of the
//! validated query, so `?type=trending` and `?window=day&type=trending`
//! share an entry. Upstream failures are never cached.

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use super::error::{ApiError, FieldErrors};
use super::AppState;
use crate::cache::{DEFAULT_FEED_CACHE_TTL_SECS, DEFAULT_MAX_ENTRIES};
use crate::upstream::{DiscoverFilter, DEFAULT_SORT};

const MAX_PAGE: u32 = 1000;

/// Longest accepted feed cache TTL in seconds.
pub const MAX_FEED_CACHE_TTL_SECS: u64 = 24 * 60 * 60;
const WINDOWS: [&str; 2] = ["day", "week"];
const SORT_ORDERS: [&str; 3] = ["popularity.desc", "vote_average.desc", "release_date.desc"];

/// Feed cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeedConfig {
    /// Lifetime of a cached feed response in seconds.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,

    /// Upper bound on cached responses. Zero means unbounded.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

fn default_cache_ttl() -> u64 {
    DEFAULT_FEED_CACHE_TTL_SECS
}

fn default_max_entries() -> usize {
    DEFAULT_MAX_ENTRIES
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl(),
            max_entries: default_max_entries(),
        }
    }
}

impl FeedConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.cache_ttl_secs == 0 {
            return Err("Feed cache TTL must be at least one second".to_string());
        }
        if self.cache_ttl_secs > MAX_FEED_CACHE_TTL_SECS {
            return Err(format!(
                "Feed cache TTL must be at most {MAX_FEED_CACHE_TTL_SECS} seconds"
            ));
        }
        Ok(())
    }
}

/// Which upstream listing backs the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedQuery {
    Trending {
        window: String,
        page: Option<u32>,
        region: Option<String>,
    },
    Discover(DiscoverFilter),
}

impl FeedQuery {
    /// Validate raw query parameters. Empty values count as absent.
    pub fn parse(params: &HashMap<String, String>) -> Result<Self, FieldErrors> {
        let get = |name: &str| params.get(name).map(String::as_str).filter(|v| !v.is_empty());
        let mut errors = FieldErrors::new();

        let kind = get("type");
        match kind {
            None => {
                errors.insert("type".into(), "is required".into());
            }
            Some("trending" | "discover") => {}
            Some(_) => {
                errors.insert("type".into(), "must be one of trending discover".into());
            }
        }

        let window = get("window");
        if window.is_some_and(|w| !WINDOWS.contains(&w)) {
            errors.insert("window".into(), format!("must be one of {}", WINDOWS.join(" ")));
        }

        let page = match get("page").map(str::parse::<i64>) {
            None => None,
            Some(Ok(n)) if n < 1 => {
                errors.insert("page".into(), "must be >= 1".into());
                None
            }
            Some(Ok(n)) if n > i64::from(MAX_PAGE) => {
                errors.insert("page".into(), format!("must be <= {MAX_PAGE}"));
                None
            }
            Some(Ok(n)) => u32::try_from(n).ok(),
            Some(Err(_)) => {
                errors.insert("page".into(), "must be an integer".into());
                None
            }
        };

        let region = get("region");
        if region.is_some_and(|r| r.chars().count() != 2) {
            errors.insert("region".into(), "must be exactly 2 characters".into());
        }

        let sort_by = get("sort_by");
        if sort_by.is_some_and(|s| !SORT_ORDERS.contains(&s)) {
            errors.insert("sort_by".into(), format!("must be one of {}", SORT_ORDERS.join(" ")));
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        let region = region.map(str::to_string);
        Ok(match kind {
            Some("trending") => FeedQuery::Trending {
                window: window.unwrap_or("day").to_string(),
                page,
                region,
            },
            _ => FeedQuery::Discover(DiscoverFilter {
                page,
                genre: get("genre").map(str::to_string),
                year: get("year").map(str::to_string),
                region,
                sort_by: Some(sort_by.unwrap_or(DEFAULT_SORT).to_string()),
            }),
        })
    }

    /// Canonical cache key: relevant fields only, defaults applied, sorted
    /// by name, values percent-encoded.
    pub fn cache_key(&self) -> String {
        let mut fields: Vec<(&str, String)> = Vec::new();
        match self {
            FeedQuery::Trending { window, page, region } => {
                fields.push(("type", "trending".to_string()));
                fields.push(("window", window.clone()));
                push_field(&mut fields, "page", page.map(|p| p.to_string()));
                push_field(&mut fields, "region", region.clone());
            }
            FeedQuery::Discover(filter) => {
                fields.push(("type", "discover".to_string()));
                push_field(&mut fields, "page", filter.page.map(|p| p.to_string()));
                push_field(&mut fields, "genre", filter.genre.clone());
                push_field(&mut fields, "year", filter.year.clone());
                push_field(&mut fields, "region", filter.region.clone());
                push_field(&mut fields, "sort_by", filter.sort_by.clone());
            }
        }
        fields.sort_by(|a, b| a.0.cmp(b.0));

        fields
            .iter()
            .map(|(name, value)| format!("{name}={}", urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

fn push_field<'a>(fields: &mut Vec<(&'a str, String)>, name: &'a str, value: Option<String>) {
    if let Some(value) = value {
        fields.push((name, value));
    }
}

/// `GET /v1/feed`
pub async fn feed(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let query = FeedQuery::parse(&params).map_err(ApiError::InvalidQuery)?;
    let key = query.cache_key();
    let max_age = state.feed_cache.ttl().as_secs();

    if let Some(body) = state.feed_cache.get(&key) {
        debug!(key = %key, "Feed cache hit");
        return Ok(json_body(body, max_age));
    }

    debug!(key = %key, "Feed cache miss");
    let page = match &query {
        FeedQuery::Trending { window, page, region } => {
            state
                .movies
                .trending(Some(window.as_str()), *page, region.as_deref())
                .await?
        }
        FeedQuery::Discover(filter) => state.movies.discover(filter).await?,
    };

    let body = Bytes::from(serde_json::to_vec(&page)?);
    state.feed_cache.set(key, body.clone());

    Ok(json_body(body, max_age))
}

fn json_body(body: Bytes, max_age: u64) -> Response {
    let cache_control = HeaderValue::from_str(&format!("public, max-age={max_age}"))
        .unwrap_or_else(|_| HeaderValue::from_static("no-store"));
    (
        StatusCode::OK,
        [
            (CONTENT_TYPE, HeaderValue::from_static("application/json")),
            (CACHE_CONTROL, cache_control),
        ],
        body,
    )
        .into_response()
}
