//! HTTP client for the movie-metadata API.

use anyhow::Context;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use super::config::UpstreamConfig;

/// Sort order used by `discover` when none is given.
pub const DEFAULT_SORT: &str = "popularity.desc";

/// Upstream call failures.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("upstream returned status {0}")]
    Status(StatusCode),
}

/// Movie summary as returned by the upstream API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub overview: String,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
}

/// One page of movie results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoviePage {
    #[serde(default, deserialize_with = "null_as_default")]
    pub page: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_results: Option<u64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub results: Vec<Movie>,
}

// The API sends `null` for blank text fields; read it as the empty value.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Filters for the discover listing. Empty fields are not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoverFilter {
    pub page: Option<u32>,
    pub genre: Option<String>,
    pub year: Option<String>,
    pub region: Option<String>,
    pub sort_by: Option<String>,
}

/// Client for the movie-metadata API.
pub struct MovieClient {
    api_key: String,
    base_url: String,
    http_client: reqwest::Client,
}

impl MovieClient {
    pub fn new(config: &UpstreamConfig) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    /// Trending movies for `window` (`day` when empty).
    pub async fn trending(
        &self,
        window: Option<&str>,
        page: Option<u32>,
        region: Option<&str>,
    ) -> Result<MoviePage, UpstreamError> {
        let window = window.filter(|w| !w.is_empty()).unwrap_or("day");
        let mut params = Vec::new();
        push_page(&mut params, page);
        push_opt(&mut params, "region", region);

        self.get_json(&format!("/trending/movie/{window}"), &params).await
    }

    pub async fn discover(&self, filter: &DiscoverFilter) -> Result<MoviePage, UpstreamError> {
        let mut params = Vec::new();
        push_page(&mut params, filter.page);
        push_opt(&mut params, "with_genres", filter.genre.as_deref());
        push_opt(&mut params, "primary_release_year", filter.year.as_deref());
        push_opt(&mut params, "region", filter.region.as_deref());
        let sort_by = filter
            .sort_by
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SORT);
        params.push(("sort_by", sort_by.to_string()));

        self.get_json("/discover/movie", &params).await
    }

    pub async fn search(&self, query: &str, page: Option<u32>) -> Result<MoviePage, UpstreamError> {
        let mut params = vec![("query", query.to_string())];
        push_page(&mut params, page);

        self.get_json("/search/movie", &params).await
    }

    pub async fn movie(&self, id: i64) -> Result<Movie, UpstreamError> {
        self.get_json(&format!("/movie/{id}"), &[]).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, UpstreamError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(path = %path, "Calling movie API");

        let response = self
            .http_client
            .get(&url)
            .query(&[("api_key", self.api_key.as_str())])
            .query(params)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            warn!(path = %path, status = %status, "Movie API returned an error status");
            return Err(UpstreamError::Status(status));
        }

        Ok(response.json::<T>().await?)
    }
}

fn push_page(params: &mut Vec<(&'static str, String)>, page: Option<u32>) {
    if let Some(page) = page.filter(|p| *p > 0) {
        params.push(("page", page.to_string()));
    }
}

fn push_opt(params: &mut Vec<(&'static str, String)>, name: &'static str, value: Option<&str>) {
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        params.push((name, value.to_string()));
    }
}
