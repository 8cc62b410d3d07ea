//! Movie-metadata API client.

pub mod client;
pub mod config;

pub use client::{DiscoverFilter, Movie, MovieClient, MoviePage, UpstreamError, DEFAULT_SORT};
pub use config::UpstreamConfig;
