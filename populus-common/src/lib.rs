//! Common types and utilities shared across Populus crates.
//!
//! This crate defines the data model, the observability helpers, and the
//! workspace-wide error type. It stays dependency-light so every other crate
//! can depend on it.
//!
//! # Overview
//!
//! - [`QueryRequest`]: validated input of one run
//! - [`SearchResult`], [`RelatedTerm`], [`TrendPoint`], [`TrendPeak`]: data
//!   produced by providers and the aggregator
//! - [`ProviderKind`]: the providers and their tie-break priority
//! - [`observability`]: centralised tracing/logging initialisation
//! - [`PopulusError`] and [`Result`]: shared error handling
//!
//! # Examples
//!
//! ```rust
//! use populus_common::{ProviderKind, QueryRequest};
//!
//! let req = QueryRequest::new("solar eclipse", "es").unwrap();
//! assert_eq!(req.timeframe(), "today 5-y");
//! assert!(ProviderKind::Google < ProviderKind::Bing);
//! ```
use std::path::PathBuf;

pub mod model;
pub mod observability;

pub use model::{
    ProviderKind, ProviderOutcome, QueryRequest, RegionInterest, RelatedTerm, RelatedTopic,
    SearchResult, Theme, TrendPeak, TrendPoint, DEFAULT_COUNTRY, DEFAULT_MAX_RESULTS, DEFAULT_TIMEFRAME, MAX_RESULTS_LIMIT,
};

/// Error types used across the Populus workspace.
#[derive(thiserror::Error, Debug)]
pub enum PopulusError {
    /// Credentials or settings are missing or invalid. Raised before any
    /// network call is made.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The user-supplied request cannot be executed (empty query, bad country).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A single provider failed; the aggregator keeps going without it.
    #[error("{provider} provider error: {message}")]
    Provider {
        provider: ProviderKind,
        message: String,
    },

    /// The Trends lookup for one term failed; the term is kept unscored.
    #[error("Trends lookup failed for `{term}`: {message}")]
    TrendsLookup { term: String, message: String },

    /// Every enabled provider failed, so there is nothing to aggregate.
    #[error("All providers failed: {}", .0.join("; "))]
    AllProvidersFailed(Vec<String>),

    /// Writing an output artifact failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The word cloud could not be produced.
    #[error("Render error: {0}")]
    Render(String),
}

impl PopulusError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenient alias for results that use [`PopulusError`].
pub type Result<T> = std::result::Result<T, PopulusError>;
