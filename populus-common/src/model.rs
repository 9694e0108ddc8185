//! Data model shared by the providers, the aggregator, the renderers and both
//! front ends.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::{PopulusError, Result};

pub const DEFAULT_COUNTRY: &str = "es";
pub const DEFAULT_TIMEFRAME: &str = "today 5-y";
pub const DEFAULT_MAX_RESULTS: u32 = 5;
pub const MAX_RESULTS_LIMIT: u32 = 10;

/// Search providers that contribute related terms.
///
/// The declaration order is the tie-break priority: when two providers return
/// the same term, the one that sorts first wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Google,
    Bing,
    #[serde(alias = "ddg")]
    DuckDuckGo,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [Self::Google, Self::Bing, Self::DuckDuckGo];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Google => "Google",
            Self::Bing => "Bing",
            Self::DuckDuckGo => "DuckDuckGo",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = PopulusError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "bing" => Ok(Self::Bing),
            "duckduckgo" | "ddg" => Ok(Self::DuckDuckGo),
            other => Err(PopulusError::Config(format!(
                "unknown provider `{other}`; expected google, bing or duckduckgo"
            ))),
        }
    }
}

/// Background of rendered word clouds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl FromStr for Theme {
    type Err = PopulusError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            other => Err(PopulusError::Config(format!(
                "unknown theme `{other}`; expected light or dark"
            ))),
        }
    }
}

/// One organic result returned by a search provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub source: ProviderKind,
}

/// A related search phrase enriched with its Google Trends peak.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedTerm {
    pub term: String,
    pub peak_date: Option<NaiveDate>,
    pub popularity_score: u32,
    pub source: ProviderKind,
}

impl RelatedTerm {
    /// A term whose Trends lookup failed or returned nothing.
    pub fn unscored(term: impl Into<String>, source: ProviderKind) -> Self {
        Self {
            term: term.into(),
            peak_date: None,
            popularity_score: 0,
            source,
        }
    }
}

/// One sample of a Google Trends interest-over-time series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub value: u32,
}

/// The highest sample of a series; the earliest one wins on ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendPeak {
    pub date: NaiveDate,
    pub score: u32,
}

impl TrendPeak {
    pub fn from_series(points: &[TrendPoint]) -> Option<Self> {
        let mut best: Option<TrendPoint> = None;
        for point in points {
            match best {
                Some(b) if point.value <= b.value => {}
                _ => best = Some(*point),
            }
        }
        best.map(|p| Self {
            date: p.date,
            score: p.value,
        })
    }
}

/// Interest in the main query for one region of the selected country.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionInterest {
    pub name: String,
    pub geo_code: String,
    pub value: u32,
}

/// A Knowledge Graph topic Trends associates with the main query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedTopic {
    pub title: String,
    /// Trends' own label such as `Topic` or `Film`.
    pub topic_type: String,
    pub value: u32,
}

/// What happened to one provider during an aggregation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderOutcome {
    pub provider: ProviderKind,
    pub related: usize,
    pub results: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProviderOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// A validated request for one run. Built once and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    query: String,
    country_code: String,
    wordcloud_path: Option<PathBuf>,
    timeframe: String,
    max_results: u32,
}

impl QueryRequest {
    /// Validate the query and country code.
    ///
    /// ```
    /// use populus_common::QueryRequest;
    ///
    /// let req = QueryRequest::new("  solar eclipse ", "US").unwrap();
    /// assert_eq!(req.query(), "solar eclipse");
    /// assert_eq!(req.country_code(), "us");
    /// assert_eq!(req.geo(), "US");
    /// assert!(QueryRequest::new("   ", "es").is_err());
    /// ```
    pub fn new(query: impl AsRef<str>, country_code: impl AsRef<str>) -> Result<Self> {
        let query = query.as_ref().trim();
        if query.is_empty() {
            return Err(PopulusError::InvalidRequest(
                "query must not be empty".into(),
            ));
        }

        let country = country_code.as_ref().trim();
        if country.len() != 2 || !country.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(PopulusError::InvalidRequest(format!(
                "country code `{country}` must be two ASCII letters (e.g. es, us)"
            )));
        }

        Ok(Self {
            query: query.to_string(),
            country_code: country.to_ascii_lowercase(),
            wordcloud_path: None,
            timeframe: DEFAULT_TIMEFRAME.to_string(),
            max_results: DEFAULT_MAX_RESULTS,
        })
    }

    pub fn with_wordcloud(mut self, path: Option<PathBuf>) -> Self {
        self.wordcloud_path = path;
        self
    }

    pub fn with_timeframe(mut self, timeframe: impl Into<String>) -> Self {
        let timeframe = timeframe.into();
        if !timeframe.trim().is_empty() {
            self.timeframe = timeframe.trim().to_string();
        }
        self
    }

    /// Use `requested` unless it is absent or blank, else `fallback`.
    pub fn with_timeframe_or(self, requested: Option<String>, fallback: &str) -> Self {
        match requested.filter(|t| !t.trim().is_empty()) {
            Some(timeframe) => self.with_timeframe(timeframe),
            None => self.with_timeframe(fallback),
        }
    }

    /// Clamped to `1..=10`, the Custom Search API page limit.
    pub fn with_max_results(mut self, max_results: u32) -> Self {
        self.max_results = max_results.clamp(1, MAX_RESULTS_LIMIT);
        self
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn country_code(&self) -> &str {
        &self.country_code
    }

    /// Uppercase form used as Google Trends `geo`.
    pub fn geo(&self) -> String {
        self.country_code.to_ascii_uppercase()
    }

    pub fn wordcloud_path(&self) -> Option<&Path> {
        self.wordcloud_path.as_deref()
    }

    pub fn timeframe(&self) -> &str {
        &self.timeframe
    }

    pub fn max_results(&self) -> u32 {
        self.max_results
    }
}
