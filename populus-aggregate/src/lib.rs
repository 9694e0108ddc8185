//! Merges provider output into one de-duplicated, Trends-scored term list.
//!
//! Providers are consulted one after another in priority order (Google, Bing,
//! DuckDuckGo), so a term returned by several providers is always attributed
//! to the highest-priority one. Each unique term then gets exactly one Trends
//! peak lookup; a failed or empty lookup leaves the term unscored.
use populus_common::{
    PopulusError, ProviderKind, ProviderOutcome, QueryRequest, RegionInterest, RelatedTerm,
    RelatedTopic, Result, SearchResult, TrendPoint,
};
use populus_providers::{SearchProvider, TrendsLookup};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

/// Everything one run produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Aggregation {
    pub terms: Vec<RelatedTerm>,
    pub results: Vec<SearchResult>,
    pub outcomes: Vec<ProviderOutcome>,
}

/// Trends context for the main query, shown next to the term list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueryInsights {
    pub timeline: Vec<TrendPoint>,
    pub regions: Vec<RegionInterest>,
    pub topics: Vec<RelatedTopic>,
}

pub struct Aggregator {
    providers: Vec<Arc<dyn SearchProvider>>,
    trends: Arc<dyn TrendsLookup>,
    max_terms: Option<usize>,
}

impl Aggregator {
    pub fn new(mut providers: Vec<Arc<dyn SearchProvider>>, trends: Arc<dyn TrendsLookup>) -> Self {
        providers.sort_by_key(|p| p.kind());
        Self {
            providers,
            trends,
            max_terms: None,
        }
    }

    /// Stop after this many unique terms.
    pub fn with_max_terms(mut self, max_terms: Option<usize>) -> Self {
        self.max_terms = max_terms;
        self
    }

    pub fn provider_kinds(&self) -> Vec<ProviderKind> {
        self.providers.iter().map(|p| p.kind()).collect()
    }

    pub async fn run(&self, request: &QueryRequest) -> Result<Aggregation> {
        if self.providers.is_empty() {
            return Err(PopulusError::Config("no providers selected".into()));
        }
        let started = Instant::now();
        tracing::info!(
            target: "aggregate",
            query = %request.query(),
            country = %request.country_code(),
            providers = self.providers.len(),
            "aggregate.run.start"
        );

        let mut outcomes = Vec::with_capacity(self.providers.len());
        let mut failures = Vec::new();
        let mut candidates: Vec<(String, ProviderKind)> = Vec::new();
        let mut results = Vec::new();

        for provider in &self.providers {
            let kind = provider.kind();
            match provider.fetch(request).await {
                Ok(resp) => {
                    outcomes.push(ProviderOutcome {
                        provider: kind,
                        related: resp.related.len(),
                        results: resp.results.len(),
                        error: None,
                    });
                    candidates.extend(resp.related.into_iter().map(|t| (t, kind)));
                    results.extend(resp.results);
                }
                Err(err) => {
                    let err = err.into_populus(kind);
                    tracing::warn!(target: "aggregate", provider = %kind, error = %err, "aggregate.provider.failed");
                    failures.push(err.to_string());
                    outcomes.push(ProviderOutcome {
                        provider: kind,
                        related: 0,
                        results: 0,
                        error: Some(err.to_string()),
                    });
                }
            }
        }

        if failures.len() == self.providers.len() {
            tracing::error!(target: "aggregate", failures = failures.len(), "aggregate.run.all_failed");
            return Err(PopulusError::AllProvidersFailed(failures));
        }

        let unique = dedup_terms(candidates, self.max_terms);
        let mut terms = Vec::with_capacity(unique.len());
        for (term, source) in unique {
            terms.push(self.score(&term, source, request).await);
        }

        tracing::info!(
            target: "aggregate",
            terms = terms.len(),
            results = results.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "aggregate.run.success"
        );
        Ok(Aggregation {
            terms,
            results,
            outcomes,
        })
    }

    async fn score(&self, term: &str, source: ProviderKind, request: &QueryRequest) -> RelatedTerm {
        match self
            .trends
            .peak(term, request.country_code(), request.timeframe())
            .await
        {
            Ok(Some(peak)) => RelatedTerm {
                term: term.to_string(),
                peak_date: Some(peak.date),
                popularity_score: peak.score,
                source,
            },
            Ok(None) => {
                tracing::info!(target: "aggregate", term, "aggregate.trends.no_data");
                RelatedTerm::unscored(term, source)
            }
            Err(err) => {
                let err = PopulusError::TrendsLookup {
                    term: term.to_string(),
                    message: err.to_string(),
                };
                tracing::warn!(target: "aggregate", term, error = %err, "aggregate.trends.lookup_failed");
                RelatedTerm::unscored(term, source)
            }
        }
    }

    /// Timeline, regional interest and related topics for the main query.
    /// Each part degrades to empty on its own.
    pub async fn insights(&self, request: &QueryRequest) -> QueryInsights {
        let timeline = self.interest_over_time(request).await;
        let regions = match self
            .trends
            .interest_by_region(request.query(), request.country_code(), request.timeframe())
            .await
        {
            Ok(regions) => regions,
            Err(err) => {
                tracing::warn!(target: "aggregate", query = %request.query(), error = %err, "aggregate.regions.failed");
                Vec::new()
            }
        };
        let topics = match self
            .trends
            .related_topics(request.query(), request.country_code(), request.timeframe())
            .await
        {
            Ok(topics) => topics,
            Err(err) => {
                tracing::warn!(target: "aggregate", query = %request.query(), error = %err, "aggregate.topics.failed");
                Vec::new()
            }
        };
        QueryInsights {
            timeline,
            regions,
            topics,
        }
    }

    /// Interest over time for the main query; empty when the lookup fails.
    pub async fn interest_over_time(&self, request: &QueryRequest) -> Vec<TrendPoint> {
        match self
            .trends
            .interest_over_time(request.query(), request.country_code(), request.timeframe())
            .await
        {
            Ok(points) => points,
            Err(err) => {
                tracing::warn!(target: "aggregate", query = %request.query(), error = %err, "aggregate.timeline.failed");
                Vec::new()
            }
        }
    }
}

/// Trim, collapse whitespace runs, lowercase.
///
/// ```
/// assert_eq!(populus_aggregate::normalize_term("  Solar   ECLIPSE\t"), "solar eclipse");
/// ```
pub fn normalize_term(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Keep the first occurrence of each normalized term, in input order.
fn dedup_terms(
    candidates: Vec<(String, ProviderKind)>,
    max_terms: Option<usize>,
) -> Vec<(String, ProviderKind)> {
    let mut seen = HashSet::new();
    let mut unique = Vec::new();
    for (term, kind) in candidates {
        if max_terms.is_some_and(|cap| unique.len() >= cap) {
            break;
        }
        let key = normalize_term(&term);
        if key.is_empty() || !seen.insert(key) {
            continue;
        }
        unique.push((term.trim().to_string(), kind));
    }
    unique
}
