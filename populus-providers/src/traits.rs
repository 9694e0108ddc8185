use async_trait::async_trait;
use populus_common::{
    ProviderKind, QueryRequest, RegionInterest, RelatedTopic, SearchResult, TrendPeak, TrendPoint,
};

use crate::ProviderError;

/// What one search provider produced for a query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderResponse {
    pub related: Vec<String>,
    pub results: Vec<SearchResult>,
}

/// A search backend that yields related terms and organic results.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    async fn fetch(&self, request: &QueryRequest) -> Result<ProviderResponse, ProviderError>;
}

/// Google Trends style popularity lookups.
///
/// `country` is the two-letter code in any case; `timeframe` uses the Trends
/// syntax (`today 5-y`, `today 12-m`, `2024-01-01 2024-06-30`).
#[async_trait]
pub trait TrendsLookup: Send + Sync {
    async fn interest_over_time(
        &self,
        term: &str,
        country: &str,
        timeframe: &str,
    ) -> Result<Vec<TrendPoint>, ProviderError>;

    /// Highest point of the series; `None` when the series is empty.
    async fn peak(
        &self,
        term: &str,
        country: &str,
        timeframe: &str,
    ) -> Result<Option<TrendPeak>, ProviderError> {
        let series = self.interest_over_time(term, country, timeframe).await?;
        Ok(TrendPeak::from_series(&series))
    }

    async fn related_queries(
        &self,
        term: &str,
        country: &str,
        timeframe: &str,
    ) -> Result<Vec<String>, ProviderError>;

    /// Regions of `country` with non-zero interest, highest first.
    async fn interest_by_region(
        &self,
        term: &str,
        country: &str,
        timeframe: &str,
    ) -> Result<Vec<RegionInterest>, ProviderError>;

    /// Top related topics in Trends' own order.
    async fn related_topics(
        &self,
        term: &str,
        country: &str,
        timeframe: &str,
    ) -> Result<Vec<RelatedTopic>, ProviderError>;
}
