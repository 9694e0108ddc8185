//! Provider clients for the external search and trends services.
//!
//! - [`GoogleSearch`]: Trends related queries + Custom Search results
//! - [`BingSearch`]: Bing Web Search v7
//! - [`DuckDuckGoSearch`]: Instant Answer API
//! - [`TrendsClient`]: Google Trends interest over time and related queries
//!
//! Every request goes out once (`retries: Some(0)`); deciding what to do with
//! a failed provider is the aggregator's job.
use populus_common::ProviderKind;
use populus_config::PopulusConfig;
use populus_http::HttpClient;
use std::sync::Arc;

mod bing;
mod duckduckgo;
mod error;
mod google;
mod traits;
mod trends;

pub use bing::BingSearch;
pub use duckduckgo::DuckDuckGoSearch;
pub use error::ProviderError;
pub use google::GoogleSearch;
pub use traits::{ProviderResponse, SearchProvider, TrendsLookup};
pub use trends::TrendsClient;

fn http_client(base: &str, config: &PopulusConfig) -> Result<HttpClient, ProviderError> {
    Ok(HttpClient::new(base)?.with_timeout(config.http.timeout()))
}

/// Build the Trends client from configuration.
pub fn build_trends(config: &PopulusConfig) -> Result<Arc<TrendsClient>, ProviderError> {
    let http = http_client(&config.endpoints.trends, config)?;
    Ok(Arc::new(TrendsClient::new(http, config.trends.tz)))
}

/// Build one client per selected provider, in priority order.
///
/// Fails with [`ProviderError::MissingCredential`] when a selected provider
/// has no usable key.
pub fn build_providers(
    config: &PopulusConfig,
    selected: &[ProviderKind],
    trends: Arc<dyn TrendsLookup>,
) -> Result<Vec<Arc<dyn SearchProvider>>, ProviderError> {
    let mut kinds = selected.to_vec();
    kinds.sort();
    kinds.dedup();

    let creds = &config.credentials;
    let mut providers: Vec<Arc<dyn SearchProvider>> = Vec::with_capacity(kinds.len());
    for kind in kinds {
        let provider: Arc<dyn SearchProvider> = match kind {
            ProviderKind::Google => {
                let key = creds
                    .google_api_key()
                    .ok_or(ProviderError::MissingCredential("GOOGLE_API_KEY"))?;
                let cx = creds
                    .search_engine_id()
                    .ok_or(ProviderError::MissingCredential("SEARCH_ENGINE_ID"))?;
                let http = http_client(&config.endpoints.google_search, config)?;
                Arc::new(GoogleSearch::new(http, key, cx, trends.clone()))
            }
            ProviderKind::Bing => {
                let key = creds
                    .bing_api_key()
                    .ok_or(ProviderError::MissingCredential("BING_API_KEY"))?;
                let http = http_client(&config.endpoints.bing_search, config)?;
                Arc::new(BingSearch::new(http, key))
            }
            ProviderKind::DuckDuckGo => {
                let http = http_client(&config.endpoints.duckduckgo, config)?;
                Arc::new(DuckDuckGoSearch::new(http))
            }
        };
        providers.push(provider);
    }
    Ok(providers)
}
