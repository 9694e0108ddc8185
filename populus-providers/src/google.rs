//! Google: related terms from Trends "top related queries", organic results
//! from the Custom Search JSON API.
use async_trait::async_trait;
use populus_common::{ProviderKind, QueryRequest, SearchResult};
use populus_http::{Auth, HttpClient, RequestOpts};
use serde::Deserialize;
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Instant;

use crate::{ProviderError, ProviderResponse, SearchProvider, TrendsLookup};

#[derive(Debug, Deserialize)]
struct CustomSearchResponse {
    #[serde(default)]
    items: Vec<CustomSearchItem>,
}

#[derive(Debug, Deserialize)]
struct CustomSearchItem {
    title: String,
    link: String,
    #[serde(default)]
    snippet: String,
}

pub struct GoogleSearch {
    http: HttpClient,
    api_key: String,
    engine_id: String,
    trends: Arc<dyn TrendsLookup>,
}

impl GoogleSearch {
    pub fn new(
        http: HttpClient,
        api_key: impl Into<String>,
        engine_id: impl Into<String>,
        trends: Arc<dyn TrendsLookup>,
    ) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            engine_id: engine_id.into(),
            trends,
        }
    }

    async fn custom_search(&self, request: &QueryRequest) -> Result<Vec<SearchResult>, ProviderError> {
        let resp: CustomSearchResponse = self
            .http
            .get_json(
                "customsearch/v1",
                RequestOpts {
                    auth: Some(Auth::Query {
                        name: "key",
                        value: Cow::Borrowed(self.api_key.as_str()),
                    }),
                    query: Some(vec![
                        ("cx", Cow::Borrowed(self.engine_id.as_str())),
                        ("q", Cow::Borrowed(request.query())),
                        ("num", request.max_results().to_string().into()),
                        ("gl", Cow::Borrowed(request.country_code())),
                    ]),
                    retries: Some(0),
                    ..Default::default()
                },
            )
            .await?;

        Ok(resp
            .items
            .into_iter()
            .map(|item| SearchResult {
                title: item.title,
                url: item.link,
                snippet: item.snippet,
                source: ProviderKind::Google,
            })
            .collect())
    }
}

#[async_trait]
impl SearchProvider for GoogleSearch {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Google
    }

    async fn fetch(&self, request: &QueryRequest) -> Result<ProviderResponse, ProviderError> {
        let started = Instant::now();
        tracing::info!(target: "providers.google", query = %request.query(), "google.fetch.start");

        let related = self
            .trends
            .related_queries(request.query(), request.country_code(), request.timeframe())
            .await?;
        let results = self.custom_search(request).await?;

        tracing::info!(
            target: "providers.google",
            related = related.len(),
            results = results.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "google.fetch.success"
        );
        Ok(ProviderResponse { related, results })
    }
}
