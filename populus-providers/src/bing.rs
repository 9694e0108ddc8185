//! Bing Web Search v7.
use async_trait::async_trait;
use populus_common::{ProviderKind, QueryRequest, SearchResult};
use populus_http::{Auth, HttpClient, HttpError, RequestOpts};
use reqwest::header::{HeaderName, HeaderValue};
use serde::Deserialize;
use std::borrow::Cow;
use std::time::Instant;

use crate::{ProviderError, ProviderResponse, SearchProvider};

const SUBSCRIPTION_HEADER: &str = "ocp-apim-subscription-key";

#[derive(Debug, Deserialize)]
struct BingResponse {
    #[serde(rename = "webPages", default)]
    web_pages: Option<ValueList<WebPage>>,
    #[serde(rename = "relatedSearches", default)]
    related_searches: Option<ValueList<RelatedSearch>>,
}

#[derive(Debug, Deserialize)]
struct ValueList<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct WebPage {
    name: String,
    url: String,
    #[serde(default)]
    snippet: String,
}

#[derive(Debug, Deserialize)]
struct RelatedSearch {
    text: String,
}

pub struct BingSearch {
    http: HttpClient,
    api_key: String,
}

impl BingSearch {
    pub fn new(http: HttpClient, api_key: impl Into<String>) -> Self {
        Self {
            http,
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl SearchProvider for BingSearch {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Bing
    }

    async fn fetch(&self, request: &QueryRequest) -> Result<ProviderResponse, ProviderError> {
        let started = Instant::now();
        tracing::info!(target: "providers.bing", query = %request.query(), "bing.fetch.start");

        let key = HeaderValue::from_str(&self.api_key)
            .map_err(|e| HttpError::Build(e.to_string()))?;
        let resp: BingResponse = self
            .http
            .get_json(
                "v7.0/search",
                RequestOpts {
                    auth: Some(Auth::Header {
                        name: HeaderName::from_static(SUBSCRIPTION_HEADER),
                        value: key,
                    }),
                    query: Some(vec![
                        ("q", Cow::Borrowed(request.query())),
                        ("count", request.max_results().to_string().into()),
                        ("cc", request.geo().into()),
                    ]),
                    retries: Some(0),
                    ..Default::default()
                },
            )
            .await?;

        let results: Vec<SearchResult> = resp
            .web_pages
            .map(|pages| pages.value)
            .unwrap_or_default()
            .into_iter()
            .map(|page| SearchResult {
                title: page.name,
                url: page.url,
                snippet: page.snippet,
                source: ProviderKind::Bing,
            })
            .collect();
        let related: Vec<String> = resp
            .related_searches
            .map(|r| r.value)
            .unwrap_or_default()
            .into_iter()
            .map(|r| r.text)
            .collect();

        tracing::info!(
            target: "providers.bing",
            related = related.len(),
            results = results.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "bing.fetch.success"
        );
        Ok(ProviderResponse { related, results })
    }
}
