//! DuckDuckGo Instant Answer API. Keyless; the country code is not used.
use async_trait::async_trait;
use populus_common::{ProviderKind, QueryRequest, SearchResult};
use populus_http::{HttpClient, RequestOpts};
use serde::Deserialize;
use serde_json::Value;
use std::borrow::Cow;
use std::time::Instant;
use url::Url;

use crate::{ProviderError, ProviderResponse, SearchProvider};

const SERVICE: &str = "DuckDuckGo";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstantAnswer {
    #[serde(default)]
    heading: String,
    #[serde(default)]
    abstract_text: String,
    #[serde(rename = "AbstractURL", default)]
    abstract_url: String,
    #[serde(default)]
    related_topics: Vec<Topic>,
}

/// Either a plain topic or a named group nesting more topics.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Topic {
    #[serde(default)]
    text: Option<String>,
    #[serde(rename = "FirstURL", default)]
    first_url: Option<String>,
    #[serde(default)]
    topics: Vec<Topic>,
}

pub struct DuckDuckGoSearch {
    http: HttpClient,
}

impl DuckDuckGoSearch {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoSearch {
    fn kind(&self) -> ProviderKind {
        ProviderKind::DuckDuckGo
    }

    async fn fetch(&self, request: &QueryRequest) -> Result<ProviderResponse, ProviderError> {
        let started = Instant::now();
        tracing::info!(target: "providers.duckduckgo", query = %request.query(), "duckduckgo.fetch.start");

        let raw: Value = self
            .http
            .get_json(
                "",
                RequestOpts {
                    query: Some(vec![
                        ("q", Cow::Borrowed(request.query())),
                        ("format", "json".into()),
                        ("no_html", "1".into()),
                        ("skip_disambig", "1".into()),
                    ]),
                    retries: Some(0),
                    ..Default::default()
                },
            )
            .await?;
        if !raw.is_object() {
            return Err(ProviderError::malformed(SERVICE, "expected a JSON object"));
        }
        let answer: InstantAnswer = serde_json::from_value(raw)
            .map_err(|e| ProviderError::malformed(SERVICE, e.to_string()))?;

        let response = convert(answer, request.max_results() as usize);
        tracing::info!(
            target: "providers.duckduckgo",
            related = response.related.len(),
            results = response.results.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "duckduckgo.fetch.success"
        );
        Ok(response)
    }
}

fn convert(answer: InstantAnswer, max_results: usize) -> ProviderResponse {
    let mut results = Vec::new();
    if !answer.abstract_url.is_empty() && !answer.abstract_text.is_empty() {
        results.push(SearchResult {
            title: answer.heading.clone(),
            url: answer.abstract_url.clone(),
            snippet: answer.abstract_text.clone(),
            source: ProviderKind::DuckDuckGo,
        });
    }

    let mut topics = Vec::new();
    flatten(answer.related_topics, &mut topics);

    let mut related = Vec::new();
    for (text, first_url) in topics {
        let Some(term) = topic_term(&text, &first_url) else {
            continue;
        };
        related.push(term.clone());
        results.push(SearchResult {
            title: term,
            url: first_url,
            snippet: text,
            source: ProviderKind::DuckDuckGo,
        });
    }
    results.truncate(max_results);

    ProviderResponse { related, results }
}

fn flatten(topics: Vec<Topic>, out: &mut Vec<(String, String)>) {
    for topic in topics {
        if !topic.topics.is_empty() {
            flatten(topic.topics, out);
            continue;
        }
        let text = topic.text.unwrap_or_default();
        let url = topic.first_url.unwrap_or_default();
        if !text.is_empty() || !url.is_empty() {
            out.push((text, url));
        }
    }
}

/// The title part of a topic ("Solar eclipse - An event where..."), or the
/// last path segment of its URL.
fn topic_term(text: &str, first_url: &str) -> Option<String> {
    if let Some((title, _)) = text.split_once(" - ") {
        let title = title.trim();
        if !title.is_empty() {
            return Some(title.to_string());
        }
    }
    let from_url = Url::parse(first_url)
        .ok()
        .and_then(|u| u.path_segments()?.filter(|s| !s.is_empty()).last().map(str::to_string))
        .and_then(|seg| urlencoding::decode(&seg).ok().map(|s| s.replace('_', " ")))
        .filter(|s| !s.trim().is_empty());
    if from_url.is_some() {
        return from_url;
    }
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}
