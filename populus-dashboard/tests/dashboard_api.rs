use async_trait::async_trait;
use chrono::NaiveDate;
use populus_aggregate::Aggregator;
use populus_common::{
    ProviderKind, QueryRequest, RegionInterest, RelatedTopic, SearchResult, TrendPoint,
};
use populus_dashboard::{AppState, DashboardServer};
use populus_providers::{ProviderError, ProviderResponse, SearchProvider, TrendsLookup};
use populus_render::{WordCloudOptions, WordCloudRenderer};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};

struct StaticProvider {
    kind: ProviderKind,
    fail: bool,
}

#[async_trait]
impl SearchProvider for StaticProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn fetch(&self, request: &QueryRequest) -> Result<ProviderResponse, ProviderError> {
        if self.fail {
            return Err(ProviderError::MissingCredential("TEST_KEY"));
        }
        Ok(ProviderResponse {
            related: vec![format!("{} 2024", request.query()), "eclipse glasses".into()],
            results: vec![SearchResult {
                title: "Eclipse".into(),
                url: "https://example.com/eclipse".into(),
                snippet: "about eclipses".into(),
                source: self.kind,
            }],
        })
    }
}

/// Fixed Trends data; remembers the timeframe of every timeline lookup.
#[derive(Default)]
struct FlatTrends {
    timeframes: Mutex<Vec<String>>,
}

#[async_trait]
impl TrendsLookup for FlatTrends {
    async fn interest_over_time(
        &self,
        _term: &str,
        _country: &str,
        timeframe: &str,
    ) -> Result<Vec<TrendPoint>, ProviderError> {
        self.timeframes.lock().unwrap().push(timeframe.to_string());
        Ok(vec![
            TrendPoint { date: NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(), value: 20 },
            TrendPoint { date: NaiveDate::from_ymd_opt(2024, 4, 8).unwrap(), value: 87 },
        ])
    }

    async fn related_queries(
        &self,
        _term: &str,
        _country: &str,
        _timeframe: &str,
    ) -> Result<Vec<String>, ProviderError> {
        Ok(Vec::new())
    }

    async fn interest_by_region(
        &self,
        _term: &str,
        _country: &str,
        _timeframe: &str,
    ) -> Result<Vec<RegionInterest>, ProviderError> {
        Ok(vec![
            RegionInterest { name: "Texas".into(), geo_code: "US-TX".into(), value: 100 },
            RegionInterest { name: "Ohio".into(), geo_code: "US-OH".into(), value: 62 },
        ])
    }

    async fn related_topics(
        &self,
        _term: &str,
        _country: &str,
        _timeframe: &str,
    ) -> Result<Vec<RelatedTopic>, ProviderError> {
        Ok(vec![RelatedTopic {
            title: "Solar eclipse".into(),
            topic_type: "Topic".into(),
            value: 100,
        }])
    }
}

async fn start(fail: bool) -> (DashboardServer, String) {
    let (server, base, _) = start_with_trends(fail).await;
    (server, base)
}

async fn start_with_trends(fail: bool) -> (DashboardServer, String, Arc<FlatTrends>) {
    let providers: Vec<Arc<dyn SearchProvider>> = vec![
        Arc::new(StaticProvider { kind: ProviderKind::Bing, fail }),
        Arc::new(StaticProvider { kind: ProviderKind::DuckDuckGo, fail }),
    ];
    let trends = Arc::new(FlatTrends::default());
    let aggregator = Aggregator::new(providers, trends.clone());
    let state = AppState::new(
        aggregator,
        WordCloudRenderer::new(WordCloudOptions::default()),
        "today 12-m",
        5,
    );
    let server = DashboardServer::start(state, "127.0.0.1", 0).await.unwrap();
    let base = format!("http://{}", server.addr());
    (server, base, trends)
}

#[tokio::test]
async fn serves_page_and_health() {
    let (_server, base) = start(false).await;
    let client = reqwest::Client::new();

    let page = client.get(format!("{base}/")).send().await.unwrap();
    assert!(page.status().is_success());
    assert!(page.text().await.unwrap().contains("Populus"));

    let health = client.get(format!("{base}/healthz")).send().await.unwrap();
    assert_eq!(health.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn search_returns_deduplicated_terms_and_timeline() {
    let (_server, base) = start(false).await;
    let resp = reqwest::Client::new()
        .post(format!("{base}/api/search"))
        .json(&json!({ "query": "solar eclipse", "country": "us" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    let terms = body["terms"].as_array().unwrap();
    assert_eq!(terms.len(), 2);
    assert_eq!(terms[0]["term"], "solar eclipse 2024");
    assert_eq!(terms[0]["source"], "bing");
    assert_eq!(terms[0]["peak_date"], "2024-04-08");
    assert_eq!(terms[0]["popularity_score"], 87);
    assert_eq!(body["results"].as_array().unwrap().len(), 2);
    assert_eq!(body["outcomes"].as_array().unwrap().len(), 2);
    assert_eq!(body["timeline"].as_array().unwrap().len(), 2);
    assert_eq!(body["regions"][0]["name"], "Texas");
    assert_eq!(body["regions"][1]["value"], 62);
    assert_eq!(body["topics"][0]["title"], "Solar eclipse");
    assert_eq!(body["topics"][0]["topic_type"], "Topic");
}

#[tokio::test]
async fn blank_timeframe_uses_configured_default() {
    let (_server, base, trends) = start_with_trends(false).await;
    let resp = reqwest::Client::new()
        .post(format!("{base}/api/search"))
        .json(&json!({ "query": "solar eclipse", "timeframe": "" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let seen = trends.timeframes.lock().unwrap();
    assert!(!seen.is_empty());
    assert!(seen.iter().all(|t| t == "today 12-m"));
}

#[tokio::test]
async fn body_without_query_is_bad_request_with_json_error() {
    let (_server, base) = start(false).await;
    let resp = reqwest::Client::new()
        .post(format!("{base}/api/search"))
        .json(&json!({ "country": "us" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("query"));
}

#[tokio::test]
async fn malformed_export_body_is_bad_request() {
    let (_server, base) = start(false).await;
    for path in ["/api/export/csv", "/api/export/wordcloud"] {
        let resp = reqwest::Client::new()
            .post(format!("{base}{path}"))
            .header("content-type", "application/json")
            .body("{\"terms\": 3")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400, "{path}");
        let body: Value = resp.json().await.unwrap();
        assert!(body["error"].is_string());
    }
}

#[tokio::test]
async fn invalid_request_is_bad_request() {
    let (_server, base) = start(false).await;
    let resp = reqwest::Client::new()
        .post(format!("{base}/api/search"))
        .json(&json!({ "query": "   " }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("query"));
}

#[tokio::test]
async fn all_providers_failing_is_bad_gateway() {
    let (_server, base) = start(true).await;
    let resp = reqwest::Client::new()
        .post(format!("{base}/api/search"))
        .json(&json!({ "query": "solar eclipse" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 502);
}

#[tokio::test]
async fn csv_export_is_an_attachment() {
    let (_server, base) = start(false).await;
    let resp = reqwest::Client::new()
        .post(format!("{base}/api/export/csv"))
        .json(&json!({ "terms": [
            { "term": "solar eclipse", "peak_date": "2024-04-08", "popularity_score": 87, "source": "google" }
        ]}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let disposition = resp.headers()["content-disposition"].to_str().unwrap().to_string();
    assert!(disposition.contains("results.csv"));
    let text = resp.text().await.unwrap();
    assert_eq!(text.lines().nth(1), Some("solar eclipse,2024-04-08,87"));
}

#[tokio::test]
async fn empty_wordcloud_is_unprocessable() {
    let (_server, base) = start(false).await;
    let resp = reqwest::Client::new()
        .post(format!("{base}/api/export/wordcloud"))
        .json(&json!({ "terms": [], "theme": "dark" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 422);
}
