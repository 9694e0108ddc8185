//! Web dashboard: a single HTML page plus a small JSON API.
//!
//! ## Endpoints
//!
//! - `GET /` the dashboard page
//! - `POST /api/search` run an aggregation, returns terms, results, outcomes
//!   plus the main query's timeline, regional interest and related topics
//! - `POST /api/export/csv` CSV download of the posted terms
//! - `POST /api/export/wordcloud` PNG download of the posted terms
//! - `GET /healthz` liveness probe
//!
//! Bodies that fail to decode get the same `400 {"error": ...}` shape as
//! invalid requests. The server keeps no state between requests besides the
//! configured clients.
use axum::Router;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Json, Response};
use axum::routing::{get, post};
use populus_aggregate::{Aggregation, Aggregator, QueryInsights};
use populus_common::{
    DEFAULT_COUNTRY, PopulusError, ProviderOutcome, QueryRequest, RelatedTerm, SearchResult, Theme,
};
use populus_render::{RenderError, WordCloudRenderer, write_csv};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

const INDEX_HTML: &str = include_str!("../assets/index.html");

/// Shared state for axum handlers.
#[derive(Clone)]
pub struct AppState {
    aggregator: Arc<Aggregator>,
    renderer: Arc<WordCloudRenderer>,
    timeframe: String,
    max_results: u32,
}

impl AppState {
    /// `timeframe` and `max_results` fill in fields the form leaves out.
    pub fn new(
        aggregator: Aggregator,
        renderer: WordCloudRenderer,
        timeframe: impl Into<String>,
        max_results: u32,
    ) -> Self {
        Self {
            aggregator: Arc::new(aggregator),
            renderer: Arc::new(renderer),
            timeframe: timeframe.into(),
            max_results,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchBody {
    query: String,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    timeframe: Option<String>,
    #[serde(default)]
    max_results: Option<u32>,
}

#[derive(Debug, Serialize)]
struct SearchResponse {
    terms: Vec<RelatedTerm>,
    results: Vec<SearchResult>,
    outcomes: Vec<ProviderOutcome>,
    #[serde(flatten)]
    insights: QueryInsights,
}

#[derive(Debug, Deserialize)]
struct ExportBody {
    terms: Vec<RelatedTerm>,
    #[serde(default)]
    theme: Option<Theme>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// JSON error with an HTTP status.
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<PopulusError> for ApiError {
    fn from(err: PopulusError) -> Self {
        let status = match &err {
            PopulusError::InvalidRequest(_) | PopulusError::Config(_) => StatusCode::BAD_REQUEST,
            PopulusError::AllProvidersFailed(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(StatusCode::BAD_REQUEST, rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handle_index))
        .route("/healthz", get(handle_healthz))
        .route("/api/search", post(handle_search))
        .route("/api/export/csv", post(handle_export_csv))
        .route("/api/export/wordcloud", post(handle_export_wordcloud))
        .with_state(state)
}

async fn handle_index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn handle_healthz() -> &'static str {
    "ok"
}

async fn handle_search(
    State(state): State<AppState>,
    body: Result<Json<SearchBody>, JsonRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
    let Json(body) = body?;
    let country = body.country.as_deref().unwrap_or(DEFAULT_COUNTRY);
    let request = QueryRequest::new(&body.query, country)?
        .with_timeframe_or(body.timeframe, &state.timeframe)
        .with_max_results(body.max_results.unwrap_or(state.max_results));

    tracing::info!(target: "dashboard", query = %request.query(), country = %request.country_code(), "dashboard.search.start");
    let Aggregation {
        terms,
        results,
        outcomes,
    } = state.aggregator.run(&request).await?;
    let insights = state.aggregator.insights(&request).await;

    Ok(Json(SearchResponse {
        terms,
        results,
        outcomes,
        insights,
    }))
}

async fn handle_export_csv(
    body: Result<Json<ExportBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body?;
    let mut buf = Vec::new();
    write_csv(&mut buf, &body.terms)
        .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(attachment("text/csv; charset=utf-8", "results.csv", buf))
}

async fn handle_export_wordcloud(
    State(state): State<AppState>,
    body: Result<Json<ExportBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body?;
    let renderer = match body.theme {
        Some(theme) => state.renderer.with_theme(theme),
        None => state.renderer.as_ref().clone(),
    };
    let png = tokio::task::spawn_blocking(move || renderer.render_png(&body.terms))
        .await
        .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .map_err(|e| match e {
            RenderError::Empty => ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
            other => {
                tracing::warn!(target: "dashboard", error = %other, "dashboard.wordcloud.failed");
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
            }
        })?;
    Ok(attachment("image/png", "wordcloud.png", png))
}

fn attachment(content_type: &'static str, filename: &str, body: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response()
}

/// A running dashboard bound to a local address.
pub struct DashboardServer {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl DashboardServer {
    /// Bind to `{host}:{port}` (port `0` picks a free one) and serve in a
    /// background task.
    pub async fn start(state: AppState, host: &str, port: u16) -> Result<Self, PopulusError> {
        let bind_addr = format!("{host}:{port}");
        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|e| PopulusError::Config(format!("dashboard bind {bind_addr} failed: {e}")))?;
        let addr = listener
            .local_addr()
            .map_err(|e| PopulusError::Config(format!("failed to get local addr: {e}")))?;

        tracing::info!(target: "dashboard", %addr, "dashboard.listening");
        let app = router(state);
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(target: "dashboard", error = %e, "dashboard.server.error");
            }
        });
        Ok(Self { addr, handle })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Block until the server task ends.
    pub async fn wait(mut self) {
        let _ = (&mut self.handle).await;
    }
}

impl Drop for DashboardServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
