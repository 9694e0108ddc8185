//! Minimal HTTP client with safe logging, optional retries, and flexible auth.
//!
//! - Request options: headers, `Auth`, query params, timeout, retries
//! - Redacts sensitive query params and headers; never logs secret values
//! - Retries 429/5xx with exponential backoff and `Retry-After` support when a
//!   retry budget is given (provider clients pass `retries: Some(0)`)
//! - JSON decoding via [`HttpClient::get_json`], raw bodies via
//!   [`HttpClient::get_text`] for endpoints that prefix their JSON
//! - Optional *raw* request/response logging via `POPULUS_HTTP_RAW=1`
//!
//! Example (no_run):
//! ```rust
//! # async fn demo() -> Result<(), populus_http::HttpError> {
//! let client = populus_http::HttpClient::new("https://api.example.com")?;
//! let got: serde_json::Value = client
//!     .get_json("v1/items", populus_http::RequestOpts::default())
//!     .await?;
//! # Ok(()) }
//! ```
//!
//! Security: logs only ever include the auth kind (bearer/header/query/none),
//! not the secret.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, RETRY_AFTER};
use reqwest::{Client, Method, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::env;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::sleep;

// ==============================
// Raw logging toggles
// ==============================

const RAW_ENV: &str = "POPULUS_HTTP_RAW";
const RAW_MAX_BODY: usize = 64 * 1024;
const SNIPPET_MAX: usize = 500;

const SECRET_QUERY_KEYS: &[&str] = &[
    "access_token",
    "authorization",
    "auth",
    "key",
    "api_key",
    "apikey",
    "token",
    "secret",
    "client_secret",
];

const SECRET_HEADERS: &[&str] = &[
    "authorization",
    "ocp-apim-subscription-key",
    "x-subscription-token",
    "x-api-key",
];

fn raw_enabled() -> bool {
    matches!(
        env::var(RAW_ENV).as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    )
}

fn is_secret_query(name: &str) -> bool {
    SECRET_QUERY_KEYS.contains(&name.to_ascii_lowercase().as_str())
}

fn is_secret_header(name: &str) -> bool {
    SECRET_HEADERS.contains(&name.to_ascii_lowercase().as_str())
}

/// Render a best-effort curl command for repro/debug, with secrets redacted.
fn make_curl(method: &Method, url: &Url, headers: &HeaderMap) -> String {
    let mut parts = vec!["curl".to_string(), format!("-X{method}")];
    for (name, val) in redact_headers(headers) {
        parts.push(format!("-H '{}: {}'", name, val.replace('\'', r"'\''")));
    }
    parts.push(format!("'{}'", redact_url(url)));
    parts.join(" ")
}

/// Redact sensitive headers for logging.
fn redact_headers(h: &HeaderMap) -> Vec<(String, String)> {
    h.iter()
        .map(|(k, v)| {
            let key = k.as_str().to_string();
            let val = if is_secret_header(&key) {
                "<redacted>".to_string()
            } else {
                v.to_str().unwrap_or("").to_string()
            };
            (key, val)
        })
        .collect()
}

fn redact_url(url: &Url) -> String {
    let mut clone = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if is_secret_query(&k) {
                "<redacted>".to_string()
            } else {
                v.into_owned()
            };
            (k.into_owned(), v)
        })
        .collect();
    if pairs.is_empty() {
        clone.set_query(None);
    } else {
        clone.query_pairs_mut().clear().extend_pairs(pairs);
    }
    clone.to_string()
}

// ==============================
// Errors
// ==============================

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid URL: {0}")]
    Url(String),
    #[error("request build failed: {0}")]
    Build(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("decode error: {0}, body_snippet: {1}")]
    Decode(String, String),
    #[error("server returned error {status}: {message}, request_id={request_id}")]
    Api {
        status: StatusCode,
        message: String,
        request_id: String,
    },
}

// ==============================
// Auth & Request Options
// ==============================

/// Authentication strategies supported by the HTTP client helpers.
///
/// ```
/// use populus_http::Auth;
/// use std::borrow::Cow;
///
/// let google = Auth::Query { name: "key", value: Cow::Borrowed("secret") };
/// match google {
///     Auth::Query { name, .. } => assert_eq!(name, "key"),
///     _ => unreachable!(),
/// }
/// ```
#[derive(Clone, Debug)]
pub enum Auth<'a> {
    /// Authorization: Bearer <token>
    Bearer(&'a str),
    /// Custom header (e.g., Bing: Ocp-Apim-Subscription-Key)
    Header {
        name: HeaderName,
        value: HeaderValue,
    },
    /// Auth via query param (e.g., Google Custom Search: key)
    Query {
        name: &'a str,
        value: Cow<'a, str>,
    },
    None,
}

impl Auth<'_> {
    fn kind(&self) -> &'static str {
        match self {
            Auth::Bearer(_) => "bearer",
            Auth::Header { .. } => "header",
            Auth::Query { .. } => "query",
            Auth::None => "none",
        }
    }
}

/// Per-request tuning knobs for the HTTP client.
///
/// ```
/// use populus_http::{Auth, RequestOpts};
/// use std::borrow::Cow;
/// use std::time::Duration;
///
/// let opts = RequestOpts {
///     timeout: Some(Duration::from_secs(30)),
///     retries: Some(0),
///     query: Some(vec![("q", Cow::Borrowed("solar eclipse"))]),
///     ..Default::default()
/// };
///
/// assert_eq!(opts.timeout.unwrap().as_secs(), 30);
/// assert!(opts.auth.is_none());
/// ```
#[derive(Clone, Debug, Default)]
pub struct RequestOpts<'a> {
    pub timeout: Option<Duration>,
    pub retries: Option<usize>,
    pub auth: Option<Auth<'a>>,
    pub headers: Option<HeaderMap>,
    pub query: Option<Vec<(&'a str, Cow<'a, str>)>>,
    /// If true and `path` is an absolute URL, use it as-is (ignore base).
    pub allow_absolute: bool,
}

// ==============================
// Client
// ==============================

#[derive(Clone, Debug)]
pub struct HttpClient {
    base: Url,
    inner: Client,
    pub default_timeout: Duration,
    pub max_retries: usize,
}

/// A successful response body together with its request id.
struct Fetched {
    req_id: String,
    bytes: Vec<u8>,
}

impl HttpClient {
    /// Construct a client anchored to a base URL.
    ///
    /// ```no_run
    /// use populus_http::{HttpClient, HttpError};
    /// use std::time::Duration;
    ///
    /// let client = HttpClient::new("https://api.example.com")?;
    /// assert_eq!(client.default_timeout, Duration::from_secs(15));
    /// assert_eq!(client.max_retries, 0);
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn new(base: &str) -> Result<Self, HttpError> {
        let base = Url::parse(base).map_err(|e| HttpError::Url(e.to_string()))?;
        let inner = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .user_agent(concat!("populus/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        Ok(Self {
            base,
            inner,
            default_timeout: Duration::from_secs(15),
            max_retries: 0,
        })
    }

    /// Override the default timeout returned by [`HttpClient::new`].
    pub fn with_timeout(mut self, dur: Duration) -> Self {
        self.default_timeout = dur;
        self
    }

    /// Override the default retry budget returned by [`HttpClient::new`].
    pub fn with_retries(mut self, n: usize) -> Self {
        self.max_retries = n;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// GET JSON with per-request options (headers/query/auth/timeout/retries).
    pub async fn get_json<T>(&self, path: &str, opts: RequestOpts<'_>) -> Result<T, HttpError>
    where
        T: DeserializeOwned,
    {
        let fetched = self.execute(Method::GET, path, opts).await?;
        decode_json(&fetched.req_id, &fetched.bytes)
    }

    /// GET and return the body as text, for payloads that need pre-processing
    /// before they can be decoded.
    pub async fn get_text(&self, path: &str, opts: RequestOpts<'_>) -> Result<String, HttpError> {
        let fetched = self.execute(Method::GET, path, opts).await?;
        String::from_utf8(fetched.bytes).map_err(|e| {
            let snippet = snip_body(e.as_bytes());
            HttpError::Decode(format!("response is not UTF-8: {e}"), snippet)
        })
    }

    fn resolve(&self, path: &str, allow_absolute: bool) -> Result<Url, HttpError> {
        if allow_absolute {
            if let Ok(abs) = Url::parse(path) {
                return Ok(abs);
            }
        }
        self.base
            .join(path)
            .map_err(|e| HttpError::Url(e.to_string()))
    }

    // ==============================
    // Core request implementation
    // ==============================

    async fn execute(
        &self,
        method: Method,
        path: &str,
        opts: RequestOpts<'_>,
    ) -> Result<Fetched, HttpError> {
        let url = self.resolve(path, opts.allow_absolute)?;
        let max_retries = opts.retries.unwrap_or(self.max_retries);
        let timeout = opts.timeout.unwrap_or(self.default_timeout);
        let auth_kind = opts.auth.as_ref().map_or("none", Auth::kind);

        // Query auth is merged into the regular params once so retries reuse it.
        let mut query: Vec<(&str, Cow<'_, str>)> = opts.query.clone().unwrap_or_default();
        if let Some(Auth::Query { name, value }) = &opts.auth {
            query.push((*name, value.clone()));
        }
        let redacted_q: Vec<(String, String)> = query
            .iter()
            .map(|(k, v)| {
                let shown = if is_secret_query(k) {
                    "<redacted>".to_string()
                } else {
                    v.to_string()
                };
                ((*k).to_string(), shown)
            })
            .collect();

        let req_id = format!("r-{}", uuid::Uuid::new_v4().simple());
        let mut attempt = 0usize;

        loop {
            let mut rb = self
                .inner
                .request(method.clone(), url.clone())
                .timeout(timeout);

            if !query.is_empty() {
                let pairs: Vec<(&str, &str)> = query.iter().map(|(k, v)| (*k, v.as_ref())).collect();
                rb = rb.query(&pairs);
            }
            if let Some(hdrs) = &opts.headers {
                rb = rb.headers(hdrs.clone());
            }
            match &opts.auth {
                Some(Auth::Bearer(tok)) => {
                    let tok = sanitize_api_key(tok)?;
                    rb = rb.bearer_auth(tok);
                }
                Some(Auth::Header { name, value }) => {
                    rb = rb.header(name, value);
                }
                Some(Auth::Query { .. }) | Some(Auth::None) | None => {}
            }

            tracing::debug!(
                req_id=%req_id,
                attempt=attempt + 1,
                max_retries,
                method=%method,
                host_path=%format!("{}{}", url.host_str().unwrap_or("-"), url.path()),
                query=?redacted_q,
                timeout_ms=timeout.as_millis() as u64,
                auth_kind,
                "http.request.start"
            );

            if raw_enabled() {
                let mut merged = HeaderMap::new();
                if let Some(h) = &opts.headers {
                    for (k, v) in h.iter() {
                        merged.append(k, v.clone());
                    }
                }
                let mut shown = url.clone();
                if !redacted_q.is_empty() {
                    shown.query_pairs_mut().extend_pairs(redacted_q.iter());
                }
                let curl = make_curl(&method, &shown, &merged);
                tracing::debug!(target: "http.raw", %req_id, %curl, "request");
            }

            // ----- Send -----
            let t0 = Instant::now();
            let outcome = match rb.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    let headers = resp.headers().clone();
                    resp.bytes()
                        .await
                        .map(|b| (status, headers, b.to_vec()))
                        .map_err(|e| e.to_string())
                }
                Err(err) => Err(err.to_string()),
            };

            let (status, headers, bytes) = match outcome {
                Ok(parts) => parts,
                Err(message) => {
                    if attempt < max_retries {
                        attempt += 1;
                        let delay = backoff(attempt);
                        tracing::warn!(
                            req_id=%req_id,
                            attempt,
                            max_retries,
                            backoff_ms=delay.as_millis() as u64,
                            message=%message,
                            "http.retrying.network"
                        );
                        sleep(delay).await;
                        continue;
                    }
                    tracing::warn!(req_id=%req_id, attempt, message=%message, "http.network_error");
                    return Err(HttpError::Network(message));
                }
            };
            let dur_ms = t0.elapsed().as_millis() as u64;

            let request_id = headers
                .get("x-request-id")
                .or_else(|| headers.get("x-goog-request-id"))
                .or_else(|| headers.get("bingapis-traceid"))
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-")
                .to_string();

            tracing::debug!(
                req_id=%req_id,
                %status,
                duration_ms=dur_ms,
                body_len=bytes.len(),
                x_request_id=%request_id,
                "http.response.headers"
            );

            if raw_enabled() {
                let truncated = bytes.len() > RAW_MAX_BODY;
                let text = String::from_utf8_lossy(&bytes[..bytes.len().min(RAW_MAX_BODY)]);
                tracing::info!(
                    target: "http.raw",
                    %req_id,
                    status=%status,
                    duration_ms=dur_ms,
                    headers=?redact_headers(&headers),
                    body=%text,
                    truncated
                );
            }

            if status.is_success() {
                return Ok(Fetched { req_id, bytes });
            }

            // ----- Non-success: maybe retry -----
            let snippet = snip_body(&bytes);
            let message = extract_error_message_multi(&bytes);
            let is_429 = status == StatusCode::TOO_MANY_REQUESTS;
            let is_5xx = status.is_server_error();

            if (is_429 || is_5xx) && attempt < max_retries {
                attempt += 1;
                let delay = match retry_after_delay_secs(&headers) {
                    Some(secs) => Duration::from_secs(secs),
                    None if is_429 => backoff(attempt).max(Duration::from_millis(1100)),
                    None => backoff(attempt),
                };
                tracing::warn!(
                    req_id=%req_id,
                    %status,
                    attempt,
                    max_retries,
                    backoff_ms=delay.as_millis() as u64,
                    message=%message,
                    "http.retrying"
                );
                sleep(delay).await;
                continue;
            }

            tracing::warn!(
                req_id=%req_id,
                %status,
                message=%message,
                x_request_id=%request_id,
                body_snippet=%snippet,
                "http.error"
            );
            return Err(HttpError::Api {
                status,
                message,
                request_id,
            });
        }
    }
}

// ==============================
// Helpers
// ==============================

fn backoff(attempt: usize) -> Duration {
    let shift = attempt.saturating_sub(1).min(10) as u32;
    Duration::from_millis(200u64.saturating_mul(1 << shift))
}

fn decode_json<T: DeserializeOwned>(req_id: &str, bytes: &[u8]) -> Result<T, HttpError> {
    serde_json::from_slice::<T>(bytes).map_err(|e| {
        let snippet = snip_body(bytes);
        tracing::warn!(
            req_id=%req_id,
            serde_line=%e.line(),
            serde_col=%e.column(),
            serde_err=%e,
            body_snippet=%snippet,
            "http.response.decode_error"
        );
        HttpError::Decode(e.to_string(), snippet)
    })
}

/// Pull a human-readable message out of the error envelopes our providers use.
fn extract_error_message_multi(body: &[u8]) -> String {
    // Google: {"error":{"code":403,"message":"..."}}
    #[derive(Deserialize)]
    struct GoogleEnv {
        error: GoogleDetail,
    }
    #[derive(Deserialize)]
    struct GoogleDetail {
        message: String,
    }

    // Bing: {"errors":[{"code":"...","message":"..."}]}
    #[derive(Deserialize)]
    struct BingErrors {
        errors: Vec<BingErr>,
    }
    #[derive(Deserialize)]
    struct BingErr {
        #[serde(default)]
        message: String,
        #[serde(default)]
        code: String,
    }

    // Generic: {"message":"..."} or {"error":"..."}
    #[derive(Deserialize)]
    struct Msg {
        #[serde(default)]
        message: String,
        #[serde(default)]
        error: String,
    }

    if let Ok(env) = serde_json::from_slice::<GoogleEnv>(body) {
        return env.error.message;
    }
    if let Ok(bing) = serde_json::from_slice::<BingErrors>(body) {
        if let Some(first) = bing.errors.into_iter().next() {
            if !first.message.is_empty() {
                return first.message;
            }
            if !first.code.is_empty() {
                return first.code;
            }
        }
    }
    if let Ok(m) = serde_json::from_slice::<Msg>(body) {
        if !m.message.is_empty() {
            return m.message;
        }
        if !m.error.is_empty() {
            return m.error;
        }
    }
    snip_body(body)
}

fn retry_after_delay_secs(h: &HeaderMap) -> Option<u64> {
    h.get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())?
        .parse()
        .ok()
}

fn snip_body(body: &[u8]) -> String {
    let mut snip = String::from_utf8_lossy(body).to_string();
    if snip.len() > SNIPPET_MAX {
        let mut cut = SNIPPET_MAX;
        while !snip.is_char_boundary(cut) {
            cut -= 1;
        }
        snip.truncate(cut);
        snip.push_str("...");
    }
    snip
}

fn sanitize_api_key(raw: &str) -> Result<String, HttpError> {
    let mut s = raw
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .to_string();
    s.retain(|ch| !ch.is_ascii_whitespace());

    if !s.is_ascii() {
        return Err(HttpError::Build("API key contains non-ASCII bytes".into()));
    }
    if s.bytes().any(|b| b < 0x20 || b == 0x7F) {
        return Err(HttpError::Build(
            "API key contains control characters".into(),
        ));
    }
    HeaderValue::from_str(&format!("Bearer {s}"))
        .map_err(|e| HttpError::Build(format!("invalid Authorization header: {e}")))?;
    Ok(s)
}
