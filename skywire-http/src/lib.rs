//! Minimal HTTP executor for XRPC calls with safe logging.
//!
//! - Request options: `Auth`, query params (repeated keys allowed), timeout
//! - Every request carries `Content-Type: application/json`
//! - Non-2xx responses become [`HttpError::Api`] with status, message and body
//! - No retries: callers see the first error verbatim
//! - Optional *raw* request/response logging via `SKYWIRE_HTTP_RAW=1`
//!
//! Example (no_run):
//! ```rust
//! # async fn demo() -> Result<(), skywire_http::HttpError> {
//! let client = skywire_http::HttpClient::new("https://bsky.social")?;
//! let got: serde_json::Value = client
//!     .get_json("xrpc/com.atproto.server.describeServer", skywire_http::RequestOpts::default())
//!     .await?;
//! # Ok(()) }
//! ```
//!
//! Security: bearer tokens are sanitized before use, and logs only ever
//! include the auth kind (bearer/none), not the secret.

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::env;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;

pub use reqwest::Method as HttpMethod;

// ==============================
// Raw logging toggles
// ==============================

const RAW_ENV: &str = "SKYWIRE_HTTP_RAW";
const RAW_MAX_BODY: usize = 64 * 1024; // cap raw body logs (64 KiB)
const SNIPPET_MAX: usize = 500;

static REQUEST_SEQ: AtomicU64 = AtomicU64::new(1);

fn raw_enabled() -> bool {
    matches!(
        env::var(RAW_ENV).as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    )
}

/// Render a best-effort curl command for repro/debug. Authorization is
/// redacted; the query string is dropped because cursors and handles are
/// the only things it ever carries and they are logged separately.
fn make_curl(method: &Method, url: &Url, headers: &HeaderMap, body: Option<&[u8]>) -> String {
    let mut parts = vec!["curl".to_string(), format!("-X{}", method)];
    for (name, val) in redact_headers(headers) {
        parts.push(format!("-H '{}: {}'", name, val.replace('\'', r"'\''")));
    }
    if let Some(bytes) = body {
        if let Ok(s) = std::str::from_utf8(bytes) {
            let mut s = s.to_string();
            if s.len() > RAW_MAX_BODY {
                truncate_on_char_boundary(&mut s, RAW_MAX_BODY);
                s.push('…');
            }
            parts.push(format!("-d '{}'", s.replace('\'', r"'\''")));
        } else {
            parts.push(format!("--data-binary @- # ({} bytes)", bytes.len()));
        }
    }
    let mut bare = url.clone();
    bare.set_query(None);
    parts.push(format!("'{}'", bare.as_str()));
    parts.join(" ")
}

/// Redact sensitive headers for logging
fn redact_headers(h: &HeaderMap) -> Vec<(String, String)> {
    h.iter()
        .map(|(k, v)| {
            let key = k.as_str().to_string();
            let mut val = v.to_str().unwrap_or("").to_string();
            if key.eq_ignore_ascii_case("authorization") {
                val = "Bearer <redacted>".into();
            }
            (key, val)
        })
        .collect()
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
    #[error("transport error: {0}")]
    Transport(String),
    #[error("decode error: {0}, body_snippet: {1}")]
    Decode(String, String),
    #[error("request failed with status {status}: {message}")]
    Api {
        status: StatusCode,
        message: String,
        body: String,
    },
}

// ==============================
// Auth & Request Options
// ==============================

/// Authentication strategies supported by the executor.
///
/// ```
/// use skywire_http::Auth;
///
/// let bearer = Auth::Bearer("token");
/// match bearer {
///     Auth::Bearer(value) => assert_eq!(value, "token"),
///     Auth::None => unreachable!(),
/// }
/// ```
#[derive(Clone, Debug)]
pub enum Auth<'a> {
    /// Authorization: Bearer <token>
    Bearer(&'a str),
    None,
}

/// Per-request tuning knobs for the executor.
///
/// ```
/// use skywire_http::{Auth, RequestOpts};
/// use std::borrow::Cow;
/// use std::time::Duration;
///
/// let opts = RequestOpts {
///     timeout: Some(Duration::from_secs(30)),
///     auth: Some(Auth::Bearer("jwt")),
///     query: Some(vec![("actors", Cow::Borrowed("a")), ("actors", Cow::Borrowed("b"))]),
///     ..Default::default()
/// };
///
/// assert_eq!(opts.timeout.unwrap().as_secs(), 30);
/// ```
#[derive(Clone, Debug, Default)]
pub struct RequestOpts<'a> {
    pub timeout: Option<Duration>,
    pub auth: Option<Auth<'a>>,
    pub query: Option<Vec<(&'a str, Cow<'a, str>)>>, // e.g. [("actor", "alice.test".into())]
}

// ==============================
// Client
// ==============================

#[derive(Clone)]
pub struct HttpClient {
    base: Url,
    inner: Client,
    pub default_timeout: Option<Duration>,
}

impl HttpClient {
    /// Construct a client anchored to a base URL. Relative request paths are
    /// joined onto it, so `xrpc/...` resolves under the host root.
    ///
    /// ```no_run
    /// use skywire_http::{HttpClient, HttpError};
    ///
    /// let client = HttpClient::new("https://bsky.social")?;
    /// assert!(client.default_timeout.is_none());
    /// assert_eq!(client.base().as_str(), "https://bsky.social/");
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn new(base: &str) -> Result<Self, HttpError> {
        let mut base = Url::parse(base).map_err(|e| HttpError::Url(e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(HttpError::Url(format!("not a base URL: {base}")));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let inner = Client::builder()
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        Ok(Self {
            base,
            inner,
            default_timeout: None,
        })
    }

    /// Apply a client-wide timeout; `None` keeps the transport default.
    pub fn with_timeout(mut self, dur: Option<Duration>) -> Self {
        self.default_timeout = dur;
        self
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// POST JSON with optional bearer auth.
    pub async fn post_json<B, T>(
        &self,
        path: &str,
        bearer: Option<&str>,
        body: &B,
    ) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let opts = RequestOpts {
            auth: bearer.map(Auth::Bearer),
            ..Default::default()
        };
        self.post_json_opts(path, body, opts).await
    }

    /// GET JSON with per-request options.
    pub async fn get_json<T>(&self, path: &str, opts: RequestOpts<'_>) -> Result<T, HttpError>
    where
        T: DeserializeOwned,
    {
        let bytes = self
            .request_bytes::<()>(Method::GET, path, None, opts)
            .await?;
        decode(&bytes)
    }

    /// POST JSON with per-request options.
    pub async fn post_json_opts<B, T>(
        &self,
        path: &str,
        body: &B,
        opts: RequestOpts<'_>,
    ) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let bytes = self
            .request_bytes(Method::POST, path, Some(body), opts)
            .await?;
        decode(&bytes)
    }

    /// Perform one request and return the raw body of a 2xx response.
    pub async fn request_bytes<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        opts: RequestOpts<'_>,
    ) -> Result<Bytes, HttpError>
    where
        B: Serialize + ?Sized,
    {
        let url = self.resolve(path)?;

        let mut rb = self.inner.request(method.clone(), url.clone());

        let timeout = opts.timeout.or(self.default_timeout);
        if let Some(t) = timeout {
            rb = rb.timeout(t);
        }

        if let Some(q) = &opts.query {
            let pairs: Vec<(&str, &str)> = q.iter().map(|(k, v)| (*k, v.as_ref())).collect();
            rb = rb.query(&pairs);
        }

        let request_body_bytes = match body {
            Some(b) => Some(serde_json::to_vec(b).map_err(|e| HttpError::Build(e.to_string()))?),
            None => None,
        };
        rb = rb.header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(bytes) = &request_body_bytes {
            rb = rb.body(bytes.clone());
        }

        let auth_kind = match &opts.auth {
            Some(Auth::Bearer(tok)) => {
                let tok = sanitize_token(tok)?;
                rb = rb.bearer_auth(tok);
                "bearer"
            }
            Some(Auth::None) | None => "none",
        };

        let req_id = format!("r{}", REQUEST_SEQ.fetch_add(1, Ordering::Relaxed));
        let query_log: Vec<(&str, &str)> = opts
            .query
            .as_ref()
            .map(|q| q.iter().map(|(k, v)| (*k, v.as_ref())).collect())
            .unwrap_or_default();

        tracing::debug!(
            req_id=%req_id,
            method=%method,
            host_path=%format!("{}{}", url.host_str().unwrap_or("-"), url.path()),
            query=?query_log,
            timeout_ms=?timeout.map(|t| t.as_millis() as u64),
            auth_kind,
            has_body=%body.is_some(),
            "http.request.start"
        );

        if raw_enabled() {
            let mut sent = HeaderMap::new();
            sent.insert(
                reqwest::header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
            if auth_kind == "bearer" {
                sent.insert(
                    reqwest::header::AUTHORIZATION,
                    HeaderValue::from_static("Bearer"),
                );
            }
            let curl = make_curl(&method, &url, &sent, request_body_bytes.as_deref());
            tracing::debug!(target: "http.raw", %req_id, %curl, "request");
        }

        // ----- Send -----
        let t0 = std::time::Instant::now();
        let resp = rb.send().await.map_err(|err| {
            let message = err.to_string();
            tracing::warn!(req_id=%req_id, message=%message, "http.transport_error.send");
            HttpError::Transport(message)
        })?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let bytes = resp.bytes().await.map_err(|err| {
            let message = err.to_string();
            tracing::warn!(req_id=%req_id, message=%message, "http.transport_error.body");
            HttpError::Transport(message)
        })?;
        let dur_ms = t0.elapsed().as_millis() as u64;

        let limit = headers.get("ratelimit-limit").and_then(|v| v.to_str().ok());
        let remain = headers
            .get("ratelimit-remaining")
            .and_then(|v| v.to_str().ok());
        let reset = headers.get("ratelimit-reset").and_then(|v| v.to_str().ok());

        tracing::debug!(
            req_id=%req_id,
            %status,
            duration_ms=dur_ms,
            body_len=bytes.len(),
            rate_limit.limit=?limit,
            rate_limit.remaining=?remain,
            rate_limit.reset=?reset,
            "http.response.headers"
        );

        if raw_enabled() {
            let hdrs = redact_headers(&headers);
            let truncated = bytes.len() > RAW_MAX_BODY;
            let shown = &bytes[..bytes.len().min(RAW_MAX_BODY)];
            let text = String::from_utf8_lossy(shown);
            tracing::info!(
                target:"http.raw",
                %req_id,
                status=%status,
                duration_ms=dur_ms,
                headers=?hdrs,
                body=%text,
                truncated
            );
        }

        if status.is_success() {
            return Ok(bytes);
        }

        let message = extract_error_message(&bytes);
        let body_text = String::from_utf8_lossy(&bytes).into_owned();
        tracing::warn!(
            req_id=%req_id,
            %status,
            message=%message,
            body_snippet=%snip_body(&bytes),
            "http.error"
        );
        Err(HttpError::Api {
            status,
            message,
            body: body_text,
        })
    }

    /// Absolute `http(s)` URLs are used as-is; anything else joins onto the base.
    fn resolve(&self, path: &str) -> Result<Url, HttpError> {
        if let Ok(abs) = Url::parse(path) {
            if matches!(abs.scheme(), "http" | "https") {
                return Ok(abs);
            }
        }
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|e| HttpError::Url(e.to_string()))
    }
}

// ==============================
// Helpers
// ==============================

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, HttpError> {
    serde_json::from_slice::<T>(bytes).map_err(|e| {
        let snippet = snip_body(bytes);
        tracing::warn!(
            serde_line=%e.line(),
            serde_col=%e.column(),
            serde_err=%e.to_string(),
            body_snippet=%snippet,
            "http.response.decode_error"
        );
        HttpError::Decode(e.to_string(), snippet)
    })
}

/// XRPC errors look like `{"error":"InvalidRequest","message":"..."}`; either
/// half may be missing.
fn extract_error_message(body: &[u8]) -> String {
    #[derive(Deserialize)]
    struct XrpcError {
        #[serde(default)]
        error: Option<String>,
        #[serde(default)]
        message: Option<String>,
    }

    if let Ok(e) = serde_json::from_slice::<XrpcError>(body) {
        match (e.error, e.message) {
            (Some(kind), Some(msg)) if !msg.is_empty() => return format!("{kind}: {msg}"),
            (_, Some(msg)) if !msg.is_empty() => return msg,
            (Some(kind), _) if !kind.is_empty() => return kind,
            _ => {}
        }
    }
    snip_body(body)
}

fn snip_body(body: &[u8]) -> String {
    let mut snip = String::from_utf8_lossy(body).to_string();
    if snip.len() > SNIPPET_MAX {
        truncate_on_char_boundary(&mut snip, SNIPPET_MAX);
        snip.push_str("...");
    }
    snip
}

fn truncate_on_char_boundary(s: &mut String, max: usize) {
    let mut cut = max.min(s.len());
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    s.truncate(cut);
}

fn sanitize_token(raw: &str) -> Result<String, HttpError> {
    let mut s = raw
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .to_string();
    s.retain(|ch| !ch.is_ascii_whitespace());

    if s.is_empty() {
        return Err(HttpError::Build("bearer token is empty".into()));
    }
    if !s.is_ascii() {
        return Err(HttpError::Build("bearer token contains non-ASCII bytes".into()));
    }
    if s.bytes().any(|b| b < 0x20 || b == 0x7F) {
        return Err(HttpError::Build(
            "bearer token contains control characters".into(),
        ));
    }

    HeaderValue::from_str(&format!("Bearer {}", s))
        .map_err(|e| HttpError::Build(format!("invalid Authorization header: {e}")))?;
    Ok(s)
}
