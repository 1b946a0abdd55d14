//! Bounded fetcher for the portal REST API
//!
//! Every call runs under a time budget (default 25 s) and an optional
//! cancellation token. A bearer token is attached when one is set, and a
//! cookie store keeps the session cookie between calls.
//!
//! # Endpoints
//! - `GET /historial/reguladores/?fecha_desde&fecha_hasta&solo_completados`
//! - `GET /submissions/{id}/`
//! - `GET /catalogos/actores/?tipo&search`
//!
//! List endpoints answer either with a bare JSON array or with a
//! `{results, count, next}` envelope; both are accepted and `next` links are
//! followed up to a page cap. Links to another origin are not followed, and
//! the bearer token is only sent to the configured backend.

use crate::error::{HistorialError, HistorialResult};
use crate::hydrator::DetailSource;
use crate::query::HistorialParams;
use crate::types::{ActorRef, ActorTipo, RawHistorialItem, SubmissionDetail};
use async_trait::async_trait;
use insp_common::config::{resolve_api_base_url, resolve_api_token, TomlConfig};
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Default per-request budget
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(25);

const HISTORIAL_PATH: &str = "/historial/reguladores/";
const ACTORES_PATH: &str = "/catalogos/actores/";

/// Keys tried, in order, for a human message in an error body
const ERROR_MESSAGE_KEYS: [&str; 4] = ["detail", "error", "message", "mensaje"];

/// Client settings
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL without trailing slash, e.g. `https://portal.example/api`
    pub base_url: String,
    pub token: Option<String>,
    pub timeout: Duration,
    /// Cap on `next` links followed for one listing
    pub max_list_pages: usize,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
            timeout: DEFAULT_TIMEOUT,
            max_list_pages: insp_common::config::DEFAULT_MAX_LIST_PAGES,
        }
    }

    /// Resolve settings from TOML, environment and an optional explicit URL
    pub fn from_toml(toml_config: &TomlConfig, base_url: Option<&str>) -> HistorialResult<Self> {
        Ok(Self {
            base_url: resolve_api_base_url(base_url, toml_config)?,
            token: resolve_api_token(toml_config),
            timeout: Duration::from_secs(toml_config.request_timeout_secs),
            max_list_pages: toml_config.max_list_pages.max(1),
        })
    }
}

/// Per-call overrides
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Overrides the client's default budget
    pub timeout: Option<Duration>,
    /// Aborts the call when cancelled
    pub cancel: Option<CancellationToken>,
}

impl FetchOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            cancel: None,
        }
    }
}

/// One decoded page of a list endpoint
struct ListPage<T> {
    items: Vec<T>,
    count: Option<u64>,
    next: Option<String>,
}

/// Portal API client
#[derive(Debug, Clone)]
pub struct HistorialClient {
    http: Client,
    base_url: String,
    token: Arc<RwLock<Option<String>>>,
    timeout: Duration,
    max_list_pages: usize,
}

impl HistorialClient {
    /// Create a new client
    ///
    /// # Errors
    /// Returns `HistorialError::Config` if the HTTP client can not be built.
    pub fn new(config: ClientConfig) -> HistorialResult<Self> {
        let http = Client::builder()
            .cookie_store(true)
            .build()
            .map_err(|e| HistorialError::Config(format!("Failed to create HTTP client: {}", e)))?;

        debug!(base_url = %config.base_url, "Created historial client");

        Ok(Self {
            http,
            base_url: config.base_url,
            token: Arc::new(RwLock::new(config.token)),
            timeout: config.timeout,
            max_list_pages: config.max_list_pages.max(1),
        })
    }

    /// Replace the bearer token (`None` relies on the session cookie)
    pub async fn set_token(&self, token: Option<String>) {
        *self.token.write().await = token;
    }

    pub async fn token(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    /// Absolute URL for an API path; absolute URLs pass through
    pub fn build_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// `url` has the scheme, host and port of the configured base URL
    pub fn is_same_origin(&self, url: &str) -> bool {
        match (Url::parse(&self.base_url), Url::parse(url)) {
            (Ok(base), Ok(url)) => base.origin() == url.origin(),
            _ => false,
        }
    }

    /// Absolute URL of a request, query included, in canonical form
    fn request_url(&self, path: &str, query: &[(&str, String)]) -> String {
        let url = self.build_url(path);
        match Url::parse(&url) {
            Ok(mut parsed) => {
                if !query.is_empty() {
                    parsed
                        .query_pairs_mut()
                        .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
                }
                parsed.to_string()
            }
            Err(_) => url,
        }
    }

    /// Issue one GET and return the parsed JSON body
    ///
    /// # Errors
    /// - `Timeout` when the budget elapses (body read included)
    /// - `Cancelled` when `opts.cancel` fires first
    /// - `Network` when the request can not be sent
    /// - `Http` on non-2xx, with the message extracted from the body
    /// - `Decode` when a 2xx body is not JSON
    pub async fn get_json(
        &self,
        path: &str,
        query: &[(&str, String)],
        opts: &FetchOptions,
    ) -> HistorialResult<Value> {
        let endpoint = endpoint_label(path);
        let budget = opts.timeout.unwrap_or(self.timeout);

        let url = self.build_url(path);
        let mut request = self.http.get(&url);
        if !query.is_empty() {
            request = request.query(query);
        }
        // The bearer token never leaves the configured backend
        let request = if self.is_same_origin(&url) {
            self.authorize(request).await
        } else {
            warn!(endpoint = %endpoint, "Request to a foreign origin, sending no token");
            request
        };

        let call = tokio::time::timeout(budget, self.execute(&endpoint, request));

        let outcome = match &opts.cancel {
            Some(token) => tokio::select! {
                _ = token.cancelled() => {
                    debug!(endpoint = %endpoint, "Request cancelled");
                    return Err(HistorialError::Cancelled { endpoint: endpoint.clone() });
                }
                outcome = call => outcome,
            },
            None => call.await,
        };

        match outcome {
            Ok(result) => result,
            Err(_) => {
                warn!(endpoint = %endpoint, budget_ms = budget.as_millis() as u64, "Request timed out");
                Err(HistorialError::Timeout {
                    endpoint,
                    after: budget,
                })
            }
        }
    }

    async fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.token.read().await.as_deref() {
            Some(token) if !token.is_empty() => request.bearer_auth(token),
            _ => request,
        }
    }

    async fn execute(&self, endpoint: &str, request: RequestBuilder) -> HistorialResult<Value> {
        let response = request
            .send()
            .await
            .map_err(|e| transport_error(endpoint, e))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| transport_error(endpoint, e))?;

        if !status.is_success() {
            let message = serde_json::from_slice::<Value>(&body)
                .ok()
                .and_then(|v| extract_error_message(&v))
                .unwrap_or_else(|| status_text(status));

            debug!(endpoint = %endpoint, status = status.as_u16(), message = %message, "Request failed");

            return Err(HistorialError::Http {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_slice(&body).map_err(|e| HistorialError::Decode {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })
    }

    /// Fetch every item of a list endpoint, following `next` links
    pub async fn fetch_list<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        opts: &FetchOptions,
    ) -> HistorialResult<Vec<T>> {
        let endpoint = endpoint_label(path);
        let value = self.get_json(path, query, opts).await?;
        let first = parse_list_page::<T>(&endpoint, value)?;

        let expected = first.count;
        let mut items = first.items;
        let mut next = first.next;
        let mut visited = HashSet::from([self.request_url(path, query)]);
        let mut pages = 1;

        while let Some(link) = next.take() {
            if pages >= self.max_list_pages {
                warn!(
                    endpoint = %endpoint,
                    pages,
                    fetched = items.len(),
                    expected = ?expected,
                    "Listing truncated at page cap"
                );
                break;
            }
            let url = self.request_url(&link, &[]);
            if !self.is_same_origin(&url) {
                warn!(endpoint = %endpoint, url = %url, "Listing links to a foreign origin, stopping");
                break;
            }
            if !visited.insert(url.clone()) {
                warn!(endpoint = %endpoint, url = %url, "Listing repeats a page link, stopping");
                break;
            }

            let value = self.get_json(&url, &[], opts).await?;
            let page = parse_list_page::<T>(&endpoint, value)?;
            items.extend(page.items);
            next = page.next;
            pages += 1;
        }

        if let Some(count) = expected {
            if count as usize != items.len() {
                debug!(
                    endpoint = %endpoint,
                    count,
                    fetched = items.len(),
                    "Listing count differs from fetched items"
                );
            }
        }

        Ok(items)
    }

    /// `GET /historial/reguladores/`
    pub async fn fetch_historial(
        &self,
        params: &HistorialParams,
        opts: &FetchOptions,
    ) -> HistorialResult<Vec<RawHistorialItem>> {
        let query = params.to_query_pairs();
        let items: Vec<RawHistorialItem> = self.fetch_list(HISTORIAL_PATH, &query, opts).await?;
        debug!(items = items.len(), "Fetched historial listing");
        Ok(items)
    }

    /// `GET /submissions/{id}/`
    pub async fn fetch_submission_detail(
        &self,
        id: &str,
        opts: &FetchOptions,
    ) -> HistorialResult<SubmissionDetail> {
        let path = format!("/submissions/{}/", id);
        let value = self.get_json(&path, &[], opts).await?;
        serde_json::from_value(value).map_err(|e| HistorialError::Decode {
            endpoint: path,
            message: e.to_string(),
        })
    }

    /// `GET /catalogos/actores/?tipo&search`
    pub async fn search_actores(
        &self,
        tipo: Option<ActorTipo>,
        search: &str,
        opts: &FetchOptions,
    ) -> HistorialResult<Vec<ActorRef>> {
        let mut query = Vec::new();
        if let Some(tipo) = tipo {
            query.push(("tipo", tipo.as_str().to_string()));
        }
        if !search.trim().is_empty() {
            query.push(("search", search.trim().to_string()));
        }
        self.fetch_list(ACTORES_PATH, &query, opts).await
    }
}

#[async_trait]
impl DetailSource for HistorialClient {
    async fn fetch_detail(&self, id: &str) -> HistorialResult<SubmissionDetail> {
        self.fetch_submission_detail(id, &FetchOptions::default())
            .await
    }
}

/// Path part used in errors and logs
fn endpoint_label(path: &str) -> String {
    match Url::parse(path) {
        Ok(url) => url.path().to_string(),
        Err(_) => path.to_string(),
    }
}

fn transport_error(endpoint: &str, e: reqwest::Error) -> HistorialError {
    HistorialError::Network {
        endpoint: endpoint.to_string(),
        message: e.to_string(),
    }
}

fn status_text(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => reason.to_string(),
        None => format!("HTTP {}", status.as_u16()),
    }
}

/// Best-effort human message from a JSON error body
///
/// Probes, in order: `detail`, `error`, `message`, `mensaje`, the first
/// string-valued field, then the first element of the first string array
/// (the shape of per-field validation errors).
pub fn extract_error_message(body: &Value) -> Option<String> {
    let map = match body {
        Value::Object(map) => map,
        Value::String(s) => return non_blank(s),
        Value::Array(items) => return items.iter().find_map(|v| v.as_str().and_then(non_blank)),
        _ => return None,
    };

    for key in ERROR_MESSAGE_KEYS {
        if let Some(message) = map.get(key).and_then(Value::as_str).and_then(non_blank) {
            return Some(message);
        }
    }

    if let Some(message) = map.values().find_map(|v| v.as_str().and_then(non_blank)) {
        return Some(message);
    }

    map.values().find_map(|v| match v {
        Value::Array(items) => items.first().and_then(Value::as_str).and_then(non_blank),
        _ => None,
    })
}

fn non_blank(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn parse_list_page<T: DeserializeOwned>(endpoint: &str, value: Value) -> HistorialResult<ListPage<T>> {
    let (raw_items, count, next) = match value {
        Value::Array(items) => (items, None, None),
        Value::Object(mut map) if map.contains_key("results") => {
            let items = match map.remove("results") {
                Some(Value::Array(items)) => items,
                _ => {
                    return Err(HistorialError::Decode {
                        endpoint: endpoint.to_string(),
                        message: "`results` is not an array".to_string(),
                    })
                }
            };
            let count = map.get("count").and_then(Value::as_u64);
            let next = map
                .get("next")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string);
            (items, count, next)
        }
        _ => {
            return Err(HistorialError::Decode {
                endpoint: endpoint.to_string(),
                message: "expected a JSON array or a {results} envelope".to_string(),
            })
        }
    };

    let total = raw_items.len();
    let items: Vec<T> = raw_items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<T>(item) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!(endpoint = %endpoint, error = %e, "Skipping malformed list item");
                None
            }
        })
        .collect();

    if items.len() != total {
        warn!(
            endpoint = %endpoint,
            skipped = total - items.len(),
            "Some list items could not be decoded"
        );
    }

    Ok(ListPage { items, count, next })
}
