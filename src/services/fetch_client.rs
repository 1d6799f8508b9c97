//! Outbound call to the upstream product search API.
//!
//! One POST per search, no retries. The response is classified into a
//! [`FetchOutcome`]; callers decide what each outcome means for the client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;

use crate::services::query_builder::WireRequest;

/// Result of one upstream search.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// At least one item was returned.
    Success(Vec<Value>),
    /// The upstream answered without errors but found nothing.
    EmptySuccess,
    /// The upstream could not be reached or timed out.
    TransportError(String),
    /// The upstream answered with errors, a non-200 status or an unreadable body.
    UpstreamError(String),
}

/// Sends wire requests to the upstream. Abstracted so tests can answer with canned outcomes.
#[async_trait]
pub trait SearchClient: Send + Sync + std::fmt::Debug {
    async fn send(&self, request: &WireRequest) -> FetchOutcome;
}

/// Upstream response envelope.
#[derive(Debug, Deserialize)]
struct UpstreamResponse {
    #[serde(default)]
    data: Option<UpstreamData>,

    #[serde(default)]
    errors: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct UpstreamData {
    search: Option<UpstreamSearch>,
}

#[derive(Debug, Deserialize)]
struct UpstreamSearch {
    items: Option<Vec<Value>>,
}

/// Error raised when the client cannot be constructed from configuration.
#[derive(Debug, thiserror::Error)]
pub enum ClientBuildError {
    #[error("invalid upstream URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Real upstream client using reqwest.
#[derive(Debug, Clone)]
pub struct HttpSearchClient {
    client: reqwest::Client,
    endpoint: url::Url,
}

impl HttpSearchClient {
    /// Build a client for `endpoint` whose requests give up after `timeout`.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, ClientBuildError> {
        let endpoint = url::Url::parse(endpoint)?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl SearchClient for HttpSearchClient {
    async fn send(&self, request: &WireRequest) -> FetchOutcome {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return FetchOutcome::TransportError(format!("Request timed out: {}", e));
            }
            Err(e) => return FetchOutcome::TransportError(format!("Request failed: {}", e)),
        };

        let status = response.status();
        match response.bytes().await {
            Ok(body) => interpret(status, &body),
            Err(e) => FetchOutcome::TransportError(format!("Failed to read response: {}", e)),
        }
    }
}

/// Classify an upstream answer.
///
/// # Rules
///
/// - Status other than 200 → `UpstreamError`
/// - Body that is not the expected envelope → `UpstreamError`
/// - Non-empty `errors` → `UpstreamError`
/// - Otherwise the items of `data.search.items`: empty → `EmptySuccess`, else `Success`
pub fn interpret(status: StatusCode, body: &[u8]) -> FetchOutcome {
    if status != StatusCode::OK {
        return FetchOutcome::UpstreamError(format!("HTTP {}", status));
    }

    let envelope: UpstreamResponse = match serde_json::from_slice(body) {
        Ok(envelope) => envelope,
        Err(e) => {
            return FetchOutcome::UpstreamError(format!("Failed to parse response: {}", e));
        }
    };

    if !envelope.errors.is_empty() {
        return FetchOutcome::UpstreamError(format!(
            "Upstream reported {} error(s): {}",
            envelope.errors.len(),
            Value::Array(envelope.errors)
        ));
    }

    let items = envelope
        .data
        .and_then(|data| data.search)
        .and_then(|search| search.items);

    match items {
        Some(items) if items.is_empty() => FetchOutcome::EmptySuccess,
        Some(items) => FetchOutcome::Success(items),
        None => FetchOutcome::UpstreamError("Response has no search items".to_string()),
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers every search with the same outcome and records what was sent.
    #[derive(Debug)]
    pub struct StaticSearchClient {
        outcome: FetchOutcome,
        calls: AtomicUsize,
        last_request: Mutex<Option<Value>>,
    }

    impl StaticSearchClient {
        pub fn new(outcome: FetchOutcome) -> Self {
            Self {
                outcome,
                calls: AtomicUsize::new(0),
                last_request: Mutex::new(None),
            }
        }

        pub fn with_items(count: usize) -> Self {
            let items = (0..count)
                .map(|i| serde_json::json!({ "itemId": i.to_string(), "name": format!("Item {}", i) }))
                .collect();
            Self::new(FetchOutcome::Success(items))
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn last_request(&self) -> Option<Value> {
            self.last_request.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SearchClient for StaticSearchClient {
        async fn send(&self, request: &WireRequest) -> FetchOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock().unwrap() = serde_json::to_value(request).ok();
            self.outcome.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(value: Value) -> Vec<u8> {
        serde_json::to_vec(&value).unwrap()
    }

    #[test]
    fn returns_items_on_clean_response() {
        let outcome = interpret(
            StatusCode::OK,
            &body(json!({
                "data": { "search": { "items": [{ "itemId": "1" }, { "itemId": "2" }] } },
                "errors": []
            })),
        );

        assert_eq!(
            outcome,
            FetchOutcome::Success(vec![json!({ "itemId": "1" }), json!({ "itemId": "2" })])
        );
    }

    #[test]
    fn empty_items_are_a_distinct_outcome() {
        let outcome = interpret(
            StatusCode::OK,
            &body(json!({ "data": { "search": { "items": [] } }, "errors": [] })),
        );

        assert_eq!(outcome, FetchOutcome::EmptySuccess);
    }

    #[test]
    fn missing_errors_member_counts_as_empty() {
        let outcome = interpret(
            StatusCode::OK,
            &body(json!({ "data": { "search": { "items": [{ "itemId": "1" }] } } })),
        );

        assert!(matches!(outcome, FetchOutcome::Success(items) if items.len() == 1));
    }

    #[test]
    fn upstream_errors_win_over_items() {
        let outcome = interpret(
            StatusCode::OK,
            &body(json!({
                "data": { "search": { "items": [{ "itemId": "1" }] } },
                "errors": [{ "message": "bad siteID" }]
            })),
        );

        assert!(matches!(outcome, FetchOutcome::UpstreamError(_)));
    }

    #[test]
    fn non_200_status_is_upstream_error() {
        let outcome = interpret(
            StatusCode::SERVICE_UNAVAILABLE,
            &body(json!({ "data": { "search": { "items": [{ "itemId": "1" }] } }, "errors": [] })),
        );

        assert_eq!(
            outcome,
            FetchOutcome::UpstreamError("HTTP 503 Service Unavailable".to_string())
        );
    }

    #[test]
    fn malformed_body_is_upstream_error() {
        assert!(matches!(
            interpret(StatusCode::OK, b"<html>blocked</html>"),
            FetchOutcome::UpstreamError(_)
        ));
        assert!(matches!(
            interpret(StatusCode::OK, &body(json!({ "data": null, "errors": [] }))),
            FetchOutcome::UpstreamError(_)
        ));
    }

    #[test]
    fn rejects_invalid_endpoint() {
        let result = HttpSearchClient::new("not a url", Duration::from_secs(1));
        assert!(matches!(result, Err(ClientBuildError::Url(_))));
    }

    #[tokio::test]
    async fn unreachable_upstream_is_transport_error() {
        // Port 9 (discard) on localhost is not expected to accept connections
        let client = HttpSearchClient::new("http://127.0.0.1:9/api", Duration::from_secs(2)).unwrap();
        let request = crate::services::query_builder::build(&crate::models::search::SearchRequest {
            limit: 1,
            min_price: 0,
            max_price: 1,
            include_categories: vec![],
            sort: "RELEVANCE".to_string(),
            region: crate::models::search::Region::De,
        })
        .unwrap();

        assert!(matches!(
            client.send(&request).await,
            FetchOutcome::TransportError(_)
        ));
    }
}
