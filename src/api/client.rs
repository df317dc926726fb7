//! Authenticated HTTP transport for the Vision One API.
//!
//! Every platform call goes through [`ApiClient::call`], which attaches the
//! bearer token, classifies the response and retries rate-limited (429),
//! server-side (5xx) and network failures with exponential backoff.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use tracing::{debug, error, warn};
use url::Url;
use zeroize::Zeroizing;

use super::retry::{retry_after, Backoff};
use crate::config::{ApiConfig, RetryConfig};
use crate::error::ApiError;

/// Header carrying the Vision One query filter expression.
pub const FILTER_HEADER: &str = "TMV1-Filter";

/// A single logical API call.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    target: String,
    params: Vec<(String, String)>,
    filter: Option<String>,
    body: Option<Value>,
}

impl ApiRequest {
    /// Create a request for a path relative to the base URL, or an absolute
    /// continuation link returned by a previous page.
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self {
            method,
            target: target.into(),
            params: Vec::new(),
            filter: None,
            body: None,
        }
    }

    pub fn get(target: impl Into<String>) -> Self {
        Self::new(Method::GET, target)
    }

    #[allow(dead_code)]
    pub fn post(target: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, target).body(body)
    }

    /// Append a query parameter.
    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }

    /// Set the `TMV1-Filter` expression.
    pub fn filter(mut self, expression: impl Into<String>) -> Self {
        self.filter = Some(expression.into());
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Same request aimed at a different target, keeping method, filter and body.
    ///
    /// Continuation links already embed the query, so parameters are dropped.
    pub fn follow(&self, link: impl Into<String>) -> Self {
        Self {
            method: self.method.clone(),
            target: link.into(),
            params: Vec::new(),
            filter: self.filter.clone(),
            body: self.body.clone(),
        }
    }
}

/// Outcome of one HTTP attempt that did not succeed.
#[derive(Debug)]
enum AttemptError {
    /// 429, 5xx, or a network-level failure.
    Retryable {
        status: Option<u16>,
        message: String,
        hint: Option<Duration>,
    },
    /// Anything that another attempt cannot fix.
    Fatal(ApiError),
}

/// Vision One API client.
pub struct ApiClient {
    http_client: Client,
    base_url: Url,
    api: ApiConfig,
    token: Zeroizing<String>,
    retry: RetryConfig,
}

impl ApiClient {
    /// Create a new API client.
    pub fn new(api: &ApiConfig, retry: &RetryConfig, token: &str) -> Result<Self, ApiError> {
        let http_client = Client::builder()
            .timeout(api.request_timeout())
            .connect_timeout(api.connect_timeout())
            .build()
            .map_err(ApiError::Client)?;

        let base_url = Url::parse(&api.base_url)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", api.base_url, e)))?;

        Ok(Self {
            http_client,
            base_url,
            api: api.clone(),
            token: Zeroizing::new(token.to_string()),
            retry: retry.clone(),
        })
    }

    /// Endpoint and paging settings this client was built with.
    pub fn api_config(&self) -> &ApiConfig {
        &self.api
    }

    /// Perform a call, retrying transient failures, and return the JSON body.
    pub async fn call(&self, request: &ApiRequest) -> Result<Value, ApiError> {
        let url = self.resolve(&request.target)?;
        let mut backoff = Backoff::new(&self.retry);

        loop {
            let attempt = backoff.attempt() + 1;
            debug!(method = %request.method, %url, attempt, "Sending API request");

            let (status, message, hint) = match self.send_once(request, &url).await {
                Ok(body) => return Ok(body),
                Err(AttemptError::Fatal(err)) => {
                    error!(
                        method = %request.method,
                        %url,
                        status = ?err.status(),
                        attempt,
                        "API request failed: {}",
                        err
                    );
                    return Err(err);
                }
                Err(AttemptError::Retryable {
                    status,
                    message,
                    hint,
                }) => (status, message, hint),
            };

            match backoff.next_delay(hint) {
                Some(delay) => {
                    warn!(
                        method = %request.method,
                        %url,
                        status = ?status,
                        attempt,
                        max_attempts = backoff.max_attempts(),
                        delay_ms = delay.as_millis() as u64,
                        "Retrying after transient error: {}",
                        message
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    error!(
                        method = %request.method,
                        %url,
                        status = ?status,
                        attempt,
                        "Giving up after {} attempts: {}",
                        attempt,
                        message
                    );
                    return Err(ApiError::RetryExhausted {
                        status,
                        message,
                        attempts: attempt,
                    });
                }
            }
        }
    }

    /// Resolve a relative path against the base URL; absolute links pass through.
    fn resolve(&self, target: &str) -> Result<Url, ApiError> {
        let result = if target.starts_with("http://") || target.starts_with("https://") {
            Url::parse(target)
        } else {
            self.base_url.join(target)
        };
        result.map_err(|e| ApiError::InvalidUrl(format!("{}: {}", target, e)))
    }

    fn headers(&self, request: &ApiRequest) -> Result<HeaderMap, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        if let Some(filter) = &request.filter {
            let value = HeaderValue::from_str(filter)
                .map_err(|e| ApiError::InvalidUrl(format!("filter {:?}: {}", filter, e)))?;
            headers.insert(FILTER_HEADER, value);
        }

        Ok(headers)
    }

    /// Issue a single HTTP attempt and classify the outcome.
    async fn send_once(&self, request: &ApiRequest, url: &Url) -> Result<Value, AttemptError> {
        let mut builder = self
            .http_client
            .request(request.method.clone(), url.clone())
            .bearer_auth(self.token.as_str())
            .headers(self.headers(request).map_err(AttemptError::Fatal)?);

        if !request.params.is_empty() {
            builder = builder.query(&request.params);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                return Err(AttemptError::Retryable {
                    status: None,
                    message: format!("network error: {}", e),
                    hint: None,
                })
            }
        };

        let status = response.status();
        if status.is_success() {
            // A body cut off mid-transfer is a network failure, not a bad payload
            let body = response.bytes().await.map_err(|e| AttemptError::Retryable {
                status: None,
                message: format!("network error: {}", e),
                hint: None,
            })?;
            return serde_json::from_slice(&body)
                .map_err(|e| AttemptError::Fatal(ApiError::ParseFailed(e.to_string())));
        }

        let hint = retry_after(response.headers());
        match status {
            StatusCode::TOO_MANY_REQUESTS => Err(AttemptError::Retryable {
                status: Some(status.as_u16()),
                message: "rate limit exceeded".to_string(),
                hint,
            }),
            s if s.is_server_error() => Err(AttemptError::Retryable {
                status: Some(s.as_u16()),
                message: format!("server error: {}", s),
                hint,
            }),
            s => {
                let body = response.text().await.unwrap_or_default();
                Err(AttemptError::Fatal(ApiError::Rejected {
                    status: s.as_u16(),
                    message: rejection_message(s, &body),
                }))
            }
        }
    }
}

/// Build a short message for a rejected request.
///
/// Vision One error bodies look like `{"error":{"code":"...","message":"..."}}`;
/// the raw body is never echoed in full.
fn rejection_message(status: StatusCode, body: &str) -> String {
    let detail = serde_json::from_str::<Value>(body).ok().and_then(|v| {
        v.pointer("/error/message")
            .and_then(Value::as_str)
            .map(str::to_string)
    });

    match detail {
        Some(detail) => format!("{} ({})", status, detail),
        None => status.to_string(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::tests::test_config;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub(crate) const TEST_TOKEN: &str = "test-token";

    pub(crate) fn test_client(base_url: &str) -> ApiClient {
        let config = test_config(base_url);
        ApiClient::new(&config.api, &config.retry, TEST_TOKEN).unwrap()
    }

    #[tokio::test]
    async fn test_call_attaches_auth_and_json_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3.0/iam/accounts"))
            .and(header("Authorization", "Bearer test-token"))
            .and(header("Content-Type", "application/json"))
            .and(header("Accept", "application/json"))
            .and(query_param("top", "50"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let body = client
            .call(&ApiRequest::get("/v3.0/iam/accounts").param("top", 50))
            .await
            .unwrap();

        assert_eq!(body, json!({"items": []}));
    }

    #[tokio::test]
    async fn test_post_sends_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3.0/echo"))
            .and(body_json(json!({"hello": "world"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let body = client
            .call(&ApiRequest::post("/v3.0/echo", json!({"hello": "world"})))
            .await
            .unwrap();

        assert_eq!(body["ok"], json!(true));
    }

    #[tokio::test]
    async fn test_rate_limit_exhausts_after_max_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .expect(3)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client
            .call(&ApiRequest::get("/v3.0/iam/accounts"))
            .await
            .unwrap_err();

        match err {
            ApiError::RetryExhausted {
                status,
                ref message,
                attempts,
            } => {
                assert_eq!(status, Some(429));
                assert_eq!(message, "rate limit exceeded");
                assert_eq!(attempts, 3);
            }
            other => panic!("Expected RetryExhausted, got: {:?}", other),
        }
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_unauthorized_fails_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {"code": "InvalidToken", "message": "Token is invalid"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client
            .call(&ApiRequest::get("/v3.0/iam/accounts"))
            .await
            .unwrap_err();

        match err {
            ApiError::Rejected { status, message } => {
                assert_eq!(status, 401);
                assert!(message.contains("Token is invalid"), "{}", message);
            }
            other => panic!("Expected Rejected, got: {:?}", other),
        }
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_server_error_then_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": [1]})))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let body = client
            .call(&ApiRequest::get("/v3.0/audit/logs"))
            .await
            .unwrap();

        assert_eq!(body["items"], json!([1]));
    }

    #[tokio::test]
    async fn test_server_error_exhaustion_keeps_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .expect(3)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client
            .call(&ApiRequest::get("/v3.0/audit/logs"))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::RetryExhausted { .. }));
        assert_eq!(err.status(), Some(502));
    }

    #[tokio::test]
    async fn test_network_failure_is_retried_then_exhausted() {
        // Bind then drop a listener so the port refuses connections
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = test_client(&format!("http://{}", addr));
        let err = client
            .call(&ApiRequest::get("/v3.0/iam/accounts"))
            .await
            .unwrap_err();

        match err {
            ApiError::RetryExhausted {
                status, attempts, ..
            } => {
                assert_eq!(status, None);
                assert_eq!(attempts, 3);
            }
            other => panic!("Expected RetryExhausted, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_truncated_body_is_retried_as_network_failure() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        // Promise 100 bytes, send a fragment, then hang up
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connections = Arc::new(AtomicUsize::new(0));
        let counter = connections.clone();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                counter.fetch_add(1, Ordering::SeqCst);
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let _ = socket
                    .write_all(
                        b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 100\r\n\r\n{\"items\":",
                    )
                    .await;
                let _ = socket.shutdown().await;
            }
        });

        let client = test_client(&format!("http://{}", addr));
        let err = client
            .call(&ApiRequest::get("/v3.0/iam/accounts"))
            .await
            .unwrap_err();

        match err {
            ApiError::RetryExhausted {
                status, attempts, ..
            } => {
                assert_eq!(status, None);
                assert_eq!(attempts, 3);
            }
            other => panic!("Expected RetryExhausted, got: {:?}", other),
        }
        assert_eq!(connections.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_invalid_json_body_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client
            .call(&ApiRequest::get("/v3.0/iam/accounts"))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::ParseFailed(_)));
    }

    #[tokio::test]
    async fn test_filter_header_and_absolute_links() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3.0/audit/logs"))
            .and(query_param("skipToken", "abc"))
            .and(header(FILTER_HEADER, "(category eq 'Logon and Logoff')"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let first = ApiRequest::get("/v3.0/audit/logs")
            .param("top", 100)
            .filter("(category eq 'Logon and Logoff')");
        let next = first.follow(format!("{}/v3.0/audit/logs?skipToken=abc", server.uri()));

        client.call(&next).await.unwrap();
    }

    #[test]
    fn test_rejection_message() {
        assert_eq!(
            rejection_message(StatusCode::NOT_FOUND, "not json"),
            "404 Not Found"
        );
        assert_eq!(
            rejection_message(
                StatusCode::FORBIDDEN,
                r#"{"error":{"code":"AccessDenied","message":"Insufficient permissions"}}"#
            ),
            "403 Forbidden (Insufficient permissions)"
        );
    }
}
