use anyhow::{Result, anyhow};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use std::error::Error as StdError;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::debug;

use super::types::{FailureReason, ProbeOutcome};
use crate::database::models::{Endpoint, HttpMethod};

/// Performs a single probe against an endpoint.
///
/// Implementations never fail: every problem is folded into the returned
/// [`ProbeOutcome`].
#[async_trait::async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, endpoint: &Endpoint) -> ProbeOutcome;
}

/// HTTP prober backed by a shared reqwest client
pub struct HttpProber {
    client: reqwest::Client,
}

impl HttpProber {
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder().user_agent(user_agent).build()?;

        Ok(Self { client })
    }

    fn build_request(&self, endpoint: &Endpoint) -> Result<reqwest::RequestBuilder> {
        let mut request = self
            .client
            .request(reqwest::Method::from(endpoint.method), endpoint.url.as_str())
            .headers(request_headers(endpoint)?);

        if endpoint.method == HttpMethod::Post {
            if let Some(body) = &endpoint.body {
                request = request.body(request_body(body));
            }
        }

        Ok(request)
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Head => reqwest::Method::HEAD,
        }
    }
}

/// JSON content type by default; configured headers replace it on conflict
fn request_headers(endpoint: &Endpoint) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    for (key, value) in endpoint.headers.iter().flatten() {
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|e| anyhow!("Invalid header name '{key}': {e}"))?;
        let value =
            HeaderValue::from_str(value).map_err(|e| anyhow!("Invalid value for header '{key}': {e}"))?;
        headers.insert(name, value);
    }

    Ok(headers)
}

/// Valid JSON is re-serialized, anything else goes out verbatim
fn request_body(raw: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(value) => value.to_string(),
        Err(_) => raw.to_string(),
    }
}

/// reqwest hides the interesting part of an error in its source chain
fn describe_error(error: &(dyn StdError + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

#[async_trait::async_trait]
impl Prober for HttpProber {
    async fn probe(&self, endpoint: &Endpoint) -> ProbeOutcome {
        let start = Instant::now();

        let request = match self.build_request(endpoint) {
            Ok(request) => request,
            Err(e) => {
                return ProbeOutcome::transport_failure(
                    elapsed_ms(start),
                    FailureReason::Network,
                    e.to_string(),
                );
            }
        };

        let limit = Duration::from_millis(endpoint.timeout_ms);
        let outcome = match timeout(limit, request.send()).await {
            Err(_) => ProbeOutcome::transport_failure(
                elapsed_ms(start),
                FailureReason::Timeout,
                format!("Request timed out after {} ms", endpoint.timeout_ms),
            ),
            Ok(Err(e)) => {
                let reason = if e.is_timeout() { FailureReason::Timeout } else { FailureReason::Network };
                ProbeOutcome::transport_failure(elapsed_ms(start), reason, describe_error(&e))
            }
            Ok(Ok(response)) => {
                let latency_ms = elapsed_ms(start);
                let status = response.status().as_u16();
                if status == endpoint.expected_status_code {
                    ProbeOutcome::success(latency_ms, status)
                } else {
                    ProbeOutcome::status_mismatch(latency_ms, endpoint.expected_status_code, status)
                }
            }
        };

        debug!(
            endpoint_id = %endpoint.id,
            method = %endpoint.method,
            url = %endpoint.url,
            latency_ms = outcome.latency_ms,
            success = outcome.success,
            "Probe finished"
        );

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn prober() -> HttpProber {
        HttpProber::new("pingboard-test").unwrap()
    }

    fn endpoint_for(server: &MockServer, route: &str) -> Endpoint {
        Endpoint::new("owner", "mock", format!("{}{}", server.uri(), route))
    }

    #[tokio::test]
    async fn test_expected_status_is_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = prober().probe(&endpoint_for(&server, "/health")).await;

        assert!(outcome.success);
        assert_eq!(outcome.status_code, Some(200));
        assert!(outcome.failure.is_none());
    }

    #[tokio::test]
    async fn test_unexpected_status_is_mismatch() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(503)).mount(&server).await;

        let outcome = prober().probe(&endpoint_for(&server, "/")).await;

        assert!(!outcome.success);
        assert_eq!(outcome.status_code, Some(503));
        assert_eq!(outcome.failure_reason(), Some(FailureReason::StatusMismatch));
        assert_eq!(outcome.error_message(), Some("Expected 200, got 503"));
    }

    #[tokio::test]
    async fn test_custom_expected_status() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD")).respond_with(ResponseTemplate::new(204)).mount(&server).await;

        let mut endpoint = endpoint_for(&server, "/");
        endpoint.method = HttpMethod::Head;
        endpoint.expected_status_code = 204;

        assert!(prober().probe(&endpoint).await.success);
    }

    #[tokio::test]
    async fn test_configured_headers_override_default_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("content-type", "text/plain"))
            .and(header("x-api-key", "secret"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let mut endpoint = endpoint_for(&server, "/");
        endpoint.headers = Some(BTreeMap::from([
            ("Content-Type".to_string(), "text/plain".to_string()),
            ("X-Api-Key".to_string(), "secret".to_string()),
        ]));

        assert!(prober().probe(&endpoint).await.success);
    }

    #[tokio::test]
    async fn test_default_content_type_is_json() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        assert!(prober().probe(&endpoint_for(&server, "/")).await.success);
    }

    #[tokio::test]
    async fn test_post_body_json_is_reserialized() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string(r#"{"ping":true}"#))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let mut endpoint = endpoint_for(&server, "/");
        endpoint.method = HttpMethod::Post;
        endpoint.body = Some("{ \"ping\" : true }".to_string());

        assert!(prober().probe(&endpoint).await.success);
    }

    #[tokio::test]
    async fn test_post_body_invalid_json_is_sent_raw() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string("ping=1"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let mut endpoint = endpoint_for(&server, "/");
        endpoint.method = HttpMethod::Post;
        endpoint.body = Some("ping=1".to_string());

        assert!(prober().probe(&endpoint).await.success);
    }

    #[tokio::test]
    async fn test_slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(1_000)))
            .mount(&server)
            .await;

        let mut endpoint = endpoint_for(&server, "/");
        endpoint.timeout_ms = 50;

        let outcome = prober().probe(&endpoint).await;

        assert!(!outcome.success);
        assert_eq!(outcome.status_code, None);
        assert_eq!(outcome.failure_reason(), Some(FailureReason::Timeout));
        assert!(outcome.latency_ms < 1_000);
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_failure() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let endpoint = Endpoint::new("owner", "closed", format!("http://127.0.0.1:{port}/"));
        let outcome = prober().probe(&endpoint).await;

        assert!(!outcome.success);
        assert_eq!(outcome.status_code, None);
        assert_eq!(outcome.failure_reason(), Some(FailureReason::Network));
        assert!(outcome.error_message().is_some_and(|m| !m.is_empty()));
    }

    #[test]
    fn test_request_body_normalization() {
        assert_eq!(request_body("[1, 2]"), "[1,2]");
        assert_eq!(request_body("plain text"), "plain text");
    }
}
