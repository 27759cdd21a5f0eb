//! Upstream dispatch: build and execute one HTTP call per gateway request.
//!
//! A [`UniversalProvider`] is constructed from the matched route and the
//! shared, connection-pooled HTTP client. It resolves the upstream URL
//! (expanding `env:NAME` base URLs), applies the route's header policy and
//! auth strategy, POSTs the transformed body, and classifies non-200 answers
//! into the upstream error taxonomy.
//!
//! The [`Provider`] trait reserves a streaming variant; it is not implemented.

pub mod headers;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use tracing::{debug, warn};

use crate::context::RequestContext;
use crate::engine::config::{resolve_env_ref, AuthStrategy, Route};
use crate::error::{AigisError, Result};

/// Per-upstream-request deadline.
pub const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(60);

/// The LLM backend adapter interface. `stream` is reserved for a future
/// streaming mode and currently always fails with `StreamingUnsupported`.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Unique identifier for this provider.
    fn id(&self) -> &str;

    /// Send a request body upstream and return the (already-read) response body.
    async fn send(
        &self,
        ctx: &RequestContext,
        client_headers: &HashMap<String, String>,
        body: Vec<u8>,
    ) -> Result<Vec<u8>>;

    /// Send a streaming request. Reserved; not implemented.
    async fn stream(
        &self,
        ctx: &RequestContext,
        client_headers: &HashMap<String, String>,
        body: Vec<u8>,
    ) -> Result<tokio::sync::mpsc::Receiver<Vec<u8>>>;
}

/// Configurable provider driven entirely by the matched [`Route`].
pub struct UniversalProvider {
    route: Route,
    client: reqwest::Client,
}

impl UniversalProvider {
    pub fn new(route: Route, client: reqwest::Client) -> Self {
        Self { route, client }
    }

    /// Resolve the full upstream URL. The `query` auth strategy appends the
    /// token as `api_key`.
    fn build_url(&self) -> String {
        let upstream = &self.route.upstream;
        let base = resolve_env_ref(&upstream.base_url);
        let base = base.trim_end_matches('/');

        let path = if upstream.path.is_empty() {
            "/chat/completions"
        } else {
            upstream.path.as_str()
        };

        let mut url = format!("{base}{path}");

        if upstream.auth_strategy == AuthStrategy::Query {
            let token = std::env::var(&upstream.token_env).unwrap_or_default();
            if !token.is_empty() {
                let sep = if url.contains('?') { '&' } else { '?' };
                url.push(sep);
                url.push_str("api_key=");
                url.push_str(&token);
            }
        }

        url
    }
}

#[async_trait]
impl Provider for UniversalProvider {
    fn id(&self) -> &str {
        &self.route.id
    }

    async fn send(
        &self,
        ctx: &RequestContext,
        client_headers: &HashMap<String, String>,
        body: Vec<u8>,
    ) -> Result<Vec<u8>> {
        let url = self.build_url();
        let header_pairs =
            headers::build_headers(&self.route.header_policy, &self.route.upstream, client_headers);

        let mut header_map = HeaderMap::new();
        for (name, value) in &header_pairs {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    header_map.insert(name, value);
                }
                _ => warn!(header = %name, "skipping invalid upstream header"),
            }
        }

        debug!(
            request_id = %ctx.request_id,
            route_id = %self.route.id,
            url = %url,
            "dispatching to upstream"
        );

        let response = self
            .client
            .post(&url)
            .headers(header_map)
            .timeout(UPSTREAM_TIMEOUT)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AigisError::UpstreamUnreachable(format!("timeout calling {url}: {e}"))
                } else {
                    AigisError::UpstreamUnreachable(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        let response_body = response
            .bytes()
            .await
            .map_err(|e| AigisError::UpstreamUnreachable(format!("reading response: {e}")))?
            .to_vec();

        if status == 200 {
            Ok(response_body)
        } else {
            Err(classify_http_error(status, &response_body))
        }
    }

    async fn stream(
        &self,
        _ctx: &RequestContext,
        _client_headers: &HashMap<String, String>,
        _body: Vec<u8>,
    ) -> Result<tokio::sync::mpsc::Receiver<Vec<u8>>> {
        Err(AigisError::StreamingUnsupported)
    }
}

/// Map a non-200 upstream answer into the error taxonomy, pulling the most
/// useful message out of the body: OpenAI's `error.message`, then a bare
/// `message`, then the raw body.
pub fn classify_http_error(status: u16, body: &[u8]) -> AigisError {
    let message = extract_error_message(body)
        .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned());

    match status {
        401 => AigisError::UpstreamUnauthorized(message),
        429 => AigisError::UpstreamRateLimited(message),
        400 => AigisError::UpstreamBadRequest(message),
        _ => AigisError::UpstreamError { status, message },
    }
}

fn extract_error_message(body: &[u8]) -> Option<String> {
    let root: Value = serde_json::from_slice(body).ok()?;

    if let Some(message) = root
        .get("error")
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
    {
        if !message.is_empty() {
            return Some(message.to_string());
        }
    }

    root.get("message")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .map(|m| m.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::{HeaderPolicy, Upstream};

    fn make_route(base_url: &str, path: &str, strategy: AuthStrategy, token_env: &str) -> Route {
        Route {
            id: "test".to_string(),
            matcher: HashMap::new(),
            upstream: Upstream {
                base_url: base_url.to_string(),
                path: path.to_string(),
                auth_strategy: strategy,
                token_env: token_env.to_string(),
                header_name: None,
            },
            header_policy: HeaderPolicy::default(),
            transforms: vec![],
        }
    }

    fn provider(route: Route) -> UniversalProvider {
        UniversalProvider::new(route, reqwest::Client::new())
    }

    #[test]
    fn url_joins_base_and_path() {
        let p = provider(make_route(
            "https://api.openai.com/v1",
            "/chat/completions",
            AuthStrategy::Bearer,
            "",
        ));
        assert_eq!(p.build_url(), "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn url_trims_trailing_slash() {
        let p = provider(make_route(
            "https://api.openai.com/v1/",
            "/chat/completions",
            AuthStrategy::Bearer,
            "",
        ));
        assert_eq!(p.build_url(), "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn url_defaults_path_when_empty() {
        let p = provider(make_route(
            "https://api.openai.com/v1",
            "",
            AuthStrategy::Bearer,
            "",
        ));
        assert_eq!(p.build_url(), "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn url_resolves_env_base() {
        std::env::set_var("AIGIS_TEST_BASE_URL", "https://internal.llm.example");
        let p = provider(make_route(
            "env:AIGIS_TEST_BASE_URL",
            "/v1/messages",
            AuthStrategy::Bearer,
            "",
        ));
        assert_eq!(p.build_url(), "https://internal.llm.example/v1/messages");
    }

    #[test]
    fn query_strategy_appends_api_key() {
        std::env::set_var("AIGIS_TEST_QTOKEN", "secret-q");
        let p = provider(make_route(
            "https://generativelanguage.googleapis.com",
            "/v1beta/models",
            AuthStrategy::Query,
            "AIGIS_TEST_QTOKEN",
        ));
        assert_eq!(
            p.build_url(),
            "https://generativelanguage.googleapis.com/v1beta/models?api_key=secret-q"
        );
    }

    #[test]
    fn query_strategy_without_token_leaves_url_bare() {
        let p = provider(make_route(
            "https://upstream.test",
            "/v1",
            AuthStrategy::Query,
            "AIGIS_TEST_QTOKEN_UNSET",
        ));
        assert_eq!(p.build_url(), "https://upstream.test/v1");
    }

    #[test]
    fn classify_401_with_openai_error_shape() {
        let err = classify_http_error(
            401,
            br#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#,
        );
        assert!(matches!(err, AigisError::UpstreamUnauthorized(_)));
        assert!(err.to_string().contains("Incorrect API key provided"));
    }

    #[test]
    fn classify_429() {
        let err = classify_http_error(429, br#"{"error":{"message":"Rate limit reached"}}"#);
        assert!(matches!(err, AigisError::UpstreamRateLimited(_)));
    }

    #[test]
    fn classify_400() {
        let err = classify_http_error(400, br#"{"error":{"message":"bad input"}}"#);
        assert!(matches!(err, AigisError::UpstreamBadRequest(_)));
    }

    #[test]
    fn classify_other_status_keeps_code() {
        let err = classify_http_error(503, br#"{"message":"overloaded"}"#);
        match err {
            AigisError::UpstreamError { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "overloaded");
            }
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn classify_falls_back_to_simple_message_shape() {
        let err = classify_http_error(401, br#"{"message":"no key"}"#);
        assert!(err.to_string().contains("no key"));
    }

    #[test]
    fn classify_falls_back_to_raw_body() {
        let err = classify_http_error(500, b"upstream exploded");
        assert!(err.to_string().contains("upstream exploded"));
    }

    #[test]
    fn provider_id_is_the_route_id() {
        let p = provider(make_route(
            "https://upstream.test",
            "/chat/completions",
            AuthStrategy::Bearer,
            "",
        ));
        assert_eq!(p.id(), "test");
    }

    #[tokio::test]
    async fn stream_is_reserved() {
        let p = provider(make_route(
            "https://upstream.test",
            "/chat/completions",
            AuthStrategy::Bearer,
            "",
        ));
        let ctx = RequestContext::new(None);
        let err = p.stream(&ctx, &HashMap::new(), vec![]).await.unwrap_err();
        assert!(matches!(err, AigisError::StreamingUnsupported));
    }
}
