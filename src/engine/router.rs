//! First-match route selection over request bodies.
//!
//! A [`RouteEngine`] is built once at startup from the configured route list;
//! every matcher regex is compiled up front so that an invalid pattern fails
//! construction (naming the route and JSON path) instead of a live request.
//! Matching is read-only and safe under concurrent calls.

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use super::config::{EngineConfig, Route};
use crate::error::{AigisError, Result};
use crate::transform::json_path;

/// The route engine: routes in declared order plus their compiled matchers.
#[derive(Debug)]
pub struct RouteEngine {
    config: EngineConfig,
    /// Compiled `(json_path, regex)` pairs, parallel to `config.routes`.
    matchers: Vec<Vec<(String, Regex)>>,
}

impl RouteEngine {
    /// Build the engine, compiling every matcher regex.
    pub fn new(config: EngineConfig) -> Result<Self> {
        let mut matchers = Vec::with_capacity(config.routes.len());
        for route in &config.routes {
            let mut compiled = Vec::with_capacity(route.matcher.len());
            for (json_path, pattern) in &route.matcher {
                let regex =
                    Regex::new(pattern).map_err(|source| AigisError::InvalidMatcher {
                        route_id: route.id.clone(),
                        json_path: json_path.clone(),
                        source,
                    })?;
                compiled.push((json_path.clone(), regex));
            }
            matchers.push(compiled);
        }
        Ok(Self { config, matchers })
    }

    /// Find the first route whose every matcher holds for `body`.
    ///
    /// A route with an empty matcher map matches any well-formed JSON body
    /// (the customary catch-all). Returns `Ok(None)` when nothing matches and
    /// an error when the body is not JSON.
    pub fn find_route(&self, body: &[u8]) -> Result<Option<&Route>> {
        let root: Value = serde_json::from_slice(body)
            .map_err(|e| AigisError::BadRequestBody(e.to_string()))?;

        for (route, matchers) in self.config.routes.iter().zip(&self.matchers) {
            let all_match = matchers.iter().all(|(path, regex)| {
                match json_path::get_path(&root, path) {
                    Some(value) => regex.is_match(&match_text(value)),
                    // Absent path: this route cannot match.
                    None => false,
                }
            });

            if all_match {
                debug!(route_id = %route.id, "route matched");
                return Ok(Some(route));
            }
        }

        Ok(None)
    }

    /// All configured routes in declared order.
    pub fn routes(&self) -> &[Route] {
        &self.config.routes
    }
}

/// Text the matcher regex runs against: the bare string for string values,
/// compact JSON for everything else.
fn match_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::{AuthStrategy, HeaderPolicy, Upstream};

    fn make_route(id: &str, matcher: Vec<(&str, &str)>) -> Route {
        Route {
            id: id.to_string(),
            matcher: matcher
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            upstream: Upstream {
                base_url: "https://upstream.test".to_string(),
                path: "/chat/completions".to_string(),
                auth_strategy: AuthStrategy::Bearer,
                token_env: String::new(),
                header_name: None,
            },
            header_policy: HeaderPolicy::default(),
            transforms: vec![],
        }
    }

    fn engine(routes: Vec<Route>) -> RouteEngine {
        RouteEngine::new(EngineConfig { routes }).unwrap()
    }

    #[test]
    fn first_matching_route_wins() {
        let e = engine(vec![
            make_route("a", vec![]),
            make_route("b", vec![]),
        ]);
        let route = e.find_route(br#"{"model":"gpt-4"}"#).unwrap().unwrap();
        assert_eq!(route.id, "a");
    }

    #[test]
    fn model_regex_selects_route() {
        let e = engine(vec![
            make_route("openai", vec![("model", "^gpt-")]),
            make_route("fallback", vec![]),
        ]);

        let route = e.find_route(br#"{"model":"gpt-4o"}"#).unwrap().unwrap();
        assert_eq!(route.id, "openai");

        let route = e
            .find_route(br#"{"model":"claude-3-opus"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(route.id, "fallback");
    }

    #[test]
    fn empty_matcher_is_universal() {
        let e = engine(vec![make_route("any", vec![])]);
        for body in [
            br#"{"model":"whatever"}"#.as_slice(),
            br#"{}"#.as_slice(),
            br#"{"messages":[]}"#.as_slice(),
        ] {
            assert_eq!(e.find_route(body).unwrap().unwrap().id, "any");
        }
    }

    #[test]
    fn absent_path_fails_the_route() {
        let e = engine(vec![make_route("needs-model", vec![("model", ".*")])]);
        assert!(e.find_route(br#"{"messages":[]}"#).unwrap().is_none());
    }

    #[test]
    fn all_matchers_must_hold() {
        let e = engine(vec![make_route(
            "both",
            vec![("model", "^gpt-"), ("stream", "false")],
        )]);

        assert!(e
            .find_route(br#"{"model":"gpt-4","stream":false}"#)
            .unwrap()
            .is_some());
        assert!(e
            .find_route(br#"{"model":"gpt-4","stream":true}"#)
            .unwrap()
            .is_none());
        assert!(e.find_route(br#"{"model":"gpt-4"}"#).unwrap().is_none());
    }

    #[test]
    fn non_string_values_match_raw_json() {
        let e = engine(vec![make_route("n", vec![("max_tokens", "^1024$")])]);
        assert!(e
            .find_route(br#"{"max_tokens":1024}"#)
            .unwrap()
            .is_some());
        assert!(e.find_route(br#"{"max_tokens":2048}"#).unwrap().is_none());
    }

    #[test]
    fn nested_path_matcher() {
        let e = engine(vec![make_route(
            "nested",
            vec![("messages.0.role", "^user$")],
        )]);
        assert!(e
            .find_route(br#"{"messages":[{"role":"user","content":"hi"}]}"#)
            .unwrap()
            .is_some());
        assert!(e
            .find_route(br#"{"messages":[{"role":"system","content":"hi"}]}"#)
            .unwrap()
            .is_none());
    }

    #[test]
    fn no_route_returns_none() {
        let e = engine(vec![make_route("strict", vec![("model", "^never$")])]);
        assert!(e.find_route(br#"{"model":"gpt-4"}"#).unwrap().is_none());
    }

    #[test]
    fn invalid_body_is_an_error() {
        let e = engine(vec![make_route("any", vec![])]);
        let err = e.find_route(b"not json").unwrap_err();
        assert!(matches!(err, AigisError::BadRequestBody(_)));
    }

    #[test]
    fn invalid_matcher_regex_fails_construction() {
        let result = RouteEngine::new(EngineConfig {
            routes: vec![make_route("bad", vec![("model", "([unclosed")])],
        });
        let err = result.err().expect("construction must fail");
        match err {
            AigisError::InvalidMatcher {
                route_id,
                json_path,
                ..
            } => {
                assert_eq!(route_id, "bad");
                assert_eq!(json_path, "model");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn routes_preserve_declared_order() {
        let e = engine(vec![
            make_route("one", vec![("model", "^gpt-")]),
            make_route("two", vec![]),
            make_route("three", vec![]),
        ]);
        let ids: Vec<&str> = e.routes().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["one", "two", "three"]);
    }
}
