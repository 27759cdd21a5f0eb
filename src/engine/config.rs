use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// How the upstream call is authenticated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthStrategy {
    /// `Authorization: Bearer <token>` (default).
    #[default]
    Bearer,
    /// Token in a custom header (`header_name`, default `Authorization`).
    Header,
    /// Token as the `api_key` query parameter.
    Query,
}

/// A transform pipeline step kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformKind {
    /// Mask PII in OpenAI-shaped request bodies (`messages[].content` strings).
    Pii,
    /// Mask PII in Anthropic-shaped bodies (`system`, string or block content).
    PiiClaude,
    /// Copy values between dotted JSON paths.
    FieldMap,
    /// Rewrite the whole body through a text template.
    Template,
}

/// One declarative operation in a route's transform pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformStep {
    #[serde(rename = "type")]
    pub kind: TransformKind,
    /// Kind-specific configuration. Accepted but currently unread for the PII
    /// kinds (reserved for per-route custom rules).
    #[serde(default)]
    pub config: HashMap<String, String>,
}

/// Target backend service for a route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Upstream {
    /// Base URL, literal or `env:NAME`.
    pub base_url: String,
    /// Endpoint path appended to the base URL.
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default)]
    pub auth_strategy: AuthStrategy,
    /// Environment variable holding the upstream token. An unset or empty
    /// variable silently omits auth; the upstream's rejection surfaces it.
    #[serde(default)]
    pub token_env: String,
    /// Header name for the `header` strategy (default `Authorization`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_name: Option<String>,
}

/// Rules for building the upstream header set from the client's headers.
/// Header names are matched case-insensitively.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeaderPolicy {
    /// Client headers copied through.
    #[serde(default)]
    pub allow: Vec<String>,
    /// Headers stripped from the allow-copied set.
    #[serde(default)]
    pub remove: Vec<String>,
    /// Headers force-set on the upstream call; values may be `env:NAME`.
    /// Force-sets win over removals; auth headers win over force-sets.
    #[serde(default)]
    pub set: HashMap<String, String>,
}

/// One routing rule: matcher, upstream, header policy, transform pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    /// Unique identifier for this route.
    pub id: String,
    /// Dotted JSON path -> regex pattern. Empty map matches every body.
    #[serde(default)]
    pub matcher: HashMap<String, String>,
    pub upstream: Upstream,
    #[serde(default)]
    pub header_policy: HeaderPolicy,
    #[serde(default)]
    pub transforms: Vec<TransformStep>,
}

/// Engine section: the ordered route table. Route order is significant; the
/// first matching route wins, so a catch-all belongs last.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub routes: Vec<Route>,
}

/// Server section: listen address and log level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            log_level: default_log_level(),
        }
    }
}

/// Top-level application configuration (`aigis.toml`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

impl AppConfig {
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }
}

fn default_path() -> String {
    "/chat/completions".to_string()
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Resolve a configuration value that may reference the environment.
///
/// `env:NAME` expands to the variable's value, degrading to the empty string
/// when unset (never fatal). Anything else is returned literally.
pub fn resolve_env_ref(value: &str) -> String {
    match value.strip_prefix("env:") {
        Some(name) => std::env::var(name).unwrap_or_default(),
        None => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_route_parses_with_defaults() {
        let toml_src = r#"
[[engine.routes]]
id = "openai"
[engine.routes.upstream]
base_url = "https://api.openai.com/v1"
"#;
        let config: AppConfig = toml::from_str(toml_src).unwrap();
        let route = &config.engine.routes[0];

        assert_eq!(route.id, "openai");
        assert!(route.matcher.is_empty());
        assert_eq!(route.upstream.path, "/chat/completions");
        assert_eq!(route.upstream.auth_strategy, AuthStrategy::Bearer);
        assert!(route.transforms.is_empty());
        assert!(route.header_policy.allow.is_empty());
    }

    #[test]
    fn full_route_parses() {
        let toml_src = r#"
[server]
listen = "127.0.0.1:9000"
log_level = "debug"

[[engine.routes]]
id = "claude"
matcher = { model = "^claude-" }

[engine.routes.upstream]
base_url = "env:ANTHROPIC_BASE_URL"
path = "/v1/messages"
auth_strategy = "header"
token_env = "ANTHROPIC_API_KEY"
header_name = "x-api-key"

[engine.routes.header_policy]
allow = ["x-request-id"]
set = { x-tenant = "acme" }
remove = ["cookie"]

[[engine.routes.transforms]]
type = "pii_claude"
"#;
        let config: AppConfig = toml::from_str(toml_src).unwrap();
        assert_eq!(config.server.listen, "127.0.0.1:9000");
        assert_eq!(config.server.log_level, "debug");

        let route = &config.engine.routes[0];
        assert_eq!(route.matcher.get("model").unwrap(), "^claude-");
        assert_eq!(route.upstream.auth_strategy, AuthStrategy::Header);
        assert_eq!(route.upstream.header_name.as_deref(), Some("x-api-key"));
        assert_eq!(route.header_policy.set.get("x-tenant").unwrap(), "acme");
        assert_eq!(route.transforms[0].kind, TransformKind::PiiClaude);
    }

    #[test]
    fn transform_kinds_deserialize_snake_case() {
        for (name, kind) in [
            ("pii", TransformKind::Pii),
            ("pii_claude", TransformKind::PiiClaude),
            ("field_map", TransformKind::FieldMap),
            ("template", TransformKind::Template),
        ] {
            let step: TransformStep =
                toml::from_str(&format!("type = \"{}\"", name)).unwrap();
            assert_eq!(step.kind, kind);
        }
    }

    #[test]
    fn transform_config_is_preserved() {
        let toml_src = r#"
type = "field_map"
[config]
"inputs.query" = "messages.0.content"
"#;
        let step: TransformStep = toml::from_str(toml_src).unwrap();
        assert_eq!(
            step.config.get("inputs.query").unwrap(),
            "messages.0.content"
        );
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.listen, "0.0.0.0:8080");
        assert_eq!(config.server.log_level, "info");
        assert!(config.engine.routes.is_empty());
    }

    #[test]
    fn serde_roundtrip() {
        let toml_src = r#"
[[engine.routes]]
id = "r1"
matcher = { model = "^gpt-" }
[engine.routes.upstream]
base_url = "https://api.openai.com/v1"
token_env = "OPENAI_API_KEY"
[[engine.routes.transforms]]
type = "pii"
"#;
        let config: AppConfig = toml::from_str(toml_src).unwrap();
        let serialized = toml::to_string(&config).unwrap();
        let decoded: AppConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(decoded.engine.routes[0].id, "r1");
        assert_eq!(decoded.engine.routes[0].transforms.len(), 1);
    }

    #[test]
    fn resolve_env_ref_literal_passthrough() {
        assert_eq!(resolve_env_ref("https://api.openai.com"), "https://api.openai.com");
        assert_eq!(resolve_env_ref("acme"), "acme");
    }

    #[test]
    fn resolve_env_ref_reads_environment() {
        std::env::set_var("AIGIS_TEST_ENV_REF", "resolved-value");
        assert_eq!(resolve_env_ref("env:AIGIS_TEST_ENV_REF"), "resolved-value");
    }

    #[test]
    fn resolve_env_ref_missing_var_is_empty() {
        assert_eq!(resolve_env_ref("env:AIGIS_TEST_DEFINITELY_UNSET"), "");
    }
}
