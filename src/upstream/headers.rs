//! Header-policy application for upstream requests.
//!
//! Builds the upstream header set from the client's headers and the route's
//! declarative policy. Order matters and later stages win: allow-copies, then
//! removals, then force-sets, then auth (which overrides any collision), then
//! a `Content-Type` default. Removals therefore strip client-supplied headers
//! but never a force-set value. All names are normalized to lowercase so
//! matching is case-insensitive.

use std::collections::HashMap;

use crate::engine::config::{resolve_env_ref, AuthStrategy, HeaderPolicy, Upstream};

/// Build the final upstream header map.
///
/// `client_headers` must already be keyed by lowercase name (the server layer
/// normalizes once per request).
pub fn build_headers(
    policy: &HeaderPolicy,
    upstream: &Upstream,
    client_headers: &HashMap<String, String>,
) -> HashMap<String, String> {
    let mut headers: HashMap<String, String> = HashMap::new();

    // 1. Copy allow-listed client headers.
    for name in &policy.allow {
        let name = name.to_lowercase();
        if let Some(value) = client_headers.get(&name) {
            headers.insert(name, value.clone());
        }
    }

    // 2. Removals strip allow-copied client headers.
    for name in &policy.remove {
        headers.remove(&name.to_lowercase());
    }

    // 3. Force-set headers win over removals; env references resolve now and
    //    drop when empty.
    for (name, value) in &policy.set {
        let resolved = resolve_env_ref(value);
        if value.starts_with("env:") && resolved.is_empty() {
            continue;
        }
        headers.insert(name.to_lowercase(), resolved);
    }

    // 4. Auth last, overriding any prior collision. An empty token omits auth
    //    entirely; the upstream's 401 surfaces the misconfiguration.
    let token = std::env::var(&upstream.token_env).unwrap_or_default();
    if !token.is_empty() {
        match upstream.auth_strategy {
            AuthStrategy::Bearer => {
                headers.insert("authorization".to_string(), format!("Bearer {token}"));
            }
            AuthStrategy::Header => {
                let name = upstream
                    .header_name
                    .as_deref()
                    .unwrap_or("Authorization")
                    .to_lowercase();
                headers.insert(name, token);
            }
            // Token goes into the URL, not the headers.
            AuthStrategy::Query => {}
        }
    }

    // 5. Content type default.
    headers
        .entry("content-type".to_string())
        .or_insert_with(|| "application/json".to_string());

    headers
}
