//! Gateway HTTP server.
//!
//! Exposes `POST /v1/chat/completions` plus health and root endpoints. Per
//! request: select a route, create a [`RequestContext`], run the route's
//! transform pipeline (vault fills), dispatch upstream, unmask the response
//! (vault reads), write an audit row, answer. Errors map through
//! [`AigisError::status_code`] to plain-text responses; the audit row is
//! written for failures too. A client disconnect drops the handler future,
//! which aborts any in-flight upstream call; the vault dies with the context.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use rusqlite::Connection;
use serde_json::Value;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::audit::{self, GatewayLog};
use crate::context::RequestContext;
use crate::engine::router::RouteEngine;
use crate::error::{AigisError, Result};
use crate::scanner::Scanner;
use crate::transform;
use crate::upstream::{Provider, UniversalProvider};

/// Shared, immutable gateway state: frozen config, stateless scanner, pooled
/// HTTP client, and the optional audit database.
pub struct GatewayState {
    pub engine: RouteEngine,
    pub scanner: Scanner,
    pub http: reqwest::Client,
    pub audit: Option<Arc<Mutex<Connection>>>,
}

/// The gateway server. Builder-style construction, `start` binds and serves.
pub struct GatewayServer {
    listen_addr: String,
    engine: RouteEngine,
    scanner: Scanner,
    audit: Option<Arc<Mutex<Connection>>>,
}

impl GatewayServer {
    pub fn new(listen_addr: String, engine: RouteEngine, scanner: Scanner) -> Self {
        Self {
            listen_addr,
            engine,
            scanner,
            audit: None,
        }
    }

    pub fn with_audit(mut self, conn: Arc<Mutex<Connection>>) -> Self {
        self.audit = Some(conn);
        self
    }

    /// Bind, spawn the accept loop, and return the actual bound address.
    pub async fn start(self) -> Result<SocketAddr> {
        let listener = TcpListener::bind(&self.listen_addr).await?;
        let local_addr = listener.local_addr()?;
        info!("AIGis gateway listening on {}", local_addr);

        let state = Arc::new(GatewayState {
            engine: self.engine,
            scanner: self.scanner,
            http: reqwest::Client::new(),
            audit: self.audit,
        });

        let app = router(state);
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!("server error: {}", e);
            }
        });

        Ok(local_addr)
    }
}

/// Build the axum router for the gateway.
pub fn router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/v1/chat/completions", post(handle_chat_completions))
        .route("/health", get(health))
        .route("/", get(root))
        .with_state(state)
}

async fn health() -> Response {
    json_body(r#"{"status":"ok"}"#)
}

async fn root() -> Response {
    json_body(r#"{"message":"AIGis is running"}"#)
}

async fn handle_chat_completions(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let trace_id = headers
        .get("x-trace-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    let ctx = RequestContext::new(trace_id);
    let model = extract_model(&body);

    let result = process(&state, &ctx, &headers, &body).await;

    let (outcome, status) = match &result {
        Ok(_) => ("ok".to_string(), 200),
        Err(e) => (e.kind().to_string(), e.status_code()),
    };
    write_audit_row(&state, &ctx, &model, &outcome, status);

    match result {
        Ok(response_body) => json_bytes(response_body),
        Err(e) => {
            error!(
                request_id = %ctx.request_id,
                trace_id = %ctx.trace_id,
                kind = e.kind(),
                error = %e,
                "gateway request failed"
            );
            e.into_response()
        }
    }
}

/// The core request flow: route -> transform -> dispatch -> unmask.
async fn process(
    state: &GatewayState,
    ctx: &RequestContext,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Vec<u8>> {
    let route = state
        .engine
        .find_route(body)?
        .ok_or(AigisError::NoRoute)?
        .clone();

    ctx.set_metadata("route_id", Value::String(route.id.clone()));
    info!(
        request_id = %ctx.request_id,
        trace_id = %ctx.trace_id,
        route_id = %route.id,
        "request started"
    );

    let client_headers = normalize_headers(headers);
    let transformed =
        transform::apply_request_transforms(&state.scanner, ctx, &route, body.to_vec())?;

    let provider = UniversalProvider::new(route, state.http.clone());
    let response = provider.send(ctx, &client_headers, transformed).await?;

    let unmasked = transform::unmask_response(&state.scanner, ctx, response);

    info!(
        request_id = %ctx.request_id,
        latency_ms = ctx.elapsed_ms(),
        masked = ctx.vault_len(),
        "request finished"
    );
    Ok(unmasked)
}

fn write_audit_row(
    state: &GatewayState,
    ctx: &RequestContext,
    model: &str,
    outcome: &str,
    status: u16,
) {
    let Some(audit) = &state.audit else { return };

    let route_id = ctx
        .get_metadata("route_id")
        .and_then(|v| v.as_str().map(|s| s.to_string()))
        .unwrap_or_default();

    let row = GatewayLog {
        id: None,
        timestamp: chrono::Utc::now().to_rfc3339(),
        request_id: ctx.request_id.clone(),
        route_id,
        model: model.to_string(),
        outcome: outcome.to_string(),
        status,
        latency_ms: ctx.elapsed_ms(),
        masked: ctx.vault_len() as i64,
    };

    match audit.lock() {
        Ok(conn) => {
            if let Err(e) = audit::log_request(&conn, &row) {
                warn!("failed to write audit row: {}", e);
            }
        }
        Err(_) => warn!("audit connection poisoned, dropping row"),
    }
}

/// Client headers as a lowercase-keyed map for the header policy.
fn normalize_headers(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_lowercase(), v.to_string()))
        })
        .collect()
}

/// Best-effort `model` extraction for the audit trail.
fn extract_model(body: &[u8]) -> String {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|v| v.get("model").and_then(Value::as_str).map(|s| s.to_string()))
        .unwrap_or_default()
}

fn json_body(body: &'static str) -> Response {
    Response::builder()
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap_or_else(|_| ().into_response())
}

fn json_bytes(body: Vec<u8>) -> Response {
    Response::builder()
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap_or_else(|_| ().into_response())
}
