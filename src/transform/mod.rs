//! Request/response transform pipeline.
//!
//! The request side applies a route's configured steps in order, each step
//! receiving the previous step's output; PII steps write placeholder
//! mappings into the request's vault. The response side is a single,
//! hard-coded unmask pass keyed by the same vault.

pub mod field_map;
pub mod json_path;
pub mod pii;
pub mod template;

use serde_json::Value;
use tracing::debug;

use crate::context::RequestContext;
use crate::engine::config::{Route, TransformKind};
use crate::error::Result;
use crate::scanner::Scanner;

/// Run the route's transform pipeline over a request body.
///
/// Steps run in configured order; the first failing step aborts the request.
pub fn apply_request_transforms(
    scanner: &Scanner,
    ctx: &RequestContext,
    route: &Route,
    body: Vec<u8>,
) -> Result<Vec<u8>> {
    let mut result = body;
    for step in &route.transforms {
        result = match step.kind {
            TransformKind::Pii => pii::apply_openai(scanner, ctx, result)?,
            TransformKind::PiiClaude => pii::apply_claude(scanner, ctx, result)?,
            TransformKind::FieldMap => field_map::apply(&step.config, result)?,
            TransformKind::Template => template::apply(&step.config, result)?,
        };
        debug!(
            request_id = %ctx.request_id,
            step = ?step.kind,
            vault_entries = ctx.vault_len(),
            "transform step applied"
        );
    }
    Ok(result)
}

/// Restore vault placeholders in the upstream response.
///
/// Only known content fields of known response shapes are rewritten: the
/// OpenAI `choices[].message.content` strings and the Claude top-level
/// `content[]` text blocks. Everything else stays byte-exact, and unmasking
/// is never fatal; an unparseable response passes through unchanged.
pub fn unmask_response(scanner: &Scanner, ctx: &RequestContext, body: Vec<u8>) -> Vec<u8> {
    let mut root: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(_) => return body,
    };

    let mut changed = false;

    // OpenAI shape: choices[].message.content
    if let Some(choices) = root.get_mut("choices").and_then(Value::as_array_mut) {
        for choice in choices {
            if let Some(message) = choice.get_mut("message") {
                if let Some(Value::String(content)) = message.get_mut("content") {
                    let restored = scanner.unmask(ctx, content);
                    if restored != *content {
                        *content = restored;
                        changed = true;
                    }
                }
            }
        }
    }

    // Claude shape: content[] blocks with type == "text"
    if let Some(blocks) = root.get_mut("content").and_then(Value::as_array_mut) {
        for block in blocks {
            if block.get("type").and_then(Value::as_str) != Some("text") {
                continue;
            }
            if let Some(Value::String(text)) = block.get_mut("text") {
                let restored = scanner.unmask(ctx, text);
                if restored != *text {
                    *text = restored;
                    changed = true;
                }
            }
        }
    }

    if changed {
        serde_json::to_vec(&root).unwrap_or(body)
    } else {
        body
    }
}
