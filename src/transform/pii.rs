//! PII masking transforms for the two chat-completion body shapes.
//!
//! OpenAI treats `content` as a plain string; Anthropic allows `content` to be
//! a string or an array of typed blocks (and adds a top-level `system`
//! prompt). Keeping two transforms makes each traversal contract explicit;
//! a route picks the one matching its downstream.
//!
//! Both transforms pass a non-JSON body through unchanged: a body that did
//! not parse had no content fields to mask in the first place.

use serde_json::Value;

use crate::context::RequestContext;
use crate::error::Result;
use crate::scanner::Scanner;

/// Mask `messages[].content` strings in an OpenAI-shaped request body.
/// Non-string content (tool call results, block arrays) is ignored.
pub fn apply_openai(scanner: &Scanner, ctx: &RequestContext, body: Vec<u8>) -> Result<Vec<u8>> {
    let mut root: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(_) => return Ok(body),
    };

    let mut changed = false;
    if let Some(messages) = root.get_mut("messages").and_then(Value::as_array_mut) {
        for message in messages {
            if let Some(Value::String(content)) = message.get_mut("content") {
                changed |= mask_in_place(scanner, ctx, content);
            }
        }
    }

    if changed {
        Ok(serde_json::to_vec(&root)?)
    } else {
        Ok(body)
    }
}

/// Mask an Anthropic-shaped request body: the optional top-level `system`
/// string, string `content`, and the `text` field of `type == "text"` content
/// blocks. Non-text blocks (images, tool use) are left byte-identical.
pub fn apply_claude(scanner: &Scanner, ctx: &RequestContext, body: Vec<u8>) -> Result<Vec<u8>> {
    let mut root: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(_) => return Ok(body),
    };

    let mut changed = false;

    if let Some(Value::String(system)) = root.get_mut("system") {
        changed |= mask_in_place(scanner, ctx, system);
    }

    if let Some(messages) = root.get_mut("messages").and_then(Value::as_array_mut) {
        for message in messages {
            match message.get_mut("content") {
                Some(Value::String(content)) => {
                    changed |= mask_in_place(scanner, ctx, content);
                }
                Some(Value::Array(blocks)) => {
                    for block in blocks {
                        if block.get("type").and_then(Value::as_str) != Some("text") {
                            continue;
                        }
                        if let Some(Value::String(text)) = block.get_mut("text") {
                            changed |= mask_in_place(scanner, ctx, text);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    if changed {
        Ok(serde_json::to_vec(&root)?)
    } else {
        Ok(body)
    }
}

/// Mask one string field; returns whether it changed.
fn mask_in_place(scanner: &Scanner, ctx: &RequestContext, field: &mut String) -> bool {
    let masked = scanner.mask(ctx, field, &[]);
    if masked != *field {
        *field = masked;
        true
    } else {
        false
    }
}
