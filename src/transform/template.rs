//! Template transform: rewrite the whole body through a text template.
//!
//! The step parses the input body into a generic JSON value, renders the
//! configured template with that value as context, and validates that the
//! output parses as JSON again. Any failure (unparseable input, bad
//! template, render error, non-JSON output) is fatal for the request.
//!
//! Templates use [`tinytemplate`] path syntax: `{messages.0.content}` reads
//! nested fields and array indices from the request body. Only field/index
//! access and value formatters are available to templates; there is no
//! environment or filesystem access.

use std::collections::HashMap;

use tinytemplate::TinyTemplate;

use crate::error::{AigisError, Result};

const TEMPLATE_NAME: &str = "transform";

pub fn apply(config: &HashMap<String, String>, body: Vec<u8>) -> Result<Vec<u8>> {
    let template = match config.get("template") {
        Some(t) if !t.is_empty() => t,
        _ => return Ok(body),
    };

    let data: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| step_error(format!("failed to parse body: {e}")))?;

    let mut tt = TinyTemplate::new();
    // The output is JSON, not HTML; the default HTML-escaping formatter would
    // corrupt quotes and ampersands in substituted values.
    tt.set_default_formatter(&tinytemplate::format_unescaped);
    tt.add_template(TEMPLATE_NAME, template)
        .map_err(|e| step_error(format!("invalid template: {e}")))?;

    let rendered = tt
        .render(TEMPLATE_NAME, &data)
        .map_err(|e| step_error(format!("template render failed: {e}")))?;

    if serde_json::from_str::<serde_json::Value>(&rendered).is_err() {
        return Err(step_error("template output is not valid JSON".to_string()));
    }

    Ok(rendered.into_bytes())
}

fn step_error(message: String) -> AigisError {
    AigisError::TransformFailed {
        step: "template".to_string(),
        message,
    }
}
