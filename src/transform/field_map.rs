//! Field-map transform: copy values between dotted JSON paths.
//!
//! Config is `target_path -> source_path`. Every source is read from the
//! step's *original* input so one mapping never observes another's write;
//! writes land in the running output. JSON types are preserved: numbers stay
//! numbers, objects and arrays are copied wholesale. Missing sources are
//! skipped silently.

use std::collections::HashMap;

use serde_json::Value;

use super::json_path;
use crate::error::Result;

pub fn apply(config: &HashMap<String, String>, body: Vec<u8>) -> Result<Vec<u8>> {
    let original: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        // Nothing to read paths from; pass through.
        Err(_) => return Ok(body),
    };

    let mut result = original.clone();
    for (target_path, source_path) in config {
        if let Some(value) = json_path::get_path(&original, source_path) {
            json_path::set_path(&mut result, target_path, value.clone());
        }
    }

    Ok(serde_json::to_vec(&result)?)
}
