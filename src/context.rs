//! Per-request context and secret vault.
//!
//! A [`RequestContext`] is created when a gateway request arrives, threaded
//! through the request-side transform pipeline and the response-side unmask
//! pass, and dropped when the response is written. The **secret vault**, a
//! mapping from opaque placeholder to original plaintext, lives here rather
//! than on the scanner, which stays stateless. The vault is filled during the
//! request phase and only read during the response phase; both locks are
//! reader-writer so diagnostic code can inspect state without blocking.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Instant;

/// Per-request state: identifiers, timing, metadata, and the secret vault.
pub struct RequestContext {
    /// Unique id for this request (`req_<nanos>`).
    pub request_id: String,
    /// Trace id propagated from the client, or equal to `request_id`.
    pub trace_id: String,
    /// Wall-clock start of request processing.
    pub started: Instant,

    metadata: RwLock<HashMap<String, serde_json::Value>>,

    /// placeholder -> original secret mappings for bidirectional tokenization,
    /// e.g. `"__AIGIS_SEC_a1b2c3d4e5f6__" -> "sk-real-key"`.
    vault: RwLock<HashMap<String, String>>,
}

impl RequestContext {
    /// Create a context with a fresh request id. `trace_id` falls back to the
    /// request id when the client did not supply one.
    pub fn new(trace_id: Option<String>) -> Self {
        let request_id = generate_request_id();
        let trace_id = trace_id.unwrap_or_else(|| request_id.clone());
        Self {
            request_id,
            trace_id,
            started: Instant::now(),
            metadata: RwLock::new(HashMap::new()),
            vault: RwLock::new(HashMap::new()),
        }
    }

    /// Milliseconds elapsed since the context was created.
    pub fn elapsed_ms(&self) -> i64 {
        self.started.elapsed().as_millis() as i64
    }

    /// Set a metadata value (thread-safe).
    pub fn set_metadata(&self, key: &str, value: serde_json::Value) {
        self.metadata
            .write()
            .expect("metadata lock poisoned")
            .insert(key.to_string(), value);
    }

    /// Get a metadata value (thread-safe).
    pub fn get_metadata(&self, key: &str) -> Option<serde_json::Value> {
        self.metadata
            .read()
            .expect("metadata lock poisoned")
            .get(key)
            .cloned()
    }

    /// Store a placeholder -> original mapping in the vault.
    pub fn vault_store(&self, placeholder: &str, original: &str) {
        self.vault
            .write()
            .expect("vault lock poisoned")
            .insert(placeholder.to_string(), original.to_string());
    }

    /// Retrieve the original secret for a placeholder.
    pub fn vault_get(&self, placeholder: &str) -> Option<String> {
        self.vault
            .read()
            .expect("vault lock poisoned")
            .get(placeholder)
            .cloned()
    }

    /// Number of entries currently in the vault.
    pub fn vault_len(&self) -> usize {
        self.vault.read().expect("vault lock poisoned").len()
    }

    /// Snapshot of all vault mappings, for diagnostics.
    pub fn vault_entries(&self) -> HashMap<String, String> {
        self.vault.read().expect("vault lock poisoned").clone()
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new(None)
    }
}

fn generate_request_id() -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    format!("req_{}", nanos)
}
