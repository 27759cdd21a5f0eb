//! # AIGis
//!
//! **LLM gateway with bidirectional tokenization of secrets and PII.**
//!
//! AIGis sits between client applications and LLM backends. It terminates
//! OpenAI-style chat-completion requests, selects an upstream per request
//! body, rewrites the body through a declarative transform pipeline, forwards
//! the call, and restores masked values on the way back. Secrets and PII
//! detected in the outbound payload are replaced by deterministic opaque
//! placeholders before the upstream sees them; placeholders surviving the
//! round trip are restored before the client sees the response.
//!
//! ## Architecture
//!
//! - **[`scanner`]** — ordered sensitive-data rules; Sanitize (irreversible)
//!   and Mask/Unmask (vault-backed tokenization)
//! - **[`context`]** — per-request state carrying the secret vault
//! - **[`engine`]** — route configuration and first-match route selection
//! - **[`transform`]** — transform pipeline (`pii`, `pii_claude`, `field_map`,
//!   `template`) and the response-side unmask pass
//! - **[`upstream`]** — upstream URL/auth/header construction, HTTP dispatch,
//!   error classification
//! - **[`server`]** — axum HTTP server exposing the gateway endpoint
//! - **[`audit`]** — SQLite-backed request audit trail with JSON/CSV export
//! - **[`cli`]** — command-line interface (clap)
//! - **[`error`]** — unified error types using `thiserror`
//!
//! ## Quick Start
//!
//! ```bash
//! # Write a starter config and create the audit database
//! aigis init
//!
//! # Start the gateway
//! OPENAI_API_KEY=sk-... aigis serve
//!
//! # Point clients at the gateway
//! curl -X POST http://127.0.0.1:8080/v1/chat/completions \
//!   -d '{"model":"gpt-4o","messages":[{"role":"user","content":"hi"}]}'
//! ```

pub mod audit;
pub mod cli;
pub mod context;
pub mod engine;
pub mod error;
pub mod scanner;
pub mod server;
pub mod transform;
pub mod upstream;
