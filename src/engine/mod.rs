//! Routing engine for AIGis.
//!
//! This module provides the TOML-based configuration model ([`config`]) and
//! the first-match route selection engine ([`router`]) that picks an upstream
//! and transform pipeline for each request body.

pub mod config;
pub mod router;
