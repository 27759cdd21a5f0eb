use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "aigis")]
#[command(about = "LLM gateway with bidirectional tokenization of secrets and PII")]
#[command(version)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "aigis.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the gateway server
    Serve,
    /// Show the configured route table
    Routes,
    /// Redact sensitive data from text (preview of the Sanitize pass)
    Scan {
        /// Text to scan; omit to read stdin
        text: Option<String>,
    },
    /// View the request audit trail
    Logs {
        /// Show last N entries
        #[arg(long, default_value = "50")]
        tail: usize,
        /// Export the full trail instead of a table
        #[arg(long)]
        export: bool,
        /// Export format (json or csv)
        #[arg(long, default_value = "json")]
        format: String,
    },
    /// Initialize AIGis configuration and audit database
    Init,
}
