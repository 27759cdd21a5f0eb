use std::io::Read;
use std::path::Path;

use aigis::audit;
use aigis::cli::{Cli, Commands};
use aigis::engine::config::AppConfig;
use aigis::engine::router::RouteEngine;
use aigis::scanner::Scanner;
use aigis::server::GatewayServer;
use clap::Parser;

fn db_path() -> std::path::PathBuf {
    dirs_path().join("aigis.db")
}

fn dirs_path() -> std::path::PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let dir = std::path::PathBuf::from(home).join(".aigis");
    std::fs::create_dir_all(&dir).ok();
    dir
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve => {
            cmd_serve(&cli.config).await?;
        }
        Commands::Routes => {
            cmd_routes(&cli.config)?;
        }
        Commands::Scan { text } => {
            cmd_scan(text)?;
        }
        Commands::Logs {
            tail,
            export,
            format,
        } => {
            cmd_logs(tail, export, &format)?;
        }
        Commands::Init => {
            cmd_init(&cli.config)?;
        }
    }

    Ok(())
}

async fn cmd_serve(config_path: &Path) -> anyhow::Result<()> {
    let config = AppConfig::load_from_path(config_path)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.server.log_level)),
        )
        .init();

    println!("AIGis starting...");
    println!("Config: {}", config_path.display());
    println!("Listen: {}", config.server.listen);
    println!("Routes loaded: {}", config.engine.routes.len());

    let engine = RouteEngine::new(config.engine)?;
    let scanner = Scanner::new();
    let conn = audit::open_db(&db_path())?;

    let server = GatewayServer::new(config.server.listen.clone(), engine, scanner)
        .with_audit(std::sync::Arc::new(std::sync::Mutex::new(conn)));
    let addr = server.start().await?;
    println!("Gateway running on {}", addr);
    println!("POST http://{}/v1/chat/completions to use it", addr);

    // Keep running until interrupted.
    tokio::signal::ctrl_c().await?;
    println!("\nShutting down...");
    Ok(())
}

fn cmd_routes(config_path: &Path) -> anyhow::Result<()> {
    let config = AppConfig::load_from_path(config_path)?;
    // Compiling validates every matcher regex before printing.
    let engine = RouteEngine::new(config.engine)?;

    println!("Configured routes ({})", engine.routes().len());
    println!("═══════════════════════════════════════");
    for route in engine.routes() {
        let matcher = if route.matcher.is_empty() {
            "<any>".to_string()
        } else {
            route
                .matcher
                .iter()
                .map(|(path, pattern)| format!("{path}~{pattern}"))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let transforms = route
            .transforms
            .iter()
            .map(|t| format!("{:?}", t.kind))
            .collect::<Vec<_>>()
            .join(" -> ");
        println!(
            "  [{}] {} => {}{} ({})",
            route.id,
            matcher,
            route.upstream.base_url,
            route.upstream.path,
            if transforms.is_empty() {
                "no transforms".to_string()
            } else {
                transforms
            }
        );
    }
    Ok(())
}

fn cmd_scan(text: Option<String>) -> anyhow::Result<()> {
    let input = match text {
        Some(t) => t,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let scanner = Scanner::new();
    print!("{}", scanner.sanitize(&input));
    Ok(())
}

fn cmd_logs(tail: usize, export: bool, format: &str) -> anyhow::Result<()> {
    let db = db_path();
    if !db.exists() {
        println!("No audit database found. Run 'aigis serve' first.");
        return Ok(());
    }

    let conn = audit::open_db(&db)?;

    if export {
        match format {
            "csv" => {
                let csv = audit::export::export_csv(&conn)?;
                print!("{}", csv);
            }
            _ => {
                let json = audit::export::export_json(&conn)?;
                println!("{}", json);
            }
        }
    } else {
        let logs = audit::query_recent(&conn, tail)?;
        if logs.is_empty() {
            println!("No audit entries found.");
        } else {
            println!(
                "{:<25} {:<20} {:<12} {:<18} {:<22} {:>6} {:>8} {:>6}",
                "TIMESTAMP", "REQUEST", "ROUTE", "MODEL", "OUTCOME", "STATUS", "LAT(MS)", "MASKED"
            );
            println!("{}", "─".repeat(120));
            for log in &logs {
                println!(
                    "{:<25} {:<20} {:<12} {:<18} {:<22} {:>6} {:>8} {:>6}",
                    log.timestamp,
                    log.request_id,
                    log.route_id,
                    log.model,
                    log.outcome,
                    log.status,
                    log.latency_ms,
                    log.masked
                );
            }
        }
    }
    Ok(())
}

fn cmd_init(config_path: &Path) -> anyhow::Result<()> {
    println!("Initializing AIGis...");

    let data_dir = dirs_path();
    std::fs::create_dir_all(&data_dir)?;
    println!("  Created data dir: {}", data_dir.display());

    let db = db_path();
    audit::open_db(&db)?;
    println!("  Initialized audit database: {}", db.display());

    if !config_path.exists() {
        let default_config = include_str!("../templates/aigis.toml");
        std::fs::write(config_path, default_config)?;
        println!("  Created config: {}", config_path.display());
    } else {
        println!("  Config already exists: {}", config_path.display());
    }

    println!("\nDone! Next steps:");
    println!("  1. Export upstream tokens: OPENAI_API_KEY=sk-...");
    println!("  2. Start the gateway:      aigis serve");
    println!("  3. Point clients at:       http://127.0.0.1:8080/v1/chat/completions");
    Ok(())
}
