use clap::Parser;
use nutriscan_core::{NutriScanConfig, Scanner};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use nutriscan_server::http::{self, HttpState};
use nutriscan_server::sessions::{self, SessionRegistry};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "nutriscan.toml")]
    config: String,

    /// Report catalog and classifier status, then exit
    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience — production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config; a missing file means defaults
    let config = match NutriScanConfig::load_or_default(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Init logging
    let level = config
        .service
        .log_level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::INFO);
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    let scanner = match Scanner::from_config(&config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Startup failed: {}", e);
            std::process::exit(1);
        }
    };

    if args.health {
        match scanner.classifier_status().classifier() {
            Some(c) => println!("✅ Classifier loaded ({})", c.name()),
            None => println!("❌ Classifier unavailable: {:?}", scanner.classifier_status()),
        }
        if scanner.catalog().is_empty() {
            println!("❌ Nutrition catalog empty ({})", config.catalog.path);
        } else {
            println!("✅ Nutrition catalog: {} entries", scanner.catalog().len());
        }
        println!("✅ Label table: {} labels", scanner.labels().len());
        return Ok(());
    }

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    let registry = Arc::new(SessionRegistry::new(Duration::from_secs(
        config.session.idle_timeout_minutes * 60,
    )));

    tokio::spawn(sessions::run_sweep_loop(
        Arc::clone(&registry),
        Duration::from_secs(config.session.sweep_interval_seconds),
        tx.subscribe(),
    ));

    let state = Arc::new(HttpState {
        scanner: Arc::new(scanner),
        sessions: registry,
        config,
    });

    http::start_http_server(state, tx.subscribe()).await?;

    Ok(())
}
