//! nutriscan-cli — command-line client for a running NutriScan server
//!
//! Sessions live in the server's memory, so start one with `session` and pass
//! its id to the other subcommands (or export `NUTRISCAN_SESSION`).
//!
//! # Subcommands
//! - `status`                                  — show server health
//! - `session`                                 — start a session, print its id
//! - `scan <image> --session <id> [--json]`    — classify a meal photo
//! - `history --session <id> [--json]`         — list past scans, newest first
//! - `clear --session <id>`                    — clear the session history

use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULT_SERVER: &str = "http://127.0.0.1:8501";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "nutriscan-cli",
    version,
    about = "NutriScan — identify a meal from a photo and show its macros"
)]
struct Cli {
    /// NutriScan HTTP server URL (overrides NUTRISCAN_HTTP_URL env var)
    #[arg(long, env = "NUTRISCAN_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show NutriScan server status
    Status,

    /// Start a new session and print its id
    Session,

    /// Upload a meal photo (JPEG or PNG) and analyze it
    Scan {
        /// Path to the image
        image: PathBuf,

        /// Session id
        #[arg(long, env = "NUTRISCAN_SESSION")]
        session: String,

        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },

    /// Show the session's meal history, most recent first
    History {
        /// Session id
        #[arg(long, env = "NUTRISCAN_SESSION")]
        session: String,

        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },

    /// Clear the session's meal history
    Clear {
        /// Session id
        #[arg(long, env = "NUTRISCAN_SESSION")]
        session: String,
    },
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Macros {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

#[derive(Debug, Deserialize)]
pub struct ChartSlice {
    pub label: String,
    pub grams: f64,
    pub percent: f64,
}

#[derive(Debug, Deserialize)]
pub struct Chart {
    pub slices: Vec<ChartSlice>,
}

/// Body of POST /sessions/:id/scan
#[derive(Debug, Deserialize)]
pub struct ScanResponse {
    pub status: String,
    pub label: Option<String>,
    pub time: Option<String>,
    pub macros: Option<Macros>,
    pub chart: Option<Chart>,
    pub warning: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryEntry {
    pub label: String,
    pub time: String,
    pub macros: Macros,
}

/// Body of GET /sessions/:id/history
#[derive(Debug, Deserialize)]
pub struct HistoryResponse {
    pub count: usize,
    pub entries: Vec<HistoryEntry>,
    pub totals: Macros,
}

// ============================================================================
// Text Output
// ============================================================================

/// One chart row, e.g. `Carbs      28.0g  ██████████ 90.6%`.
pub fn chart_row(slice: &ChartSlice) -> String {
    let filled = (slice.percent / 5.0).round().clamp(0.0, 20.0) as usize;
    format!(
        "{:<8} {:>6.1}g  {:<20} {:.1}%",
        slice.label,
        slice.grams,
        "█".repeat(filled),
        slice.percent
    )
}

pub fn format_macros(m: &Macros) -> String {
    format!(
        "Calories: {}  Protein: {}g  Carbs: {}g  Fat: {}g",
        m.calories, m.protein, m.carbs, m.fat
    )
}

pub fn format_scan(resp: &ScanResponse) -> String {
    match resp.status.as_str() {
        "success" => {
            let mut out = format!("Identified: {}", resp.label.as_deref().unwrap_or("?"));
            if let Some(time) = &resp.time {
                out.push_str(&format!(" at {time}"));
            }
            out.push('\n');
            if let Some(m) = &resp.macros {
                out.push_str(&format_macros(m));
                out.push('\n');
            }
            if let Some(chart) = &resp.chart {
                out.push_str("\nMacro Ratio\n");
                for slice in &chart.slices {
                    out.push_str(&chart_row(slice));
                    out.push('\n');
                }
            }
            out
        }
        "no_nutrition_data" => format!(
            "Warning: {}\n",
            resp.warning.as_deref().unwrap_or("no nutritional info found")
        ),
        _ => format!("Error: {}\n", resp.error.as_deref().unwrap_or("unknown error")),
    }
}

pub fn format_history(resp: &HistoryResponse) -> String {
    if resp.entries.is_empty() {
        return "No meals scanned yet.\n".to_string();
    }
    let mut out = String::new();
    for e in &resp.entries {
        out.push_str(&format!(
            "{} - {}\n    {} kcal | protein {}g | carbs {}g | fat {}g\n",
            e.label, e.time, e.macros.calories, e.macros.protein, e.macros.carbs, e.macros.fat
        ));
    }
    out.push_str(&format!("\n{} meals. Total {}\n", resp.count, format_macros(&resp.totals)));
    out
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

fn client(timeout_secs: u64) -> anyhow::Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()?)
}

fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}

/// Show the server status by calling GET /health.
fn do_status(server: &str) -> anyhow::Result<()> {
    let url = format!("{}/health", server);
    let resp = client(10)?.get(&url).send();

    match resp {
        Ok(r) if r.status().is_success() => {
            let body: serde_json::Value = r.json().unwrap_or_default();
            println!("NutriScan server: {}", body["status"].as_str().unwrap_or("unknown"));
            println!("Version:          {}", body["version"].as_str().unwrap_or("?"));
            println!(
                "Classifier:       {}",
                body["classifier"]["status"].as_str().unwrap_or("?")
            );
            println!("Catalog entries:  {}", body["catalog_entries"]);
            println!("Active sessions:  {}", body["sessions"]);
        }
        Ok(r) => {
            eprintln!("nutriscan-cli: server unhealthy (HTTP {})", r.status());
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("nutriscan-cli: cannot reach {} — {}", url, e);
            std::process::exit(1);
        }
    }

    Ok(())
}

fn do_session(server: &str) -> anyhow::Result<()> {
    let url = format!("{}/sessions", server);
    let resp = client(10)?.post(&url).send()?.error_for_status()?;
    let body: serde_json::Value = resp.json()?;
    println!("{}", body["session_id"].as_str().unwrap_or_default());
    Ok(())
}

fn do_scan(server: &str, image: &Path, session: &str, json_output: bool) -> anyhow::Result<()> {
    let bytes = std::fs::read(image)
        .map_err(|e| anyhow::anyhow!("cannot read {}: {}", image.display(), e))?;

    let url = format!("{}/sessions/{}/scan", server, session);
    let resp = client(120)?
        .post(&url)
        .header("content-type", content_type_for(image))
        .body(bytes)
        .send()
        .map_err(|e| anyhow::anyhow!("connection failed to {}: {}", url, e))?;

    let status = resp.status();
    let text = resp.text()?;
    if json_output {
        println!("{}", text);
    } else {
        match serde_json::from_str::<ScanResponse>(&text) {
            Ok(scan) => print!("{}", format_scan(&scan)),
            Err(_) => eprintln!("nutriscan-cli: server returned {}: {}", status, text),
        }
    }

    if !status.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

fn do_history(server: &str, session: &str, json_output: bool) -> anyhow::Result<()> {
    let url = format!("{}/sessions/{}/history", server, session);
    let resp = client(10)?.get(&url).send()?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().unwrap_or_default();
        eprintln!("nutriscan-cli: server returned {}: {}", status, body);
        std::process::exit(1);
    }

    if json_output {
        println!("{}", resp.text()?);
    } else {
        let history: HistoryResponse = resp.json()?;
        print!("{}", format_history(&history));
    }
    Ok(())
}

fn do_clear(server: &str, session: &str) -> anyhow::Result<()> {
    let url = format!("{}/sessions/{}/history", server, session);
    client(10)?.delete(&url).send()?.error_for_status()?;
    println!("History cleared.");
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/').to_string();

    let result = match cli.command {
        Commands::Status => do_status(&server),
        Commands::Session => do_session(&server),
        Commands::Scan {
            image,
            session,
            json,
        } => do_scan(&server, &image, &session, json),
        Commands::History { session, json } => do_history(&server, &session, json),
        Commands::Clear { session } => do_clear(&server, &session),
    };

    if let Err(e) = result {
        eprintln!("nutriscan-cli: {}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================
