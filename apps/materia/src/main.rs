//! # Materia - Rule Store Server
//!
//! The main binary for the Materia rule store and scoring engine.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │               apps/materia (THE BINARY)              │
//! │                                                      │
//! │   ┌─────────────┐   ┌─────────────┐   ┌──────────┐   │
//! │   │    CLI      │   │  HTTP API   │   │  config  │   │
//! │   │   (clap)    │   │   (axum)    │   │  (toml)  │   │
//! │   └──────┬──────┘   └──────┬──────┘   └────┬─────┘   │
//! │          └─────────────────┼───────────────┘         │
//! │                            ▼                         │
//! │                   ┌────────────────┐                 │
//! │                   │  materia-core  │                 │
//! │                   │  (THE LOGIC)   │                 │
//! │                   └────────────────┘                 │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Ingest extracted rules from one paper
//! materia ingest -f rules.json --source-id 10.1000/xyz
//!
//! # Score a material for photovoltaics
//! materia score --prop band_gap=1.4 --prop formation_energy=-1.2 --domain photovoltaics
//!
//! # Start the HTTP server
//! materia server --host 0.0.0.0 --port 8080
//! ```

use clap::Parser;
use materia::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // MATERIA_LOG_FORMAT=json enables machine-parseable output
    let log_format = std::env::var("MATERIA_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "materia=info,materia_core=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the startup banner.
fn print_banner() {
    println!(
        r#"
  ███╗   ███╗ █████╗ ████████╗███████╗██████╗ ██╗ █████╗
  ████╗ ████║██╔══██╗╚══██╔══╝██╔════╝██╔══██╗██║██╔══██╗
  ██╔████╔██║███████║   ██║   █████╗  ██████╔╝██║███████║
  ██║╚██╔╝██║██╔══██║   ██║   ██╔══╝  ██╔══██╗██║██╔══██║
  ██║ ╚═╝ ██║██║  ██║   ██║   ███████╗██║  ██║██║██║  ██║
  ╚═╝     ╚═╝╚═╝  ╚═╝   ╚═╝   ╚══════╝╚═╝  ╚═╝╚═╝╚═╝  ╚═╝

  Materials Rule Store v{}

  Normalized • Cross-validated • Scored
"#,
        env!("CARGO_PKG_VERSION")
    );
}
