//! # Materia CLI Module
//!
//! ## Available Commands
//!
//! - `init` - Initialize an empty store
//! - `ingest` - Ingest candidate rules from a JSON file
//! - `rules` - List rules matching filters
//! - `search` - Keyword search
//! - `stats` - Store statistics
//! - `report` - Quality report
//! - `score` - Score a material
//! - `server` - Start the HTTP server

mod commands;

use crate::config::MateriaConfig;
use clap::{Parser, Subcommand};
use materia_core::MateriaError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Materia - materials rule store and scoring engine
///
/// Stores quantitative rules about material properties, cross-validates them
/// across sources, and scores materials against them.
#[derive(Parser, Debug)]
#[command(name = "materia")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file (default: ./materia.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Store location: directory for json, database file for redb
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Storage backend: "json", "redb" or "memory"
    #[arg(short = 'B', long, global = true)]
    pub backend: Option<String>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize an empty store
    Init {
        /// Overwrite an existing store
        #[arg(short, long)]
        force: bool,
    },

    /// Ingest candidate rules from a JSON file
    Ingest {
        /// A JSON array of rules, or {"source": {...}, "rules": [...]}
        #[arg(short, long)]
        file: PathBuf,

        /// Source identifier (overrides the file's source)
        #[arg(long)]
        source_id: Option<String>,

        /// Source title
        #[arg(long)]
        title: Option<String>,

        /// Source URL
        #[arg(long)]
        url: Option<String>,
    },

    /// List rules matching all given filters
    Rules {
        #[arg(long)]
        category: Option<String>,

        #[arg(long)]
        property: Option<String>,

        #[arg(long)]
        domain: Option<String>,

        #[arg(long)]
        rule_type: Option<String>,

        /// Minimum confidence
        #[arg(long, default_value = "0.0")]
        min_confidence: f64,

        /// Maximum number of rules printed
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },

    /// Search rules by keyword
    Search {
        keyword: String,

        /// Maximum number of rules printed
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },

    /// Show store statistics
    Stats,

    /// Show the quality report
    Report,

    /// Score a material against the stored rules
    Score {
        /// JSON object of property name to numeric value
        #[arg(short, long, conflicts_with = "prop")]
        material: Option<PathBuf>,

        /// Property as name=value (repeatable)
        #[arg(short, long, value_name = "NAME=VALUE")]
        prop: Vec<String>,

        /// Target domain
        #[arg(short, long, default_value = "general")]
        domain: String,
    },

    /// Start HTTP server
    Server {
        /// Host to bind to (default from config, then 127.0.0.1)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to (default from config, then 8080)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), MateriaError> {
    let config = MateriaConfig::load(cli.config.as_deref())?
        .with_overrides(cli.database, cli.backend.as_deref())?;
    let json_mode = cli.json_mode;

    if cli.verbose {
        tracing::info!(
            backend = %config.storage.backend,
            path = %config.storage.resolved_path().display(),
            "using store"
        );
    }

    match cli.command {
        Some(Commands::Init { force }) => cmd_init(&config, force),
        Some(Commands::Ingest {
            file,
            source_id,
            title,
            url,
        }) => cmd_ingest(&config, json_mode, &file, SourceOverride { source_id, title, url }),
        Some(Commands::Rules {
            category,
            property,
            domain,
            rule_type,
            min_confidence,
            limit,
        }) => {
            let query = crate::api::RulesQuery {
                category,
                property,
                domain,
                rule_type,
                min_confidence: Some(min_confidence),
            };
            cmd_rules(&config, json_mode, &query, limit)
        }
        Some(Commands::Search { keyword, limit }) => {
            cmd_search(&config, json_mode, &keyword, limit)
        }
        Some(Commands::Stats) => cmd_stats(&config, json_mode),
        Some(Commands::Report) => cmd_report(&config, json_mode),
        Some(Commands::Score {
            material,
            prop,
            domain,
        }) => cmd_score(&config, json_mode, material.as_deref(), &prop, &domain),
        Some(Commands::Server { host, port }) => {
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            cmd_server(&config, &host, port).await
        }
        // No subcommand - statistics by default
        None => cmd_stats(&config, json_mode),
    }
}
