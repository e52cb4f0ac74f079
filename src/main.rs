//! # Engagement Fusion CLI (`efx`)
//!
//! ## Usage
//!
//! ```bash
//! efx --config ./config/efx.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `efx aggregate <ids>` | Build the combined engagement table for one or more programs |
//! | `efx check [target]` | Open and close a connection to each backend |
//! | `efx time-spent <ids>` | App time-spent summary per provider session window |
//!
//! Program ids are free text: `"9365, 9364 9086"` and `9365 9364` both work.
//! Logs go to stderr; tables go to stdout unless `--output` is given.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use engagement_fusion::aggregate::{parse_program_ids, Engine};
use engagement_fusion::checks;
use engagement_fusion::config;
use engagement_fusion::export::{self, ExportFormat};
use engagement_fusion::time_spent;
use engagement_fusion_core::{Backend, CampaignMode};

#[derive(Parser)]
#[command(
    name = "efx",
    about = "Engagement fusion: combine program engagement sources into one report table",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/efx.toml")]
    config: PathBuf,

    /// Enable debug logging. `RUST_LOG` takes precedence when set.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate engagements for one or more programs.
    ///
    /// Fans out to every source selected by the campaign mode, unions the
    /// rows, fills program metadata, attaches provider specialty, and writes
    /// the projected report table.
    Aggregate {
        /// Program ids, separated by commas or whitespace.
        #[arg(required = true, num_args = 1..)]
        ids: Vec<String>,

        /// Campaign mode: `custom` or `turnkey`.
        #[arg(long, default_value = "custom")]
        mode: String,

        #[arg(long, value_enum, default_value = "csv")]
        format: ExportFormat,

        /// Write to this file instead of stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Check backend connectivity.
    Check {
        /// `warehouse`, `operational`, or `all`.
        #[arg(default_value = "all")]
        target: String,
    },

    /// App time-spent summary for one or more programs.
    TimeSpent {
        #[arg(required = true, num_args = 1..)]
        ids: Vec<String>,

        #[arg(long, value_enum, default_value = "csv")]
        format: ExportFormat,

        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn program_ids(raw: &[String]) -> anyhow::Result<Vec<i64>> {
    let ids = parse_program_ids(&raw.join(" "));
    if ids.is_empty() {
        bail!("Provide at least one valid program ID.");
    }
    Ok(ids)
}

fn check_targets(target: &str) -> anyhow::Result<Vec<Backend>> {
    match target.trim().to_lowercase().as_str() {
        "all" => Ok(vec![Backend::Warehouse, Backend::Operational]),
        "warehouse" => Ok(vec![Backend::Warehouse]),
        "operational" => Ok(vec![Backend::Operational]),
        other => bail!(
            "Unknown check target '{}'. Expected warehouse, operational, or all.",
            other
        ),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Aggregate {
            ids,
            mode,
            format,
            output,
        } => {
            let ids = program_ids(&ids)?;
            let mode: CampaignMode = mode.parse()?;
            let cfg = config::load_config(&cli.config)?;

            let report = Engine::from_config(&cfg).aggregate_mode(&ids, mode).await?;
            export::run_export(&report.table, format, output.as_deref())?;

            eprintln!("{}", report.summary());
            for source in report.degraded_sources() {
                eprintln!("  {} ({}): {}", source.adapter, source.backend, source.outcome);
            }
            if !report.conflicts.is_empty() {
                eprintln!(
                    "  {} program metadata conflict(s); first non-null value kept",
                    report.conflicts.len()
                );
            }
        }
        Commands::Check { target } => {
            let backends = check_targets(&target)?;
            let cfg = config::load_config(&cli.config)?;

            let results = checks::run_checks(&cfg, &backends).await;
            let mut failed = 0;
            for result in &results {
                let status = if result.ok { "OK" } else { "FAILED" };
                println!("{:<12} {:<7} {}", result.backend.as_str(), status, result.detail);
                if !result.ok {
                    failed += 1;
                }
            }
            if failed > 0 {
                bail!("{} connection check(s) failed", failed);
            }
        }
        Commands::TimeSpent {
            ids,
            format,
            output,
        } => {
            let ids = program_ids(&ids)?;
            let cfg = config::load_config(&cli.config)
                .with_context(|| format!("loading {}", cli.config.display()))?;

            let table = time_spent::run_time_spent_summary(&cfg, &ids).await;
            export::run_export(&table, format, output.as_deref())?;
        }
    }

    Ok(())
}
