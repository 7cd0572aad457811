mod config;
mod display;

use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use mrlcheck_core::{BatchItem, BatchSummary, ComplianceChecker};
use mrlcheck_store::DuckStore;

use crate::config::StoreArgs;

#[derive(Parser)]
#[command(
    name = "mrlcheck",
    version,
    about = "Check pesticide residues against EU and Codex maximum residue limits"
)]
struct Cli {
    #[command(flatten)]
    store: StoreArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check one substance on one crop.
    Check {
        #[arg(long)]
        crop: String,
        #[arg(long)]
        substance: String,
        /// EU or Codex.
        #[arg(long, default_value = "EU")]
        market: String,
        /// Measured residue in mg/kg.
        #[arg(long)]
        residue: Option<f64>,
        #[arg(long)]
        json: bool,
    },
    /// Check several substances on one crop.
    Batch {
        #[arg(long)]
        crop: String,
        /// Substance, optionally with a residue: `Azoxystrobin=0.5`. Repeatable.
        #[arg(long = "item", required = true, value_parser = parse_item)]
        items: Vec<BatchItem>,
        #[arg(long, default_value = "EU")]
        market: String,
        /// Abort on the first lookup failure instead of reporting it per item.
        #[arg(long)]
        fail_fast: bool,
        #[arg(long)]
        json: bool,
    },
    /// List every substance documented for a crop.
    List {
        #[arg(long)]
        crop: String,
        #[arg(long)]
        json: bool,
    },
    /// Build a persistent database from a Parquet or CSV export.
    Load,
}

fn parse_item(raw: &str) -> Result<BatchItem, String> {
    match raw.rsplit_once('=') {
        Some((name, residue)) => {
            let residue: f64 = residue
                .trim()
                .parse()
                .map_err(|e| format!("invalid residue in `{raw}`: {e}"))?;
            Ok(BatchItem::new(name.trim(), Some(residue)))
        }
        None => Ok(BatchItem::new(raw.trim(), None)),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    tracing::info!("mrlcheck v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    let store = &cli.store;
    let checker = || -> anyhow::Result<ComplianceChecker> {
        Ok(ComplianceChecker::new(store.backend()?.open()?))
    };

    match cli.command {
        Command::Check {
            crop,
            substance,
            market,
            residue,
            json,
        } => {
            let result = checker()?.evaluate(&crop, &substance, &market, residue).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                display::print_card(&result);
            }
        }
        Command::Batch {
            crop,
            items,
            market,
            fail_fast,
            json,
        } => {
            let checker = checker()?;
            if fail_fast {
                let results = checker.evaluate_batch(&crop, &items, &market).await?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&results)?);
                } else {
                    results.iter().for_each(display::print_card);
                    print!("{}", display::render_summary(&BatchSummary::from_results(&results)));
                }
            } else {
                let outcomes = checker.evaluate_batch_each(&crop, &items, &market).await?;
                let mut summary = BatchSummary::default();
                let mut values = Vec::with_capacity(outcomes.len());
                for (item, outcome) in items.iter().zip(outcomes) {
                    match outcome {
                        Ok(result) => {
                            summary.record(result.status);
                            if json {
                                values.push(serde_json::to_value(&result)?);
                            } else {
                                display::print_card(&result);
                            }
                        }
                        Err(err) => {
                            summary.record_failure();
                            tracing::error!(substance = %item.substance, error = %err, "check failed");
                            values.push(serde_json::json!({
                                "substance": item.substance,
                                "error": err.to_string(),
                            }));
                        }
                    }
                }
                if json {
                    println!("{}", serde_json::to_string_pretty(&values)?);
                } else {
                    print!("{}", display::render_summary(&summary));
                }
            }
        }
        Command::List { crop, json } => {
            let rows = checker()?.substances_for_crop(&crop).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                print!("{}", display::render_substances(&crop, &rows));
            }
        }
        Command::Load => load(store.db.clone(), store.data.clone())?,
    }

    Ok(())
}

fn load(db: Option<PathBuf>, data: Option<PathBuf>) -> anyhow::Result<()> {
    let (Some(db), Some(data)) = (db, data) else {
        bail!("`load` needs both --db (MRLCHECK_DB) and --data (MRLCHECK_DATA)");
    };
    let store = DuckStore::open_persistent(&db)
        .with_context(|| format!("opening {}", db.display()))?;
    let count = store
        .load_records(&data)
        .with_context(|| format!("loading {}", data.display()))?;
    println!("Loaded {count} records into {}", db.display());
    Ok(())
}
