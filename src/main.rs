//! msp-reconcile: import or re-import an MS Project export.
//!
//! Usage:
//!     msp-reconcile plan.xml --org 12 --project 40 --store store.json

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use msp_reconcile::store::{load_store, save_store};
use msp_reconcile::{export_summary_csv, parse_file, ImportConfig, Reconciler, Scope};

#[derive(Parser, Debug)]
#[command(
    name = "msp-reconcile",
    version,
    about = "Reconcile an MS Project export with the stored project"
)]
struct Args {
    /// Export file (.xml, .csv, .txt, .tsv, .xlsx, .xls, .ods)
    file: PathBuf,

    /// Organization the project belongs to
    #[arg(long = "org", env = "MSP_ORG")]
    organization: String,

    /// Project to reconcile into
    #[arg(long)]
    project: String,

    /// Project type stamped on inserted rows
    #[arg(long)]
    project_type: Option<String>,

    /// JSON store file (created if missing)
    #[arg(long, default_value = "msp-store.json", env = "MSP_STORE")]
    store: PathBuf,

    /// Config file (defaults to the platform config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Rows per store call
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Report what would change without writing
    #[arg(long)]
    dry_run: bool,

    /// Also write the classified records to this CSV file
    #[arg(long)]
    report: Option<PathBuf>,

    /// Print the outcome as JSON instead of summary lines
    #[arg(long)]
    json: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose {
        "msp_reconcile=debug"
    } else {
        "msp_reconcile=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = ImportConfig::load(args.config.as_deref())?;
    if let Some(n) = args.chunk_size {
        config.chunk_size = n.max(1);
    }
    let scope = Scope::new(
        &args.organization,
        &args.project,
        args.project_type.as_deref(),
    )?;

    let parsed = parse_file(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let mut store = load_store(&args.store)
        .with_context(|| format!("Failed to load store {}", args.store.display()))?;

    let mut progress = |label: &str| tracing::info!("{}", label);
    let result = Reconciler::new(&mut store, &config, &scope)
        .with_progress(&mut progress)
        .dry_run(args.dry_run)
        .run(parsed);

    // Writes that landed before a failure stay in the store.
    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            if !args.dry_run {
                save_store(&store, &args.store)?;
                tracing::warn!("Saved partial changes to {}", args.store.display());
            }
            return Err(e.into());
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        for line in &outcome.summary_lines {
            println!("{}", line);
        }
    }

    if !args.dry_run {
        save_store(&store, &args.store)
            .with_context(|| format!("Failed to save store {}", args.store.display()))?;
        tracing::info!("Saved store to {}", args.store.display());
    }

    if let Some(path) = &args.report {
        let written = export_summary_csv(&outcome.summary, path)?;
        tracing::info!("Wrote {} records to {}", written, path.display());
    }

    Ok(())
}
