mod batch;
mod config;
mod facts;
mod show;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result, bail};
use clap::{Args as ClapArgs, CommandFactory as _, Parser, Subcommand};
use ledger_engine::{GenerateOptions, MemoryLedgerStore, ValidateOptions};
use uuid::Uuid;

use crate::batch::ChargeReport;
use crate::config::Config;
use crate::facts::FactSnapshot;
use crate::show::Palette;

#[derive(Parser)]
#[command(
    name = "ledger-engine",
    about = "Generate, compare and reconcile the double-entry ledgers of accounting charges"
)]
#[command(disable_help_subcommand = true)]
struct Args {
    #[command(flatten)]
    input: InputArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(ClapArgs)]
struct InputArgs {
    /// JSON snapshot with entities, charges and their stored ledger records
    #[arg(short, long)]
    facts: PathBuf,

    /// Engine configuration. Defaults to ledger-engine.toml or .ledger-engine.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Only process these charges
    #[arg(long = "charge")]
    charges: Vec<Uuid>,

    /// Number of charges processed at once
    #[arg(short = 'j', long)]
    concurrency: Option<usize>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare stored records with the generated ledger of every charge (default)
    Diff,
    /// Print the generated ledger of every charge
    Generate,
    /// Check that the stored records of every charge balance
    Balance,
    /// Reconcile every valid charge and write the converged records
    Apply {
        /// Where to write the stored ledger
        #[arg(short, long)]
        write: PathBuf,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    if let Some(path) = path {
        return Config::load_from_file(path);
    }
    let (path, config) = Config::find_and_load()?
        .context("No configuration found: pass --config or create ledger-engine.toml")?;
    tracing::debug!("using configuration {}", path.display());
    Ok(config)
}

fn ensure_supported<T>(reports: &[ChargeReport<T>]) -> Result<()> {
    let unsupported: Vec<_> = reports
        .iter()
        .filter(|report| report.is_unsupported())
        .map(|report| report.kind.as_str())
        .collect();
    if !unsupported.is_empty() {
        bail!("unsupported charge types: {}", unsupported.join(", "));
    }
    Ok(())
}

pub async fn run(args: impl IntoIterator<Item = String>) -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "ledger_engine=info,ledger_engine_cli=info".into());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    clap_complete::CompleteEnv::with_factory(Args::command).complete();

    let args = Args::parse_from(args);
    let config = load_config(args.input.config.as_ref())?;
    let mut snapshot = FactSnapshot::load(&args.input.facts).await?;
    snapshot.retain_charges(&args.input.charges);

    let concurrency = args
        .input
        .concurrency
        .or(config.concurrency)
        .unwrap_or(batch::DEFAULT_CONCURRENCY);
    let palette = if args.input.no_color {
        Palette::plain()
    } else {
        Palette::colored()
    };
    let engine = Arc::new(config.engine);
    let snapshot = Arc::new(snapshot);

    match args.command.unwrap_or(Commands::Diff) {
        Commands::Diff => {
            let options = ValidateOptions {
                check_stored_balance: true,
                insert_if_not_exists: false,
            };
            let reports =
                batch::validate_all(&snapshot, Arc::clone(&engine), options, concurrency).await?;
            print!("{}", show::render_diff(&reports, &snapshot.entities, &palette));
            ensure_supported(&reports)
        }
        Commands::Generate => {
            let reports = batch::generate_all(
                &snapshot,
                Arc::clone(&engine),
                GenerateOptions::default(),
                concurrency,
            )
            .await?;
            print!("{}", show::render_generated(&reports, &snapshot.entities, &palette));
            ensure_supported(&reports)
        }
        Commands::Balance => {
            print!("{}", show::render_balance(&snapshot, &engine, &palette));
            Ok(())
        }
        Commands::Apply { write } => {
            let options = ValidateOptions {
                check_stored_balance: false,
                insert_if_not_exists: true,
            };
            let reports =
                batch::validate_all(&snapshot, Arc::clone(&engine), options, concurrency).await?;
            ensure_supported(&reports)?;

            let mut store = MemoryLedgerStore::from_iter(snapshot.records.iter().cloned());
            let summary = batch::apply_all(&mut store, &reports)?;

            let records = store.into_records();
            facts::write_records(&write, &records).await?;
            println!(
                "Applied {} plan(s), skipped {} charge(s), wrote {} record(s) to {}",
                summary.applied,
                summary.skipped,
                records.len(),
                write.display()
            );
            Ok(())
        }
    }
}
