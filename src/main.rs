/// Field visit import CLI.
///
/// Usage:
///   fieldvisit_service <records.json> [--config <path>] [--db]
///
/// Reads a JSON array of stage/discharge rows, consolidates them into field
/// visits and prints a JSON summary. Without `--db` the visits go to an
/// in-memory sink (dry run); with `--db` they are written to PostgreSQL
/// using `DATABASE_URL`.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueHint};

use fieldvisit_service::batch::{self, ConsolidationSummary};
use fieldvisit_service::config::{CONFIG_PATH_ENV, ImportConfig};
use fieldvisit_service::ingest::record::parse_records_json;
use fieldvisit_service::logging::{self, LogScope};
use fieldvisit_service::model::ImportError;
use fieldvisit_service::sink::{MemorySink, PostgresSink};

#[derive(Parser, Debug)]
#[command(author, version, about = "Consolidate stage/discharge rows into field visits", long_about = None)]
struct CliArgs {
    /// JSON array of stage/discharge rows
    #[arg(value_hint = ValueHint::FilePath)]
    records_path: PathBuf,

    /// TOML import config (defaults to $FIELDVISIT_CONFIG, then built-in defaults)
    #[arg(long, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Write visits to PostgreSQL using DATABASE_URL instead of a dry run
    #[arg(long)]
    db: bool,
}

fn load_config(explicit: Option<&PathBuf>) -> Result<ImportConfig, ImportError> {
    match explicit {
        Some(path) => ImportConfig::load(path),
        None => match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => ImportConfig::load(path.as_ref()),
            Err(_) => Ok(ImportConfig::default()),
        },
    }
}

fn run(args: &CliArgs) -> Result<ConsolidationSummary, ImportError> {
    let config = load_config(args.config.as_ref())?;
    logging::init_logger(config.log_level, config.log_file.as_deref(), config.console_timestamps);

    let input = fs::read_to_string(&args.records_path)
        .map_err(|e| ImportError::Parse(format!("{}: {}", args.records_path.display(), e)))?;
    let records = parse_records_json(&input)?;

    if args.db {
        let mut sink = PostgresSink::from_env()?;
        batch::consolidate(records, &mut sink, &config)
    } else {
        logging::info(LogScope::System, None, "Dry run: visits are kept in memory");
        let mut sink = MemorySink::accepting_any_location();
        batch::consolidate(records, &mut sink, &config)
    }
}

fn main() -> ExitCode {
    dotenv::dotenv().ok();

    let args = CliArgs::parse();

    match run(&args) {
        Ok(summary) => match serde_json::to_string_pretty(&summary) {
            Ok(json) => {
                println!("{}", json);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("failed to serialize summary: {}", e);
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            logging::error(LogScope::System, None, &e.to_string());
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
