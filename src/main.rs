use training_card::config::CardConfig;
use training_card::render::{self, OutputFormat};
use training_card::session::{LookupOutcome, Session};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "training-card")]
#[command(about = "Look up an employee's training card by RE and admission date")]
#[command(version)]
struct Args {
    /// JSON configuration file (or set TRAINING_CARD_CONFIG)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Dataset file, overriding the configured data directory and table
    #[arg(short, long, global = true)]
    dataset: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Look up a single card
    Lookup {
        /// Employee identifier (RE)
        #[arg(long)]
        re: String,

        /// Admission date, DD/MM/YYYY
        #[arg(long)]
        admission: String,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Prompt for lookups until a blank RE or end of input
    Interactive,
    /// Show how dataset columns were resolved and the first rows
    Columns {
        /// Number of rows to preview
        #[arg(short, long, default_value_t = 5)]
        rows: usize,
    },
}

fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let mut config = CardConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(dataset) = args.dataset {
        config.dataset = Some(dataset);
    }

    // Configuration errors end the run here, before any query is accepted.
    let session = Session::open(&config).context("Cannot start lookup session")?;
    info!("Session ready with {} rows", session.dataset().len());

    match args.command {
        Commands::Lookup { re, admission, format } => run_lookup(&session, &re, &admission, format),
        Commands::Interactive => run_interactive(&session),
        Commands::Columns { rows } => {
            println!("{}", render::render_mapping(session.mapping()));
            println!("{}", render::render_preview(session.dataset(), rows));
            Ok(())
        }
    }
}

fn run_lookup(session: &Session, re: &str, admission: &str, format: OutputFormat) -> Result<()> {
    let outcome = session.lookup(re, admission)?;
    let stdout = io::stdout();
    render::write_outcome(&outcome, format, stdout.lock())?;
    if let (OutputFormat::Csv, LookupOutcome::NotFound { identifier, admission_date }) = (format, &outcome) {
        eprintln!("{}", render::not_found_message(identifier, *admission_date));
    }
    Ok(())
}

fn prompt(lines: &mut impl Iterator<Item = io::Result<String>>, label: &str) -> Result<Option<String>> {
    print!("{}", label);
    io::stdout().flush()?;
    match lines.next() {
        Some(line) => Ok(Some(line?.trim().to_string())),
        None => Ok(None),
    }
}

fn run_interactive(session: &Session) -> Result<()> {
    println!("Enter RE and admission date (DD/MM/YYYY). Leave RE blank to quit.\n");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        let re = match prompt(&mut lines, "RE: ")? {
            Some(re) if !re.is_empty() => re,
            _ => break,
        };
        let admission = match prompt(&mut lines, "Admission date (DD/MM/YYYY): ")? {
            Some(admission) => admission,
            None => break,
        };

        match session.lookup(&re, &admission) {
            Ok(outcome) => println!("\n{}", render::render_outcome(&outcome)),
            Err(e) if e.is_recoverable() => println!("\n{}\n", e),
            Err(e) => {
                error!("Lookup failed: {}", e);
                return Err(e.into());
            }
        }
    }

    Ok(())
}
