mod config;
mod error;
mod heuristics;
mod mailbox;
mod message_processor;
mod pdf_extract;
mod pipeline;
mod sink;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use config::{Config, Credentials, RestEndpoint, StoreBackend};
use mailbox::ImapMailbox;
use pdf_extract::{PageTextExtractor, PdfPages};
use pipeline::Pipeline;
use sink::{ConsumptionSink, PostgrestSink, SqliteSink};

#[derive(Parser)]
#[command(name = "utility_mail", about = "Pull utility consumption readings out of invoice emails")]
struct Cli {
    /// Optional TOML config; defaults apply when the file is missing.
    #[arg(long, default_value = ".config/utility_mail.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Scan the most recent emails and store the readings found (default).
    Run,
    /// Parse one local PDF and print what was recognised.
    Parse { pdf: PathBuf },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // init tracing
    tracing_subscriber::fmt()
        .with_target(true)
        .with_level(true)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            let cfg = Config::load_or_default(&cli.config)?;
            run(&cfg).await
        }
        Command::Parse { pdf } => parse_one(&pdf),
    }
}

async fn run(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let creds = Credentials::from_env()?;
    let extractor = PdfPages;
    let pipeline = Pipeline::new(&extractor, cfg.scratch_dir.clone());

    // Nothing is persisted when the mailbox cannot be read.
    let report = {
        let mut mailbox = match ImapMailbox::connect(&cfg.mailbox, &creds) {
            Ok(m) => m,
            Err(e) => {
                error!(error = %e, "Mailbox unavailable, nothing processed");
                return Ok(());
            }
        };
        match pipeline.collect(&mut mailbox, cfg.mailbox.recent) {
            Ok(report) => report,
            Err(e) => {
                error!(error = %e, "Mailbox error, run aborted");
                return Ok(());
            }
        }
    };

    pipeline::print_summary(&report);

    let mut sink: Option<Box<dyn ConsumptionSink>> = match cfg.store.backend {
        StoreBackend::Postgrest => match RestEndpoint::from_env() {
            Some(endpoint) => Some(Box::new(PostgrestSink::new(&endpoint, &cfg.store.table))),
            None => {
                warn!("SUPABASE_URL / SUPABASE_ANON_KEY not set");
                None
            }
        },
        StoreBackend::Sqlite => match SqliteSink::open(&cfg.store.db_path, &cfg.store.table) {
            Ok(s) => Some(Box::new(s)),
            Err(e) => {
                error!(error = %e, path = %cfg.store.db_path, "Could not open database");
                None
            }
        },
    };

    let written = pipeline::persist(sink.as_deref_mut(), cfg.facility_id, &report.readings).await;
    info!(written, found = report.readings.len(), "Done");
    Ok(())
}

fn parse_one(path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = std::fs::read(path)?;
    let pages = PdfPages.page_texts(&bytes)?;
    info!(file = %path.display(), pages = pages.len(), "Extracted text");

    match heuristics::parse_pages(&pages) {
        Some(fragment) => println!("{}", serde_json::to_string_pretty(&fragment)?),
        None => println!("No consumption value found"),
    }
    Ok(())
}
