#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! CLI for downloading email attachments over IMAP

use attachment_harvester::{
    AttachmentFilter, Error, HarvestOptions, Harvester, ImapConfig, SearchFilter, Summary,
    parse_date,
};
use chrono::NaiveDate;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Exit code when the run finished but some messages were skipped
/// because they could not be fetched or parsed.
const PARTIAL_FAILURE: u8 = 6;

#[derive(Parser)]
#[command(name = "harvester")]
#[command(about = "Download whitelisted email attachments from an IMAP mailbox")]
struct Args {
    /// Directory to save attachments into (default: ./attachments)
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Only messages dated on or after this day
    /// (e.g. "Nov 24, 2024" or 2024-11-24)
    #[arg(long, value_parser = parse_since)]
    since: Option<NaiveDate>,

    /// Mailbox to open read-only (default: INBOX)
    #[arg(long)]
    mailbox: Option<String>,

    /// Only messages whose sender contains this text
    #[arg(long)]
    from: Option<String>,

    /// Only the N most recent matching messages
    #[arg(long)]
    limit: Option<usize>,

    /// Messages parsed and saved in parallel (default: 4)
    #[arg(long, value_parser = parse_concurrency)]
    concurrency: Option<usize>,

    /// Accepted extension; repeat to build a custom whitelist
    #[arg(long = "ext", value_name = "EXT")]
    extensions: Vec<String>,

    /// Abort on the first message that cannot be fetched or parsed
    #[arg(long)]
    fail_fast: bool,

    /// Output the summary as JSON
    #[arg(long)]
    json: bool,
}

fn parse_since(s: &str) -> Result<NaiveDate, String> {
    parse_date(s).map_err(|e| e.to_string())
}

fn parse_concurrency(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(format!("Invalid concurrency '{s}': expected a positive integer")),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(&args).await {
        Ok(summary) if summary.is_complete() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::from(PARTIAL_FAILURE),
        Err(e) => {
            let (kind, code) = e
                .downcast_ref::<Error>()
                .map_or(("internal", 1), |err| (err.kind(), err.exit_code()));
            eprintln!("error[{kind}]: {e:#}");
            ExitCode::from(code)
        }
    }
}

async fn run(args: &Args) -> anyhow::Result<Summary> {
    let config = ImapConfig::from_env()?;
    let options = harvest_options(args)?;
    let output_dir = options.output_dir.clone();

    let summary = Harvester::new(config, options).run().await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary, &output_dir);
    }

    Ok(summary)
}

/// Environment defaults overridden by command line flags.
fn harvest_options(args: &Args) -> attachment_harvester::Result<HarvestOptions> {
    let mut options = HarvestOptions::from_env()?;

    if let Some(dir) = &args.output {
        options.output_dir.clone_from(dir);
    }
    if let Some(mailbox) = &args.mailbox {
        options.mailbox.clone_from(mailbox);
    }

    let since = args.since.or_else(|| options.filter.since_date());
    let sender = args
        .from
        .clone()
        .or_else(|| options.filter.sender().map(ToString::to_string));
    let mut filter = since.map_or_else(SearchFilter::all, SearchFilter::since);
    if let Some(sender) = sender {
        filter = filter.from_sender(sender);
    }
    options.filter = filter;

    if args.limit.is_some() {
        options.limit = args.limit;
    }
    if let Some(n) = args.concurrency {
        options.concurrency = n;
    }
    if !args.extensions.is_empty() {
        let filter = AttachmentFilter::new(&args.extensions);
        if filter.is_empty() {
            return Err(Error::Config(
                "--ext needs at least one non-empty extension".to_string(),
            ));
        }
        options.attachments = filter;
    }
    options.fail_fast |= args.fail_fast;

    Ok(options)
}

fn print_summary(summary: &Summary, output_dir: &Path) {
    let rows = [
        ("Messages found", summary.messages_found),
        ("Messages scanned", summary.messages_scanned),
        ("Attachments saved", summary.attachments_saved),
        ("Skipped (duplicate)", summary.skipped_duplicate),
        ("Skipped (unsupported)", summary.skipped_unsupported),
        ("Messages failed", summary.messages_failed),
    ];

    println!("{:<23} {}", "Output directory", output_dir.display());
    println!("{}", "-".repeat(40));
    for (label, count) in rows {
        println!("{label:<23} {count}");
    }
}
