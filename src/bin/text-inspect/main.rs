//! CLI tool to read a text value out of a saved Automerge document.
//!
//! Usage:
//!   text-inspect --input doc.automerge --path notes.body [--spans] [--json] [--stats]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use collabtext::TextDocument;

#[derive(Parser, Debug)]
#[command(
    name = "text-inspect",
    about = "Print a text value stored in an Automerge document",
    version
)]
struct Args {
    /// Saved Automerge document
    #[arg(short, long)]
    input: PathBuf,

    /// Dotted path of map keys to the text (e.g. notes.body)
    #[arg(short, long)]
    path: String,

    /// Print the span-grouped view as JSON instead of the flat string
    #[arg(long, default_value = "false", conflicts_with = "json")]
    spans: bool,

    /// Print the lossy JSON form
    #[arg(long, default_value = "false")]
    json: bool,

    /// Print statistics about the text
    #[arg(long, default_value = "false")]
    stats: bool,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, env = "TEXT_INSPECT_LOG", default_value = "warn")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging
    let filter_layer = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .context("Invalid log filter")?;
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // 1. Validate input exists
    if !args.input.exists() {
        anyhow::bail!("Input file does not exist: {}", args.input.display());
    }

    // 2. Load the document
    let bytes = std::fs::read(&args.input).context("Failed to read input file")?;
    let mut doc = TextDocument::from_bytes(&bytes).context("Failed to load Automerge document")?;

    // 3. Read the text
    let path: Vec<&str> = args.path.split('.').filter(|s| !s.is_empty()).collect();
    let text = doc
        .text(&path)
        .with_context(|| format!("Failed to read text at '{}'", args.path))?;

    // 4. Print the requested view
    if args.spans {
        let spans = serde_json::to_string_pretty(text.spans()).context("Failed to encode spans")?;
        println!("{}", spans);
    } else if args.json {
        println!("{}", text.to_json());
    } else {
        println!("{}", text);
    }

    // 5. Optional stats
    if args.stats {
        let embedded = text.elements().iter().filter(|e| e.is_embedded()).count();
        eprintln!();
        eprintln!("Text statistics:");
        eprintln!("  Path:       {}", args.path);
        eprintln!("  Elements:   {}", text.len());
        eprintln!("  Characters: {}", text.len() - embedded);
        eprintln!("  Embedded:   {}", embedded);
        eprintln!("  Spans:      {}", text.spans().len());
        eprintln!("  Document:   {} bytes", bytes.len());
    }

    Ok(())
}
