use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;

use autobrief::{run_transform, FsObjectStore, TransformOutcome};

#[derive(Parser, Debug)]
#[command(
    name = "autobrief-transform",
    about = "Consolidate raw listing CSVs into a per-manufacturer summary object"
)]
struct TransformCli {
    /// Storage container identifier (object-store root directory)
    container: String,

    /// Prefix holding raw input objects
    input_prefix: String,

    /// Prefix that receives the summary object
    output_prefix: String,
}

fn main() -> Result<()> {
    init_logging();
    let cli = TransformCli::parse();
    let store = FsObjectStore::new(&cli.container);

    let outcome = run_transform(&store, &cli.input_prefix, &cli.output_prefix, Utc::now())
        .context("transform stage failed")?;
    if let TransformOutcome::Written { key, rows, groups } = outcome {
        println!("Transform complete. Wrote: {key} ({groups} group(s) from {rows} row(s))");
    }
    Ok(())
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
}
