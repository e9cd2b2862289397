use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Parser;

use autobrief::{run_report, FsObjectStore, GenerationMode, ModelConfig, ReportOutcome};

#[derive(Parser, Debug)]
#[command(
    name = "autobrief-report",
    about = "Generate a short text report per manufacturer from the latest summary object"
)]
struct ReportCli {
    /// Storage container identifier (object-store root directory)
    container: String,

    /// Prefix holding summary objects
    input_prefix: String,

    /// Prefix that receives generated report objects
    output_prefix: String,

    /// Base URL for the OpenAI-compatible completion API
    #[arg(
        long,
        env = "AUTOBRIEF_LLM_URL",
        default_value = "https://api.openai.com/v1"
    )]
    llm_base_url: String,

    /// API key for the completion API; leave unset to force template mode
    #[arg(long, env = "AUTOBRIEF_LLM_API_KEY")]
    llm_api_key: Option<String>,

    /// Model identifier used for report generation
    #[arg(long, env = "AUTOBRIEF_LLM_MODEL", default_value = "gpt-4o-mini")]
    llm_model: String,

    /// Maximum tokens requested per generated report
    #[arg(long, env = "AUTOBRIEF_LLM_MAX_TOKENS", default_value_t = 128)]
    llm_max_tokens: usize,

    /// Max seconds to wait for each generation request
    #[arg(long, env = "AUTOBRIEF_LLM_TIMEOUT_SECS", default_value_t = 60)]
    llm_timeout_secs: u64,

    /// Number of attempts for rate limits or transient errors
    #[arg(long, env = "AUTOBRIEF_LLM_MAX_RETRIES", default_value_t = 3)]
    llm_max_retries: usize,
}

fn main() -> Result<()> {
    init_logging();
    let cli = ReportCli::parse();
    let store = FsObjectStore::new(&cli.container);

    let config = ModelConfig {
        base_url: cli.llm_base_url,
        api_key: cli.llm_api_key.unwrap_or_default(),
        model: cli.llm_model,
        max_tokens: cli.llm_max_tokens,
        timeout: Duration::from_secs(cli.llm_timeout_secs.max(1)),
        max_retries: cli.llm_max_retries.max(1),
    };
    let mode = GenerationMode::resolve(&config);
    if !mode.is_model() {
        println!("Model runtime unavailable; reports fall back to template text.");
    }

    let outcome = run_report(&store, &mode, &cli.input_prefix, &cli.output_prefix, Utc::now())
        .context("report stage failed")?;
    if let ReportOutcome::Generated {
        source,
        written,
        failed,
    } = outcome
    {
        println!("Generated {} report(s) from {source}.", written.len());
        if failed > 0 {
            bail!(
                "{failed} report row(s) failed; wrote {} object(s)",
                written.len()
            );
        }
    }
    Ok(())
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
}
