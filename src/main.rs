use anyhow::Context;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use news_digest::{query::QueryParams, Pipeline, PipelineConfig, RunRequest};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Search Google News for a keyword, summarize the articles and email a digest.
#[derive(Parser, Debug)]
#[command(name = "news_digest", version, about)]
struct Args {
    /// Keyword to search for
    keyword: String,

    /// zh-TW, en-US or both
    #[arg(short, long, default_value = "both")]
    language: String,

    /// Number of articles, 1 to 20
    #[arg(short, long, default_value_t = 5)]
    count: u32,

    /// today or custom
    #[arg(long, default_value = "today")]
    date_mode: String,

    /// First day for custom mode, YYYY-MM-DD
    #[arg(long)]
    start_date: Option<String>,

    /// Last day for custom mode, YYYY-MM-DD
    #[arg(long)]
    end_date: Option<String>,

    /// Recipient of the digest email
    #[arg(long)]
    to: String,

    /// Optional TOML/YAML/JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,
}

/// The main entry point of the application.
///
/// Initializes logging, loads the configuration, runs one digest and prints
/// the `RunResult` as JSON.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = PipelineConfig::load(args.config.as_deref()).context("loading configuration")?;
    let pipeline = Pipeline::from_config(config).context("building pipeline")?;

    let request = RunRequest {
        params: QueryParams {
            keyword: args.keyword,
            language: args.language,
            date_mode: args.date_mode,
            start_date: args.start_date,
            end_date: args.end_date,
            count: args.count,
        },
        recipient: args.to,
    };

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .context("spinner template")?,
    );
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner.set_message(format!("Building digest for '{}'...", request.params.keyword));

    let start_time = Instant::now();
    let result = pipeline.run(request).await;
    spinner.finish_and_clear();

    match result {
        Ok(result) => {
            info!(
                articles = result.actual_count,
                elapsed = ?start_time.elapsed(),
                "Digest finished"
            );
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Err(e) => {
            error!("Run rejected: {}", e);
            Err(e.into())
        }
    }
}
