//! Crawler entrypoint. Runs the model and news pipelines once and prints a
//! single JSON report to stdout; logs go to stderr via `tracing`.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ai_radar_crawler::config::AppConfig;
use ai_radar_crawler::run::{run_crawler, RunStatus};

#[derive(Parser, Debug)]
#[command(name = "ai-radar-crawler", about = "Run crawler for models and articles.")]
struct Cli {
    /// Per-source model limit (0 = daily default).
    #[arg(long, default_value_t = 0)]
    model_limit: usize,
    /// Per-source news limit (0 = daily default).
    #[arg(long, default_value_t = 0)]
    news_limit: usize,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ai_radar_crawler=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(error) => {
            eprintln!("configuration error: {error:#}");
            return ExitCode::from(2);
        }
    };

    let report = run_crawler(&config, cli.model_limit, cli.news_limit).await;

    match serde_json::to_string(&report) {
        Ok(json) => println!("{json}"),
        Err(error) => {
            eprintln!("failed to serialize run report: {error}");
            return ExitCode::from(2);
        }
    }

    match report.status {
        RunStatus::Failed => ExitCode::from(1),
        _ => ExitCode::SUCCESS,
    }
}
