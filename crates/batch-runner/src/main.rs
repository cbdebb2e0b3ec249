//! batch-runner: run one scoring batch against Polygon and print the bundle.
//!
//! Usage:
//!   cargo run -p batch-runner                                  # SET50, configured defaults
//!   cargo run -p batch-runner -- --symbols PTT ADVANC SCB
//!   cargo run -p batch-runner -- --start-year 2019 --end-year 2024 --window 10 --threshold 25

use analysis_orchestrator::{AnalysisConfig, AnalysisOrchestrator, BatchRequest};
use anyhow::Context;
use polygon_client::{PolygonClient, PolygonSettings};
use std::sync::Arc;

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}

fn parsed<T: std::str::FromStr>(args: &[String], flag: &str) -> anyhow::Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match flag_value(args, flag) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("invalid value for {}: {} ({})", flag, raw, e)),
        None => Ok(None),
    }
}

fn parse_args(args: &[String]) -> anyhow::Result<BatchRequest> {
    let symbols = args.iter().position(|a| a == "--symbols").map(|idx| {
        args[idx + 1..]
            .iter()
            .take_while(|a| !a.starts_with("--"))
            .cloned()
            .collect::<Vec<_>>()
    });

    Ok(BatchRequest {
        start_year: parsed(args, "--start-year")?,
        end_year: parsed(args, "--end-year")?,
        window: parsed(args, "--window")?,
        outlier_threshold: parsed(args, "--threshold")?,
        symbols,
        ..Default::default()
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "batch_runner=info,analysis_orchestrator=info,polygon_client=warn".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let request = parse_args(&args)?;

    let api_key = std::env::var("POLYGON_API_KEY").context("POLYGON_API_KEY must be set")?;
    let config = AnalysisConfig::from_env()?;
    let provider = Arc::new(PolygonClient::with_settings(PolygonSettings::new(api_key)));
    let orchestrator = AnalysisOrchestrator::new(provider, config)?;

    let bundle = orchestrator.run_batch(request).await?;
    tracing::info!(
        "Scored {} of {} stocks ({} failures)",
        bundle.table.stocks.len(),
        bundle.universe_size,
        bundle.failures.len()
    );
    println!("{}", serde_json::to_string_pretty(&bundle)?);
    Ok(())
}
