//! whaleback: run the daily analysis engine for one target date.
//!
//! Usage:
//!   whaleback --date 20260302
//!   whaleback                  # defaults to today

use analysis_core::EngineConfig;
use analysis_orchestrator::AnalysisEngine;
use chrono::{Local, NaiveDate};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "whaleback=info,analysis_orchestrator=info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();

    let target_date = match args.iter().position(|a| a == "--date") {
        Some(idx) => {
            let raw = args.get(idx + 1).map(String::as_str).unwrap_or_default();
            NaiveDate::parse_from_str(raw, "%Y%m%d")
                .map_err(|_| anyhow::anyhow!("--date must be YYYYMMDD, got '{raw}'"))?
        }
        None => Local::now().date_naive(),
    };

    let config = EngineConfig::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;
    let engine = AnalysisEngine::new(config)
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    // Ctrl-C requests cancellation at the next phase boundary.
    let cancel = engine.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("cancellation requested, stopping at the next phase boundary");
            cancel.store(true, std::sync::atomic::Ordering::Relaxed);
        }
    });

    let summary = engine
        .compute_analysis(target_date)
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    println!("analysis for {target_date}:");
    println!("  quant:       {}", summary.quant);
    println!("  whale:       {}", summary.whale);
    println!("  trend:       {}", summary.trend);
    println!("  flow:        {}", summary.flow);
    println!("  technical:   {}", summary.technical);
    println!("  risk:        {}", summary.risk);
    println!("  sector_flow: {}", summary.sector_flow);
    println!("  articles:    {}", summary.articles);
    println!("  news:        {}", summary.news);
    println!("  simulation:  {}", summary.simulation);
    println!("  composite:   {}", summary.composite);

    Ok(())
}
