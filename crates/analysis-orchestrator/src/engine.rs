//! The daily analysis engine: one run, one target date, all snapshots.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use analysis_core::{
    AnalysisError, EngineConfig, InvestorFlowDay, RunSummary, TrendSnapshot,
};
use chrono::NaiveDate;
use composite_score::{QuantInput, TrendInput};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::composite_stage::{synthesize, CompositeInputs};
use crate::cross::{fill_rs_percentiles, sector_flow_pass, sector_quadrants};
use crate::loader::Loader;
use crate::news_stage::{NewsStage, NewsStageOutput};
use crate::persist::Persister;
use crate::pipeline::{compute_ticker, TickerArtifacts};
use crate::simulation_stage::{run_simulation_stage, SimTask};

pub struct AnalysisEngine {
    config: EngineConfig,
    pool: PgPool,
    cancelled: Arc<AtomicBool>,
}

impl AnalysisEngine {
    pub async fn new(config: EngineConfig) -> Result<Self, AnalysisError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&config.database_url)
            .await
            .map_err(|e| AnalysisError::DatabaseError(e.to_string()))?;

        Ok(Self {
            config,
            pool,
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Flag checked once between phases; loaders and persisters are not
    /// interrupted mid-batch.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    fn checkpoint(&self) -> Result<(), AnalysisError> {
        if self.cancelled.load(Ordering::Relaxed) {
            return Err(AnalysisError::CalculationError("run cancelled".to_string()));
        }
        Ok(())
    }

    /// Compute and persist every snapshot category for the target date.
    /// Returns per-category persisted row counts.
    pub async fn compute_analysis(
        &self,
        target_date: NaiveDate,
    ) -> Result<RunSummary, AnalysisError> {
        tracing::info!("starting analysis computation for {}", target_date);
        let loader = Loader::new(self.pool.clone());

        // --- Load the universe (fatal on failure) -------------------------
        let stocks = loader.active_tickers().await?;
        tracing::info!("found {} active tickers", stocks.len());
        if stocks.is_empty() {
            return Ok(RunSummary::default());
        }

        let sector_map = loader.sector_map().await?;
        let sector_medians = loader.sector_medians(target_date).await?;
        tracing::info!("computed sector medians for {} sectors", sector_medians.len());
        let index_closes = loader.index_closes(target_date).await?;

        self.checkpoint()?;

        // --- Per-ticker pipeline ------------------------------------------
        let mut artifacts: HashMap<String, TickerArtifacts> = HashMap::new();

        for (i, stock) in stocks.iter().enumerate() {
            if (i + 1) % 200 == 0 {
                tracing::info!("processing {}/{}...", i + 1, stocks.len());
            }
            match compute_ticker(
                &loader,
                &self.config,
                &stock.ticker,
                target_date,
                &sector_map,
                &sector_medians,
                &index_closes,
            )
            .await
            {
                Ok(result) => {
                    artifacts.insert(stock.ticker.clone(), result);
                }
                Err(e) => {
                    tracing::warn!("analysis failed for {}: {}", stock.ticker, e);
                }
            }
        }

        self.checkpoint()?;

        // --- News sentiment stage (optional) ------------------------------
        let news_output = if self.config.news_enabled {
            let ticker_names: Vec<(String, String)> = stocks
                .iter()
                .map(|s| (s.ticker.clone(), s.name.clone()))
                .collect();
            NewsStage::new(&self.config).run(target_date, &ticker_names).await
        } else {
            tracing::info!("news stage disabled by configuration");
            NewsStageOutput::default()
        };

        self.checkpoint()?;

        // --- Simulation stage ---------------------------------------------
        let sim_tasks: Vec<SimTask> = artifacts
            .iter()
            .filter(|(_, a)| a.prices.len() >= self.config.min_history_days)
            .map(|(ticker, a)| SimTask {
                ticker: ticker.clone(),
                prices: a.prices.clone(),
                adjustments: news_output.sim_adjustments.get(ticker).cloned(),
            })
            .collect();

        let simulation_rows = run_simulation_stage(target_date, sim_tasks, &self.config);

        self.checkpoint()?;

        // --- Cross-ticker passes ------------------------------------------
        let mut trend_rows: Vec<TrendSnapshot> = artifacts
            .values()
            .filter_map(|a| a.trend.clone())
            .collect();
        fill_rs_percentiles(&mut trend_rows);

        let rs_changes: HashMap<String, f64> = artifacts
            .iter()
            .filter_map(|(t, a)| a.rs_change_pct.map(|c| (t.clone(), c)))
            .collect();
        let quadrants = sector_quadrants(&trend_rows, &rs_changes);

        let investor_data: HashMap<String, Vec<InvestorFlowDay>> = artifacts
            .iter()
            .filter(|(_, a)| !a.investor_rows.is_empty())
            .map(|(t, a)| (t.clone(), a.investor_rows.clone()))
            .collect();
        let trading_values: HashMap<String, f64> = artifacts
            .iter()
            .filter_map(|(t, a)| a.avg_trading_value.map(|v| (t.clone(), v)))
            .collect();

        let (sector_flow_rows, sector_bonuses) = sector_flow_pass(
            target_date,
            &sector_map,
            &investor_data,
            &trading_values,
            self.config.whale_lookback_days,
        );

        self.checkpoint()?;

        // --- Composite synthesis ------------------------------------------
        let rs_percentiles: HashMap<&str, Option<i32>> = trend_rows
            .iter()
            .map(|row| (row.ticker.as_str(), row.rs_percentile))
            .collect();
        let simulation_scores: HashMap<&str, f64> = simulation_rows
            .iter()
            .filter_map(|row| row.simulation_score.map(|s| (row.ticker.as_str(), s)))
            .collect();

        let mut composite_rows = Vec::new();
        for (ticker, artifact) in &artifacts {
            let sector = sector_map.get(ticker).map(|s| s.as_str());
            let inputs = CompositeInputs {
                quant: artifact.quant.as_ref().map(|q| QuantInput {
                    fscore: Some(q.fscore),
                    safety_margin: q.safety_margin,
                    data_completeness: q.data_completeness,
                }),
                whale_score: artifact.whale.as_ref().map(|w| w.whale_score),
                trend: rs_percentiles
                    .get(ticker.as_str())
                    .copied()
                    .flatten()
                    .map(|pct| TrendInput {
                        rs_percentile: Some(pct),
                        sector_quadrant: sector
                            .and_then(|s| quadrants.get(s))
                            .map(|q| q.to_string()),
                    }),
                forecast_score: simulation_scores.get(ticker.as_str()).copied(),
                sentiment_score: news_output.composite_inputs.get(ticker).copied(),
                sector,
            };
            if let Some(row) = synthesize(target_date, ticker, &inputs, &sector_bonuses) {
                composite_rows.push(row);
            }
        }

        self.checkpoint()?;

        // --- Persist -------------------------------------------------------
        let persister = Persister::new(self.pool.clone());

        let quant_rows: Vec<_> = artifacts.values().filter_map(|a| a.quant.clone()).collect();
        let whale_rows: Vec<_> = artifacts.values().filter_map(|a| a.whale.clone()).collect();
        let flow_rows: Vec<_> = artifacts.values().filter_map(|a| a.flow.clone()).collect();
        let technical_rows: Vec<_> = artifacts
            .values()
            .filter_map(|a| a.technical.clone())
            .collect();
        let risk_rows: Vec<_> = artifacts.values().filter_map(|a| a.risk.clone()).collect();

        let summary = RunSummary {
            quant: persister.quant(&quant_rows).await,
            whale: persister.whale(&whale_rows).await,
            trend: persister.trend(&trend_rows).await,
            flow: persister.flow(&flow_rows).await,
            technical: persister.technical(&technical_rows).await,
            risk: persister.risk(&risk_rows).await,
            sector_flow: persister.sector_flow(&sector_flow_rows).await,
            articles: persister.articles(&news_output.articles).await,
            news: persister.news(&news_output.snapshots).await,
            simulation: persister.simulation(&simulation_rows).await,
            composite: persister.composite(&composite_rows).await,
        };

        tracing::info!(
            "analysis complete for {}: quant={} whale={} trend={} flow={} technical={} risk={} \
             sector_flow={} news={} articles={} simulation={} composite={}",
            target_date,
            summary.quant,
            summary.whale,
            summary.trend,
            summary.flow,
            summary.technical,
            summary.risk,
            summary.sector_flow,
            summary.news,
            summary.articles,
            summary.simulation,
            summary.composite,
        );

        Ok(summary)
    }
}
