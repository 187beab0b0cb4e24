//! Monte-Carlo simulation stage.
//!
//! CPU-bound worker pool over fully self-contained inputs. Each worker takes
//! a ticker, its clean price series, and an optional sentiment adjustment,
//! and returns the finished snapshot payload; there is no shared state.

use analysis_core::{EngineConfig, SimulationSnapshot};
use chrono::NaiveDate;
use rayon::prelude::*;
use sentiment_analysis::SentimentAdjustments;
use simulation_engine::{run_monte_carlo, SimModel, SimulationParams};

pub struct SimTask {
    pub ticker: String,
    pub prices: Vec<f64>,
    pub adjustments: Option<SentimentAdjustments>,
}

pub fn simulation_params(config: &EngineConfig) -> SimulationParams {
    SimulationParams {
        num_simulations: config.num_simulations,
        min_history_days: config.min_history_days,
        max_sigma: config.max_annualized_sigma,
        models: SimModel::ALL.to_vec(),
        weights: config
            .ensemble_weights()
            .iter()
            .map(|(name, w)| (name.to_string(), *w))
            .collect(),
        garch_p: config.garch_p,
        garch_q: config.garch_q,
        heston_kappa: config.heston_kappa,
        heston_theta: config.heston_theta,
        heston_xi: config.heston_xi,
        heston_rho: config.heston_rho,
        merton_lambda: config.merton_lambda,
        merton_mu_j: config.merton_mu_j,
        merton_sigma_j: config.merton_sigma_j,
        ..SimulationParams::default()
    }
}

/// Run the forecast for every eligible ticker on a pool of
/// `config.sim_workers` threads.
pub fn run_simulation_stage(
    target_date: NaiveDate,
    tasks: Vec<SimTask>,
    config: &EngineConfig,
) -> Vec<SimulationSnapshot> {
    let params = simulation_params(config);

    let pool = match rayon::ThreadPoolBuilder::new()
        .num_threads(config.sim_workers)
        .build()
    {
        Ok(pool) => pool,
        Err(e) => {
            tracing::warn!("simulation pool build failed ({}), running on current thread", e);
            return tasks
                .iter()
                .filter_map(|task| simulate_one(target_date, task, &params))
                .collect();
        }
    };

    let snapshots: Vec<SimulationSnapshot> = pool.install(|| {
        tasks
            .par_iter()
            .filter_map(|task| simulate_one(target_date, task, &params))
            .collect()
    });

    tracing::info!(
        "simulation stage: {}/{} tickers produced forecasts",
        snapshots.len(),
        tasks.len()
    );
    snapshots
}

fn simulate_one(
    target_date: NaiveDate,
    task: &SimTask,
    params: &SimulationParams,
) -> Option<SimulationSnapshot> {
    let output = run_monte_carlo(&task.ticker, &task.prices, params, task.adjustments.as_ref())?;

    Some(SimulationSnapshot {
        trade_date: target_date,
        ticker: task.ticker.clone(),
        simulation_score: output.simulation_score,
        simulation_grade: output.simulation_grade.clone(),
        base_price: output.base_price,
        mu: output.mu,
        sigma: output.sigma,
        num_simulations: output.num_simulations as i32,
        input_days_used: output.input_days_used as i32,
        horizons: serde_json::to_value(&output.horizons).unwrap_or_default(),
        target_probs: serde_json::to_value(&output.target_probs).unwrap_or_default(),
        model_breakdown: output
            .model_breakdown
            .as_ref()
            .and_then(|b| serde_json::to_value(b).ok()),
        sentiment_applied: output.sentiment_applied,
    })
}
