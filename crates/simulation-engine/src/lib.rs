//! Monte-Carlo price forecasting.
//!
//! Four stochastic models (GBM, GARCH(1,1), Heston, Merton jump-diffusion)
//! simulate terminal prices over 1/3/6/12-month horizons; an ensemble pools
//! them into one forecast distribution with a 0-100 score. Seeding is
//! SHA-256 per (ticker, model) so results are reproducible and each model is
//! independent of its siblings.

pub mod ensemble;
pub mod garch;
pub mod gbm;
pub mod heston;
pub mod merton;
pub mod score;
pub mod seeds;
pub mod stats;

pub use ensemble::{combine_ensemble, EnsembleResult, ModelBreakdown, ModelScore};
pub use garch::{simulate_garch, GarchParams};
pub use gbm::{simulate_gbm, GbmParams};
pub use heston::{simulate_heston, HestonParams};
pub use merton::{simulate_merton, MertonParams};
pub use score::{compute_simulation_score, SimulationScore};
pub use seeds::{model_seed, ticker_seed};
pub use stats::HorizonStats;

use std::collections::BTreeMap;

use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::SeedableRng;
use sentiment_analysis::SentimentAdjustments;
use serde::{Deserialize, Serialize};
use statrs::distribution::Normal;

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;
/// Cap annual drift at ±100%.
pub const MAX_DAILY_MU: f64 = 1.0 / 252.0;
pub const DEFAULT_HORIZONS: [usize; 4] = [21, 63, 126, 252];
pub const DEFAULT_TARGET_MULTIPLIERS: [f64; 3] = [1.1, 1.2, 1.5];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimModel {
    Gbm,
    Garch,
    Heston,
    Merton,
}

impl SimModel {
    pub fn name(&self) -> &'static str {
        match self {
            SimModel::Gbm => "gbm",
            SimModel::Garch => "garch",
            SimModel::Heston => "heston",
            SimModel::Merton => "merton",
        }
    }

    pub const ALL: [SimModel; 4] = [SimModel::Gbm, SimModel::Garch, SimModel::Heston, SimModel::Merton];
}

/// Terminal prices and per-horizon stats from one model.
#[derive(Debug, Clone)]
pub struct ModelResult {
    pub model: SimModel,
    pub terminal_prices: BTreeMap<usize, Vec<f64>>,
    pub horizons: BTreeMap<usize, HorizonStats>,
}

/// One standard-normal draw.
pub(crate) fn standard_normal(rng: &mut StdRng) -> f64 {
    // Normal(0, 1) construction cannot fail.
    Normal::new(0.0, 1.0).unwrap().sample(rng)
}

/// Terminal prices are clipped to [base/1000, base*100].
pub(crate) fn clip_terminal(price: f64, base: f64) -> f64 {
    price.clamp(base * 0.001, base * 100.0)
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SimulationParams {
    pub num_simulations: usize,
    pub horizons: Vec<usize>,
    pub target_multipliers: Vec<f64>,
    pub min_history_days: usize,
    pub max_sigma: f64,
    pub models: Vec<SimModel>,
    pub weights: Vec<(String, f64)>,
    pub garch_p: usize,
    pub garch_q: usize,
    pub heston_kappa: f64,
    pub heston_theta: f64,
    pub heston_xi: f64,
    pub heston_rho: f64,
    pub merton_lambda: f64,
    pub merton_mu_j: f64,
    pub merton_sigma_j: f64,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            num_simulations: 10_000,
            horizons: DEFAULT_HORIZONS.to_vec(),
            target_multipliers: DEFAULT_TARGET_MULTIPLIERS.to_vec(),
            min_history_days: 60,
            max_sigma: 1.50,
            models: SimModel::ALL.to_vec(),
            weights: vec![
                ("gbm".to_string(), 0.25),
                ("garch".to_string(), 0.30),
                ("heston".to_string(), 0.20),
                ("merton".to_string(), 0.25),
            ],
            garch_p: 1,
            garch_q: 1,
            heston_kappa: 2.0,
            heston_theta: 0.04,
            heston_xi: 0.3,
            heston_rho: -0.7,
            merton_lambda: 3.0,
            merton_mu_j: 0.0,
            merton_sigma_j: 0.06,
        }
    }
}

/// Full result of the per-ticker simulation stage.
#[derive(Debug, Clone)]
pub struct SimulationOutput {
    pub simulation_score: Option<f64>,
    pub simulation_grade: Option<String>,
    pub base_price: i64,
    pub mu: f64,
    pub sigma: f64,
    pub num_simulations: usize,
    pub input_days_used: usize,
    pub horizons: BTreeMap<usize, HorizonStats>,
    pub target_probs: BTreeMap<String, BTreeMap<usize, f64>>,
    pub model_breakdown: Option<ModelBreakdown>,
    pub sentiment_applied: bool,
}

/// Run the multi-model Monte-Carlo forecast for one ticker.
///
/// Returns None when there is not enough clean price history or every model
/// fails (for example, zero variance). With a single configured model the
/// RNG is seeded from the ticker alone; multi-model runs seed each model
/// from its own (ticker, model) hash.
pub fn run_monte_carlo(
    ticker: &str,
    prices: &[f64],
    params: &SimulationParams,
    adjustments: Option<&SentimentAdjustments>,
) -> Option<SimulationOutput> {
    let clean: Vec<f64> = prices
        .iter()
        .copied()
        .filter(|p| p.is_finite() && *p > 0.0)
        .collect();

    if clean.len() < params.min_history_days {
        tracing::debug!(
            "simulation {}: insufficient history ({} days, need {})",
            ticker,
            clean.len(),
            params.min_history_days
        );
        return None;
    }

    let log_returns: Vec<f64> = clean.windows(2).map(|w| (w[1] / w[0]).ln()).collect();
    if log_returns.is_empty() || log_returns.iter().all(|r| *r == 0.0) {
        tracing::debug!("simulation {}: no valid returns", ticker);
        return None;
    }

    let base_price = *clean.last().unwrap() as i64;

    let neutral = SentimentAdjustments::neutral();
    let adj = adjustments.unwrap_or(&neutral);

    let run_model = |model: SimModel, rng: &mut StdRng| -> Option<ModelResult> {
        match model {
            SimModel::Gbm => simulate_gbm(
                &log_returns,
                base_price,
                params.num_simulations,
                &params.horizons,
                rng,
                &GbmParams {
                    max_sigma: params.max_sigma,
                    drift_adj_daily: adj.drift_adj_daily,
                    vol_multiplier: adj.vol_multiplier,
                },
            ),
            SimModel::Garch => simulate_garch(
                &log_returns,
                base_price,
                params.num_simulations,
                &params.horizons,
                rng,
                &GarchParams {
                    p: params.garch_p,
                    q: params.garch_q,
                    max_sigma: params.max_sigma,
                    drift_adj_daily: adj.drift_adj_daily,
                    var_multiplier: adj.var_multiplier,
                },
            ),
            SimModel::Heston => simulate_heston(
                &log_returns,
                base_price,
                params.num_simulations,
                &params.horizons,
                rng,
                &HestonParams {
                    kappa: params.heston_kappa,
                    theta: params.heston_theta,
                    xi: params.heston_xi,
                    rho: params.heston_rho,
                    drift_adj_daily: adj.drift_adj_daily,
                    theta_mult: adj.theta_mult,
                    v0_mult: adj.v0_mult,
                    rho_adj: adj.rho_adj,
                },
            ),
            SimModel::Merton => simulate_merton(
                &log_returns,
                base_price,
                params.num_simulations,
                &params.horizons,
                rng,
                &MertonParams {
                    lambda: params.merton_lambda,
                    mu_j: params.merton_mu_j,
                    sigma_j: params.merton_sigma_j,
                    max_sigma: params.max_sigma,
                    drift_adj_daily: adj.drift_adj_daily,
                    vol_multiplier: adj.vol_multiplier,
                    lam_multiplier: adj.lam_mult,
                    mu_j_adj: adj.mu_j_adj,
                    sig_j_multiplier: adj.sig_j_mult,
                },
            ),
        }
    };

    let mut successful: Vec<ModelResult> = Vec::with_capacity(params.models.len());

    if params.models.len() == 1 {
        // Fast path keeps the historical ticker-only seed.
        let mut rng = StdRng::from_seed(ticker_seed(ticker));
        if let Some(result) = run_model(params.models[0], &mut rng) {
            successful.push(result);
        }
    } else {
        for &model in &params.models {
            let mut rng = StdRng::from_seed(model_seed(ticker, model.name()));
            match run_model(model, &mut rng) {
                Some(result) => successful.push(result),
                None => tracing::debug!("simulation {}: model {} failed", ticker, model.name()),
            }
        }
    }

    if successful.is_empty() {
        return None;
    }

    let daily_mu = stats::mean(&log_returns);
    let daily_sigma = stats::sample_std(&log_returns);
    let sigma_report = (daily_sigma * TRADING_DAYS_PER_YEAR.sqrt()).min(params.max_sigma);
    let mu_report = (daily_mu + 0.5 * daily_sigma * daily_sigma)
        .clamp(-MAX_DAILY_MU, MAX_DAILY_MU)
        * TRADING_DAYS_PER_YEAR;

    let weights = match &adj.ensemble_weight_overrides {
        Some(overrides) => overrides.clone(),
        None => params.weights.clone(),
    };

    let (horizons, target_probs, model_breakdown) = if successful.len() == 1 {
        let only = &successful[0];
        let target_probs = single_model_target_probs(only, base_price, &params.target_multipliers);
        (only.horizons.clone(), target_probs, None)
    } else {
        let combined = combine_ensemble(
            &successful,
            &weights,
            &params.horizons,
            base_price,
            &params.target_multipliers,
            params.num_simulations,
        )?;
        (combined.horizons, combined.target_probs, Some(combined.breakdown))
    };

    let score = compute_simulation_score(&horizons);

    Some(SimulationOutput {
        simulation_score: score.score,
        simulation_grade: score.grade.map(|g| g.to_string()),
        base_price,
        mu: round6(mu_report),
        sigma: round6(sigma_report),
        num_simulations: params.num_simulations,
        input_days_used: clean.len(),
        horizons,
        target_probs,
        model_breakdown,
        sentiment_applied: adjustments.is_some(),
    })
}

fn single_model_target_probs(
    result: &ModelResult,
    base_price: i64,
    target_multipliers: &[f64],
) -> BTreeMap<String, BTreeMap<usize, f64>> {
    let mut target_probs = BTreeMap::new();
    for &mult in target_multipliers {
        let target_price = base_price as f64 * mult;
        let mut per_horizon = BTreeMap::new();
        for (&h, terminal) in &result.terminal_prices {
            if terminal.is_empty() {
                continue;
            }
            let prob =
                terminal.iter().filter(|&&t| t > target_price).count() as f64 / terminal.len() as f64;
            per_horizon.insert(h, (prob * 10_000.0).round() / 10_000.0);
        }
        target_probs.insert(format!("{mult}"), per_horizon);
    }
    target_probs
}

fn round6(v: f64) -> f64 {
    (v * 1_000_000.0).round() / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn realistic_prices() -> Vec<f64> {
        // 200 days of drifting prices with deterministic wiggle.
        let mut prices = vec![50_000.0];
        for i in 0..200 {
            let r = 0.0003 + 0.015 * ((i as f64 * 0.9).sin());
            let last = *prices.last().unwrap();
            prices.push(last * r.exp());
        }
        prices
    }

    fn fast_params(models: Vec<SimModel>) -> SimulationParams {
        SimulationParams {
            num_simulations: 300,
            models,
            ..SimulationParams::default()
        }
    }

    #[test]
    fn insufficient_history_returns_none() {
        let short: Vec<f64> = (0..30).map(|i| 50_000.0 + i as f64 * 100.0).collect();
        assert!(run_monte_carlo("005930", &short, &SimulationParams::default(), None).is_none());
    }

    #[test]
    fn empty_prices_return_none() {
        assert!(run_monte_carlo("005930", &[], &SimulationParams::default(), None).is_none());
    }

    #[test]
    fn constant_prices_return_none() {
        let flat = vec![50_000.0; 100];
        assert!(run_monte_carlo("005930", &flat, &SimulationParams::default(), None).is_none());
    }

    #[test]
    fn full_ensemble_produces_breakdown() {
        let output = run_monte_carlo(
            "005930",
            &realistic_prices(),
            &fast_params(SimModel::ALL.to_vec()),
            None,
        )
        .unwrap();

        let breakdown = output.model_breakdown.expect("multi-model run has breakdown");
        assert!(breakdown.model_scores.len() >= 2);
        let weight_sum: f64 = breakdown.model_scores.iter().map(|m| m.weight).sum();
        assert!((weight_sum - 1.0).abs() < 1e-3);
        assert!(!output.sentiment_applied);
    }

    #[test]
    fn single_model_has_no_breakdown() {
        let output = run_monte_carlo(
            "005930",
            &realistic_prices(),
            &fast_params(vec![SimModel::Gbm]),
            None,
        )
        .unwrap();
        assert!(output.model_breakdown.is_none());
        assert!(output.target_probs.contains_key("1.1"));
    }

    #[test]
    fn score_and_grade_valid() {
        let output = run_monte_carlo(
            "005930",
            &realistic_prices(),
            &fast_params(SimModel::ALL.to_vec()),
            None,
        )
        .unwrap();
        if let Some(score) = output.simulation_score {
            assert!((0.0..=100.0).contains(&score));
        }
        if let Some(grade) = &output.simulation_grade {
            assert!(["positive", "neutral_positive", "neutral", "negative"].contains(&grade.as_str()));
        }
    }

    #[test]
    fn repeat_runs_are_identical() {
        let prices = realistic_prices();
        let params = fast_params(SimModel::ALL.to_vec());
        let a = run_monte_carlo("005930", &prices, &params, None).unwrap();
        let b = run_monte_carlo("005930", &prices, &params, None).unwrap();
        assert_eq!(a.simulation_score, b.simulation_score);
        assert_eq!(a.horizons[&126].p50, b.horizons[&126].p50);
        assert_eq!(a.target_probs, b.target_probs);
    }

    #[test]
    fn model_results_independent_of_siblings() {
        // GBM alone (seeded per model) must match GBM inside the full ensemble.
        let prices = realistic_prices();
        let clean: Vec<f64> = prices.clone();
        let log_returns: Vec<f64> = clean.windows(2).map(|w| (w[1] / w[0]).ln()).collect();
        let base = *clean.last().unwrap() as i64;

        let mut rng1 = StdRng::from_seed(model_seed("005930", "gbm"));
        let mut rng2 = StdRng::from_seed(model_seed("005930", "gbm"));
        let solo = simulate_gbm(&log_returns, base, 300, &[63], &mut rng1, &GbmParams::default())
            .unwrap();
        // Sibling models consuming their own RNG streams cannot disturb GBM.
        let mut sibling_rng = StdRng::from_seed(model_seed("005930", "garch"));
        let _ = simulate_garch(
            &log_returns,
            base,
            300,
            &[63],
            &mut sibling_rng,
            &GarchParams::default(),
        );
        let again = simulate_gbm(&log_returns, base, 300, &[63], &mut rng2, &GbmParams::default())
            .unwrap();
        assert_eq!(solo.terminal_prices[&63], again.terminal_prices[&63]);
    }

    #[test]
    fn different_tickers_produce_different_medians() {
        let prices = realistic_prices();
        let params = fast_params(vec![SimModel::Gbm]);
        let a = run_monte_carlo("005930", &prices, &params, None).unwrap();
        let b = run_monte_carlo("035420", &prices, &params, None).unwrap();
        assert_ne!(a.horizons[&126].p50, b.horizons[&126].p50);
    }

    #[test]
    fn sentiment_adjustments_mark_output() {
        let adj = SentimentAdjustments::neutral();
        let output = run_monte_carlo(
            "005930",
            &realistic_prices(),
            &fast_params(vec![SimModel::Gbm]),
            Some(&adj),
        )
        .unwrap();
        assert!(output.sentiment_applied);
    }

    #[test]
    fn ensemble_weight_overrides_change_breakdown() {
        let mut adj = SentimentAdjustments::neutral();
        adj.ensemble_weight_overrides = Some(vec![
            ("gbm".to_string(), 0.7),
            ("garch".to_string(), 0.1),
            ("heston".to_string(), 0.1),
            ("merton".to_string(), 0.1),
        ]);
        let output = run_monte_carlo(
            "005930",
            &realistic_prices(),
            &fast_params(SimModel::ALL.to_vec()),
            Some(&adj),
        )
        .unwrap();
        let breakdown = output.model_breakdown.unwrap();
        let gbm = breakdown.model_scores.iter().find(|m| m.model == "gbm").unwrap();
        assert!(gbm.weight > 0.5);
    }
}
