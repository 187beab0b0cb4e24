//! Geometric Brownian Motion (constant volatility) simulation.

use std::collections::BTreeMap;

use rand::rngs::StdRng;

use crate::stats::{compute_horizon_stats, mean, sample_std};
use crate::{clip_terminal, standard_normal, ModelResult, SimModel, MAX_DAILY_MU, TRADING_DAYS_PER_YEAR};

#[derive(Debug, Clone, Copy)]
pub struct GbmParams {
    pub max_sigma: f64,
    pub drift_adj_daily: f64,
    pub vol_multiplier: f64,
}

impl Default for GbmParams {
    fn default() -> Self {
        Self {
            max_sigma: 1.50,
            drift_adj_daily: 0.0,
            vol_multiplier: 1.0,
        }
    }
}

/// Simulate GBM terminal prices for every horizon.
///
/// The arithmetic drift is recovered from the sample log returns
/// (`mu_arith = E[log_ret] + sigma_hist^2 / 2`), clipped to ±100% annualised,
/// sentiment-adjusted, then re-paired with the (possibly capped) volatility
/// through the Ito correction.
pub fn simulate_gbm(
    log_returns: &[f64],
    base_price: i64,
    num_simulations: usize,
    horizons: &[usize],
    rng: &mut StdRng,
    params: &GbmParams,
) -> Option<ModelResult> {
    let daily_mu = mean(log_returns);
    let daily_sigma = sample_std(log_returns);

    let mut sigma = daily_sigma * TRADING_DAYS_PER_YEAR.sqrt();
    if sigma > params.max_sigma {
        tracing::debug!("gbm: capping sigma {:.4} -> {:.4}", sigma, params.max_sigma);
        sigma = params.max_sigma;
    }
    if sigma == 0.0 {
        tracing::debug!("gbm: zero volatility, skipping");
        return None;
    }

    let mut daily_vol = sigma / TRADING_DAYS_PER_YEAR.sqrt();

    let mut mu_arith_daily = daily_mu + 0.5 * daily_sigma * daily_sigma;
    mu_arith_daily = mu_arith_daily.clamp(-MAX_DAILY_MU, MAX_DAILY_MU);
    mu_arith_daily += params.drift_adj_daily;
    mu_arith_daily = mu_arith_daily.clamp(-MAX_DAILY_MU * 2.0, MAX_DAILY_MU * 2.0);

    daily_vol *= params.vol_multiplier;
    let max_daily_vol = params.max_sigma / TRADING_DAYS_PER_YEAR.sqrt();
    daily_vol = daily_vol.min(max_daily_vol);

    let daily_drift = mu_arith_daily - 0.5 * daily_vol * daily_vol;

    let base = base_price as f64;
    let mut terminal_prices: BTreeMap<usize, Vec<f64>> = BTreeMap::new();
    let mut horizons_result = BTreeMap::new();

    for &h in horizons {
        let mut terminal = Vec::with_capacity(num_simulations);
        for _ in 0..num_simulations {
            let mut cumulative = 0.0;
            for _ in 0..h {
                cumulative += daily_drift + daily_vol * standard_normal(rng);
            }
            terminal.push(clip_terminal(base * cumulative.exp(), base));
        }
        horizons_result.insert(h, compute_horizon_stats(&terminal, base_price, h));
        terminal_prices.insert(h, terminal);
    }

    Some(ModelResult {
        model: SimModel::Gbm,
        terminal_prices,
        horizons: horizons_result,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seeds::model_seed;
    use rand::SeedableRng;

    fn sample_returns() -> Vec<f64> {
        // Deterministic pseudo-returns around +8%/yr, ~20% vol.
        let daily_vol = 0.20 / (252.0_f64).sqrt();
        let daily_mu = 0.08 / 252.0;
        (0..200)
            .map(|i| daily_mu + daily_vol * ((i as f64 * 0.7).sin()))
            .collect()
    }

    const HORIZONS: [usize; 4] = [21, 63, 126, 252];

    #[test]
    fn returns_all_horizons() {
        let mut rng = StdRng::from_seed(model_seed("005930", "gbm"));
        let result =
            simulate_gbm(&sample_returns(), 50_000, 500, &HORIZONS, &mut rng, &GbmParams::default())
                .unwrap();
        for h in HORIZONS {
            assert_eq!(result.terminal_prices[&h].len(), 500);
            let stats = &result.horizons[&h];
            assert!(stats.p5 <= stats.p25 && stats.p25 <= stats.p50);
            assert!(stats.p50 <= stats.p75 && stats.p75 <= stats.p95);
        }
    }

    #[test]
    fn zero_volatility_returns_none() {
        let flat = vec![0.0; 100];
        let mut rng = StdRng::from_seed(model_seed("005930", "gbm"));
        assert!(simulate_gbm(&flat, 50_000, 100, &HORIZONS, &mut rng, &GbmParams::default()).is_none());
    }

    #[test]
    fn terminal_prices_clipped() {
        let wild: Vec<f64> = (0..200).map(|i| if i % 2 == 0 { 0.5 } else { -0.5 }).collect();
        let mut rng = StdRng::from_seed(model_seed("005930", "gbm"));
        let result =
            simulate_gbm(&wild, 50_000, 200, &[252], &mut rng, &GbmParams::default()).unwrap();
        for &t in &result.terminal_prices[&252] {
            assert!(t >= 50_000.0 * 0.001 && t <= 50_000.0 * 100.0);
        }
    }

    #[test]
    fn same_seed_reproduces_terminals() {
        let returns = sample_returns();
        let mut rng1 = StdRng::from_seed(model_seed("005930", "gbm"));
        let mut rng2 = StdRng::from_seed(model_seed("005930", "gbm"));
        let r1 = simulate_gbm(&returns, 50_000, 300, &[63], &mut rng1, &GbmParams::default()).unwrap();
        let r2 = simulate_gbm(&returns, 50_000, 300, &[63], &mut rng2, &GbmParams::default()).unwrap();
        assert_eq!(r1.terminal_prices[&63], r2.terminal_prices[&63]);
    }

    #[test]
    fn different_tickers_differ() {
        let returns = sample_returns();
        let mut rng1 = StdRng::from_seed(model_seed("005930", "gbm"));
        let mut rng2 = StdRng::from_seed(model_seed("035420", "gbm"));
        let r1 = simulate_gbm(&returns, 50_000, 300, &[63], &mut rng1, &GbmParams::default()).unwrap();
        let r2 = simulate_gbm(&returns, 50_000, 300, &[63], &mut rng2, &GbmParams::default()).unwrap();
        assert_ne!(r1.terminal_prices[&63], r2.terminal_prices[&63]);
    }

    #[test]
    fn positive_drift_adjustment_lifts_median() {
        let returns = sample_returns();
        let mut rng1 = StdRng::from_seed(model_seed("005930", "gbm"));
        let mut rng2 = StdRng::from_seed(model_seed("005930", "gbm"));
        let neutral =
            simulate_gbm(&returns, 50_000, 2000, &[126], &mut rng1, &GbmParams::default()).unwrap();
        let lifted = simulate_gbm(
            &returns,
            50_000,
            2000,
            &[126],
            &mut rng2,
            &GbmParams {
                drift_adj_daily: 0.10 / 252.0,
                ..GbmParams::default()
            },
        )
        .unwrap();
        assert!(lifted.horizons[&126].p50 > neutral.horizons[&126].p50);
    }
}
