//! Merton jump-diffusion simulation.
//!
//! GBM plus a compound Poisson jump process:
//!   dS/S = (mu - lambda k) dt + sigma dW + J dN
//!   N ~ Poisson(lambda dt), jump magnitudes ~ Normal(mu_j, sigma_j)

use std::collections::BTreeMap;

use rand::distributions::Distribution;
use rand::rngs::StdRng;
use statrs::distribution::{Normal, Poisson};

use crate::stats::{compute_horizon_stats, mean, sample_std};
use crate::{clip_terminal, standard_normal, ModelResult, SimModel, MAX_DAILY_MU, TRADING_DAYS_PER_YEAR};

#[derive(Debug, Clone, Copy)]
pub struct MertonParams {
    /// Annual jump intensity (expected jumps per year).
    pub lambda: f64,
    /// Mean jump size (log scale).
    pub mu_j: f64,
    /// Jump size volatility.
    pub sigma_j: f64,
    pub max_sigma: f64,
    pub drift_adj_daily: f64,
    pub vol_multiplier: f64,
    pub lam_multiplier: f64,
    pub mu_j_adj: f64,
    pub sig_j_multiplier: f64,
}

impl Default for MertonParams {
    fn default() -> Self {
        Self {
            lambda: 3.0,
            mu_j: 0.0,
            sigma_j: 0.06,
            max_sigma: 1.50,
            drift_adj_daily: 0.0,
            vol_multiplier: 1.0,
            lam_multiplier: 1.0,
            mu_j_adj: 0.0,
            sig_j_multiplier: 1.0,
        }
    }
}

pub fn simulate_merton(
    log_returns: &[f64],
    base_price: i64,
    num_simulations: usize,
    horizons: &[usize],
    rng: &mut StdRng,
    params: &MertonParams,
) -> Option<ModelResult> {
    if log_returns.len() < 30 {
        tracing::debug!("merton: insufficient data");
        return None;
    }

    let daily_mu = mean(log_returns);
    let daily_sigma_orig = sample_std(log_returns);

    let mut sigma = daily_sigma_orig * TRADING_DAYS_PER_YEAR.sqrt();
    sigma = sigma.min(params.max_sigma);
    let mut daily_sigma = sigma / TRADING_DAYS_PER_YEAR.sqrt();

    if daily_sigma == 0.0 {
        return None;
    }

    let mut mu_arith_daily = daily_mu + 0.5 * daily_sigma_orig * daily_sigma_orig;
    mu_arith_daily = mu_arith_daily.clamp(-MAX_DAILY_MU, MAX_DAILY_MU);
    mu_arith_daily += params.drift_adj_daily;
    mu_arith_daily = mu_arith_daily.clamp(-MAX_DAILY_MU * 2.0, MAX_DAILY_MU * 2.0);

    daily_sigma *= params.vol_multiplier;
    let max_daily_sigma = params.max_sigma / TRADING_DAYS_PER_YEAR.sqrt();
    daily_sigma = daily_sigma.min(max_daily_sigma);

    let lambda = params.lambda * params.lam_multiplier;
    let mu_j = params.mu_j + params.mu_j_adj;
    // Cap prevents exp() overflow in the jump compensator.
    let sigma_j = (params.sigma_j * params.sig_j_multiplier).min(5.0);

    let lam_daily = lambda / TRADING_DAYS_PER_YEAR;

    // Drift compensation for the jump component: k = E[J - 1].
    let k = (mu_j + 0.5 * sigma_j * sigma_j).exp() - 1.0;
    let drift_comp = mu_arith_daily - lam_daily * k;

    let poisson = if lam_daily > 0.0 {
        Poisson::new(lam_daily).ok()
    } else {
        None
    };
    let jump_dist = if sigma_j > 0.0 {
        Normal::new(mu_j, sigma_j).ok()
    } else {
        None
    };

    let max_horizon = *horizons.iter().max()?;
    let base = base_price as f64;

    let mut sorted_horizons: Vec<usize> = horizons.to_vec();
    sorted_horizons.sort_unstable();

    let mut terminals_by_path: Vec<Vec<f64>> = Vec::with_capacity(num_simulations);

    for _ in 0..num_simulations {
        let mut cumulative = 0.0;
        let mut snapshots = Vec::with_capacity(sorted_horizons.len());

        for t in 0..max_horizon {
            let diffusion = (drift_comp - 0.5 * daily_sigma * daily_sigma)
                + daily_sigma * standard_normal(rng);

            let mut jumps = 0.0;
            if let Some(p) = &poisson {
                let n_jumps = p.sample(rng) as u64;
                for _ in 0..n_jumps {
                    jumps += match &jump_dist {
                        Some(d) => d.sample(rng),
                        None => mu_j,
                    };
                }
            }

            cumulative += diffusion + jumps;

            if sorted_horizons.contains(&(t + 1)) {
                snapshots.push(clip_terminal(base * cumulative.exp(), base));
            }
        }
        terminals_by_path.push(snapshots);
    }

    let mut terminal_prices: BTreeMap<usize, Vec<f64>> = BTreeMap::new();
    let mut horizons_result = BTreeMap::new();

    for (idx, &h) in sorted_horizons.iter().enumerate() {
        let terminal: Vec<f64> = terminals_by_path.iter().map(|snap| snap[idx]).collect();
        horizons_result.insert(h, compute_horizon_stats(&terminal, base_price, h));
        terminal_prices.insert(h, terminal);
    }

    Some(ModelResult {
        model: SimModel::Merton,
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
        let daily_vol = 0.20 / (252.0_f64).sqrt();
        (0..200)
            .map(|i| 0.0003 + daily_vol * ((i as f64 * 0.8).sin()))
            .collect()
    }

    #[test]
    fn produces_all_horizons() {
        let mut rng = StdRng::from_seed(model_seed("005930", "merton"));
        let result = simulate_merton(
            &sample_returns(),
            50_000,
            300,
            &[21, 63, 126, 252],
            &mut rng,
            &MertonParams::default(),
        )
        .unwrap();
        assert_eq!(result.terminal_prices.len(), 4);
        for h in [21, 63, 126, 252] {
            let stats = &result.horizons[&h];
            assert!(stats.p5 <= stats.p95);
        }
    }

    #[test]
    fn insufficient_data_returns_none() {
        let mut rng = StdRng::from_seed(model_seed("005930", "merton"));
        assert!(simulate_merton(&[0.01; 10], 50_000, 100, &[63], &mut rng, &MertonParams::default())
            .is_none());
    }

    #[test]
    fn zero_volatility_returns_none() {
        let mut rng = StdRng::from_seed(model_seed("005930", "merton"));
        assert!(simulate_merton(&[0.0; 100], 50_000, 100, &[63], &mut rng, &MertonParams::default())
            .is_none());
    }

    #[test]
    fn reproducible_with_same_seed() {
        let returns = sample_returns();
        let mut rng1 = StdRng::from_seed(model_seed("000660", "merton"));
        let mut rng2 = StdRng::from_seed(model_seed("000660", "merton"));
        let r1 =
            simulate_merton(&returns, 50_000, 200, &[63], &mut rng1, &MertonParams::default()).unwrap();
        let r2 =
            simulate_merton(&returns, 50_000, 200, &[63], &mut rng2, &MertonParams::default()).unwrap();
        assert_eq!(r1.terminal_prices[&63], r2.terminal_prices[&63]);
    }

    #[test]
    fn higher_jump_intensity_widens_distribution() {
        let returns = sample_returns();
        let mut rng1 = StdRng::from_seed(model_seed("005930", "merton"));
        let mut rng2 = StdRng::from_seed(model_seed("005930", "merton"));

        let calm =
            simulate_merton(&returns, 50_000, 2000, &[126], &mut rng1, &MertonParams::default())
                .unwrap();
        let jumpy = simulate_merton(
            &returns,
            50_000,
            2000,
            &[126],
            &mut rng2,
            &MertonParams {
                lam_multiplier: 3.0,
                sig_j_multiplier: 2.0,
                ..MertonParams::default()
            },
        )
        .unwrap();

        let spread = |r: &ModelResult| {
            let s = &r.horizons[&126];
            s.p95 - s.p5
        };
        assert!(spread(&jumpy) > spread(&calm));
    }
}
