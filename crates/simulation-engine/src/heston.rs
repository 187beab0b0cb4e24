//! Heston stochastic volatility simulation.
//!
//! Two coupled SDEs discretised with Euler-Maruyama, full truncation on the
//! variance process:
//!   dS = mu * S dt + sqrt(V) * S dW1
//!   dV = kappa (theta - V) dt + xi sqrt(V) dW2,  corr(W1, W2) = rho

use std::collections::BTreeMap;

use rand::rngs::StdRng;

use crate::stats::{compute_horizon_stats, mean, sample_std};
use crate::{clip_terminal, standard_normal, ModelResult, SimModel, TRADING_DAYS_PER_YEAR};

#[derive(Debug, Clone, Copy)]
pub struct HestonParams {
    pub kappa: f64,
    pub theta: f64,
    pub xi: f64,
    pub rho: f64,
    pub drift_adj_daily: f64,
    pub theta_mult: f64,
    pub v0_mult: f64,
    pub rho_adj: f64,
}

impl Default for HestonParams {
    fn default() -> Self {
        Self {
            kappa: 2.0,
            theta: 0.04,
            xi: 0.3,
            rho: -0.7,
            drift_adj_daily: 0.0,
            theta_mult: 1.0,
            v0_mult: 1.0,
            rho_adj: 0.0,
        }
    }
}

pub fn simulate_heston(
    log_returns: &[f64],
    base_price: i64,
    num_simulations: usize,
    horizons: &[usize],
    rng: &mut StdRng,
    params: &HestonParams,
) -> Option<ModelResult> {
    if log_returns.len() < 30 {
        tracing::debug!("heston: insufficient data");
        return None;
    }

    let daily_mu = mean(log_returns);
    let mu_annual = (daily_mu + params.drift_adj_daily) * TRADING_DAYS_PER_YEAR;
    let dt = 1.0 / TRADING_DAYS_PER_YEAR;

    let theta = params.theta * params.theta_mult;
    let rho = (params.rho + params.rho_adj).clamp(-0.99, 0.99);

    // Initial variance: recent daily variance annualised onto the theta scale.
    let recent = if log_returns.len() >= 20 {
        &log_returns[log_returns.len() - 20..]
    } else {
        log_returns
    };
    let v0 = (sample_std(recent).powi(2) * TRADING_DAYS_PER_YEAR * params.v0_mult).max(1e-8);

    if 2.0 * params.kappa * theta < params.xi * params.xi {
        tracing::warn!(
            "heston: Feller condition violated (2*kappa*theta = {:.4} < xi^2 = {:.4})",
            2.0 * params.kappa * theta,
            params.xi * params.xi
        );
    }

    let max_horizon = *horizons.iter().max()?;
    let sqrt_dt = dt.sqrt();
    let rho_comp = (1.0 - rho * rho).sqrt();

    let base = base_price as f64;
    let mut terminals_by_path: Vec<Vec<f64>> = Vec::with_capacity(num_simulations);

    for _ in 0..num_simulations {
        let mut log_s = 0.0;
        let mut v = v0;
        let mut snapshots = Vec::with_capacity(horizons.len());

        for t in 0..max_horizon {
            let z1 = standard_normal(rng);
            let z2 = rho * z1 + rho_comp * standard_normal(rng);

            let v_pos = v.max(0.0); // full truncation
            let sqrt_v = v_pos.sqrt();

            log_s += (mu_annual - 0.5 * v_pos) * dt + sqrt_v * sqrt_dt * z1;
            v += params.kappa * (theta - v_pos) * dt + params.xi * sqrt_v * sqrt_dt * z2;

            if horizons.contains(&(t + 1)) {
                snapshots.push(clip_terminal(base * log_s.exp(), base));
            }
        }
        terminals_by_path.push(snapshots);
    }

    let mut terminal_prices: BTreeMap<usize, Vec<f64>> = BTreeMap::new();
    let mut horizons_result = BTreeMap::new();

    let mut sorted_horizons: Vec<usize> = horizons.to_vec();
    sorted_horizons.sort_unstable();

    for (idx, &h) in sorted_horizons.iter().enumerate() {
        let terminal: Vec<f64> = terminals_by_path.iter().map(|snap| snap[idx]).collect();
        horizons_result.insert(h, compute_horizon_stats(&terminal, base_price, h));
        terminal_prices.insert(h, terminal);
    }

    Some(ModelResult {
        model: SimModel::Heston,
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
            .map(|i| 0.0003 + daily_vol * ((i as f64 * 1.1).sin()))
            .collect()
    }

    #[test]
    fn produces_all_horizons() {
        let mut rng = StdRng::from_seed(model_seed("005930", "heston"));
        let result = simulate_heston(
            &sample_returns(),
            50_000,
            300,
            &[21, 63, 126, 252],
            &mut rng,
            &HestonParams::default(),
        )
        .unwrap();
        for h in [21, 63, 126, 252] {
            assert_eq!(result.terminal_prices[&h].len(), 300);
        }
    }

    #[test]
    fn insufficient_data_returns_none() {
        let short = vec![0.001; 10];
        let mut rng = StdRng::from_seed(model_seed("005930", "heston"));
        assert!(
            simulate_heston(&short, 50_000, 100, &[63], &mut rng, &HestonParams::default()).is_none()
        );
    }

    #[test]
    fn terminals_positive_and_clipped() {
        let mut rng = StdRng::from_seed(model_seed("005930", "heston"));
        let result = simulate_heston(
            &sample_returns(),
            50_000,
            500,
            &[252],
            &mut rng,
            &HestonParams::default(),
        )
        .unwrap();
        for &t in &result.terminal_prices[&252] {
            assert!(t >= 50_000.0 * 0.001 && t <= 50_000.0 * 100.0);
        }
    }

    #[test]
    fn reproducible_with_same_seed() {
        let returns = sample_returns();
        let mut rng1 = StdRng::from_seed(model_seed("000660", "heston"));
        let mut rng2 = StdRng::from_seed(model_seed("000660", "heston"));
        let r1 =
            simulate_heston(&returns, 50_000, 200, &[63], &mut rng1, &HestonParams::default()).unwrap();
        let r2 =
            simulate_heston(&returns, 50_000, 200, &[63], &mut rng2, &HestonParams::default()).unwrap();
        assert_eq!(r1.terminal_prices[&63], r2.terminal_prices[&63]);
    }

    #[test]
    fn feller_violation_still_simulates() {
        let params = HestonParams {
            kappa: 0.5,
            theta: 0.01,
            xi: 1.0,
            ..HestonParams::default()
        };
        let mut rng = StdRng::from_seed(model_seed("005930", "heston"));
        let result = simulate_heston(&sample_returns(), 50_000, 100, &[63], &mut rng, &params);
        assert!(result.is_some());
    }
}
