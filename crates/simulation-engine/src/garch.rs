//! GARCH(1,1) time-varying volatility simulation.
//!
//! Three-stage fallback: maximum-likelihood GARCH fit, then mean-reverting
//! EWMA (lambda = 0.94), then constant sigma.

use std::collections::BTreeMap;

use rand::rngs::StdRng;

use crate::stats::{compute_horizon_stats, mean, sample_std};
use crate::{clip_terminal, standard_normal, ModelResult, SimModel, MAX_DAILY_MU, TRADING_DAYS_PER_YEAR};

#[derive(Debug, Clone, Copy)]
pub struct GarchParams {
    pub p: usize,
    pub q: usize,
    pub max_sigma: f64,
    pub drift_adj_daily: f64,
    pub var_multiplier: f64,
}

impl Default for GarchParams {
    fn default() -> Self {
        Self {
            p: 1,
            q: 1,
            max_sigma: 1.50,
            drift_adj_daily: 0.0,
            var_multiplier: 1.0,
        }
    }
}

/// Simulate with a GARCH-forecast volatility path.
///
/// All paths share one forecast variance trajectory; a path-dependent
/// variant would produce heavier tails. Kept deliberately.
pub fn simulate_garch(
    log_returns: &[f64],
    base_price: i64,
    num_simulations: usize,
    horizons: &[usize],
    rng: &mut StdRng,
    params: &GarchParams,
) -> Option<ModelResult> {
    if log_returns.len() < 30 {
        tracing::debug!("garch: insufficient data ({} returns)", log_returns.len());
        return None;
    }

    let daily_mu = mean(log_returns);
    let daily_sigma_hist = sample_std(log_returns);

    let mut mu_arith_daily = daily_mu + 0.5 * daily_sigma_hist * daily_sigma_hist;
    mu_arith_daily = mu_arith_daily.clamp(-MAX_DAILY_MU, MAX_DAILY_MU);
    mu_arith_daily += params.drift_adj_daily;

    let max_daily_sigma = params.max_sigma / TRADING_DAYS_PER_YEAR.sqrt();
    let max_horizon = *horizons.iter().max()?;

    let mut forecast_variance = fit_garch(log_returns, params.p, params.q, max_horizon)
        .or_else(|| {
            tracing::debug!("garch: fell back to EWMA");
            mean_reverting_variance(log_returns, max_horizon, 0.94)
        })
        .or_else(|| {
            tracing::debug!("garch: fell back to constant sigma");
            let daily_sigma = sample_std(log_returns);
            if daily_sigma == 0.0 {
                None
            } else {
                Some(vec![daily_sigma * daily_sigma; max_horizon])
            }
        })?;

    let max_var = max_daily_sigma * max_daily_sigma;
    for v in forecast_variance.iter_mut() {
        *v = (*v * params.var_multiplier).clamp(1e-10, max_var);
    }

    let sigma_path: Vec<f64> = forecast_variance.iter().map(|v| v.sqrt()).collect();

    let base = base_price as f64;
    let mut terminal_prices: BTreeMap<usize, Vec<f64>> = BTreeMap::new();
    let mut horizons_result = BTreeMap::new();

    for &h in horizons {
        let mut terminal = Vec::with_capacity(num_simulations);
        for _ in 0..num_simulations {
            let mut cumulative = 0.0;
            for &s in &sigma_path[..h] {
                cumulative += (mu_arith_daily - 0.5 * s * s) + s * standard_normal(rng);
            }
            terminal.push(clip_terminal(base * cumulative.exp(), base));
        }
        horizons_result.insert(h, compute_horizon_stats(&terminal, base_price, h));
        terminal_prices.insert(h, terminal);
    }

    Some(ModelResult {
        model: SimModel::Garch,
        terminal_prices,
        horizons: horizons_result,
    })
}

/// Gaussian maximum-likelihood GARCH(1,1) fit with variance targeting,
/// searched over an (alpha, beta) grid. Returns the multi-step variance
/// forecast, or None when the fit is unusable (orders other than (1,1),
/// degenerate variance, or a non-finite likelihood surface).
fn fit_garch(log_returns: &[f64], p: usize, q: usize, max_horizon: usize) -> Option<Vec<f64>> {
    if p != 1 || q != 1 {
        return None;
    }

    let demeaned: Vec<f64> = {
        let m = mean(log_returns);
        log_returns.iter().map(|r| r - m).collect()
    };
    let long_run_var = crate::stats::population_var(&demeaned);
    if long_run_var <= 0.0 || !long_run_var.is_finite() {
        return None;
    }

    let mut best: Option<(f64, f64, f64)> = None; // (ll, alpha, beta)

    for ai in 1..=15 {
        let alpha = ai as f64 * 0.02; // 0.02 .. 0.30
        for bi in 0..=19 {
            let beta = 0.60 + bi as f64 * 0.02; // 0.60 .. 0.98
            if alpha + beta >= 0.999 {
                continue;
            }
            let omega = long_run_var * (1.0 - alpha - beta);

            let mut h = long_run_var;
            let mut ll = 0.0;
            let mut valid = true;
            for &r in &demeaned {
                if h <= 0.0 || !h.is_finite() {
                    valid = false;
                    break;
                }
                ll += -0.5 * ((2.0 * std::f64::consts::PI * h).ln() + r * r / h);
                h = omega + alpha * r * r + beta * h;
            }
            if !valid || !ll.is_finite() {
                continue;
            }
            if best.map_or(true, |(b, _, _)| ll > b) {
                best = Some((ll, alpha, beta));
            }
        }
    }

    let (_, alpha, beta) = best?;
    let omega = long_run_var * (1.0 - alpha - beta);

    // Filter to the end of the sample, then forecast forward:
    // h[T+1] = omega + alpha r_T^2 + beta h_T, decaying toward long-run.
    let mut h = long_run_var;
    for &r in &demeaned {
        h = omega + alpha * r * r + beta * h;
    }

    let persistence = alpha + beta;
    let mut forecast = Vec::with_capacity(max_horizon);
    let mut hk = h;
    for _ in 0..max_horizon {
        forecast.push(hk);
        hk = omega + persistence * hk;
    }

    if forecast.iter().any(|v| !v.is_finite() || *v <= 0.0) {
        return None;
    }
    Some(forecast)
}

/// Mean-reverting exponential smoothing variance forecast. Unlike flat
/// RiskMetrics EWMA, the path decays toward the long-run variance:
/// h[t] = lambda * h[t-1] + (1 - lambda) * sigma_lr^2.
fn mean_reverting_variance(log_returns: &[f64], max_horizon: usize, lambda: f64) -> Option<Vec<f64>> {
    let recent = if log_returns.len() >= 20 {
        &log_returns[log_returns.len() - 20..]
    } else {
        log_returns
    };

    let daily_var = sample_std(recent).powi(2);
    if daily_var <= 0.0 {
        return None;
    }

    let long_run_var = sample_std(log_returns).powi(2);

    let mut path = Vec::with_capacity(max_horizon);
    path.push(daily_var);
    for t in 1..max_horizon {
        let prev = path[t - 1];
        path.push(lambda * prev + (1.0 - lambda) * long_run_var);
    }
    Some(path)
}
