//! Risk kernels: annualised volatility, beta against a benchmark index, and
//! maximum drawdown.

use serde::Serialize;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

// ---------------------------------------------------------------------------
// Volatility
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct VolatilityResult {
    pub volatility_20d: Option<f64>,
    pub volatility_60d: Option<f64>,
    pub volatility_1y: Option<f64>,
    pub risk_level: &'static str,
}

impl VolatilityResult {
    fn unknown() -> Self {
        Self {
            volatility_20d: None,
            volatility_60d: None,
            volatility_1y: None,
            risk_level: "unknown",
        }
    }
}

/// Annualised volatility of daily log returns over 20/60/252-day windows,
/// as a percentage. Risk level classifies the 60-day number at 20/40/60.
pub fn compute_volatility(prices: &[f64]) -> VolatilityResult {
    if prices.len() < 2 {
        return VolatilityResult::unknown();
    }

    let returns: Vec<f64> = prices
        .windows(2)
        .filter(|w| w[0] > 0.0 && w[1] > 0.0)
        .map(|w| (w[1] / w[0]).ln())
        .collect();

    if returns.is_empty() {
        return VolatilityResult::unknown();
    }

    let vol_for = |period: usize| -> Option<f64> {
        if returns.len() < period {
            return None;
        }
        let window = &returns[returns.len() - period..];
        Some(round4(sample_std(window) * TRADING_DAYS_PER_YEAR.sqrt() * 100.0))
    };

    let volatility_20d = vol_for(20);
    let volatility_60d = vol_for(60);
    let volatility_1y = vol_for(252);

    let risk_level = match volatility_60d {
        None => "unknown",
        Some(v) if v < 20.0 => "low",
        Some(v) if v < 40.0 => "medium",
        Some(v) if v < 60.0 => "high",
        Some(_) => "very_high",
    };

    VolatilityResult {
        volatility_20d,
        volatility_60d,
        volatility_1y,
        risk_level,
    }
}

// ---------------------------------------------------------------------------
// Beta
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct BetaResult {
    pub beta_60d: Option<f64>,
    pub beta_252d: Option<f64>,
    pub interpretation: &'static str,
}

impl BetaResult {
    fn unknown() -> Self {
        Self {
            beta_60d: None,
            beta_252d: None,
            interpretation: "unknown",
        }
    }
}

/// Beta = Cov(stock, index) / Var(index) over daily returns, for 60- and
/// 252-day windows. Interpretation thresholds: 0.8 / 1.2 / 1.5 on the 60-day
/// value.
pub fn compute_beta(stock_prices: &[f64], index_prices: &[f64]) -> BetaResult {
    if stock_prices.is_empty() || index_prices.is_empty() {
        return BetaResult::unknown();
    }

    let min_len = stock_prices.len().min(index_prices.len());
    let stock = &stock_prices[stock_prices.len() - min_len..];
    let index = &index_prices[index_prices.len() - min_len..];

    if stock.len() < 2 {
        return BetaResult::unknown();
    }

    let mut stock_returns = Vec::with_capacity(stock.len() - 1);
    let mut index_returns = Vec::with_capacity(index.len() - 1);
    for i in 1..stock.len() {
        if stock[i - 1] > 0.0 && index[i - 1] > 0.0 {
            stock_returns.push((stock[i] - stock[i - 1]) / stock[i - 1]);
            index_returns.push((index[i] - index[i - 1]) / index[i - 1]);
        }
    }

    if stock_returns.is_empty() {
        return BetaResult::unknown();
    }

    let beta_for = |period: usize| -> Option<f64> {
        if stock_returns.len() < period {
            return None;
        }
        let s = &stock_returns[stock_returns.len() - period..];
        let m = &index_returns[index_returns.len() - period..];

        let s_mean = s.iter().sum::<f64>() / s.len() as f64;
        let m_mean = m.iter().sum::<f64>() / m.len() as f64;

        let mut covariance = 0.0;
        let mut market_var = 0.0;
        for (si, mi) in s.iter().zip(m.iter()) {
            covariance += (si - s_mean) * (mi - m_mean);
            market_var += (mi - m_mean).powi(2);
        }
        // Sample covariance / variance share the same n-1 denominator,
        // so the ratio is taken on the raw sums.
        if market_var > 0.0 {
            Some(round4(covariance / market_var))
        } else {
            None
        }
    };

    let beta_60d = beta_for(60);
    let beta_252d = beta_for(252);

    let interpretation = match beta_60d {
        None => "unknown",
        Some(b) if b < 0.8 => "defensive",
        Some(b) if b < 1.2 => "neutral",
        Some(b) if b < 1.5 => "aggressive",
        Some(_) => "highly_aggressive",
    };

    BetaResult {
        beta_60d,
        beta_252d,
        interpretation,
    }
}

// ---------------------------------------------------------------------------
// Max drawdown
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct DrawdownResult {
    pub mdd_60d: Option<f64>,
    pub mdd_1y: Option<f64>,
    pub current_drawdown: Option<f64>,
    pub recovery_label: &'static str,
}

impl DrawdownResult {
    fn unknown() -> Self {
        Self {
            mdd_60d: None,
            mdd_1y: None,
            current_drawdown: None,
            recovery_label: "unknown",
        }
    }
}

/// Maximum drawdown (most negative peak-to-trough decline) over 60- and
/// 252-day windows, plus the current drawdown from the all-time high of the
/// series. Recovery label: > −5% recovered, > −15% correcting, else
/// declining.
pub fn compute_max_drawdown(prices: &[f64]) -> DrawdownResult {
    if prices.len() < 2 {
        return DrawdownResult::unknown();
    }

    let mdd_for = |period: usize| -> Option<f64> {
        if prices.len() < period {
            return None;
        }
        let window = &prices[prices.len() - period..];
        let mut peak = f64::MIN;
        let mut mdd = 0.0_f64;
        for &p in window {
            peak = peak.max(p);
            if peak > 0.0 {
                mdd = mdd.min((p - peak) / peak);
            }
        }
        Some(round4(mdd))
    };

    let mdd_60d = mdd_for(60);
    let mdd_1y = mdd_for(252);

    let all_time_high = prices.iter().cloned().fold(f64::MIN, f64::max);
    let current = *prices.last().unwrap();

    let (current_drawdown, recovery_label) = if all_time_high > 0.0 {
        let dd = round4((current - all_time_high) / all_time_high);
        let label = if dd > -0.05 {
            "recovered"
        } else if dd > -0.15 {
            "correcting"
        } else {
            "declining"
        };
        (Some(dd), label)
    } else {
        (None, "unknown")
    };

    DrawdownResult {
        mdd_60d,
        mdd_1y,
        current_drawdown,
        recovery_label,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trending(n: usize, start: f64, daily: f64) -> Vec<f64> {
        (0..n).map(|i| start * (1.0 + daily).powi(i as i32)).collect()
    }

    #[test]
    fn volatility_short_input_is_unknown() {
        let result = compute_volatility(&[100.0]);
        assert!(result.volatility_20d.is_none());
        assert_eq!(result.risk_level, "unknown");
    }

    #[test]
    fn volatility_flat_series_is_zero() {
        let result = compute_volatility(&vec![100.0; 80]);
        assert_eq!(result.volatility_20d, Some(0.0));
        assert_eq!(result.volatility_60d, Some(0.0));
        assert_eq!(result.risk_level, "low");
    }

    #[test]
    fn volatility_alternating_series_is_very_high() {
        // ±5% daily swings annualise far above 60%.
        let mut prices = vec![100.0];
        for i in 0..80 {
            let last = *prices.last().unwrap();
            prices.push(if i % 2 == 0 { last * 1.05 } else { last * 0.95 });
        }
        let result = compute_volatility(&prices);
        assert!(result.volatility_60d.unwrap() > 60.0);
        assert_eq!(result.risk_level, "very_high");
    }

    #[test]
    fn volatility_windows_require_enough_returns() {
        let prices = trending(40, 100.0, 0.01);
        let result = compute_volatility(&prices);
        assert!(result.volatility_20d.is_some());
        assert!(result.volatility_60d.is_none());
        assert!(result.volatility_1y.is_none());
    }

    #[test]
    fn beta_of_index_against_itself_is_one() {
        let index = trending(80, 2500.0, 0.003);
        let result = compute_beta(&index, &index);
        assert!((result.beta_60d.unwrap() - 1.0).abs() < 1e-6);
        assert_eq!(result.interpretation, "neutral");
    }

    #[test]
    fn beta_of_levered_series_is_two() {
        // Stock return = 2x index return each day.
        let mut index = vec![1000.0];
        let mut stock = vec![100.0];
        for i in 0..80 {
            let r = if i % 2 == 0 { 0.01 } else { -0.008 };
            index.push(index.last().unwrap() * (1.0 + r));
            stock.push(stock.last().unwrap() * (1.0 + 2.0 * r));
        }
        let result = compute_beta(&stock, &index);
        assert!((result.beta_60d.unwrap() - 2.0).abs() < 0.05);
        assert_eq!(result.interpretation, "highly_aggressive");
    }

    #[test]
    fn beta_empty_is_unknown() {
        assert_eq!(compute_beta(&[], &[]).interpretation, "unknown");
    }

    #[test]
    fn drawdown_monotonic_rise_has_zero_mdd() {
        let prices = trending(80, 100.0, 0.01);
        let result = compute_max_drawdown(&prices);
        assert_eq!(result.mdd_60d, Some(0.0));
        assert_eq!(result.recovery_label, "recovered");
        assert_eq!(result.current_drawdown, Some(0.0));
    }

    #[test]
    fn drawdown_crash_and_partial_recovery() {
        // Rise to 200, crash to 120, recover to 160: ATH drawdown = -20%.
        let mut prices: Vec<f64> = (0..60).map(|i| 100.0 + i as f64 * (100.0 / 59.0)).collect();
        prices.extend((0..10).map(|i| 200.0 - (i + 1) as f64 * 8.0));
        prices.extend((0..10).map(|i| 120.0 + (i + 1) as f64 * 4.0));

        let result = compute_max_drawdown(&prices);
        assert!(result.mdd_60d.unwrap() <= -0.39);
        assert!((result.current_drawdown.unwrap() - (-0.20)).abs() < 1e-9);
        assert_eq!(result.recovery_label, "declining");
    }

    #[test]
    fn drawdown_small_dip_is_correcting() {
        let mut prices = trending(70, 100.0, 0.005);
        let peak = *prices.last().unwrap();
        prices.push(peak * 0.90);
        let result = compute_max_drawdown(&prices);
        assert_eq!(result.recovery_label, "correcting");
    }
}
