//! Technical indicator kernels: disparity, Bollinger Bands, MACD.
//!
//! Price series are chronological (oldest first). All functions return their
//! documented neutral result on short input.

pub mod indicators;

pub use indicators::{ema, sma};

use serde::Serialize;

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

// ---------------------------------------------------------------------------
// Disparity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct DisparityResult {
    pub disparity_20d: Option<f64>,
    pub disparity_60d: Option<f64>,
    pub disparity_120d: Option<f64>,
    pub signal: &'static str,
}

/// Disparity index: last price over the simple moving average, as a
/// percentage, for 20/60/120-day windows. The signal comes from the 20-day
/// value: <92 strong oversold, <96 oversold, >108 strong overbought,
/// >104 overbought.
pub fn compute_disparity(prices: &[f64]) -> DisparityResult {
    if prices.is_empty() {
        return DisparityResult {
            disparity_20d: None,
            disparity_60d: None,
            disparity_120d: None,
            signal: "neutral",
        };
    }

    let current = *prices.last().unwrap();

    let disparity_for = |period: usize| -> Option<f64> {
        if prices.len() < period {
            return None;
        }
        let window = &prices[prices.len() - period..];
        let sma = window.iter().sum::<f64>() / period as f64;
        if sma > 0.0 {
            Some(round2(current / sma * 100.0))
        } else {
            None
        }
    };

    let disparity_20d = disparity_for(20);
    let disparity_60d = disparity_for(60);
    let disparity_120d = disparity_for(120);

    let signal = match disparity_20d {
        None => "neutral",
        Some(d) if d < 92.0 => "strong_oversold",
        Some(d) if d < 96.0 => "oversold",
        Some(d) if d > 108.0 => "strong_overbought",
        Some(d) if d > 104.0 => "overbought",
        _ => "neutral",
    };

    DisparityResult {
        disparity_20d,
        disparity_60d,
        disparity_120d,
        signal,
    }
}

// ---------------------------------------------------------------------------
// Bollinger Bands
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct BollingerResult {
    pub upper: Option<f64>,
    pub center: Option<f64>,
    pub lower: Option<f64>,
    pub bandwidth: Option<f64>,
    pub percent_b: Option<f64>,
    pub signal: &'static str,
}

impl BollingerResult {
    fn neutral() -> Self {
        Self {
            upper: None,
            center: None,
            lower: None,
            bandwidth: None,
            percent_b: None,
            signal: "neutral",
        }
    }
}

/// Bollinger Bands over `period` days at ±`num_std` sample standard
/// deviations. `%b > 1` breaks the upper band, `%b < 0` sits on lower
/// support, bandwidth under 10% is a squeeze.
pub fn compute_bollinger(prices: &[f64], period: usize, num_std: f64) -> BollingerResult {
    if period < 2 || prices.len() < period {
        return BollingerResult::neutral();
    }

    let window = &prices[prices.len() - period..];
    let center = window.iter().sum::<f64>() / period as f64;
    let variance =
        window.iter().map(|p| (p - center).powi(2)).sum::<f64>() / (period - 1) as f64;
    let std = variance.sqrt();

    let upper = center + num_std * std;
    let lower = center - num_std * std;

    let bandwidth = if center > 0.0 {
        (upper - lower) / center * 100.0
    } else {
        0.0
    };

    let current = *prices.last().unwrap();
    let percent_b = if (upper - lower).abs() > f64::EPSILON {
        (current - lower) / (upper - lower)
    } else {
        0.5
    };

    let signal = if percent_b > 1.0 {
        "upper_break"
    } else if percent_b < 0.0 {
        "lower_support"
    } else if bandwidth < 10.0 {
        "squeeze"
    } else {
        "neutral"
    };

    BollingerResult {
        upper: Some(round2(upper)),
        center: Some(round2(center)),
        lower: Some(round2(lower)),
        bandwidth: Some(round2(bandwidth)),
        percent_b: Some(round4(percent_b)),
        signal,
    }
}

// ---------------------------------------------------------------------------
// MACD
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct MacdResult {
    pub macd: Option<f64>,
    pub signal_line: Option<f64>,
    pub histogram: Option<f64>,
    pub crossover: &'static str,
}

impl MacdResult {
    fn neutral() -> Self {
        Self {
            macd: None,
            signal_line: None,
            histogram: None,
            crossover: "none",
        }
    }
}

/// MACD(fast, slow, signal): EMA(fast) − EMA(slow), with the signal line an
/// EMA over the MACD series. Crossover is golden when the histogram crosses
/// zero upward between the previous and current bar, dead when downward.
pub fn compute_macd(
    prices: &[f64],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> MacdResult {
    let min_required = slow + signal_period;
    if prices.len() < min_required {
        return MacdResult::neutral();
    }

    let fast_ema = ema(prices, fast);
    let slow_ema = ema(prices, slow);

    // MACD is defined from the first index where the slow EMA exists.
    let macd_line: Vec<f64> = fast_ema
        .iter()
        .zip(slow_ema.iter())
        .skip(slow - 1)
        .map(|(f, s)| f - s)
        .collect();

    if macd_line.len() < signal_period + 1 {
        return MacdResult::neutral();
    }

    let signal_ema = ema(&macd_line, signal_period);

    let current_macd = *macd_line.last().unwrap();
    let current_signal = *signal_ema.last().unwrap();
    let current_histogram = current_macd - current_signal;

    let prev_macd = macd_line[macd_line.len() - 2];
    let prev_signal = signal_ema[signal_ema.len() - 2];
    let prev_histogram = prev_macd - prev_signal;

    let crossover = if current_histogram > 0.0 && prev_histogram <= 0.0 {
        "golden_cross"
    } else if current_histogram < 0.0 && prev_histogram >= 0.0 {
        "dead_cross"
    } else {
        "none"
    };

    MacdResult {
        macd: Some(round4(current_macd)),
        signal_line: Some(round4(current_signal)),
        histogram: Some(round4(current_histogram)),
        crossover,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(n: usize, value: f64) -> Vec<f64> {
        vec![value; n]
    }

    #[test]
    fn disparity_empty_is_neutral() {
        let result = compute_disparity(&[]);
        assert!(result.disparity_20d.is_none());
        assert_eq!(result.signal, "neutral");
    }

    #[test]
    fn disparity_flat_series_is_hundred() {
        let result = compute_disparity(&flat(120, 50_000.0));
        assert_eq!(result.disparity_20d, Some(100.0));
        assert_eq!(result.disparity_60d, Some(100.0));
        assert_eq!(result.disparity_120d, Some(100.0));
        assert_eq!(result.signal, "neutral");
    }

    #[test]
    fn disparity_signals() {
        // Price collapses well below its 20-day average.
        let mut prices = flat(19, 100.0);
        prices.push(85.0);
        let result = compute_disparity(&prices);
        assert_eq!(result.signal, "strong_oversold");

        // Price spikes far above the average.
        let mut prices = flat(19, 100.0);
        prices.push(120.0);
        let result = compute_disparity(&prices);
        assert_eq!(result.signal, "strong_overbought");
    }

    #[test]
    fn disparity_partial_windows() {
        let prices = flat(30, 100.0);
        let result = compute_disparity(&prices);
        assert!(result.disparity_20d.is_some());
        assert!(result.disparity_60d.is_none());
        assert!(result.disparity_120d.is_none());
    }

    #[test]
    fn bollinger_short_input_is_neutral() {
        let result = compute_bollinger(&flat(10, 100.0), 20, 2.0);
        assert!(result.center.is_none());
        assert_eq!(result.signal, "neutral");
    }

    #[test]
    fn bollinger_degenerate_band_centers_percent_b() {
        // Zero variance: %b falls back to 0.5, bandwidth 0 -> squeeze.
        let result = compute_bollinger(&flat(20, 100.0), 20, 2.0);
        assert_eq!(result.percent_b, Some(0.5));
        assert_eq!(result.signal, "squeeze");
    }

    #[test]
    fn bollinger_upper_break() {
        let mut prices: Vec<f64> = (0..19).map(|i| 100.0 + (i % 3) as f64).collect();
        prices.push(130.0);
        let result = compute_bollinger(&prices, 20, 2.0);
        assert!(result.percent_b.unwrap() > 1.0);
        assert_eq!(result.signal, "upper_break");
    }

    #[test]
    fn bollinger_band_ordering() {
        let prices: Vec<f64> = (0..40).map(|i| 100.0 + (i as f64).sin() * 5.0).collect();
        let result = compute_bollinger(&prices, 20, 2.0);
        assert!(result.lower.unwrap() < result.center.unwrap());
        assert!(result.center.unwrap() < result.upper.unwrap());
    }

    #[test]
    fn macd_short_input_is_neutral() {
        let result = compute_macd(&flat(30, 100.0), 12, 26, 9);
        assert!(result.macd.is_none());
        assert_eq!(result.crossover, "none");
    }

    #[test]
    fn macd_flat_series_is_zero() {
        let result = compute_macd(&flat(60, 100.0), 12, 26, 9);
        assert_eq!(result.macd, Some(0.0));
        assert_eq!(result.histogram, Some(0.0));
        assert_eq!(result.crossover, "none");
    }

    #[test]
    fn macd_golden_cross_after_turnaround() {
        // Long decline followed by a sharp recovery drives the histogram
        // through zero from below.
        let mut prices: Vec<f64> = (0..60).map(|i| 200.0 - i as f64).collect();
        prices.extend((0..10).map(|i| 141.0 + i as f64 * 6.0));
        let result = compute_macd(&prices, 12, 26, 9);
        assert!(result.macd.is_some());
        // Histogram must have turned positive at some point in the recovery;
        // scan the recovery window for the crossover event.
        let mut saw_golden = false;
        for end in 61..=prices.len() {
            if compute_macd(&prices[..end], 12, 26, 9).crossover == "golden_cross" {
                saw_golden = true;
                break;
            }
        }
        assert!(saw_golden);
    }

    #[test]
    fn macd_uptrend_positive() {
        let prices: Vec<f64> = (0..80).map(|i| 100.0 * (1.0 + 0.01 * i as f64)).collect();
        let result = compute_macd(&prices, 12, 26, 9);
        assert!(result.macd.unwrap() > 0.0);
    }
}
