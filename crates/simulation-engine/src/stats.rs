//! Shared distribution statistics for the simulation models.

use serde::{Deserialize, Serialize};

/// Percentile statistics of one horizon's terminal-price distribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HorizonStats {
    pub label: String,
    pub p5: i64,
    pub p25: i64,
    pub p50: i64,
    pub p75: i64,
    pub p95: i64,
    pub expected_return_pct: f64,
    pub var_5pct_pct: f64,
    pub upside_prob: f64,
}

pub fn horizon_label(h: usize) -> String {
    match h {
        21 => "1M".to_string(),
        63 => "3M".to_string(),
        126 => "6M".to_string(),
        252 => "1Y".to_string(),
        other => format!("{other}D"),
    }
}

/// Linear-interpolation percentile over an unsorted sample.
pub fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let rank = (p / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    let frac = rank - lower as f64;
    sorted[lower] + frac * (sorted[upper] - sorted[lower])
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1 denominator).
pub fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    (values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64).sqrt()
}

/// Population variance (n denominator).
pub fn population_var(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

/// Distribution statistics from a terminal-price sample.
pub fn compute_horizon_stats(terminal: &[f64], base_price: i64, horizon: usize) -> HorizonStats {
    let base = base_price as f64;
    let upside = terminal.iter().filter(|&&t| t > base).count() as f64 / terminal.len() as f64;

    HorizonStats {
        label: horizon_label(horizon),
        p5: percentile(terminal, 5.0) as i64,
        p25: percentile(terminal, 25.0) as i64,
        p50: percentile(terminal, 50.0) as i64,
        p75: percentile(terminal, 75.0) as i64,
        p95: percentile(terminal, 95.0) as i64,
        expected_return_pct: round2((mean(terminal) / base - 1.0) * 100.0),
        var_5pct_pct: round2((percentile(terminal, 5.0) / base - 1.0) * 100.0),
        upside_prob: round4(upside),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_endpoints() {
        let values: Vec<f64> = (1..=100).map(|i| i as f64).collect();
        assert_eq!(percentile(&values, 0.0), 1.0);
        assert_eq!(percentile(&values, 100.0), 100.0);
        assert!((percentile(&values, 50.0) - 50.5).abs() < 1e-9);
    }

    #[test]
    fn percentile_empty_is_zero() {
        assert_eq!(percentile(&[], 50.0), 0.0);
    }

    #[test]
    fn horizon_stats_ordering() {
        let terminal: Vec<f64> = (0..1000).map(|i| 40_000.0 + i as f64 * 20.0).collect();
        let stats = compute_horizon_stats(&terminal, 50_000, 63);
        assert!(stats.p5 <= stats.p25);
        assert!(stats.p25 <= stats.p50);
        assert!(stats.p50 <= stats.p75);
        assert!(stats.p75 <= stats.p95);
        assert_eq!(stats.label, "3M");
        assert!((0.0..=1.0).contains(&stats.upside_prob));
    }
}
