//! Moving-average primitives shared by the indicator kernels.

/// Simple moving average. Returns one value per full window, so the output
/// is `data.len() - period + 1` long.
pub fn sma(data: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || data.len() < period {
        return Vec::new();
    }

    let mut result = Vec::with_capacity(data.len() - period + 1);
    let mut sum: f64 = data[..period].iter().sum();
    result.push(sum / period as f64);

    for i in period..data.len() {
        sum += data[i] - data[i - period];
        result.push(sum / period as f64);
    }
    result
}

/// Exponential moving average, same length as the input.
///
/// The first `period` slots hold the SMA seed so that callers can align EMA
/// values with the source series by index; smoothing starts right after the
/// seed window.
pub fn ema(data: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || data.is_empty() {
        return Vec::new();
    }

    if data.len() < period {
        let avg = data.iter().sum::<f64>() / data.len() as f64;
        return vec![avg; data.len()];
    }

    let multiplier = 2.0 / (period as f64 + 1.0);
    let seed: f64 = data[..period].iter().sum::<f64>() / period as f64;

    let mut result = Vec::with_capacity(data.len());
    result.resize(period, seed);

    for i in period..data.len() {
        let prev = result[i - 1];
        result.push((data[i] - prev) * multiplier + prev);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_basic() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let result = sma(&values, 3);
        assert_eq!(result, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn sma_short_input_is_empty() {
        assert!(sma(&[1.0, 2.0], 3).is_empty());
        assert!(sma(&[1.0], 0).is_empty());
    }

    #[test]
    fn ema_same_length_as_input() {
        let values: Vec<f64> = (0..50).map(|i| i as f64).collect();
        assert_eq!(ema(&values, 12).len(), values.len());
    }

    #[test]
    fn ema_of_constant_series_is_constant() {
        let values = vec![7.0; 30];
        let result = ema(&values, 10);
        assert!(result.iter().all(|&v| (v - 7.0).abs() < 1e-12));
    }

    #[test]
    fn ema_tracks_trend_with_lag() {
        let values: Vec<f64> = (0..40).map(|i| i as f64).collect();
        let result = ema(&values, 10);
        let last = *result.last().unwrap();
        // EMA lags a rising series but stays below the latest value.
        assert!(last < 39.0);
        assert!(last > 30.0);
    }
}
