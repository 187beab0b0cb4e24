//! Whale (large-investor) accumulation scoring.

use analysis_core::{InvestorFlowDay, WHALE_INVESTOR_TYPES};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhaleComponent {
    pub net_total: i64,
    pub buy_days: usize,
    pub sell_days: usize,
    pub neutral_days: usize,
    pub consistency: f64,
    pub intensity: f64,
    pub score: f64,
}

impl WhaleComponent {
    fn empty() -> Self {
        Self {
            net_total: 0,
            buy_days: 0,
            sell_days: 0,
            neutral_days: 0,
            consistency: 0.0,
            intensity: 0.0,
            score: 0.0,
        }
    }

    pub fn has_data(&self) -> bool {
        self.buy_days + self.sell_days > 0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WhaleResult {
    pub whale_score: f64,
    pub components: Vec<(&'static str, WhaleComponent)>,
    pub signal: &'static str,
    pub lookback_days: usize,
}

impl WhaleResult {
    fn empty() -> Self {
        Self {
            whale_score: 0.0,
            components: WHALE_INVESTOR_TYPES
                .iter()
                .map(|&t| (t, WhaleComponent::empty()))
                .collect(),
            signal: "neutral",
            lookback_days: 0,
        }
    }

    pub fn component(&self, investor_type: &str) -> Option<&WhaleComponent> {
        self.components
            .iter()
            .find(|(t, _)| *t == investor_type)
            .map(|(_, c)| c)
    }
}

/// Composite whale score from institutional buying patterns.
///
/// Per investor class over the lookback window:
///   consistency = buy_days / active_days
///   intensity   = min(1, (|net_total| / active_days) / avg_daily_trading_value)
///   sub_score   = 60·consistency + min(40, 40·intensity)
///
/// whale_score = 0.5·max(sub_scores) + 0.5·mean(sub_scores) over classes with
/// data. When the trading value is unknown, intensity falls back to
/// consistency·0.5.
pub fn compute_whale_score(
    investor_data: &[InvestorFlowDay],
    avg_daily_trading_value: Option<f64>,
    lookback_days: usize,
) -> WhaleResult {
    if investor_data.is_empty() {
        return WhaleResult::empty();
    }

    let mut data = investor_data.to_vec();
    data.sort_by_key(|d| d.trade_date);
    let window: Vec<&InvestorFlowDay> = data.iter().rev().take(lookback_days).rev().collect();
    let total_days = window.len();

    if total_days == 0 {
        return WhaleResult::empty();
    }

    let mut components: Vec<(&'static str, WhaleComponent)> = Vec::with_capacity(5);

    for investor_type in WHALE_INVESTOR_TYPES {
        let net_values: Vec<i64> = window
            .iter()
            .filter_map(|d| d.net_for(investor_type))
            .collect();

        if net_values.is_empty() {
            components.push((investor_type, WhaleComponent::empty()));
            continue;
        }

        let net_total: i64 = net_values.iter().sum();
        let buy_days = net_values.iter().filter(|&&v| v > 0).count();
        let sell_days = net_values.iter().filter(|&&v| v < 0).count();
        let active_days = net_values.len();

        let consistency = buy_days as f64 / active_days as f64;

        let intensity = match avg_daily_trading_value {
            Some(tv) if tv > 0.0 => {
                let avg_net = net_total.abs() as f64 / active_days as f64;
                (avg_net / tv).min(1.0)
            }
            _ => consistency * 0.5,
        };

        let sub_score = consistency * 60.0 + (intensity * 40.0).min(40.0);

        components.push((
            investor_type,
            WhaleComponent {
                net_total,
                buy_days,
                sell_days,
                neutral_days: active_days - buy_days - sell_days,
                consistency: round4(consistency),
                intensity: round4(intensity),
                score: round2(sub_score),
            },
        ));
    }

    let active_scores: Vec<f64> = components
        .iter()
        .filter(|(_, c)| c.has_data())
        .map(|(_, c)| c.score)
        .collect();

    let whale_score = if active_scores.is_empty() {
        0.0
    } else {
        let max = active_scores.iter().cloned().fold(f64::MIN, f64::max);
        let avg = active_scores.iter().sum::<f64>() / active_scores.len() as f64;
        max * 0.5 + avg * 0.5
    };

    let signal = classify_whale_signal(whale_score, &components);

    WhaleResult {
        whale_score: round2(whale_score),
        components,
        signal,
        lookback_days: total_days,
    }
}

fn classify_whale_signal(
    whale_score: f64,
    components: &[(&'static str, WhaleComponent)],
) -> &'static str {
    if whale_score >= 70.0 {
        return "strong_accumulation";
    }
    if whale_score >= 50.0 {
        return "mild_accumulation";
    }
    if whale_score >= 30.0 {
        return "neutral";
    }

    let total_net: i64 = components.iter().map(|(_, c)| c.net_total).sum();
    if total_net < 0 {
        "distribution"
    } else {
        "neutral"
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(offset: i64, institution: i64, foreign: i64, pension: i64) -> InvestorFlowDay {
        InvestorFlowDay {
            trade_date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
                + chrono::Duration::days(offset),
            institution_net: Some(institution),
            foreign_net: Some(foreign),
            pension_net: Some(pension),
            ..Default::default()
        }
    }

    #[test]
    fn empty_input_is_neutral() {
        let result = compute_whale_score(&[], Some(1e9), 20);
        assert_eq!(result.whale_score, 0.0);
        assert_eq!(result.signal, "neutral");
        assert_eq!(result.lookback_days, 0);
        assert_eq!(result.components.len(), 5);
    }

    #[test]
    fn strong_accumulation_from_consistent_buying() {
        // 20 consecutive buy days across institution / foreign / pension.
        let data: Vec<_> = (0..20)
            .map(|i| day(i, 2_000_000_000, 1_500_000_000, 800_000_000))
            .collect();
        let result = compute_whale_score(&data, Some(5e9), 20);

        assert!(result.whale_score >= 70.0, "score = {}", result.whale_score);
        assert_eq!(result.signal, "strong_accumulation");

        let inst = result.component("institution_net").unwrap();
        assert_eq!(inst.buy_days, 20);
        assert_eq!(inst.consistency, 1.0);
    }

    #[test]
    fn distribution_when_all_selling() {
        let data: Vec<_> = (0..20)
            .map(|i| day(i, -2_000_000_000, -1_500_000_000, -800_000_000))
            .collect();
        let result = compute_whale_score(&data, Some(5e9), 20);
        assert!(result.whale_score < 30.0);
        assert_eq!(result.signal, "distribution");
    }

    #[test]
    fn intensity_fallback_without_trading_value() {
        let data: Vec<_> = (0..20).map(|i| day(i, 1_000_000, 0, 0)).collect();
        let result = compute_whale_score(&data, None, 20);
        let inst = result.component("institution_net").unwrap();
        // Fallback: intensity = consistency * 0.5.
        assert!((inst.intensity - inst.consistency * 0.5).abs() < 1e-9);
    }

    #[test]
    fn lookback_limits_window() {
        let data: Vec<_> = (0..40).map(|i| day(i, 1_000_000, 0, 0)).collect();
        let result = compute_whale_score(&data, Some(1e9), 20);
        assert_eq!(result.lookback_days, 20);
    }

    #[test]
    fn classes_without_data_are_excluded_from_composite() {
        // Only institution has data: score = max*0.5 + avg*0.5 over one class.
        let data: Vec<_> = (0..20)
            .map(|i| InvestorFlowDay {
                trade_date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
                    + chrono::Duration::days(i),
                institution_net: Some(3_000_000_000),
                ..Default::default()
            })
            .collect();
        let result = compute_whale_score(&data, Some(5e9), 20);
        let inst = result.component("institution_net").unwrap();
        assert!((result.whale_score - inst.score).abs() < 1e-9);
        assert!(!result.component("foreign_net").unwrap().has_data());
    }
}
