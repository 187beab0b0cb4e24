//! Investor-flow kernels: whale accumulation score, retail contrarian
//! signal, smart/dumb money divergence, flow momentum shifts, and the
//! sector-level flow aggregation.
//!
//! All functions are pure and total; empty input produces the documented
//! neutral result.

pub mod sector;
pub mod whale;

pub use sector::*;
pub use whale::*;

use analysis_core::InvestorFlowDay;
use serde::Serialize;

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

/// Sort a copy of the flow rows chronologically.
fn sorted_by_date(investor_data: &[InvestorFlowDay]) -> Vec<InvestorFlowDay> {
    let mut data = investor_data.to_vec();
    data.sort_by_key(|d| d.trade_date);
    data
}

// ---------------------------------------------------------------------------
// Retail contrarian
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct RetailContrarianResult {
    pub retail_z: f64,
    pub retail_intensity: f64,
    pub retail_consistency: f64,
    pub signal: &'static str,
    pub lookback_days: usize,
}

impl RetailContrarianResult {
    fn neutral() -> Self {
        Self {
            retail_z: 0.0,
            retail_intensity: 0.0,
            retail_consistency: 0.0,
            signal: "neutral",
            lookback_days: 0,
        }
    }
}

/// Retail contrarian signal from individual-investor extremes.
///
/// Z > 2 means extreme retail buying (contrarian sell warning); Z < -2 means
/// extreme retail selling (contrarian buy opportunity). The Z-score is taken
/// over rolling `lookback_days` intensities and needs at least 60 days of
/// history to be meaningful.
pub fn compute_retail_contrarian(
    investor_data: &[InvestorFlowDay],
    avg_daily_trading_value: Option<f64>,
    lookback_days: usize,
) -> RetailContrarianResult {
    if investor_data.is_empty() {
        return RetailContrarianResult::neutral();
    }

    let data = sorted_by_date(investor_data);
    let window: Vec<i64> = data
        .iter()
        .rev()
        .take(lookback_days)
        .rev()
        .map(|d| d.individual_net.unwrap_or(0))
        .collect();

    if window.is_empty() {
        return RetailContrarianResult::neutral();
    }

    let net_total: i64 = window.iter().sum();
    let total_days = window.len();
    let buy_days = window.iter().filter(|&&v| v > 0).count();

    let retail_intensity = match avg_daily_trading_value {
        Some(tv) if tv > 0.0 => net_total as f64 / (tv * lookback_days as f64),
        _ => 0.0,
    };
    let retail_consistency = buy_days as f64 / total_days as f64;

    let retail_z = retail_z_score(&data, avg_daily_trading_value, lookback_days);

    let signal = if retail_z > 2.0 {
        "extreme_buying"
    } else if retail_z < -2.0 {
        "extreme_selling"
    } else {
        "neutral"
    };

    RetailContrarianResult {
        retail_z: round2(retail_z),
        retail_intensity: round4(retail_intensity),
        retail_consistency: round4(retail_consistency),
        signal,
        lookback_days: total_days,
    }
}

/// Z-score of the latest rolling retail intensity against the distribution of
/// all rolling intensities. Returns 0 with under 60 days of history.
fn retail_z_score(
    sorted_data: &[InvestorFlowDay],
    avg_daily_trading_value: Option<f64>,
    window_size: usize,
) -> f64 {
    if sorted_data.len() < 60 {
        return 0.0;
    }
    let avg_tv = match avg_daily_trading_value {
        Some(tv) if tv > 0.0 => tv,
        _ => return 0.0,
    };
    if window_size == 0 || sorted_data.len() < window_size {
        return 0.0;
    }

    let intensities: Vec<f64> = sorted_data
        .windows(window_size)
        .map(|w| {
            let net: i64 = w.iter().map(|d| d.individual_net.unwrap_or(0)).sum();
            net as f64 / (avg_tv * window_size as f64)
        })
        .collect();

    if intensities.len() < 2 {
        return 0.0;
    }

    let current = *intensities.last().unwrap();
    let mean = intensities.iter().sum::<f64>() / intensities.len() as f64;
    let variance =
        intensities.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / intensities.len() as f64;
    let std = variance.sqrt();

    if std > 0.0 {
        (current - mean) / std
    } else {
        0.0
    }
}

// ---------------------------------------------------------------------------
// Smart / dumb money divergence
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct SmartDumbResult {
    pub divergence_score: f64,
    pub smart_ratio: f64,
    pub dumb_ratio: f64,
    pub signal: &'static str,
    pub lookback_days: usize,
}

impl SmartDumbResult {
    fn neutral() -> Self {
        Self {
            divergence_score: 0.0,
            smart_ratio: 0.0,
            dumb_ratio: 0.0,
            signal: "mixed",
            lookback_days: 0,
        }
    }
}

/// Divergence between smart money (institution + foreign + pension) and dumb
/// money (individual retail). Positive divergence = smart buying while dumb
/// selling.
pub fn compute_smart_dumb_divergence(
    investor_data: &[InvestorFlowDay],
    avg_daily_trading_value: Option<f64>,
    lookback_days: usize,
) -> SmartDumbResult {
    if investor_data.is_empty() {
        return SmartDumbResult::neutral();
    }

    let data = sorted_by_date(investor_data);
    let window: Vec<&InvestorFlowDay> = data.iter().rev().take(lookback_days).rev().collect();

    if window.is_empty() {
        return SmartDumbResult::neutral();
    }

    let smart_flow: i64 = window
        .iter()
        .map(|d| {
            d.institution_net.unwrap_or(0) + d.foreign_net.unwrap_or(0) + d.pension_net.unwrap_or(0)
        })
        .sum();
    let dumb_flow: i64 = window.iter().map(|d| d.individual_net.unwrap_or(0)).sum();

    let (smart_ratio, dumb_ratio) = match avg_daily_trading_value {
        Some(tv) if tv > 0.0 => {
            let denominator = tv * lookback_days as f64;
            (smart_flow as f64 / denominator, dumb_flow as f64 / denominator)
        }
        _ => (0.0, 0.0),
    };

    let divergence_score = smart_ratio - dumb_ratio;

    let signal = if divergence_score > 0.5 {
        "smart_accumulation"
    } else if divergence_score < -0.5 {
        "smart_distribution"
    } else {
        "mixed"
    };

    SmartDumbResult {
        divergence_score: round4(divergence_score),
        smart_ratio: round4(smart_ratio),
        dumb_ratio: round4(dumb_ratio),
        signal,
        lookback_days: window.len(),
    }
}

// ---------------------------------------------------------------------------
// Flow momentum shift
// ---------------------------------------------------------------------------

const SHIFT_INVESTOR_TYPES: [&str; 3] = ["institution_net", "foreign_net", "pension_net"];

#[derive(Debug, Clone, Serialize)]
pub struct ShiftComponent {
    pub flow_short: i64,
    pub flow_long: i64,
    pub reversal_type: &'static str,
    pub strength: f64,
    pub score: f64,
}

impl ShiftComponent {
    fn empty() -> Self {
        Self {
            flow_short: 0,
            flow_long: 0,
            reversal_type: "none",
            strength: 0.0,
            score: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MomentumShiftResult {
    pub shift_score: f64,
    pub components: Vec<(&'static str, ShiftComponent)>,
    pub overall_signal: &'static str,
    pub lookback_short: usize,
    pub lookback_long: usize,
}

impl MomentumShiftResult {
    fn neutral() -> Self {
        Self {
            shift_score: 0.0,
            components: SHIFT_INVESTOR_TYPES
                .iter()
                .map(|&t| (t, ShiftComponent::empty()))
                .collect(),
            overall_signal: "no_shift",
            lookback_short: 0,
            lookback_long: 0,
        }
    }
}

/// Detect momentum shifts in institutional flows by comparing the short
/// window (5 days) against the long window (60 days). A reversal is a sign
/// flip between the two; strength is the short flow against the long flow
/// normalised to the short timeframe, capped at 2.0.
pub fn compute_flow_momentum_shift(
    investor_data: &[InvestorFlowDay],
    lookback_short: usize,
    lookback_long: usize,
) -> MomentumShiftResult {
    if investor_data.is_empty() {
        return MomentumShiftResult::neutral();
    }

    let data = sorted_by_date(investor_data);
    if data.len() < lookback_short {
        return MomentumShiftResult::neutral();
    }

    let short_window = &data[data.len() - lookback_short..];
    let long_window = if data.len() >= lookback_long {
        &data[data.len() - lookback_long..]
    } else {
        &data[..]
    };

    let mut components: Vec<(&'static str, ShiftComponent)> = Vec::with_capacity(3);
    let mut sub_scores: Vec<f64> = Vec::with_capacity(3);

    for investor_type in SHIFT_INVESTOR_TYPES {
        let flow_short: i64 = short_window
            .iter()
            .map(|d| d.net_for(investor_type).unwrap_or(0))
            .sum();
        let flow_long: i64 = long_window
            .iter()
            .map(|d| d.net_for(investor_type).unwrap_or(0))
            .sum();

        let reversal_type = if flow_short > 0 && flow_long < 0 {
            "bullish_reversal"
        } else if flow_short < 0 && flow_long > 0 {
            "bearish_reversal"
        } else {
            "none"
        };

        let strength = if reversal_type != "none" && flow_long != 0 {
            let normalized_long =
                flow_long.abs() as f64 / (long_window.len() as f64 / short_window.len() as f64);
            if normalized_long > 0.0 {
                (flow_short.abs() as f64 / normalized_long).min(2.0)
            } else {
                0.0
            }
        } else {
            0.0
        };

        let score = if reversal_type != "none" { strength * 50.0 } else { 0.0 };

        components.push((
            investor_type,
            ShiftComponent {
                flow_short,
                flow_long,
                reversal_type,
                strength: round4(strength),
                score: round2(score),
            },
        ));
        sub_scores.push(score);
    }

    let max_score = sub_scores.iter().cloned().fold(0.0_f64, f64::max);
    let avg_score = sub_scores.iter().sum::<f64>() / sub_scores.len() as f64;
    let shift_score = max_score * 0.6 + avg_score * 0.4;

    let overall_signal = classify_shift_signal(shift_score, &components);

    MomentumShiftResult {
        shift_score: round2(shift_score),
        components,
        overall_signal,
        lookback_short: short_window.len(),
        lookback_long: long_window.len(),
    }
}

fn classify_shift_signal(
    shift_score: f64,
    components: &[(&'static str, ShiftComponent)],
) -> &'static str {
    let bullish = components
        .iter()
        .filter(|(_, c)| c.reversal_type == "bullish_reversal")
        .count();
    let bearish = components
        .iter()
        .filter(|(_, c)| c.reversal_type == "bearish_reversal")
        .count();

    if shift_score >= 40.0 {
        if bullish > bearish {
            "strong_bullish_shift"
        } else if bearish > bullish {
            "strong_bearish_shift"
        } else {
            "strong_shift"
        }
    } else if shift_score >= 20.0 {
        if bullish > bearish {
            "mild_bullish_shift"
        } else if bearish > bullish {
            "mild_bearish_shift"
        } else {
            "mild_shift"
        }
    } else {
        "no_shift"
    }
}
