//! Signal confluence and divergence detection across the five axes.

use serde::Serialize;

pub const BUY_SIGNALS: [&str; 2] = ["strong_buy", "buy"];
pub const SELL_SIGNALS: [&str; 2] = ["strong_sell", "sell"];

/// Classify a 0-100 sub-score into a discrete signal level:
/// >=75 strong_buy, >=60 buy, >=40 neutral, >=25 sell, else strong_sell.
pub fn classify_signal(score: Option<f64>) -> &'static str {
    match score {
        None => "unknown",
        Some(s) if s >= 75.0 => "strong_buy",
        Some(s) if s >= 60.0 => "buy",
        Some(s) if s >= 40.0 => "neutral",
        Some(s) if s >= 25.0 => "sell",
        Some(_) => "strong_sell",
    }
}

fn is_buy(signal: &str) -> bool {
    BUY_SIGNALS.contains(&signal)
}

fn is_sell(signal: &str) -> bool {
    SELL_SIGNALS.contains(&signal)
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfluenceResult {
    pub confluence_tier: i32,
    pub confluence_pattern: String,
    pub value_signal: &'static str,
    pub flow_signal: &'static str,
    pub momentum_signal: &'static str,
    pub forecast_signal: &'static str,
    pub sentiment_signal: &'static str,
    pub divergence_type: Option<&'static str>,
    pub divergence_severity: Option<&'static str>,
    pub divergence_label: Option<&'static str>,
    pub action_label: &'static str,
    pub action_description: &'static str,
}

/// Detect confluence tier and axis divergences.
///
/// Tiers over the K axes with known signals:
///   5 - all K strong in one direction, K >= 3
///   4 - all K on one side (buy+ or sell+), K >= 3
///   3 - at least two strong one way with at most one contrary, K >= 3
///   2 - exactly one strong signal, nothing contrary
///   1 - everything else
///
/// Divergence rules are evaluated in order; the first hit wins.
pub fn detect_confluence(
    value_score: Option<f64>,
    flow_score: Option<f64>,
    momentum_score: Option<f64>,
    forecast_score: Option<f64>,
    sentiment_score: Option<f64>,
) -> ConfluenceResult {
    let v_sig = classify_signal(value_score);
    let f_sig = classify_signal(flow_score);
    let m_sig = classify_signal(momentum_score);
    let fc_sig = classify_signal(forecast_score);
    let s_sig = classify_signal(sentiment_score);

    let known: Vec<&str> = [v_sig, f_sig, m_sig, fc_sig, s_sig]
        .into_iter()
        .filter(|s| *s != "unknown")
        .collect();
    let num_known = known.len();

    let buy_count = known.iter().filter(|s| is_buy(s)).count();
    let sell_count = known.iter().filter(|s| is_sell(s)).count();
    let strong_buy_count = known.iter().filter(|s| **s == "strong_buy").count();
    let strong_sell_count = known.iter().filter(|s| **s == "strong_sell").count();

    let (tier, direction) = if num_known >= 3 && strong_buy_count == num_known {
        (5, "buy")
    } else if num_known >= 3 && strong_sell_count == num_known {
        (5, "sell")
    } else if num_known >= 3 && buy_count == num_known {
        (4, "buy")
    } else if num_known >= 3 && sell_count == num_known {
        (4, "sell")
    } else if num_known >= 3 && strong_buy_count >= 2 && sell_count <= 1 {
        (3, "buy")
    } else if num_known >= 3 && strong_sell_count >= 2 && buy_count <= 1 {
        (3, "sell")
    } else if strong_buy_count == 1 && sell_count == 0 {
        (2, "buy")
    } else if strong_sell_count == 1 && buy_count == 0 {
        (2, "sell")
    } else {
        (1, "neutral")
    };

    let confluence_pattern = describe_pattern(tier, direction, num_known);

    // Order-sensitive divergence rules.
    let (divergence_type, divergence_severity, divergence_label) =
        if is_buy(v_sig) && is_sell(m_sig) {
            (
                Some("value_momentum_divergence"),
                Some("medium"),
                Some("Cheap but out of favor; possible bottoming setup"),
            )
        } else if is_buy(m_sig) && is_sell(v_sig) {
            (
                Some("momentum_value_divergence"),
                Some("high"),
                Some("Expensive and running hot; overheating risk"),
            )
        } else if is_buy(f_sig) && is_sell(v_sig) {
            (
                Some("flow_value_divergence"),
                Some("medium"),
                Some("Big money chasing weak fundamentals; theme-stock risk"),
            )
        } else if is_buy(fc_sig) && is_sell(v_sig) {
            (
                Some("forecast_value_divergence"),
                Some("medium"),
                Some("Forecast optimistic despite weak fundamentals"),
            )
        } else if is_sell(fc_sig) && is_buy(m_sig) {
            (
                Some("forecast_momentum_divergence"),
                Some("medium"),
                Some("Momentum intact but forecast deteriorating"),
            )
        } else {
            (None, None, None)
        };

    let (action_label, action_description) = action_for_tier(tier, direction);

    ConfluenceResult {
        confluence_tier: tier,
        confluence_pattern,
        value_signal: v_sig,
        flow_signal: f_sig,
        momentum_signal: m_sig,
        forecast_signal: fc_sig,
        sentiment_signal: s_sig,
        divergence_type,
        divergence_severity,
        divergence_label,
        action_label,
        action_description,
    }
}

fn describe_pattern(tier: i32, direction: &str, num_known: usize) -> String {
    if num_known == 0 {
        return "no_data".to_string();
    }
    match tier {
        5 => format!("all_strong_{direction}"),
        4 => format!("all_{direction}"),
        3 => format!("double_strong_{direction}"),
        2 => format!("single_strong_{direction}"),
        _ => "mixed".to_string(),
    }
}

fn action_for_tier(tier: i32, direction: &str) -> (&'static str, &'static str) {
    match (tier, direction) {
        (5, "buy") => (
            "Strong Buy",
            "Every available axis is flashing a strong buy signal",
        ),
        (5, "sell") => (
            "Strong Sell",
            "Every available axis is flashing a strong sell signal",
        ),
        (4, "buy") => ("Buy", "All available axes point in the buy direction"),
        (4, "sell") => ("Sell", "All available axes point in the sell direction"),
        (3, "buy") => (
            "Consider Buying",
            "Two or more strong buy signals with little disagreement",
        ),
        (3, "sell") => (
            "Consider Selling",
            "Two or more strong sell signals with little disagreement",
        ),
        (2, _) => ("Watchlist", "One strong signal detected; keep on the radar"),
        _ => ("Hold", "No clear direction; further observation needed"),
    }
}
