//! Composite synthesis: one snapshot per ticker combining whatever axes are
//! available for it.

use std::collections::HashMap;

use analysis_core::CompositeSnapshot;
use chrono::NaiveDate;
use composite_score::{
    classify_composite_score, compute_composite_score, detect_confluence, CompositeWeights,
    QuantInput, TrendInput,
};
use serde_json::json;

/// Per-ticker inputs gathered from the earlier stages.
pub struct CompositeInputs<'a> {
    pub quant: Option<QuantInput>,
    pub whale_score: Option<f64>,
    pub trend: Option<TrendInput>,
    pub forecast_score: Option<f64>,
    pub sentiment_score: Option<f64>,
    pub sector: Option<&'a str>,
}

/// Synthesise the composite snapshot for one ticker. Returns None when no
/// axis has data; such tickers are skipped silently.
pub fn synthesize(
    target_date: NaiveDate,
    ticker: &str,
    inputs: &CompositeInputs<'_>,
    sector_bonuses: &HashMap<String, f64>,
) -> Option<CompositeSnapshot> {
    let sector_flow_bonus = inputs
        .sector
        .and_then(|s| sector_bonuses.get(s).copied())
        .unwrap_or(0.0);

    let result = compute_composite_score(
        inputs.quant.as_ref(),
        inputs.whale_score,
        inputs.trend.as_ref(),
        inputs.forecast_score,
        inputs.sentiment_score,
        sector_flow_bonus,
        &CompositeWeights::default(),
    );

    let composite_score = result.composite_score?;

    let confluence = detect_confluence(
        result.value_score,
        result.flow_score,
        result.momentum_score,
        result.forecast_score,
        result.sentiment_score,
    );
    let tier = classify_composite_score(Some(composite_score));

    Some(CompositeSnapshot {
        trade_date: target_date,
        ticker: ticker.to_string(),
        composite_score,
        value_score: result.value_score,
        flow_score: result.flow_score,
        momentum_score: result.momentum_score,
        forecast_score: result.forecast_score,
        sentiment_score: result.sentiment_score,
        weights_used: json!({
            "w_value": result.weights_used.value,
            "w_flow": result.weights_used.flow,
            "w_momentum": result.weights_used.momentum,
            "w_forecast": result.weights_used.forecast,
            "w_sentiment": result.weights_used.sentiment,
        }),
        axes_available: result.axes_available,
        confidence: result.confidence,
        confluence_tier: confluence.confluence_tier,
        confluence_pattern: confluence.confluence_pattern,
        value_signal: confluence.value_signal.to_string(),
        flow_signal: confluence.flow_signal.to_string(),
        momentum_signal: confluence.momentum_signal.to_string(),
        forecast_signal: confluence.forecast_signal.to_string(),
        sentiment_signal: confluence.sentiment_signal.to_string(),
        divergence_type: confluence.divergence_type.map(|s| s.to_string()),
        divergence_severity: confluence.divergence_severity.map(|s| s.to_string()),
        divergence_label: confluence.divergence_label.map(|s| s.to_string()),
        action_label: confluence.action_label.to_string(),
        action_description: confluence.action_description.to_string(),
        score_tier: tier.tier.to_string(),
        score_label: tier.label.to_string(),
        score_color: tier.color.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    #[test]
    fn no_axes_is_skipped() {
        let inputs = CompositeInputs {
            quant: None,
            whale_score: None,
            trend: None,
            forecast_score: None,
            sentiment_score: None,
            sector: None,
        };
        assert!(synthesize(date(), "005930", &inputs, &HashMap::new()).is_none());
    }

    #[test]
    fn full_inputs_produce_tier5_strong_buy() {
        let inputs = CompositeInputs {
            quant: Some(QuantInput {
                fscore: Some(9),
                safety_margin: Some(60.0),
                data_completeness: 1.0,
            }),
            whale_score: Some(80.0),
            trend: Some(TrendInput {
                rs_percentile: Some(82),
                sector_quadrant: None,
            }),
            forecast_score: Some(85.0),
            sentiment_score: None,
            sector: None,
        };
        let snapshot = synthesize(date(), "005930", &inputs, &HashMap::new()).unwrap();

        assert_eq!(snapshot.axes_available, 4);
        assert_eq!(snapshot.confidence, 0.8);
        assert_eq!(snapshot.confluence_tier, 5);
        assert_eq!(snapshot.action_label.to_lowercase(), "strong buy");
        assert_eq!(snapshot.sentiment_signal, "unknown");
    }

    #[test]
    fn sector_bonus_feeds_flow_axis() {
        let mut bonuses = HashMap::new();
        bonuses.insert("Semis".to_string(), 15.0);

        let inputs = CompositeInputs {
            quant: None,
            whale_score: Some(60.0),
            trend: None,
            forecast_score: None,
            sentiment_score: None,
            sector: Some("Semis"),
        };
        let snapshot = synthesize(date(), "005930", &inputs, &bonuses).unwrap();
        assert_eq!(snapshot.flow_score, Some(75.0));
    }
}
