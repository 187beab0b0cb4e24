//! Investor-profile weight presets and eligibility screening.

use serde::{Deserialize, Serialize};

use crate::{compute_composite_score, CompositeWeights, QuantInput, TrendInput};

#[derive(Debug, Clone)]
pub struct InvestorProfile {
    pub name: &'static str,
    pub label: &'static str,
    pub description: &'static str,
    pub weights: CompositeWeights,
    /// (metric, minimum) pairs a ticker must clear to be eligible.
    pub min_filters: &'static [(&'static str, f64)],
}

/// Weight presets. Each profile redistributes emphasis across the five axes;
/// eligibility filters act on the raw underlying metrics.
pub fn investor_profiles() -> Vec<InvestorProfile> {
    vec![
        InvestorProfile {
            name: "value",
            label: "Value",
            description: "Undervalued quality names",
            weights: CompositeWeights {
                value: 0.45,
                flow: 0.20,
                momentum: 0.10,
                forecast: 0.15,
                sentiment: 0.10,
            },
            min_filters: &[("fscore", 6.0), ("safety_margin", 10.0)],
        },
        InvestorProfile {
            name: "growth",
            label: "Growth",
            description: "Institutional flow and growth emphasis",
            weights: CompositeWeights {
                value: 0.20,
                flow: 0.35,
                momentum: 0.20,
                forecast: 0.15,
                sentiment: 0.10,
            },
            min_filters: &[("fscore", 5.0), ("whale_score", 50.0)],
        },
        InvestorProfile {
            name: "momentum",
            label: "Momentum",
            description: "Relative strength and trend following",
            weights: CompositeWeights {
                value: 0.10,
                flow: 0.25,
                momentum: 0.40,
                forecast: 0.15,
                sentiment: 0.10,
            },
            min_filters: &[("rs_percentile", 70.0)],
        },
        InvestorProfile {
            name: "balanced",
            label: "Balanced",
            description: "Default blend across all axes",
            weights: CompositeWeights::default(),
            min_filters: &[],
        },
    ]
}

pub fn find_profile(name: &str) -> InvestorProfile {
    investor_profiles()
        .into_iter()
        .find(|p| p.name == name)
        .unwrap_or_else(|| {
            tracing::warn!("unknown investor profile '{}', falling back to balanced", name);
            investor_profiles().pop().unwrap()
        })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileScore {
    pub score: Option<f64>,
    pub eligible: bool,
    pub profile: String,
    pub profile_label: String,
    pub filters_met: Vec<(String, bool)>,
}

/// Score a ticker under a profile's weights and check its minimum filters.
#[allow(clippy::too_many_arguments)]
pub fn compute_profile_score(
    quant: Option<&QuantInput>,
    whale_score: Option<f64>,
    trend: Option<&TrendInput>,
    forecast_score: Option<f64>,
    sentiment_score: Option<f64>,
    sector_flow_bonus: f64,
    profile_name: &str,
) -> ProfileScore {
    let profile = find_profile(profile_name);

    let result = compute_composite_score(
        quant,
        whale_score,
        trend,
        forecast_score,
        sentiment_score,
        sector_flow_bonus,
        &profile.weights,
    );

    let extract = |metric: &str| -> Option<f64> {
        match metric {
            "fscore" => quant.and_then(|q| q.fscore.map(|f| f as f64)),
            "safety_margin" => quant.and_then(|q| q.safety_margin),
            "whale_score" => whale_score,
            "rs_percentile" => trend.and_then(|t| t.rs_percentile.map(|r| r as f64)),
            _ => None,
        }
    };

    let mut eligible = true;
    let filters_met: Vec<(String, bool)> = profile
        .min_filters
        .iter()
        .map(|(metric, threshold)| {
            let passed = extract(metric).map_or(false, |actual| actual >= *threshold);
            if !passed {
                eligible = false;
            }
            (metric.to_string(), passed)
        })
        .collect();

    ProfileScore {
        score: result.composite_score,
        eligible,
        profile: profile.name.to_string(),
        profile_label: profile.label.to_string(),
        filters_met,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strong_inputs() -> (QuantInput, f64, TrendInput) {
        (
            QuantInput {
                fscore: Some(8),
                safety_margin: Some(35.0),
                data_completeness: 1.0,
            },
            80.0,
            TrendInput {
                rs_percentile: Some(90),
                sector_quadrant: Some("leading".to_string()),
            },
        )
    }

    #[test]
    fn profile_weights_sum_to_one() {
        for profile in investor_profiles() {
            assert!((profile.weights.sum() - 1.0).abs() < 1e-9, "{}", profile.name);
        }
    }

    #[test]
    fn value_profile_eligibility() {
        let (quant, whale, trend) = strong_inputs();
        let result = compute_profile_score(
            Some(&quant),
            Some(whale),
            Some(&trend),
            Some(70.0),
            None,
            0.0,
            "value",
        );
        assert!(result.eligible);
        assert!(result.score.is_some());
    }

    #[test]
    fn value_profile_rejects_low_fscore() {
        let quant = QuantInput {
            fscore: Some(3),
            safety_margin: Some(35.0),
            data_completeness: 1.0,
        };
        let result = compute_profile_score(Some(&quant), None, None, None, None, 0.0, "value");
        assert!(!result.eligible);
        let fscore_filter = result.filters_met.iter().find(|(m, _)| m == "fscore").unwrap();
        assert!(!fscore_filter.1);
    }

    #[test]
    fn missing_metric_fails_filter() {
        let result = compute_profile_score(None, None, None, None, None, 0.0, "momentum");
        assert!(!result.eligible);
    }

    #[test]
    fn unknown_profile_falls_back_to_balanced() {
        let (quant, whale, trend) = strong_inputs();
        let result = compute_profile_score(
            Some(&quant),
            Some(whale),
            Some(&trend),
            None,
            None,
            0.0,
            "yolo",
        );
        assert_eq!(result.profile, "balanced");
        assert!(result.eligible);
    }

    #[test]
    fn balanced_profile_has_no_filters() {
        let result = compute_profile_score(None, None, None, None, None, 0.0, "balanced");
        assert!(result.filters_met.is_empty());
        assert!(result.eligible);
        assert!(result.score.is_none());
    }
}
