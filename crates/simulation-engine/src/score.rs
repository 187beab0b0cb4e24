//! Simulation score: a 0-100 summary of the forecast distribution.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::stats::HorizonStats;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct SimulationScore {
    pub score: Option<f64>,
    pub grade: Option<&'static str>,
}

/// Sigmoid mapping to 0-100 with midpoint `center` and steepness `scale`.
fn sigmoid_norm(value: f64, center: f64, scale: f64) -> f64 {
    100.0 / (1.0 + (-(value - center) / scale).exp())
}

/// Weights: 40% six-month expected return, 35% three-month upside
/// probability, 25% three-month 5% VaR (less negative VaR scores higher).
/// Both the 3- and 6-month horizons must be present.
pub fn compute_simulation_score(horizons: &BTreeMap<usize, HorizonStats>) -> SimulationScore {
    let (Some(h126), Some(h63)) = (horizons.get(&126), horizons.get(&63)) else {
        return SimulationScore {
            score: None,
            grade: None,
        };
    };

    let norm_return = sigmoid_norm(h126.expected_return_pct, 0.0, 20.0);
    let norm_upside = h63.upside_prob * 100.0;
    let norm_var = sigmoid_norm(h63.var_5pct_pct, -15.0, 10.0);

    let score = 0.40 * norm_return + 0.35 * norm_upside + 0.25 * norm_var;
    let score = (score.clamp(0.0, 100.0) * 100.0).round() / 100.0;

    let grade = if score >= 70.0 {
        "positive"
    } else if score >= 50.0 {
        "neutral_positive"
    } else if score >= 30.0 {
        "neutral"
    } else {
        "negative"
    };

    SimulationScore {
        score: Some(score),
        grade: Some(grade),
    }
}
