//! Composite score synthesis.
//!
//! Combines five analysis axes (value, flow, momentum, forecast, sentiment)
//! into a 0-100 composite with redistributed weights, then classifies signal
//! confluence, axis divergences, and a qualitative tier.

pub mod confluence;
pub mod profiles;

pub use confluence::*;
pub use profiles::*;

use serde::{Deserialize, Serialize};

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

// ---------------------------------------------------------------------------
// Normalisation
// ---------------------------------------------------------------------------

/// F-Score (0-9) to 0-100 with a 1.3 exponent that rewards high scores while
/// compressing the middle: 5/9 -> 44.4, 7/9 -> 72.1, 9/9 -> 100.
pub fn normalize_fscore(fscore: i32) -> f64 {
    let ratio = (fscore.max(0) as f64 / 9.0).min(1.0);
    round2(ratio.powf(1.3) * 100.0)
}

/// Safety margin to 0-100 via a sigmoid: -30% -> 23.1, 0% -> 50, +30% -> 76.8.
/// Missing margin is neutral (50).
pub fn normalize_safety_margin(margin_pct: Option<f64>) -> f64 {
    match margin_pct {
        None => 50.0,
        Some(m) => {
            let clamped = m.clamp(-500.0, 500.0);
            round2(100.0 / (1.0 + (-clamped / 25.0).exp()))
        }
    }
}

/// Sector rotation quadrant adjustment for the momentum axis.
pub fn quadrant_bonus(quadrant: Option<&str>) -> f64 {
    match quadrant {
        Some("leading") => 15.0,
        Some("improving") => 10.0,
        Some("weakening") => -5.0,
        Some("lagging") => -15.0,
        _ => 0.0,
    }
}

// ---------------------------------------------------------------------------
// Composite score
// ---------------------------------------------------------------------------

/// Per-axis weights. Defaults redistribute over the axes that have data.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CompositeWeights {
    pub value: f64,
    pub flow: f64,
    pub momentum: f64,
    pub forecast: f64,
    pub sentiment: f64,
}

impl Default for CompositeWeights {
    fn default() -> Self {
        Self {
            value: 0.25,
            flow: 0.25,
            momentum: 0.20,
            forecast: 0.20,
            sentiment: 0.10,
        }
    }
}

impl CompositeWeights {
    pub fn zero() -> Self {
        Self {
            value: 0.0,
            flow: 0.0,
            momentum: 0.0,
            forecast: 0.0,
            sentiment: 0.0,
        }
    }

    pub fn sum(&self) -> f64 {
        self.value + self.flow + self.momentum + self.forecast + self.sentiment
    }
}

/// Value-axis inputs from the quant snapshot.
#[derive(Debug, Clone, Default)]
pub struct QuantInput {
    pub fscore: Option<i32>,
    pub safety_margin: Option<f64>,
    pub data_completeness: f64,
}

/// Momentum-axis inputs from the trend snapshot plus sector rotation.
#[derive(Debug, Clone, Default)]
pub struct TrendInput {
    pub rs_percentile: Option<i32>,
    pub sector_quadrant: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeResult {
    pub composite_score: Option<f64>,
    pub value_score: Option<f64>,
    pub flow_score: Option<f64>,
    pub momentum_score: Option<f64>,
    pub forecast_score: Option<f64>,
    pub sentiment_score: Option<f64>,
    pub weights_used: CompositeWeights,
    pub confidence: f64,
    pub axes_available: i32,
}

/// Compute the composite score.
///
/// Sub-scores:
///   value    = (0.55 norm_fscore + 0.45 norm_margin) * min(1, completeness)
///   flow     = whale_score + sector_flow_bonus, clipped to [0, 100]
///   momentum = rs_percentile + quadrant bonus, clipped to [0, 100]
///   forecast = simulation score, sentiment = sentiment score (pass-through)
///
/// Weights are renormalised over the available axes; confidence is
/// axes_available / 5.
pub fn compute_composite_score(
    quant: Option<&QuantInput>,
    whale_score: Option<f64>,
    trend: Option<&TrendInput>,
    forecast_score: Option<f64>,
    sentiment_score: Option<f64>,
    sector_flow_bonus: f64,
    weights: &CompositeWeights,
) -> CompositeResult {
    let value_score = quant.and_then(|q| {
        q.fscore.map(|fscore| {
            let completeness = q.data_completeness.min(1.0);
            let raw = 0.55 * normalize_fscore(fscore)
                + 0.45 * normalize_safety_margin(q.safety_margin);
            round2(raw * completeness)
        })
    });

    let flow_score = whale_score.map(|ws| round2((ws + sector_flow_bonus).clamp(0.0, 100.0)));

    let momentum_score = trend.and_then(|t| {
        t.rs_percentile.map(|rs| {
            let raw = rs as f64 + quadrant_bonus(t.sector_quadrant.as_deref());
            round2(raw.clamp(0.0, 100.0))
        })
    });

    let axes = [
        (value_score, weights.value),
        (flow_score, weights.flow),
        (momentum_score, weights.momentum),
        (forecast_score, weights.forecast),
        (sentiment_score, weights.sentiment),
    ];

    let axes_available = axes.iter().filter(|(score, _)| score.is_some()).count() as i32;

    if axes_available == 0 {
        return CompositeResult {
            composite_score: None,
            value_score: None,
            flow_score: None,
            momentum_score: None,
            forecast_score: None,
            sentiment_score: None,
            weights_used: CompositeWeights::zero(),
            confidence: 0.0,
            axes_available: 0,
        };
    }

    let available_sum: f64 = axes
        .iter()
        .filter(|(score, _)| score.is_some())
        .map(|(_, w)| w)
        .sum();

    let redistribute = |score: Option<f64>, w: f64| -> f64 {
        if score.is_some() && available_sum > 0.0 {
            round4(w / available_sum)
        } else {
            0.0
        }
    };

    let weights_used = CompositeWeights {
        value: redistribute(value_score, weights.value),
        flow: redistribute(flow_score, weights.flow),
        momentum: redistribute(momentum_score, weights.momentum),
        forecast: redistribute(forecast_score, weights.forecast),
        sentiment: redistribute(sentiment_score, weights.sentiment),
    };

    let composite = value_score.unwrap_or(0.0) * weights_used.value
        + flow_score.unwrap_or(0.0) * weights_used.flow
        + momentum_score.unwrap_or(0.0) * weights_used.momentum
        + forecast_score.unwrap_or(0.0) * weights_used.forecast
        + sentiment_score.unwrap_or(0.0) * weights_used.sentiment;

    CompositeResult {
        composite_score: Some(round2(composite)),
        value_score,
        flow_score,
        momentum_score,
        forecast_score,
        sentiment_score,
        weights_used,
        confidence: round2(axes_available as f64 / 5.0),
        axes_available,
    }
}

// ---------------------------------------------------------------------------
// Qualitative tier
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ScoreTier {
    pub tier: &'static str,
    pub label: &'static str,
    pub color: &'static str,
    pub description: &'static str,
}

/// Composite-score tiers at 80/65/50/35/20.
pub fn classify_composite_score(score: Option<f64>) -> ScoreTier {
    match score {
        None => ScoreTier {
            tier: "unknown",
            label: "Not Rated",
            color: "gray",
            description: "Not enough data to produce a composite score",
        },
        Some(s) if s >= 80.0 => ScoreTier {
            tier: "excellent",
            label: "Top Pick",
            color: "emerald",
            description: "Strong on value, flow, and momentum alike",
        },
        Some(s) if s >= 65.0 => ScoreTier {
            tier: "good",
            label: "Quality",
            color: "green",
            description: "Most indicators are positive",
        },
        Some(s) if s >= 50.0 => ScoreTier {
            tier: "fair",
            label: "Decent",
            color: "blue",
            description: "Broadly unremarkable readings",
        },
        Some(s) if s >= 35.0 => ScoreTier {
            tier: "average",
            label: "Average",
            color: "yellow",
            description: "Some indicators warrant attention",
        },
        Some(s) if s >= 20.0 => ScoreTier {
            tier: "caution",
            label: "Caution",
            color: "orange",
            description: "Multiple indicators are negative",
        },
        Some(_) => ScoreTier {
            tier: "risk",
            label: "Risk",
            color: "red",
            description: "Most indicators are flashing warnings",
        },
    }
}
