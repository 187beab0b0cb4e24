//! News sentiment kernels.
//!
//! 3-dimensional decomposition (Direction × Intensity × Confidence) over
//! scored articles, plus the parameter adjustments the Monte-Carlo models
//! consume and the dynamic ensemble weight overrides.

pub mod classifier;

pub use classifier::{classifier, ClassifierScore, LexiconClassifier};

use analysis_core::NewsArticle;
use serde::{Deserialize, Serialize};

/// (source_type, weight): financial press carries more signal than portals.
const SOURCE_WEIGHTS: [(&str, f64); 3] = [("financial", 1.5), ("general", 1.0), ("portal", 0.7)];

/// (article_type, weight): disclosures and analyst notes outweigh general news.
const TYPE_WEIGHTS: [(&str, f64); 4] = [
    ("disclosure", 2.0),
    ("analyst", 1.8),
    ("earnings", 1.5),
    ("general", 1.0),
];

pub const BASE_ENSEMBLE_WEIGHTS: [(&str, f64); 4] =
    [("gbm", 0.25), ("garch", 0.30), ("heston", 0.20), ("merton", 0.25)];

fn lookup(table: &[(&str, f64)], key: &str) -> f64 {
    table
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, w)| *w)
        .unwrap_or(1.0)
}

fn clip(v: f64, lo: f64, hi: f64) -> f64 {
    v.clamp(lo, hi)
}

// ---------------------------------------------------------------------------
// Sentiment score
// ---------------------------------------------------------------------------

/// 3-dimensional sentiment decomposition for one ticker.
#[derive(Debug, Clone, Serialize)]
pub struct SentimentScore {
    /// D in [-1, +1]: time/source/type-weighted average sentiment.
    pub direction: f64,
    /// I in [0, 1]: reaction strength from article count.
    pub intensity: f64,
    /// C in [0, 1]: agreement between articles.
    pub confidence: f64,
    /// S_eff = D · I · C in [-1, +1].
    pub effective_score: f64,
    /// (S_eff + 1) / 2 · 100, the 0-100 composite axis input.
    pub sentiment_score: f64,
    pub signal: &'static str,
    pub article_count: usize,
    /// active / insufficient / no_data
    pub status: &'static str,
}

impl SentimentScore {
    fn neutral(article_count: usize, status: &'static str) -> Self {
        Self {
            direction: 0.0,
            intensity: 0.0,
            confidence: 0.0,
            effective_score: 0.0,
            sentiment_score: 50.0,
            signal: "neutral",
            article_count,
            status,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == "active"
    }
}

pub fn classify_sentiment_signal(effective_score: f64) -> &'static str {
    if effective_score >= 0.40 {
        "strong_buy"
    } else if effective_score >= 0.15 {
        "buy"
    } else if effective_score >= -0.15 {
        "neutral"
    } else if effective_score >= -0.40 {
        "sell"
    } else {
        "strong_sell"
    }
}

/// Aggregate scored articles into a ticker-level sentiment score.
///
/// Article weights combine exponential time decay (`exp(-ln2/half_life · age)`
/// with age in days from the newest article) with source, type, and
/// importance weights. Articles must carry `sentiment_raw`; unscored rows are
/// skipped.
pub fn compute_sentiment_score(
    articles: &[NewsArticle],
    half_life_days: f64,
    min_articles: usize,
) -> SentimentScore {
    let scored: Vec<&NewsArticle> = articles.iter().filter(|a| a.sentiment_raw.is_some()).collect();
    let n = scored.len();

    if n == 0 {
        return SentimentScore::neutral(0, "no_data");
    }

    let status = if n < min_articles { "insufficient" } else { "active" };

    let lambda = std::f64::consts::LN_2 / half_life_days;
    let newest = scored.iter().map(|a| a.published_at).max().unwrap();

    let mut weights = Vec::with_capacity(n);
    let mut sentiments = Vec::with_capacity(n);

    for article in &scored {
        let s_i = article.sentiment_raw.unwrap();
        let age_days = ((newest - article.published_at).num_seconds() as f64 / 86_400.0).max(0.0);

        let w_t = (-lambda * age_days).exp();
        let v_i = lookup(&SOURCE_WEIGHTS, &article.source_type)
            * lookup(&TYPE_WEIGHTS, &article.article_type)
            * article.importance_weight;

        weights.push(w_t * v_i);
        sentiments.push(s_i);
    }

    let total_weight: f64 = weights.iter().sum();
    if total_weight == 0.0 {
        return SentimentScore::neutral(n, status);
    }

    let weighted_sum: f64 = sentiments.iter().zip(weights.iter()).map(|(s, w)| s * w).sum();
    let direction = clip(weighted_sum / total_weight, -1.0, 1.0);

    let intensity = clip(
        direction.abs() * ((n.min(20) as f64) / 20.0).sqrt(),
        0.0,
        1.0,
    );

    // Population std of the raw sentiments: disagreement lowers confidence.
    let sigma = if n > 1 {
        let mean = sentiments.iter().sum::<f64>() / n as f64;
        (sentiments.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n as f64).sqrt()
    } else {
        0.0
    };
    let confidence = clip((1.0 - sigma) * (n.min(5) as f64) / 5.0, 0.0, 1.0);

    let effective_score = clip(direction * intensity * confidence, -1.0, 1.0);
    let sentiment_score = (effective_score + 1.0) / 2.0 * 100.0;

    SentimentScore {
        direction,
        intensity,
        confidence,
        effective_score,
        sentiment_score,
        signal: classify_sentiment_signal(effective_score),
        article_count: n,
        status,
    }
}

// ---------------------------------------------------------------------------
// Simulation adjustments
// ---------------------------------------------------------------------------

/// Tunables for the sentiment → simulation mapping.
#[derive(Debug, Clone, Copy)]
pub struct AdjustmentParams {
    /// Annual drift sensitivity.
    pub alpha: f64,
    /// Volatility sensitivity.
    pub beta: f64,
    /// Asymmetry factor for negative-news volatility impact.
    pub delta: f64,
    /// Jump intensity sensitivity.
    pub gamma_lambda: f64,
    /// Jump mean sensitivity.
    pub gamma_mu: f64,
}

impl Default for AdjustmentParams {
    fn default() -> Self {
        Self {
            alpha: 0.08,
            beta: 0.15,
            delta: 0.50,
            gamma_lambda: 1.50,
            gamma_mu: 0.03,
        }
    }
}

/// Parameter overrides handed to the simulation models.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentAdjustments {
    pub drift_adj_daily: f64,
    pub vol_multiplier: f64,
    pub var_multiplier: f64,
    pub theta_mult: f64,
    pub v0_mult: f64,
    pub rho_adj: f64,
    pub lam_mult: f64,
    pub mu_j_adj: f64,
    pub sig_j_mult: f64,
    pub ensemble_weight_overrides: Option<Vec<(String, f64)>>,
}

impl SentimentAdjustments {
    pub fn neutral() -> Self {
        Self {
            drift_adj_daily: 0.0,
            vol_multiplier: 1.0,
            var_multiplier: 1.0,
            theta_mult: 1.0,
            v0_mult: 1.0,
            rho_adj: 0.0,
            lam_mult: 1.0,
            mu_j_adj: 0.0,
            sig_j_mult: 1.0,
            ensemble_weight_overrides: None,
        }
    }
}

/// Dynamic ensemble weight overrides via softmax against the base weights.
///
/// phi = (S, -0.8S, 0.6|S|, 1.2·max(0, -S)) for gbm/garch/heston/merton;
/// the result is renormalised to sum to 1.
pub fn compute_ensemble_weights(effective_score: f64) -> Vec<(String, f64)> {
    let s = effective_score;
    let phi = [
        ("gbm", 1.0 * s),
        ("garch", 0.8 * (-s)),
        ("heston", 0.6 * s.abs()),
        ("merton", 1.2 * (-s).max(0.0)),
    ];

    let unnormalized: Vec<(String, f64)> = phi
        .iter()
        .map(|(model, p)| {
            let base = lookup(&BASE_ENSEMBLE_WEIGHTS, model);
            (model.to_string(), base * p.exp())
        })
        .collect();

    let total: f64 = unnormalized.iter().map(|(_, w)| w).sum();
    if total == 0.0 {
        return BASE_ENSEMBLE_WEIGHTS
            .iter()
            .map(|(m, w)| (m.to_string(), *w))
            .collect();
    }

    unnormalized.into_iter().map(|(m, w)| (m, w / total)).collect()
}

/// Map a ticker's sentiment score into simulation parameter adjustments.
/// Anything other than `active` status yields the neutral identity.
pub fn compute_sentiment_adjustments(
    score: &SentimentScore,
    params: &AdjustmentParams,
) -> SentimentAdjustments {
    if score.status != "active" {
        return SentimentAdjustments::neutral();
    }

    let s = score.effective_score;
    let d = score.direction;
    let i = score.intensity;
    let c = score.confidence;

    let drift_cap = 0.10 / 252.0;
    let drift_adj_daily = clip((params.alpha / 252.0) * s, -drift_cap, drift_cap);

    // Bad news widens volatility more than good news narrows it.
    let v = if d >= 0.0 {
        1.0 - params.beta * d * i * c
    } else {
        1.0 + params.beta * d.abs() * (1.0 + params.delta) * i * c
    };
    let v = clip(v, 0.70, 1.50);

    let neg = (-s).max(0.0);

    SentimentAdjustments {
        drift_adj_daily,
        vol_multiplier: v,
        var_multiplier: v * v,
        theta_mult: v * v,
        v0_mult: v * v,
        rho_adj: -0.10 * neg,
        lam_mult: clip(1.0 + params.gamma_lambda * neg, 0.5, 3.0),
        mu_j_adj: -params.gamma_mu * neg,
        sig_j_mult: clip(1.0 + 0.5 * neg, 0.5, 2.0),
        ensemble_weight_overrides: Some(compute_ensemble_weights(s)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn article(sentiment: f64, age_days: i64, source_type: &str, article_type: &str) -> NewsArticle {
        let newest = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        NewsArticle {
            ticker: "005930".to_string(),
            title: "t".to_string(),
            description: None,
            source_url: format!("https://news.example.com/{age_days}/{sentiment}"),
            source_name: "example".to_string(),
            published_at: newest - chrono::Duration::days(age_days),
            article_type: article_type.to_string(),
            source_type: source_type.to_string(),
            importance_weight: 1.0,
            sentiment_raw: Some(sentiment),
            sentiment_label: None,
            sentiment_confidence: None,
            scoring_method: Some("lexicon".to_string()),
        }
    }

    #[test]
    fn no_articles_is_no_data() {
        let score = compute_sentiment_score(&[], 3.0, 2);
        assert_eq!(score.status, "no_data");
        assert_eq!(score.sentiment_score, 50.0);
        assert_eq!(score.signal, "neutral");
    }

    #[test]
    fn single_article_is_insufficient() {
        let articles = vec![article(0.8, 0, "general", "general")];
        let score = compute_sentiment_score(&articles, 3.0, 2);
        assert_eq!(score.status, "insufficient");
        assert_eq!(score.article_count, 1);
    }

    #[test]
    fn agreeing_positive_articles_signal_buy() {
        // Five identical articles: std = 0, so confidence = 1.0.
        let articles: Vec<_> = (0..5).map(|_| article(0.6, 0, "general", "general")).collect();
        let score = compute_sentiment_score(&articles, 3.0, 2);

        assert_eq!(score.status, "active");
        assert!(score.direction > 0.0);
        assert!((score.confidence - 1.0).abs() < 1e-9);
        assert!(score.signal == "buy" || score.signal == "strong_buy");
    }

    #[test]
    fn bounds_hold_for_extreme_inputs() {
        let articles: Vec<_> = (0..40)
            .map(|i| article(if i % 2 == 0 { 1.0 } else { -1.0 }, i % 10, "financial", "disclosure"))
            .collect();
        let score = compute_sentiment_score(&articles, 3.0, 2);

        assert!((-1.0..=1.0).contains(&score.direction));
        assert!((0.0..=1.0).contains(&score.intensity));
        assert!((0.0..=1.0).contains(&score.confidence));
        assert!((-1.0..=1.0).contains(&score.effective_score));
        assert!((0.0..=100.0).contains(&score.sentiment_score));
    }

    #[test]
    fn newer_articles_dominate() {
        // Fresh strong negative vs stale strong positive.
        let articles = vec![
            article(-0.9, 0, "general", "general"),
            article(-0.9, 0, "general", "general"),
            article(0.9, 12, "general", "general"),
        ];
        let score = compute_sentiment_score(&articles, 3.0, 2);
        assert!(score.direction < 0.0);
    }

    #[test]
    fn signal_bands() {
        assert_eq!(classify_sentiment_signal(0.5), "strong_buy");
        assert_eq!(classify_sentiment_signal(0.2), "buy");
        assert_eq!(classify_sentiment_signal(0.0), "neutral");
        assert_eq!(classify_sentiment_signal(-0.2), "sell");
        assert_eq!(classify_sentiment_signal(-0.5), "strong_sell");
    }

    #[test]
    fn ensemble_weights_sum_to_one() {
        for s in [-1.0, -0.5, 0.0, 0.5, 1.0] {
            let weights = compute_ensemble_weights(s);
            let total: f64 = weights.iter().map(|(_, w)| w).sum();
            assert!((total - 1.0).abs() < 1e-9, "sum for S={s} was {total}");
            assert_eq!(weights.len(), 4);
        }
    }

    #[test]
    fn negative_sentiment_shifts_weight_to_merton() {
        let neutral = compute_ensemble_weights(0.0);
        let bearish = compute_ensemble_weights(-0.8);
        let weight = |set: &Vec<(String, f64)>, m: &str| {
            set.iter().find(|(k, _)| k == m).map(|(_, w)| *w).unwrap()
        };
        assert!(weight(&bearish, "merton") > weight(&neutral, "merton"));
        assert!(weight(&bearish, "gbm") < weight(&neutral, "gbm"));
    }

    #[test]
    fn adjustments_neutral_when_not_active() {
        let score = SentimentScore::neutral(1, "insufficient");
        let adj = compute_sentiment_adjustments(&score, &AdjustmentParams::default());
        assert_eq!(adj.vol_multiplier, 1.0);
        assert_eq!(adj.drift_adj_daily, 0.0);
        assert!(adj.ensemble_weight_overrides.is_none());
    }

    #[test]
    fn negative_news_raises_volatility_and_jumps() {
        let articles: Vec<_> = (0..10).map(|_| article(-0.9, 0, "financial", "general")).collect();
        let score = compute_sentiment_score(&articles, 3.0, 2);
        let adj = compute_sentiment_adjustments(&score, &AdjustmentParams::default());

        assert!(adj.vol_multiplier > 1.0);
        assert!(adj.lam_mult > 1.0);
        assert!(adj.mu_j_adj < 0.0);
        assert!(adj.rho_adj < 0.0);
        assert!(adj.drift_adj_daily < 0.0);
    }

    #[test]
    fn positive_news_dampens_volatility() {
        let articles: Vec<_> = (0..10).map(|_| article(0.9, 0, "financial", "general")).collect();
        let score = compute_sentiment_score(&articles, 3.0, 2);
        let adj = compute_sentiment_adjustments(&score, &AdjustmentParams::default());

        assert!(adj.vol_multiplier < 1.0);
        assert!(adj.vol_multiplier >= 0.70);
        assert_eq!(adj.lam_mult, 1.0);
    }

    #[test]
    fn drift_adjustment_is_capped() {
        let score = SentimentScore {
            direction: 1.0,
            intensity: 1.0,
            confidence: 1.0,
            effective_score: 1.0,
            sentiment_score: 100.0,
            signal: "strong_buy",
            article_count: 20,
            status: "active",
        };
        // alpha large enough that the cap binds.
        let params = AdjustmentParams {
            alpha: 1.0,
            ..AdjustmentParams::default()
        };
        let adj = compute_sentiment_adjustments(&score, &params);
        assert!((adj.drift_adj_daily - 0.10 / 252.0).abs() < 1e-12);
    }
}
