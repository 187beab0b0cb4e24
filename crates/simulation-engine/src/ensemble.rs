//! Weighted pooling of multiple simulation models.
//!
//! For each horizon, terminal prices are sampled with replacement from each
//! successful model proportional to its (renormalised) weight, pooled, and
//! the distribution statistics recomputed on the pooled sample.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::score::compute_simulation_score;
use crate::stats::{compute_horizon_stats, HorizonStats};
use crate::ModelResult;

/// Fixed pooling seed: the pooled sample must be stable across runs
/// independently of the per-model seeds.
const POOLING_SEED: u64 = 42;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelScore {
    pub model: String,
    pub score: Option<f64>,
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelBreakdown {
    pub model_scores: Vec<ModelScore>,
    pub ensemble_method: String,
}

#[derive(Debug, Clone)]
pub struct EnsembleResult {
    pub horizons: BTreeMap<usize, HorizonStats>,
    pub target_probs: BTreeMap<String, BTreeMap<usize, f64>>,
    pub breakdown: ModelBreakdown,
}

/// Combine model results via weighted pooling. `weights` may mention models
/// that failed; it is renormalised over the models actually present, with an
/// equal-weight fallback when nothing positive remains.
pub fn combine_ensemble(
    model_results: &[ModelResult],
    weights: &[(String, f64)],
    horizons: &[usize],
    base_price: i64,
    target_multipliers: &[f64],
    total_samples: usize,
) -> Option<EnsembleResult> {
    if model_results.is_empty() {
        return None;
    }

    let weight_for = |name: &str| -> f64 {
        weights
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, w)| *w)
            .unwrap_or(0.0)
    };

    let mut available: Vec<(String, f64)> = model_results
        .iter()
        .map(|r| (r.model.name().to_string(), weight_for(r.model.name())))
        .collect();

    let total_weight: f64 = available.iter().map(|(_, w)| w).sum();
    if total_weight <= 0.0 {
        let equal = 1.0 / available.len() as f64;
        for (_, w) in available.iter_mut() {
            *w = equal;
        }
    } else {
        for (_, w) in available.iter_mut() {
            *w /= total_weight;
        }
    }

    // Per-model sample counts; the last model absorbs rounding remainder.
    let mut sample_counts: Vec<usize> = Vec::with_capacity(available.len());
    let mut allocated = 0usize;
    for (i, (_, w)) in available.iter().enumerate() {
        if i == available.len() - 1 {
            sample_counts.push(total_samples.saturating_sub(allocated));
        } else {
            let n = (w * total_samples as f64).round() as usize;
            sample_counts.push(n);
            allocated += n;
        }
    }

    let mut rng = StdRng::seed_from_u64(POOLING_SEED);

    let mut ensemble_horizons: BTreeMap<usize, HorizonStats> = BTreeMap::new();
    let mut ensemble_terminal: BTreeMap<usize, Vec<f64>> = BTreeMap::new();

    let mut sorted_horizons: Vec<usize> = horizons.to_vec();
    sorted_horizons.sort_unstable();

    for &h in &sorted_horizons {
        let mut pooled: Vec<f64> = Vec::with_capacity(total_samples);

        for (result, &n_sample) in model_results.iter().zip(sample_counts.iter()) {
            let Some(tp) = result.terminal_prices.get(&h) else {
                continue;
            };
            if tp.is_empty() || n_sample == 0 {
                continue;
            }
            for _ in 0..n_sample {
                pooled.push(tp[rng.gen_range(0..tp.len())]);
            }
        }

        if pooled.is_empty() {
            continue;
        }

        ensemble_horizons.insert(h, compute_horizon_stats(&pooled, base_price, h));
        ensemble_terminal.insert(h, pooled);
    }

    if ensemble_horizons.is_empty() {
        return None;
    }

    let mut target_probs: BTreeMap<String, BTreeMap<usize, f64>> = BTreeMap::new();
    for &mult in target_multipliers {
        let target_price = base_price as f64 * mult;
        let mut per_horizon = BTreeMap::new();
        for (&h, terminal) in &ensemble_terminal {
            let prob =
                terminal.iter().filter(|&&t| t > target_price).count() as f64 / terminal.len() as f64;
            per_horizon.insert(h, (prob * 10_000.0).round() / 10_000.0);
        }
        target_probs.insert(format!("{mult}"), per_horizon);
    }

    let model_scores: Vec<ModelScore> = model_results
        .iter()
        .zip(available.iter())
        .map(|(result, (name, weight))| ModelScore {
            model: name.clone(),
            score: compute_simulation_score(&result.horizons).score,
            weight: (weight * 10_000.0).round() / 10_000.0,
        })
        .collect();

    Some(EnsembleResult {
        horizons: ensemble_horizons,
        target_probs,
        breakdown: ModelBreakdown {
            model_scores,
            ensemble_method: "weighted_pooling".to_string(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gbm::{simulate_gbm, GbmParams};
    use crate::seeds::model_seed;
    use crate::SimModel;

    fn gbm_result(seed_ticker: &str) -> ModelResult {
        let daily_vol = 0.20 / (252.0_f64).sqrt();
        let returns: Vec<f64> = (0..200)
            .map(|i| 0.0003 + daily_vol * ((i as f64 * 0.7).sin()))
            .collect();
        let mut rng = StdRng::from_seed(model_seed(seed_ticker, "gbm"));
        simulate_gbm(&returns, 50_000, 500, &[63, 126], &mut rng, &GbmParams::default()).unwrap()
    }

    fn default_weights() -> Vec<(String, f64)> {
        vec![
            ("gbm".to_string(), 0.25),
            ("garch".to_string(), 0.30),
            ("heston".to_string(), 0.20),
            ("merton".to_string(), 0.25),
        ]
    }

    #[test]
    fn empty_results_yield_none() {
        assert!(combine_ensemble(&[], &default_weights(), &[63], 50_000, &[1.1], 1000).is_none());
    }

    #[test]
    fn single_model_renormalises_weight_to_one() {
        let results = vec![gbm_result("005930")];
        let combined =
            combine_ensemble(&results, &default_weights(), &[63, 126], 50_000, &[1.1, 1.2], 1000)
                .unwrap();

        assert_eq!(combined.breakdown.model_scores.len(), 1);
        assert_eq!(combined.breakdown.model_scores[0].weight, 1.0);
        assert_eq!(combined.horizons[&63].label, "3M");
    }

    #[test]
    fn pooled_sample_size_matches_request() {
        let results = vec![gbm_result("005930"), {
            let mut r = gbm_result("000660");
            r.model = SimModel::Garch;
            r
        }];
        let combined =
            combine_ensemble(&results, &default_weights(), &[63], 50_000, &[1.1], 2000).unwrap();
        // Stats come from a 2000-point pooled sample: percentiles inside range.
        let stats = &combined.horizons[&63];
        assert!(stats.p5 <= stats.p95);
        assert!(combined.target_probs["1.1"].contains_key(&63));
    }

    #[test]
    fn pooling_is_deterministic() {
        let results = vec![gbm_result("005930")];
        let a = combine_ensemble(&results, &default_weights(), &[63], 50_000, &[1.1], 1000).unwrap();
        let b = combine_ensemble(&results, &default_weights(), &[63], 50_000, &[1.1], 1000).unwrap();
        assert_eq!(a.horizons[&63].p50, b.horizons[&63].p50);
        assert_eq!(a.target_probs, b.target_probs);
    }

    #[test]
    fn zero_weights_fall_back_to_equal() {
        let results = vec![gbm_result("005930")];
        let combined =
            combine_ensemble(&results, &[("nope".to_string(), 1.0)], &[63], 50_000, &[1.1], 500)
                .unwrap();
        assert_eq!(combined.breakdown.model_scores[0].weight, 1.0);
    }
}
