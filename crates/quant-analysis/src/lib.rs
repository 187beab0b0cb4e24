//! Valuation kernels: RIM intrinsic value, safety margin, Modified F-Score,
//! and the investment grade derived from them.
//!
//! All functions are pure and total. Missing inputs mark the affected
//! criterion non-computable instead of failing.

use analysis_core::FundamentalRow;
use serde::{Deserialize, Serialize};

/// Median PBR / PER across a sector's fundamental cross-section.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SectorMedians {
    pub median_pbr: Option<f64>,
    pub median_per: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RimResult {
    pub rim_value: Option<f64>,
    pub computable: bool,
    pub reason: Option<&'static str>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct SafetyMarginResult {
    pub safety_margin_pct: Option<f64>,
    pub is_undervalued: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FscoreCriterion {
    pub name: &'static str,
    pub score: i32,
    pub value: Option<f64>,
    pub computable: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct FscoreResult {
    pub total_score: i32,
    pub max_score: i32,
    pub criteria: Vec<FscoreCriterion>,
    pub data_completeness: f64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct InvestmentGrade {
    pub grade: &'static str,
    pub label: &'static str,
    pub description: &'static str,
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Residual Income Model intrinsic value.
///
/// `intrinsic = BPS + (ROE − r) · BPS / (r − g)` with required return
/// `r = risk_free_rate + equity_risk_premium`. ROE arrives as a percentage
/// (13.21 means 13.21%). When `r ≈ g` the perpetuity degenerates: value is
/// capped at 10× BPS if ROE exceeds the required return, else BPS.
pub fn compute_rim(
    bps: Option<f64>,
    roe_pct: Option<f64>,
    risk_free_rate: f64,
    equity_risk_premium: f64,
    growth_rate: f64,
) -> RimResult {
    let required_return = risk_free_rate + equity_risk_premium;

    let (bps, roe_pct) = match (bps, roe_pct) {
        (Some(b), Some(r)) => (b, r),
        _ => {
            return RimResult {
                rim_value: None,
                computable: false,
                reason: Some("missing_data"),
            }
        }
    };

    if bps <= 0.0 {
        return RimResult {
            rim_value: None,
            computable: false,
            reason: Some("negative_bps"),
        };
    }

    let roe = roe_pct / 100.0;
    let denominator = required_return - growth_rate;

    let rim_value = if denominator.abs() < 1e-10 {
        if roe > required_return {
            bps * 10.0
        } else {
            bps
        }
    } else {
        bps + (roe - required_return) * bps / denominator
    };

    RimResult {
        rim_value: Some(round2(rim_value.max(0.0))),
        computable: true,
        reason: None,
    }
}

/// Safety margin between intrinsic value and market price.
/// Positive = undervalued.
pub fn compute_safety_margin(rim_value: Option<f64>, current_price: Option<i64>) -> SafetyMarginResult {
    let (rim, price) = match (rim_value, current_price) {
        (Some(r), Some(p)) if r > 0.0 && p > 0 => (r, p as f64),
        _ => {
            return SafetyMarginResult {
                safety_margin_pct: None,
                is_undervalued: None,
            }
        }
    };

    let margin = (rim - price) / rim * 100.0;
    SafetyMarginResult {
        safety_margin_pct: Some(round2(margin)),
        is_undervalued: Some(margin > 0.0),
    }
}

/// Modified Piotroski F-Score (0-9) over the fundamentals the exchange
/// actually publishes:
///
/// 1. EPS > 0
/// 2. ROE > 0
/// 3. ROE increasing YoY
/// 4. EPS increasing YoY
/// 5. BPS increasing YoY (retained-earnings proxy)
/// 6. PBR < sector median
/// 7. DIV > 0
/// 8. PER < sector median (both positive)
/// 9. Volume increasing
pub fn compute_fscore(
    current: Option<&FundamentalRow>,
    previous: Option<&FundamentalRow>,
    sector_medians: Option<&SectorMedians>,
    volume_current: Option<i64>,
    volume_previous: Option<i64>,
) -> FscoreResult {
    const TOTAL_SIGNALS: i32 = 9;

    let current = match current {
        Some(c) => c,
        None => {
            return FscoreResult {
                total_score: 0,
                max_score: TOTAL_SIGNALS,
                criteria: Vec::new(),
                data_completeness: 0.0,
            }
        }
    };

    let mut criteria: Vec<FscoreCriterion> = Vec::with_capacity(TOTAL_SIGNALS as usize);
    let mut computable_count = 0;

    let mut push = |name: &'static str, outcome: Option<(bool, Option<f64>)>| match outcome {
        Some((passed, value)) => {
            computable_count += 1;
            criteria.push(FscoreCriterion {
                name,
                score: if passed { 1 } else { 0 },
                value,
                computable: true,
            });
        }
        None => criteria.push(FscoreCriterion {
            name,
            score: 0,
            value: None,
            computable: false,
        }),
    };

    push("positive_eps", current.eps.map(|e| (e > 0.0, Some(e))));
    push("positive_roe", current.roe.map(|r| (r > 0.0, Some(r))));

    let roe_prev = previous.and_then(|p| p.roe);
    push(
        "roe_increasing",
        current
            .roe
            .zip(roe_prev)
            .map(|(cur, prev)| (cur > prev, Some(cur - prev))),
    );

    let eps_prev = previous.and_then(|p| p.eps);
    push(
        "eps_increasing",
        current
            .eps
            .zip(eps_prev)
            .map(|(cur, prev)| (cur > prev, Some(cur - prev))),
    );

    let bps_prev = previous.and_then(|p| p.bps);
    push(
        "bps_increasing",
        current
            .bps
            .zip(bps_prev)
            .map(|(cur, prev)| (cur > prev, Some(cur - prev))),
    );

    let median_pbr = sector_medians.and_then(|m| m.median_pbr);
    push(
        "pbr_below_sector",
        match (current.pbr, median_pbr) {
            (Some(pbr), Some(median)) if pbr > 0.0 => Some((pbr < median, Some(pbr))),
            _ => None,
        },
    );

    push("positive_dividend", current.div.map(|d| (d > 0.0, Some(d))));

    let median_per = sector_medians.and_then(|m| m.median_per);
    push(
        "per_below_sector",
        match (current.per, median_per) {
            (Some(per), Some(median)) if per > 0.0 && median > 0.0 => {
                Some((per < median, Some(per)))
            }
            _ => None,
        },
    );

    push(
        "volume_increasing",
        match (volume_current, volume_previous) {
            (Some(cur), Some(prev)) if prev > 0 => {
                Some((cur > prev, Some((cur - prev) as f64)))
            }
            _ => None,
        },
    );

    let total_score = criteria.iter().map(|c| c.score).sum();

    FscoreResult {
        total_score,
        max_score: TOTAL_SIGNALS,
        criteria,
        data_completeness: round2(computable_count as f64 / TOTAL_SIGNALS as f64),
    }
}

/// Investment grade from F-Score and safety margin. Data completeness below
/// 50% always grades F regardless of the other inputs.
pub fn compute_investment_grade(
    fscore: i32,
    safety_margin_pct: Option<f64>,
    data_completeness: f64,
) -> InvestmentGrade {
    if data_completeness < 0.5 {
        return InvestmentGrade {
            grade: "F",
            label: "Insufficient Data",
            description: "Less than half of the criteria were computable",
        };
    }

    let margin = safety_margin_pct.unwrap_or(f64::NEG_INFINITY);

    if fscore >= 8 && margin >= 30.0 {
        InvestmentGrade {
            grade: "A+",
            label: "Strong Buy",
            description: "Excellent financials with a deep safety margin",
        }
    } else if fscore >= 7 && margin >= 20.0 {
        InvestmentGrade {
            grade: "A",
            label: "Buy",
            description: "Solid financials with an adequate safety margin",
        }
    } else if fscore >= 6 && margin >= 10.0 {
        InvestmentGrade {
            grade: "B+",
            label: "Consider Buying",
            description: "Good financials, mildly undervalued",
        }
    } else if fscore >= 5 && margin >= 0.0 {
        InvestmentGrade {
            grade: "B",
            label: "Hold",
            description: "Fair financials at fair value",
        }
    } else if fscore >= 4 {
        InvestmentGrade {
            grade: "C+",
            label: "Watch",
            description: "Average financial condition",
        }
    } else if fscore >= 3 {
        InvestmentGrade {
            grade: "C",
            label: "Caution",
            description: "Signs of financial weakness",
        }
    } else {
        InvestmentGrade {
            grade: "D",
            label: "Risk",
            description: "Serious financial health concerns",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fundamentals(
        eps: Option<f64>,
        roe: Option<f64>,
        bps: Option<f64>,
        pbr: Option<f64>,
        per: Option<f64>,
        div: Option<f64>,
    ) -> FundamentalRow {
        FundamentalRow {
            eps,
            roe,
            bps,
            pbr,
            per,
            div,
            dps: None,
        }
    }

    #[test]
    fn rim_value_creation() {
        // r = 0.10, g = 0: 50000 + (0.15 - 0.10) * 50000 / 0.10 = 75000... with
        // defaults r = 0.035 + 0.065 = 0.10, residual = 0.05 * 50000 / 0.10.
        let result = compute_rim(Some(50_000.0), Some(15.0), 0.035, 0.065, 0.0);
        assert!(result.computable);
        assert_eq!(result.rim_value, Some(75_000.0));
    }

    #[test]
    fn rim_missing_inputs_not_computable() {
        let result = compute_rim(None, Some(10.0), 0.035, 0.065, 0.0);
        assert!(!result.computable);
        assert_eq!(result.reason, Some("missing_data"));

        let result = compute_rim(Some(-100.0), Some(10.0), 0.035, 0.065, 0.0);
        assert!(!result.computable);
        assert_eq!(result.reason, Some("negative_bps"));
    }

    #[test]
    fn rim_degenerate_denominator() {
        // g == r: value capped at 10x BPS when ROE beats required return.
        let result = compute_rim(Some(10_000.0), Some(20.0), 0.035, 0.065, 0.10);
        assert_eq!(result.rim_value, Some(100_000.0));

        let result = compute_rim(Some(10_000.0), Some(5.0), 0.035, 0.065, 0.10);
        assert_eq!(result.rim_value, Some(10_000.0));
    }

    #[test]
    fn rim_never_negative() {
        let result = compute_rim(Some(1_000.0), Some(-50.0), 0.035, 0.065, 0.0);
        assert_eq!(result.rim_value, Some(0.0));
    }

    #[test]
    fn safety_margin_undervalued() {
        let result = compute_safety_margin(Some(70_000.0), Some(42_000));
        assert_eq!(result.safety_margin_pct, Some(40.0));
        assert_eq!(result.is_undervalued, Some(true));
    }

    #[test]
    fn safety_margin_requires_positive_inputs() {
        assert!(compute_safety_margin(None, Some(100)).safety_margin_pct.is_none());
        assert!(compute_safety_margin(Some(100.0), None).safety_margin_pct.is_none());
        assert!(compute_safety_margin(Some(0.0), Some(100)).safety_margin_pct.is_none());
    }

    #[test]
    fn fscore_all_nine_criteria_pass() {
        let current = fundamentals(
            Some(5_000.0),
            Some(15.0),
            Some(60_000.0),
            Some(0.5),
            Some(8.0),
            Some(2.5),
        );
        let previous = fundamentals(Some(3_000.0), Some(10.0), Some(50_000.0), None, None, None);
        let medians = SectorMedians {
            median_pbr: Some(1.0),
            median_per: Some(15.0),
        };

        let result = compute_fscore(
            Some(&current),
            Some(&previous),
            Some(&medians),
            Some(1_000_000),
            Some(800_000),
        );

        assert_eq!(result.total_score, 9);
        assert_eq!(result.data_completeness, 1.0);
        assert_eq!(result.criteria.len(), 9);
        assert!(result.criteria.iter().all(|c| c.computable && c.score == 1));
    }

    #[test]
    fn fscore_missing_current_is_neutral() {
        let result = compute_fscore(None, None, None, None, None);
        assert_eq!(result.total_score, 0);
        assert_eq!(result.data_completeness, 0.0);
        assert!(result.criteria.is_empty());
    }

    #[test]
    fn fscore_partial_data_marks_non_computable() {
        let current = fundamentals(Some(100.0), None, None, None, None, None);
        let result = compute_fscore(Some(&current), None, None, None, None);

        // Only positive_eps is computable.
        assert_eq!(result.total_score, 1);
        assert_eq!(result.data_completeness, 0.11);
        let computable: Vec<_> = result.criteria.iter().filter(|c| c.computable).collect();
        assert_eq!(computable.len(), 1);
        assert_eq!(computable[0].name, "positive_eps");
    }

    #[test]
    fn fscore_volume_requires_positive_previous() {
        let current = fundamentals(Some(1.0), None, None, None, None, None);
        let result = compute_fscore(Some(&current), None, None, Some(500), Some(0));
        let vol = result
            .criteria
            .iter()
            .find(|c| c.name == "volume_increasing")
            .unwrap();
        assert!(!vol.computable);
    }

    #[test]
    fn grade_thresholds() {
        assert_eq!(compute_investment_grade(8, Some(40.0), 0.9).grade, "A+");
        assert_eq!(compute_investment_grade(7, Some(25.0), 0.9).grade, "A");
        assert_eq!(compute_investment_grade(6, Some(15.0), 0.9).grade, "B+");
        assert_eq!(compute_investment_grade(5, Some(5.0), 0.9).grade, "B");
        assert_eq!(compute_investment_grade(4, Some(-10.0), 0.9).grade, "C+");
        assert_eq!(compute_investment_grade(3, None, 0.9).grade, "C");
        assert_eq!(compute_investment_grade(2, Some(50.0), 0.9).grade, "D");
    }

    #[test]
    fn grade_low_completeness_is_f() {
        assert_eq!(compute_investment_grade(9, Some(50.0), 0.4).grade, "F");
    }

    #[test]
    fn grade_missing_margin_treated_as_worst() {
        // F-Score 8 but no margin: falls through to the margin-free tiers.
        assert_eq!(compute_investment_grade(8, None, 0.9).grade, "C+");
    }
}
