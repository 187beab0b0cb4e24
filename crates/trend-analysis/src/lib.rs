//! Relative strength and sector rotation kernels.

use serde::{Deserialize, Serialize};

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RsPoint {
    pub stock_indexed: f64,
    pub index_indexed: f64,
    pub rs_ratio: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelativeStrengthResult {
    pub current_rs: Option<f64>,
    pub rs_change_pct: Option<f64>,
    pub series: Vec<RsPoint>,
}

impl RelativeStrengthResult {
    fn empty() -> Self {
        Self {
            current_rs: None,
            rs_change_pct: None,
            series: Vec::new(),
        }
    }
}

/// Relative strength of a stock against a benchmark index.
///
/// Both series are indexed to 100 at the first point of the window, then
/// `rs_t = stock_indexed_t / index_indexed_t`. Series of unequal length are
/// trimmed to the common tail.
pub fn compute_relative_strength(
    stock_prices: &[f64],
    index_prices: &[f64],
) -> RelativeStrengthResult {
    if stock_prices.is_empty() || index_prices.is_empty() {
        return RelativeStrengthResult::empty();
    }

    let min_len = stock_prices.len().min(index_prices.len());
    let stock = &stock_prices[stock_prices.len() - min_len..];
    let index = &index_prices[index_prices.len() - min_len..];

    if stock.len() < 2 {
        return RelativeStrengthResult::empty();
    }

    let stock_base = stock[0];
    let index_base = index[0];
    if stock_base <= 0.0 || index_base <= 0.0 {
        return RelativeStrengthResult::empty();
    }

    let series: Vec<RsPoint> = stock
        .iter()
        .zip(index.iter())
        .map(|(&sp, &ip)| {
            let stock_indexed = sp / stock_base * 100.0;
            let index_indexed = ip / index_base * 100.0;
            let rs_ratio = if index_indexed > 0.0 {
                Some(round4(stock_indexed / index_indexed))
            } else {
                None
            };
            RsPoint {
                stock_indexed: round2(stock_indexed),
                index_indexed: round2(index_indexed),
                rs_ratio,
            }
        })
        .collect();

    let current_rs = series.last().and_then(|p| p.rs_ratio);
    let first_rs = series.first().and_then(|p| p.rs_ratio);

    let rs_change_pct = match (current_rs, first_rs) {
        (Some(cur), Some(first)) if first > 0.0 => Some(round2((cur - first) / first * 100.0)),
        _ => None,
    };

    RelativeStrengthResult {
        current_rs,
        rs_change_pct,
        series,
    }
}

/// Percentile rank of one RS value among all tickers' RS values
/// (100 = strongest relative performer). Counts strictly-smaller entries.
pub fn compute_rs_percentile(ticker_rs: Option<f64>, all_rs_values: &[f64]) -> Option<i32> {
    let rs = ticker_rs?;
    if all_rs_values.is_empty() {
        return None;
    }

    let below = all_rs_values.iter().filter(|&&v| v < rs).count();
    let percentile = (below as f64 / all_rs_values.len() as f64 * 100.0).floor() as i32;
    Some(percentile.min(100))
}

// ---------------------------------------------------------------------------
// Sector rotation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectorRotationInput {
    pub sector: String,
    pub avg_rs_20d: Option<f64>,
    pub avg_rs_change: Option<f64>,
    pub stock_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SectorRotation {
    pub sector: String,
    pub avg_rs_20d: Option<f64>,
    pub avg_rs_change: Option<f64>,
    pub stock_count: usize,
    pub quadrant: &'static str,
}

/// Classify sectors into RRG-style rotation quadrants against the median RS
/// level and median RS change:
///   leading   - high RS, improving momentum
///   weakening - high RS, fading momentum
///   lagging   - low RS, fading momentum
///   improving - low RS, improving momentum
pub fn compute_sector_rotation(sectors: &[SectorRotationInput]) -> Vec<SectorRotation> {
    if sectors.is_empty() {
        return Vec::new();
    }

    let rs_values: Vec<f64> = sectors.iter().filter_map(|s| s.avg_rs_20d).collect();
    let change_values: Vec<f64> = sectors.iter().filter_map(|s| s.avg_rs_change).collect();

    if rs_values.is_empty() || change_values.is_empty() {
        return sectors
            .iter()
            .map(|s| SectorRotation {
                sector: s.sector.clone(),
                avg_rs_20d: s.avg_rs_20d,
                avg_rs_change: s.avg_rs_change,
                stock_count: s.stock_count,
                quadrant: "neutral",
            })
            .collect();
    }

    let rs_median = median(&rs_values);
    let change_median = median(&change_values);

    sectors
        .iter()
        .map(|s| {
            let quadrant = match (s.avg_rs_20d, s.avg_rs_change) {
                (Some(rs), Some(change)) => {
                    if rs >= rs_median && change >= change_median {
                        "leading"
                    } else if rs >= rs_median {
                        "weakening"
                    } else if change < change_median {
                        "lagging"
                    } else {
                        "improving"
                    }
                }
                _ => "neutral",
            };
            SectorRotation {
                sector: s.sector.clone(),
                avg_rs_20d: s.avg_rs_20d,
                avg_rs_change: s.avg_rs_change,
                stock_count: s.stock_count,
                quadrant,
            }
        })
        .collect()
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_series_give_rs_of_one() {
        let prices: Vec<f64> = (1..=30).map(|i| 1000.0 + i as f64 * 3.0).collect();
        let result = compute_relative_strength(&prices, &prices);
        for point in &result.series {
            assert_eq!(point.rs_ratio, Some(1.0));
        }
        assert_eq!(result.current_rs, Some(1.0));
        assert_eq!(result.rs_change_pct, Some(0.0));
    }

    #[test]
    fn outperformer_has_rs_above_one() {
        let stock: Vec<f64> = (0..20).map(|i| 100.0 * (1.0 + 0.01 * i as f64)).collect();
        let index: Vec<f64> = (0..20).map(|i| 100.0 * (1.0 + 0.002 * i as f64)).collect();
        let result = compute_relative_strength(&stock, &index);
        assert!(result.current_rs.unwrap() > 1.0);
        assert!(result.rs_change_pct.unwrap() > 0.0);
    }

    #[test]
    fn unequal_lengths_trim_to_common_tail() {
        let stock: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let index: Vec<f64> = (0..20).map(|i| 200.0 + i as f64).collect();
        let result = compute_relative_strength(&stock, &index);
        assert_eq!(result.series.len(), 20);
    }

    #[test]
    fn empty_or_short_input_is_neutral() {
        assert!(compute_relative_strength(&[], &[]).current_rs.is_none());
        assert!(compute_relative_strength(&[100.0], &[200.0]).current_rs.is_none());
        assert!(compute_relative_strength(&[0.0, 1.0], &[1.0, 2.0]).current_rs.is_none());
    }

    #[test]
    fn percentile_counts_strictly_below() {
        let all = vec![0.8, 0.9, 1.0, 1.1, 1.2];
        assert_eq!(compute_rs_percentile(Some(1.0), &all), Some(40));
        assert_eq!(compute_rs_percentile(Some(1.2), &all), Some(80));
        assert_eq!(compute_rs_percentile(Some(0.8), &all), Some(0));
        assert_eq!(compute_rs_percentile(Some(5.0), &all), Some(100));
    }

    #[test]
    fn percentile_is_monotonic() {
        let all: Vec<f64> = (0..50).map(|i| 0.5 + i as f64 * 0.02).collect();
        let mut last = -1;
        for &rs in &all {
            let pct = compute_rs_percentile(Some(rs), &all).unwrap();
            assert!(pct >= last, "percentile must not decrease");
            last = pct;
        }
    }

    #[test]
    fn percentile_none_inputs() {
        assert_eq!(compute_rs_percentile(None, &[1.0]), None);
        assert_eq!(compute_rs_percentile(Some(1.0), &[]), None);
    }

    #[test]
    fn rotation_quadrants() {
        let sectors = vec![
            SectorRotationInput {
                sector: "Semis".into(),
                avg_rs_20d: Some(1.2),
                avg_rs_change: Some(3.0),
                stock_count: 10,
            },
            SectorRotationInput {
                sector: "Banks".into(),
                avg_rs_20d: Some(1.1),
                avg_rs_change: Some(-2.0),
                stock_count: 8,
            },
            SectorRotationInput {
                sector: "Retail".into(),
                avg_rs_20d: Some(0.9),
                avg_rs_change: Some(-3.0),
                stock_count: 12,
            },
            SectorRotationInput {
                sector: "Bio".into(),
                avg_rs_20d: Some(0.8),
                avg_rs_change: Some(4.0),
                stock_count: 9,
            },
        ];

        let rotated = compute_sector_rotation(&sectors);
        let quadrant = |name: &str| {
            rotated
                .iter()
                .find(|r| r.sector == name)
                .map(|r| r.quadrant)
                .unwrap()
        };
        assert_eq!(quadrant("Semis"), "leading");
        assert_eq!(quadrant("Banks"), "weakening");
        assert_eq!(quadrant("Retail"), "lagging");
        assert_eq!(quadrant("Bio"), "improving");
    }

    #[test]
    fn rotation_without_data_is_neutral() {
        let sectors = vec![SectorRotationInput {
            sector: "Unknown".into(),
            avg_rs_20d: None,
            avg_rs_change: None,
            stock_count: 1,
        }];
        let rotated = compute_sector_rotation(&sectors);
        assert_eq!(rotated[0].quadrant, "neutral");
    }
}
