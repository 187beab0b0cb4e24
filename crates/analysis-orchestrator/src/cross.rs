//! Cross-ticker passes: RS percentile ranking, sector rotation quadrants,
//! and sector-flow aggregation. These run after the per-ticker pipeline has
//! completed for the whole universe.

use std::collections::HashMap;

use analysis_core::{InvestorFlowDay, SectorFlowSnapshot, TrendSnapshot};
use chrono::NaiveDate;
use flow_analysis::{compute_sector_flow_bonus, compute_sector_flows};
use trend_analysis::{
    compute_rs_percentile, compute_sector_rotation, SectorRotationInput,
};

/// Fill each ticker's RS percentile from the distribution of all tickers'
/// 20-day RS values.
pub fn fill_rs_percentiles(trend_rows: &mut [TrendSnapshot]) {
    let all_rs: Vec<f64> = trend_rows
        .iter()
        .filter_map(|row| row.rs_vs_kospi_20d)
        .collect();

    for row in trend_rows.iter_mut() {
        row.rs_percentile = compute_rs_percentile(row.rs_vs_kospi_20d, &all_rs);
    }
}

/// Classify sectors into rotation quadrants from the per-ticker RS levels
/// and changes, then hand each ticker its sector's quadrant.
pub fn sector_quadrants(
    trend_rows: &[TrendSnapshot],
    rs_changes: &HashMap<String, f64>,
) -> HashMap<String, &'static str> {
    struct SectorAccum {
        rs: Vec<f64>,
        change: Vec<f64>,
        count: usize,
    }

    let mut by_sector: HashMap<String, SectorAccum> = HashMap::new();
    for row in trend_rows {
        let Some(sector) = &row.sector else { continue };
        let entry = by_sector.entry(sector.clone()).or_insert(SectorAccum {
            rs: Vec::new(),
            change: Vec::new(),
            count: 0,
        });
        entry.count += 1;
        if let Some(rs) = row.rs_vs_kospi_20d {
            entry.rs.push(rs);
        }
        if let Some(change) = rs_changes.get(&row.ticker) {
            entry.change.push(*change);
        }
    }

    let inputs: Vec<SectorRotationInput> = by_sector
        .iter()
        .map(|(sector, accum)| SectorRotationInput {
            sector: sector.clone(),
            avg_rs_20d: mean(&accum.rs),
            avg_rs_change: mean(&accum.change),
            stock_count: accum.count,
        })
        .collect();

    compute_sector_rotation(&inputs)
        .into_iter()
        .map(|rotation| (rotation.sector, rotation.quadrant))
        .collect()
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Sector-flow aggregation plus the per-sector composite bonus.
pub fn sector_flow_pass(
    target_date: NaiveDate,
    sector_map: &HashMap<String, String>,
    investor_data: &HashMap<String, Vec<InvestorFlowDay>>,
    trading_values: &HashMap<String, f64>,
    lookback_days: usize,
) -> (Vec<SectorFlowSnapshot>, HashMap<String, f64>) {
    let stats = compute_sector_flows(sector_map, investor_data, trading_values, lookback_days);
    let bonuses = compute_sector_flow_bonus(&stats);

    let snapshots = stats
        .into_iter()
        .map(|stat| SectorFlowSnapshot {
            trade_date: target_date,
            sector: stat.sector,
            investor_type: stat.investor_type.to_string(),
            net_purchase: stat.net_purchase,
            intensity: stat.intensity,
            consistency: stat.consistency,
            signal: stat.signal.to_string(),
            trend_5d: stat.trend_5d,
            trend_20d: stat.trend_20d,
            stock_count: stat.stock_count,
        })
        .collect();

    (snapshots, bonuses)
}
