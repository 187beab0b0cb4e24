//! Sector-level whale flow aggregation.
//!
//! Groups tickers by sector and aggregates each whale investor class across
//! the sector, producing one row per (sector, investor_type).

use std::collections::{BTreeMap, HashMap};

use analysis_core::{InvestorFlowDay, WHALE_INVESTOR_TYPES};
use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct SectorFlowStat {
    pub sector: String,
    pub investor_type: &'static str,
    pub net_purchase: i64,
    pub intensity: f64,
    pub consistency: f64,
    pub signal: &'static str,
    pub trend_5d: i64,
    pub trend_20d: i64,
    pub stock_count: i32,
}

impl SectorFlowStat {
    fn empty(sector: &str, investor_type: &'static str, stock_count: i32) -> Self {
        Self {
            sector: sector.to_string(),
            investor_type,
            net_purchase: 0,
            intensity: 0.0,
            consistency: 0.0,
            signal: "neutral",
            trend_5d: 0,
            trend_20d: 0,
            stock_count,
        }
    }
}

/// Aggregate per-ticker investor flows into (sector, investor_type) rows.
///
/// For each pair: net purchase summed across the sector, buy-day consistency,
/// intensity normalised by the sector's aggregate daily trading value, and
/// 5-day vs full-window trend sums.
pub fn compute_sector_flows(
    sector_map: &HashMap<String, String>,
    investor_data: &HashMap<String, Vec<InvestorFlowDay>>,
    trading_values: &HashMap<String, f64>,
    lookback_days: usize,
) -> Vec<SectorFlowStat> {
    let mut sector_tickers: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (ticker, sector) in sector_map {
        if !sector.is_empty() && investor_data.contains_key(ticker) {
            sector_tickers.entry(sector).or_default().push(ticker);
        }
    }

    let mut results = Vec::new();

    for (sector, tickers) in sector_tickers {
        let stock_count = tickers.len() as i32;
        if stock_count == 0 {
            continue;
        }

        let sector_trading_value: f64 = tickers
            .iter()
            .map(|t| trading_values.get(*t).copied().unwrap_or(0.0))
            .sum();

        for investor_type in WHALE_INVESTOR_TYPES {
            // date -> sector-wide net for this class
            let mut daily_flows: BTreeMap<NaiveDate, i64> = BTreeMap::new();

            for ticker in &tickers {
                let rows = &investor_data[*ticker];
                let mut sorted = rows.clone();
                sorted.sort_by_key(|r| r.trade_date);
                for row in sorted.iter().rev().take(lookback_days) {
                    if let Some(val) = row.net_for(investor_type) {
                        *daily_flows.entry(row.trade_date).or_insert(0) += val;
                    }
                }
            }

            if daily_flows.is_empty() {
                results.push(SectorFlowStat::empty(sector, investor_type, stock_count));
                continue;
            }

            let flows: Vec<i64> = daily_flows.values().copied().collect();
            let total_days = flows.len();

            let net_purchase: i64 = flows.iter().sum();
            let buy_days = flows.iter().filter(|&&f| f > 0).count();
            let consistency = buy_days as f64 / total_days as f64;

            let intensity = if sector_trading_value > 0.0 {
                let avg_daily_net = net_purchase.abs() as f64 / total_days as f64;
                (avg_daily_net / sector_trading_value).min(1.0)
            } else {
                0.0
            };

            let signal = classify_sector_flow_signal(consistency, intensity, net_purchase);

            let trend_5d = if flows.len() >= 5 {
                flows[flows.len() - 5..].iter().sum()
            } else {
                net_purchase
            };

            results.push(SectorFlowStat {
                sector: sector.to_string(),
                investor_type,
                net_purchase,
                intensity: (intensity * 10_000.0).round() / 10_000.0,
                consistency: (consistency * 100.0).round() / 100.0,
                signal,
                trend_5d,
                trend_20d: net_purchase,
                stock_count,
            });
        }
    }

    results
}

fn classify_sector_flow_signal(
    consistency: f64,
    intensity: f64,
    net_purchase: i64,
) -> &'static str {
    if net_purchase > 0 && consistency >= 0.7 && intensity >= 0.3 {
        "strong_accumulation"
    } else if net_purchase > 0 && consistency >= 0.5 {
        "mild_accumulation"
    } else if net_purchase < 0 && consistency <= 0.3 {
        "distribution"
    } else {
        "neutral"
    }
}

/// Composite-score bonus per sector: +15 for any strong accumulation row,
/// +5 per mild accumulation row, capped at 15 per sector.
pub fn compute_sector_flow_bonus(flows: &[SectorFlowStat]) -> HashMap<String, f64> {
    let mut bonuses: HashMap<String, f64> = HashMap::new();

    for row in flows {
        let bonus = match row.signal {
            "strong_accumulation" => 15.0,
            "mild_accumulation" => 5.0,
            _ => 0.0,
        };
        if bonus > 0.0 {
            let entry = bonuses.entry(row.sector.clone()).or_insert(0.0);
            *entry = (*entry + bonus).min(15.0);
        }
    }

    bonuses
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flow_day(offset: i64, institution: i64) -> InvestorFlowDay {
        InvestorFlowDay {
            trade_date: NaiveDate::from_ymd_opt(2026, 4, 1).unwrap()
                + chrono::Duration::days(offset),
            institution_net: Some(institution),
            ..Default::default()
        }
    }

    fn fixture() -> (
        HashMap<String, String>,
        HashMap<String, Vec<InvestorFlowDay>>,
        HashMap<String, f64>,
    ) {
        let mut sector_map = HashMap::new();
        sector_map.insert("005930".to_string(), "Semiconductors".to_string());
        sector_map.insert("000660".to_string(), "Semiconductors".to_string());

        let mut investor_data = HashMap::new();
        investor_data.insert(
            "005930".to_string(),
            (0..20).map(|i| flow_day(i, 2_000_000_000)).collect(),
        );
        investor_data.insert(
            "000660".to_string(),
            (0..20).map(|i| flow_day(i, 1_000_000_000)).collect(),
        );

        let mut trading_values = HashMap::new();
        trading_values.insert("005930".to_string(), 5_000_000_000.0);
        trading_values.insert("000660".to_string(), 3_000_000_000.0);

        (sector_map, investor_data, trading_values)
    }

    #[test]
    fn aggregates_one_row_per_investor_type() {
        let (sector_map, investor_data, trading_values) = fixture();
        let flows = compute_sector_flows(&sector_map, &investor_data, &trading_values, 20);
        assert_eq!(flows.len(), 5);
        assert!(flows.iter().all(|f| f.sector == "Semiconductors"));
        assert!(flows.iter().all(|f| f.stock_count == 2));
    }

    #[test]
    fn strong_accumulation_on_consistent_sector_buying() {
        let (sector_map, investor_data, trading_values) = fixture();
        let flows = compute_sector_flows(&sector_map, &investor_data, &trading_values, 20);

        let inst = flows
            .iter()
            .find(|f| f.investor_type == "institution_net")
            .unwrap();
        // 3e9/day vs 8e9 sector trading value: intensity 0.375, consistency 1.0.
        assert_eq!(inst.signal, "strong_accumulation");
        assert_eq!(inst.net_purchase, 60_000_000_000);
        assert_eq!(inst.trend_5d, 15_000_000_000);
        assert_eq!(inst.trend_20d, 60_000_000_000);
    }

    #[test]
    fn classes_without_data_emit_neutral_rows() {
        let (sector_map, investor_data, trading_values) = fixture();
        let flows = compute_sector_flows(&sector_map, &investor_data, &trading_values, 20);
        let pension = flows
            .iter()
            .find(|f| f.investor_type == "pension_net")
            .unwrap();
        assert_eq!(pension.signal, "neutral");
        assert_eq!(pension.net_purchase, 0);
    }

    #[test]
    fn bonus_capped_at_fifteen() {
        let flows = vec![
            SectorFlowStat {
                signal: "strong_accumulation",
                ..SectorFlowStat::empty("Autos", "institution_net", 3)
            },
            SectorFlowStat {
                signal: "strong_accumulation",
                ..SectorFlowStat::empty("Autos", "foreign_net", 3)
            },
            SectorFlowStat {
                signal: "mild_accumulation",
                ..SectorFlowStat::empty("Banks", "pension_net", 2)
            },
        ];

        let bonuses = compute_sector_flow_bonus(&flows);
        assert_eq!(bonuses.get("Autos"), Some(&15.0));
        assert_eq!(bonuses.get("Banks"), Some(&5.0));
    }

    #[test]
    fn distribution_signal_on_persistent_selling() {
        let mut sector_map = HashMap::new();
        sector_map.insert("035420".to_string(), "Internet".to_string());
        let mut investor_data = HashMap::new();
        investor_data.insert(
            "035420".to_string(),
            (0..20).map(|i| flow_day(i, -1_000_000_000)).collect::<Vec<_>>(),
        );
        let mut trading_values = HashMap::new();
        trading_values.insert("035420".to_string(), 4_000_000_000.0);

        let flows = compute_sector_flows(&sector_map, &investor_data, &trading_values, 20);
        let inst = flows
            .iter()
            .find(|f| f.investor_type == "institution_net")
            .unwrap();
        assert_eq!(inst.signal, "distribution");
    }
}
