//! Snapshot rows produced by one engine run for one target date.
//!
//! Every snapshot is keyed on (trade_date, ticker), except the sector flow
//! snapshot which is keyed on (trade_date, sector, investor_type). Re-running
//! the engine for the same date overwrites the previous rows via upsert.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuantSnapshot {
    pub trade_date: NaiveDate,
    pub ticker: String,
    pub rim_value: Option<f64>,
    pub safety_margin: Option<f64>,
    pub fscore: i32,
    /// Nine per-criterion entries (name, score, value, note).
    pub fscore_detail: Value,
    pub investment_grade: String,
    pub data_completeness: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhaleSnapshot {
    pub trade_date: NaiveDate,
    pub ticker: String,
    pub whale_score: f64,
    pub institution_net_20d: Option<i64>,
    pub foreign_net_20d: Option<i64>,
    pub pension_net_20d: Option<i64>,
    pub private_equity_net_20d: Option<i64>,
    pub other_corp_net_20d: Option<i64>,
    pub institution_consistency: Option<f64>,
    pub foreign_consistency: Option<f64>,
    pub pension_consistency: Option<f64>,
    pub private_equity_consistency: Option<f64>,
    pub other_corp_consistency: Option<f64>,
    pub signal: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendSnapshot {
    pub trade_date: NaiveDate,
    pub ticker: String,
    pub rs_vs_kospi_20d: Option<f64>,
    pub rs_vs_kospi_60d: Option<f64>,
    /// Filled by the cross-ticker pass after all tickers are processed.
    pub rs_percentile: Option<i32>,
    pub sector: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowSnapshot {
    pub trade_date: NaiveDate,
    pub ticker: String,
    pub retail_z: f64,
    pub retail_intensity: f64,
    pub retail_consistency: f64,
    pub retail_signal: String,
    pub smart_ratio: f64,
    pub dumb_ratio: f64,
    pub divergence_score: f64,
    pub divergence_signal: String,
    pub shift_score: f64,
    pub shift_signal: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnicalSnapshot {
    pub trade_date: NaiveDate,
    pub ticker: String,
    pub disparity_20d: Option<f64>,
    pub disparity_60d: Option<f64>,
    pub disparity_120d: Option<f64>,
    pub disparity_signal: String,
    pub bb_upper: Option<f64>,
    pub bb_center: Option<f64>,
    pub bb_lower: Option<f64>,
    pub bb_bandwidth: Option<f64>,
    pub bb_percent_b: Option<f64>,
    pub bb_signal: String,
    pub macd: Option<f64>,
    pub macd_signal_line: Option<f64>,
    pub macd_histogram: Option<f64>,
    pub macd_crossover: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskSnapshot {
    pub trade_date: NaiveDate,
    pub ticker: String,
    pub volatility_20d: Option<f64>,
    pub volatility_60d: Option<f64>,
    pub volatility_1y: Option<f64>,
    pub risk_level: String,
    pub beta_60d: Option<f64>,
    pub beta_252d: Option<f64>,
    pub beta_interpretation: String,
    pub mdd_60d: Option<f64>,
    pub mdd_1y: Option<f64>,
    pub current_drawdown: Option<f64>,
    pub recovery_label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationSnapshot {
    pub trade_date: NaiveDate,
    pub ticker: String,
    pub simulation_score: Option<f64>,
    pub simulation_grade: Option<String>,
    pub base_price: i64,
    pub mu: f64,
    pub sigma: f64,
    pub num_simulations: i32,
    pub input_days_used: i32,
    /// Per-horizon percentile statistics keyed by horizon days.
    pub horizons: Value,
    /// Target-multiplier probability table keyed by multiplier.
    pub target_probs: Value,
    /// Per-model sub-score and final ensemble weight; None for single-model runs.
    pub model_breakdown: Option<Value>,
    pub sentiment_applied: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsSnapshot {
    pub trade_date: NaiveDate,
    pub ticker: String,
    pub sentiment_score: f64,
    pub direction: f64,
    pub intensity: f64,
    pub confidence: f64,
    pub effective_score: f64,
    pub sentiment_signal: String,
    pub article_count: i32,
    /// active / insufficient / no_data
    pub status: String,
    pub source_breakdown: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectorFlowSnapshot {
    pub trade_date: NaiveDate,
    pub sector: String,
    pub investor_type: String,
    pub net_purchase: i64,
    pub intensity: f64,
    pub consistency: f64,
    pub signal: String,
    pub trend_5d: i64,
    pub trend_20d: i64,
    pub stock_count: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeSnapshot {
    pub trade_date: NaiveDate,
    pub ticker: String,
    pub composite_score: f64,
    pub value_score: Option<f64>,
    pub flow_score: Option<f64>,
    pub momentum_score: Option<f64>,
    pub forecast_score: Option<f64>,
    pub sentiment_score: Option<f64>,
    pub weights_used: Value,
    pub axes_available: i32,
    pub confidence: f64,
    pub confluence_tier: i32,
    pub confluence_pattern: String,
    pub value_signal: String,
    pub flow_signal: String,
    pub momentum_signal: String,
    pub forecast_signal: String,
    pub sentiment_signal: String,
    pub divergence_type: Option<String>,
    pub divergence_severity: Option<String>,
    pub divergence_label: Option<String>,
    pub action_label: String,
    pub action_description: String,
    pub score_tier: String,
    pub score_label: String,
    pub score_color: String,
}

/// Per-category persisted row counts returned by a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub quant: usize,
    pub whale: usize,
    pub trend: usize,
    pub flow: usize,
    pub technical: usize,
    pub risk: usize,
    pub sector_flow: usize,
    pub news: usize,
    pub articles: usize,
    pub simulation: usize,
    pub composite: usize,
}
