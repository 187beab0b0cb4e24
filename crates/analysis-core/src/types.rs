use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Listed stock (input universe row).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stock {
    pub ticker: String,
    pub name: String,
    pub market: String,
    pub is_active: bool,
}

/// Daily OHLCV bar. Prices are integer KRW.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OhlcvBar {
    pub trade_date: NaiveDate,
    pub open: Option<i64>,
    pub high: Option<i64>,
    pub low: Option<i64>,
    pub close: i64,
    pub volume: i64,
    pub trading_value: Option<i64>,
    pub change_rate: Option<f64>,
}

/// Per-ticker fundamental cross-section for one trade date. Any field may be
/// missing depending on what the exchange published.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FundamentalRow {
    pub bps: Option<f64>,
    pub per: Option<f64>,
    pub pbr: Option<f64>,
    pub eps: Option<f64>,
    pub div: Option<f64>,
    pub dps: Option<f64>,
    pub roe: Option<f64>,
}

/// One trading day of per-investor-class net purchases (buy minus sell, KRW).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvestorFlowDay {
    pub trade_date: NaiveDate,
    pub institution_net: Option<i64>,
    pub foreign_net: Option<i64>,
    pub individual_net: Option<i64>,
    pub pension_net: Option<i64>,
    pub financial_invest_net: Option<i64>,
    pub insurance_net: Option<i64>,
    pub trust_net: Option<i64>,
    pub private_equity_net: Option<i64>,
    pub bank_net: Option<i64>,
    pub other_financial_net: Option<i64>,
    pub other_corp_net: Option<i64>,
    pub other_foreign_net: Option<i64>,
    pub total_net: Option<i64>,
}

impl InvestorFlowDay {
    /// Net value for a named whale investor class.
    pub fn net_for(&self, investor_type: &str) -> Option<i64> {
        match investor_type {
            "institution_net" => self.institution_net,
            "foreign_net" => self.foreign_net,
            "individual_net" => self.individual_net,
            "pension_net" => self.pension_net,
            "private_equity_net" => self.private_equity_net,
            "other_corp_net" => self.other_corp_net,
            _ => None,
        }
    }
}

/// Closing level of a market index on one trade date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexBar {
    pub trade_date: NaiveDate,
    pub index_code: String,
    pub close: f64,
    pub change_rate: Option<f64>,
}

/// Date-aligned closing price point.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClosePoint {
    pub trade_date: NaiveDate,
    pub close: f64,
}

/// Normalised news article flowing through the sentiment stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsArticle {
    pub ticker: String,
    pub title: String,
    pub description: Option<String>,
    pub source_url: String,
    pub source_name: String,
    pub published_at: DateTime<Utc>,
    /// earnings / analyst / disclosure / general
    pub article_type: String,
    /// financial / portal / general
    pub source_type: String,
    pub importance_weight: f64,
    pub sentiment_raw: Option<f64>,
    pub sentiment_label: Option<String>,
    pub sentiment_confidence: Option<f64>,
    pub scoring_method: Option<String>,
}

impl NewsArticle {
    /// Title + description, the text the classifier stages see.
    pub fn scoring_text(&self) -> String {
        match &self.description {
            Some(d) if !d.is_empty() => format!("{} {}", self.title, d),
            _ => self.title.clone(),
        }
    }

    pub fn is_pre_scored(&self) -> bool {
        self.scoring_method.is_some()
    }
}

/// Whale investor classes tracked by the accumulation-flow analysis.
pub const WHALE_INVESTOR_TYPES: [&str; 5] = [
    "institution_net",
    "foreign_net",
    "pension_net",
    "private_equity_net",
    "other_corp_net",
];

/// Benchmark index codes: KOSPI and KOSDAQ.
pub const INDEX_KOSPI: &str = "1001";
pub const INDEX_KOSDAQ: &str = "2001";
