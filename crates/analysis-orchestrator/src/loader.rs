//! Read side of the time-series store.
//!
//! Every load is a read-only query against the partitioned input tables;
//! numeric columns are cast to double precision at the SQL boundary. The
//! loader never mutates the store.

use std::collections::HashMap;

use analysis_core::{AnalysisError, ClosePoint, FundamentalRow, InvestorFlowDay, Stock};
use chrono::{Duration, NaiveDate};
use quant_analysis::SectorMedians;
use sqlx::{PgPool, Row};

/// Calendar-day span loaded for price-based windows (technical, risk,
/// simulation all slice trading-day windows out of this).
pub const PRICE_HISTORY_DAYS: i64 = 400;

#[derive(Debug, Clone)]
pub struct PriceBar {
    pub trade_date: NaiveDate,
    pub close: f64,
    pub volume: i64,
}

pub struct Loader {
    pool: PgPool,
}

impl Loader {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Active tickers forming the input universe. A failure here is fatal to
    /// the run.
    pub async fn active_tickers(&self) -> Result<Vec<Stock>, AnalysisError> {
        let rows = sqlx::query(
            "SELECT ticker, name, market, is_active FROM stocks WHERE is_active = TRUE ORDER BY ticker",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows
            .iter()
            .map(|row| Stock {
                ticker: row.get("ticker"),
                name: row.get("name"),
                market: row.get("market"),
                is_active: row.get("is_active"),
            })
            .collect())
    }

    /// Full ticker -> sector reference dictionary.
    pub async fn sector_map(&self) -> Result<HashMap<String, String>, AnalysisError> {
        let rows = sqlx::query("SELECT ticker, sector FROM sector_mapping")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(rows
            .iter()
            .map(|row| (row.get("ticker"), row.get("sector")))
            .collect())
    }

    /// Median PBR / PER per sector from the target date's fundamental
    /// cross-section. Uses the lower-median convention.
    pub async fn sector_medians(
        &self,
        target_date: NaiveDate,
    ) -> Result<HashMap<String, SectorMedians>, AnalysisError> {
        let rows = sqlx::query(
            "SELECT sm.sector, f.pbr::float8 AS pbr, f.per::float8 AS per \
             FROM sector_mapping sm \
             JOIN fundamentals f ON f.ticker = sm.ticker AND f.trade_date = $1 \
             WHERE f.pbr IS NOT NULL",
        )
        .bind(target_date)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut pbr_by_sector: HashMap<String, Vec<f64>> = HashMap::new();
        let mut per_by_sector: HashMap<String, Vec<f64>> = HashMap::new();

        for row in &rows {
            let sector: String = row.get("sector");
            if let Some(pbr) = row.get::<Option<f64>, _>("pbr") {
                if pbr > 0.0 {
                    pbr_by_sector.entry(sector.clone()).or_default().push(pbr);
                }
            }
            if let Some(per) = row.get::<Option<f64>, _>("per") {
                if per > 0.0 {
                    per_by_sector.entry(sector.clone()).or_default().push(per);
                }
            }
        }

        let lower_median = |mut values: Vec<f64>| -> Option<f64> {
            if values.is_empty() {
                return None;
            }
            values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            Some(values[values.len() / 2])
        };

        let mut medians: HashMap<String, SectorMedians> = HashMap::new();
        for (sector, values) in pbr_by_sector {
            medians.entry(sector).or_default().median_pbr = lower_median(values);
        }
        for (sector, values) in per_by_sector {
            medians.entry(sector).or_default().median_per = lower_median(values);
        }

        Ok(medians)
    }

    /// Benchmark index closes over the price-history window, keyed by index
    /// code.
    pub async fn index_closes(
        &self,
        target_date: NaiveDate,
    ) -> Result<HashMap<String, Vec<ClosePoint>>, AnalysisError> {
        let start = target_date - Duration::days(PRICE_HISTORY_DAYS);
        let rows = sqlx::query(
            "SELECT trade_date, index_code, close::float8 AS close \
             FROM market_index \
             WHERE trade_date BETWEEN $1 AND $2 AND index_code IN ($3, $4) \
             ORDER BY trade_date",
        )
        .bind(start)
        .bind(target_date)
        .bind(analysis_core::INDEX_KOSPI)
        .bind(analysis_core::INDEX_KOSDAQ)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut closes: HashMap<String, Vec<ClosePoint>> = HashMap::new();
        for row in &rows {
            let code: String = row.get("index_code");
            closes.entry(code).or_default().push(ClosePoint {
                trade_date: row.get("trade_date"),
                close: row.get("close"),
            });
        }
        Ok(closes)
    }

    /// Close/volume history for one ticker, chronological, suspended rows
    /// (zero close) excluded.
    pub async fn price_history(
        &self,
        ticker: &str,
        target_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, AnalysisError> {
        let start = target_date - Duration::days(PRICE_HISTORY_DAYS);
        let rows = sqlx::query(
            "SELECT trade_date, close, volume FROM daily_ohlcv \
             WHERE ticker = $1 AND trade_date BETWEEN $2 AND $3 AND close > 0 \
             ORDER BY trade_date",
        )
        .bind(ticker)
        .bind(start)
        .bind(target_date)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows
            .iter()
            .map(|row| PriceBar {
                trade_date: row.get("trade_date"),
                close: row.get::<i64, _>("close") as f64,
                volume: row.get("volume"),
            })
            .collect())
    }

    /// Fundamentals exactly at the target date.
    pub async fn fundamental_at(
        &self,
        ticker: &str,
        target_date: NaiveDate,
    ) -> Result<Option<FundamentalRow>, AnalysisError> {
        let row = sqlx::query(
            "SELECT bps::float8 AS bps, per::float8 AS per, pbr::float8 AS pbr, \
                    eps::float8 AS eps, div::float8 AS div, dps::float8 AS dps, \
                    roe::float8 AS roe \
             FROM fundamentals WHERE ticker = $1 AND trade_date = $2",
        )
        .bind(ticker)
        .bind(target_date)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.map(|r| fundamental_from_row(&r)))
    }

    /// Most recent fundamentals at least a year old, for the YoY criteria.
    pub async fn fundamental_year_ago(
        &self,
        ticker: &str,
        target_date: NaiveDate,
    ) -> Result<Option<FundamentalRow>, AnalysisError> {
        let cutoff = target_date - Duration::days(365);
        let row = sqlx::query(
            "SELECT bps::float8 AS bps, per::float8 AS per, pbr::float8 AS pbr, \
                    eps::float8 AS eps, div::float8 AS div, dps::float8 AS dps, \
                    roe::float8 AS roe \
             FROM fundamentals WHERE ticker = $1 AND trade_date <= $2 \
             ORDER BY trade_date DESC LIMIT 1",
        )
        .bind(ticker)
        .bind(cutoff)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.map(|r| fundamental_from_row(&r)))
    }

    /// Per-investor-class net flows over a 2x lookback calendar window.
    pub async fn investor_flows(
        &self,
        ticker: &str,
        target_date: NaiveDate,
        lookback_days: usize,
    ) -> Result<Vec<InvestorFlowDay>, AnalysisError> {
        let start = target_date - Duration::days(lookback_days as i64 * 2);
        let rows = sqlx::query(
            "SELECT trade_date, institution_net, foreign_net, individual_net, pension_net, \
                    financial_invest_net, insurance_net, trust_net, private_equity_net, \
                    bank_net, other_financial_net, other_corp_net, other_foreign_net, total_net \
             FROM investor_trading \
             WHERE ticker = $1 AND trade_date BETWEEN $2 AND $3 \
             ORDER BY trade_date",
        )
        .bind(ticker)
        .bind(start)
        .bind(target_date)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows
            .iter()
            .map(|row| InvestorFlowDay {
                trade_date: row.get("trade_date"),
                institution_net: row.get("institution_net"),
                foreign_net: row.get("foreign_net"),
                individual_net: row.get("individual_net"),
                pension_net: row.get("pension_net"),
                financial_invest_net: row.get("financial_invest_net"),
                insurance_net: row.get("insurance_net"),
                trust_net: row.get("trust_net"),
                private_equity_net: row.get("private_equity_net"),
                bank_net: row.get("bank_net"),
                other_financial_net: row.get("other_financial_net"),
                other_corp_net: row.get("other_corp_net"),
                other_foreign_net: row.get("other_foreign_net"),
                total_net: row.get("total_net"),
            })
            .collect())
    }

    /// Average daily traded value over the same 2x lookback window.
    pub async fn avg_trading_value(
        &self,
        ticker: &str,
        target_date: NaiveDate,
        lookback_days: usize,
    ) -> Result<Option<f64>, AnalysisError> {
        let start = target_date - Duration::days(lookback_days as i64 * 2);
        let row = sqlx::query(
            "SELECT AVG(trading_value)::float8 AS avg_value FROM daily_ohlcv \
             WHERE ticker = $1 AND trade_date BETWEEN $2 AND $3",
        )
        .bind(ticker)
        .bind(start)
        .bind(target_date)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.get("avg_value"))
    }
}

fn fundamental_from_row(row: &sqlx::postgres::PgRow) -> FundamentalRow {
    FundamentalRow {
        bps: row.get("bps"),
        per: row.get("per"),
        pbr: row.get("pbr"),
        eps: row.get("eps"),
        div: row.get("div"),
        dps: row.get("dps"),
        roe: row.get("roe"),
    }
}

fn db_err(e: sqlx::Error) -> AnalysisError {
    AnalysisError::DatabaseError(e.to_string())
}
