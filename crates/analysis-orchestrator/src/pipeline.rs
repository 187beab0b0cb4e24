//! Per-ticker analysis pipeline.
//!
//! Runs the numeric kernels in dependency order for one ticker and produces
//! one row per analytical axis. Failures are reported to the caller, which
//! logs and skips the ticker; a single ticker never aborts the run.

use std::collections::HashMap;

use analysis_core::{
    AnalysisError, ClosePoint, EngineConfig, FlowSnapshot, InvestorFlowDay, QuantSnapshot,
    RiskSnapshot, TechnicalSnapshot, TrendSnapshot, WhaleSnapshot, INDEX_KOSPI,
};
use chrono::NaiveDate;
use quant_analysis::SectorMedians;

use crate::loader::Loader;

/// Everything the later stages need for one ticker: the six axis rows plus
/// the raw windows the cross-ticker passes and the simulation stage consume.
#[derive(Debug, Default)]
pub struct TickerArtifacts {
    pub quant: Option<QuantSnapshot>,
    pub whale: Option<WhaleSnapshot>,
    pub trend: Option<TrendSnapshot>,
    pub flow: Option<FlowSnapshot>,
    pub technical: Option<TechnicalSnapshot>,
    pub risk: Option<RiskSnapshot>,
    /// 20-day RS change, kept for the sector rotation pass (not persisted).
    pub rs_change_pct: Option<f64>,
    /// Chronological clean closes for the simulation stage.
    pub prices: Vec<f64>,
    /// Raw investor window for the sector-flow aggregation.
    pub investor_rows: Vec<InvestorFlowDay>,
    pub avg_trading_value: Option<f64>,
}

pub async fn compute_ticker(
    loader: &Loader,
    config: &EngineConfig,
    ticker: &str,
    target_date: NaiveDate,
    sector_map: &HashMap<String, String>,
    sector_medians: &HashMap<String, SectorMedians>,
    index_closes: &HashMap<String, Vec<ClosePoint>>,
) -> Result<TickerArtifacts, AnalysisError> {
    let mut artifacts = TickerArtifacts::default();

    let bars = loader.price_history(ticker, target_date).await?;
    artifacts.prices = bars.iter().map(|b| b.close).collect();

    // Date-align stock closes with the KOSPI benchmark.
    let kospi: HashMap<NaiveDate, f64> = index_closes
        .get(INDEX_KOSPI)
        .map(|points| points.iter().map(|p| (p.trade_date, p.close)).collect())
        .unwrap_or_default();

    let mut aligned_stock: Vec<f64> = Vec::with_capacity(bars.len());
    let mut aligned_index: Vec<f64> = Vec::with_capacity(bars.len());
    for bar in &bars {
        if let Some(&index_close) = kospi.get(&bar.trade_date) {
            aligned_stock.push(bar.close);
            aligned_index.push(index_close);
        }
    }

    // --- Quant -----------------------------------------------------------
    if let Some(current) = loader.fundamental_at(ticker, target_date).await? {
        let previous = loader.fundamental_year_ago(ticker, target_date).await?;

        let volume_window = &bars[bars.len().saturating_sub(40)..];
        let volume_current = volume_window.last().map(|b| b.volume);
        let volume_previous = if volume_window.len() > 20 {
            volume_window.first().map(|b| b.volume)
        } else {
            None
        };

        let current_price = bars
            .last()
            .filter(|b| b.trade_date == target_date)
            .map(|b| b.close as i64);

        let rim = quant_analysis::compute_rim(
            current.bps,
            current.roe,
            config.risk_free_rate,
            config.equity_risk_premium,
            0.0,
        );
        let margin = quant_analysis::compute_safety_margin(rim.rim_value, current_price);
        let fscore = quant_analysis::compute_fscore(
            Some(&current),
            previous.as_ref(),
            sector_map.get(ticker).and_then(|s| sector_medians.get(s)),
            volume_current,
            volume_previous,
        );
        let grade = quant_analysis::compute_investment_grade(
            fscore.total_score,
            margin.safety_margin_pct,
            fscore.data_completeness,
        );

        artifacts.quant = Some(QuantSnapshot {
            trade_date: target_date,
            ticker: ticker.to_string(),
            rim_value: rim.rim_value,
            safety_margin: margin.safety_margin_pct,
            fscore: fscore.total_score,
            fscore_detail: serde_json::to_value(&fscore.criteria)
                .map_err(|e| AnalysisError::CalculationError(e.to_string()))?,
            investment_grade: grade.grade.to_string(),
            data_completeness: fscore.data_completeness,
        });
    }

    // --- Whale + behavioural flow ---------------------------------------
    let investor_rows = loader
        .investor_flows(ticker, target_date, config.whale_lookback_days)
        .await?;

    if !investor_rows.is_empty() {
        let avg_tv = loader
            .avg_trading_value(ticker, target_date, config.whale_lookback_days)
            .await?;

        let whale = flow_analysis::compute_whale_score(
            &investor_rows,
            avg_tv,
            config.whale_lookback_days,
        );
        let net_20d = |t: &str| whale.component(t).filter(|c| c.has_data()).map(|c| c.net_total);
        let consistency =
            |t: &str| whale.component(t).filter(|c| c.has_data()).map(|c| c.consistency);

        artifacts.whale = Some(WhaleSnapshot {
            trade_date: target_date,
            ticker: ticker.to_string(),
            whale_score: whale.whale_score,
            institution_net_20d: net_20d("institution_net"),
            foreign_net_20d: net_20d("foreign_net"),
            pension_net_20d: net_20d("pension_net"),
            private_equity_net_20d: net_20d("private_equity_net"),
            other_corp_net_20d: net_20d("other_corp_net"),
            institution_consistency: consistency("institution_net"),
            foreign_consistency: consistency("foreign_net"),
            pension_consistency: consistency("pension_net"),
            private_equity_consistency: consistency("private_equity_net"),
            other_corp_consistency: consistency("other_corp_net"),
            signal: whale.signal.to_string(),
        });

        let retail = flow_analysis::compute_retail_contrarian(
            &investor_rows,
            avg_tv,
            config.whale_lookback_days,
        );
        let divergence = flow_analysis::compute_smart_dumb_divergence(
            &investor_rows,
            avg_tv,
            config.whale_lookback_days,
        );
        let shift = flow_analysis::compute_flow_momentum_shift(&investor_rows, 5, 60);

        artifacts.flow = Some(FlowSnapshot {
            trade_date: target_date,
            ticker: ticker.to_string(),
            retail_z: retail.retail_z,
            retail_intensity: retail.retail_intensity,
            retail_consistency: retail.retail_consistency,
            retail_signal: retail.signal.to_string(),
            smart_ratio: divergence.smart_ratio,
            dumb_ratio: divergence.dumb_ratio,
            divergence_score: divergence.divergence_score,
            divergence_signal: divergence.signal.to_string(),
            shift_score: shift.shift_score,
            shift_signal: shift.overall_signal.to_string(),
        });

        artifacts.avg_trading_value = avg_tv;
        artifacts.investor_rows = investor_rows;
    }

    // --- Trend -----------------------------------------------------------
    if aligned_stock.len() >= 5 {
        let rs_20d = if aligned_stock.len() >= 20 {
            let window = &aligned_stock[aligned_stock.len() - 20..];
            let index_window = &aligned_index[aligned_index.len() - 20..];
            let result = trend_analysis::compute_relative_strength(window, index_window);
            artifacts.rs_change_pct = result.rs_change_pct;
            result.current_rs
        } else {
            None
        };

        let rs_60d = if aligned_stock.len() >= 60 {
            let window = &aligned_stock[aligned_stock.len() - 60..];
            let index_window = &aligned_index[aligned_index.len() - 60..];
            trend_analysis::compute_relative_strength(window, index_window).current_rs
        } else {
            None
        };

        artifacts.trend = Some(TrendSnapshot {
            trade_date: target_date,
            ticker: ticker.to_string(),
            rs_vs_kospi_20d: rs_20d,
            rs_vs_kospi_60d: rs_60d,
            rs_percentile: None, // filled by the cross-ticker pass
            sector: sector_map.get(ticker).cloned(),
        });
    }

    // --- Technical --------------------------------------------------------
    if !artifacts.prices.is_empty() {
        let disparity = technical_analysis::compute_disparity(&artifacts.prices);
        let bollinger = technical_analysis::compute_bollinger(&artifacts.prices, 20, 2.0);
        let macd = technical_analysis::compute_macd(&artifacts.prices, 12, 26, 9);

        artifacts.technical = Some(TechnicalSnapshot {
            trade_date: target_date,
            ticker: ticker.to_string(),
            disparity_20d: disparity.disparity_20d,
            disparity_60d: disparity.disparity_60d,
            disparity_120d: disparity.disparity_120d,
            disparity_signal: disparity.signal.to_string(),
            bb_upper: bollinger.upper,
            bb_center: bollinger.center,
            bb_lower: bollinger.lower,
            bb_bandwidth: bollinger.bandwidth,
            bb_percent_b: bollinger.percent_b,
            bb_signal: bollinger.signal.to_string(),
            macd: macd.macd,
            macd_signal_line: macd.signal_line,
            macd_histogram: macd.histogram,
            macd_crossover: macd.crossover.to_string(),
        });
    }

    // --- Risk -------------------------------------------------------------
    if artifacts.prices.len() >= 2 {
        let volatility = risk_analysis::compute_volatility(&artifacts.prices);
        let beta = risk_analysis::compute_beta(&aligned_stock, &aligned_index);
        let drawdown = risk_analysis::compute_max_drawdown(&artifacts.prices);

        artifacts.risk = Some(RiskSnapshot {
            trade_date: target_date,
            ticker: ticker.to_string(),
            volatility_20d: volatility.volatility_20d,
            volatility_60d: volatility.volatility_60d,
            volatility_1y: volatility.volatility_1y,
            risk_level: volatility.risk_level.to_string(),
            beta_60d: beta.beta_60d,
            beta_252d: beta.beta_252d,
            beta_interpretation: beta.interpretation.to_string(),
            mdd_60d: drawdown.mdd_60d,
            mdd_1y: drawdown.mdd_1y,
            current_drawdown: drawdown.current_drawdown,
            recovery_label: drawdown.recovery_label.to_string(),
        });
    }

    Ok(artifacts)
}
