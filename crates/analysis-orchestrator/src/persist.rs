//! Batched snapshot persistence.
//!
//! Every category is upserted in fixed-size batches with
//! `INSERT ... ON CONFLICT (pk) DO UPDATE` so that re-running the engine for
//! the same date deterministically replaces the previous rows. A failed
//! batch is logged and abandoned; the remaining batches and categories
//! continue.

use analysis_core::{
    CompositeSnapshot, FlowSnapshot, NewsArticle, NewsSnapshot, QuantSnapshot, RiskSnapshot,
    SectorFlowSnapshot, SimulationSnapshot, TechnicalSnapshot, TrendSnapshot, WhaleSnapshot,
};
use sqlx::{PgPool, Postgres, QueryBuilder};

const BATCH_SIZE: usize = 1000;

pub struct Persister {
    pool: PgPool,
}

impl Persister {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run `build` per batch; a batch error is logged and skipped.
    async fn upsert_batches<T, F>(&self, category: &str, rows: &[T], build: F) -> usize
    where
        F: Fn(&[T]) -> QueryBuilder<'static, Postgres>,
    {
        let mut total = 0;
        for batch in rows.chunks(BATCH_SIZE) {
            let mut builder = build(batch);
            match builder.build().execute(&self.pool).await {
                Ok(_) => total += batch.len(),
                Err(e) => {
                    tracing::error!("persist {}: batch of {} failed: {}", category, batch.len(), e);
                }
            }
        }
        if total > 0 {
            tracing::info!("persist {}: {} rows", category, total);
        }
        total
    }

    pub async fn quant(&self, rows: &[QuantSnapshot]) -> usize {
        self.upsert_batches("quant", rows, |batch| {
            let mut qb = QueryBuilder::new(
                "INSERT INTO analysis_quant_snapshot \
                 (trade_date, ticker, rim_value, safety_margin, fscore, fscore_detail, \
                  investment_grade, data_completeness) ",
            );
            qb.push_values(batch, |mut b, row| {
                b.push_bind(row.trade_date)
                    .push_bind(row.ticker.clone())
                    .push_bind(row.rim_value)
                    .push_bind(row.safety_margin)
                    .push_bind(row.fscore)
                    .push_bind(row.fscore_detail.clone())
                    .push_bind(row.investment_grade.clone())
                    .push_bind(row.data_completeness);
            });
            qb.push(
                " ON CONFLICT (trade_date, ticker) DO UPDATE SET \
                 rim_value = EXCLUDED.rim_value, safety_margin = EXCLUDED.safety_margin, \
                 fscore = EXCLUDED.fscore, fscore_detail = EXCLUDED.fscore_detail, \
                 investment_grade = EXCLUDED.investment_grade, \
                 data_completeness = EXCLUDED.data_completeness",
            );
            qb
        })
        .await
    }

    pub async fn whale(&self, rows: &[WhaleSnapshot]) -> usize {
        self.upsert_batches("whale", rows, |batch| {
            let mut qb = QueryBuilder::new(
                "INSERT INTO analysis_whale_snapshot \
                 (trade_date, ticker, whale_score, institution_net_20d, foreign_net_20d, \
                  pension_net_20d, private_equity_net_20d, other_corp_net_20d, \
                  institution_consistency, foreign_consistency, pension_consistency, \
                  private_equity_consistency, other_corp_consistency, signal) ",
            );
            qb.push_values(batch, |mut b, row| {
                b.push_bind(row.trade_date)
                    .push_bind(row.ticker.clone())
                    .push_bind(row.whale_score)
                    .push_bind(row.institution_net_20d)
                    .push_bind(row.foreign_net_20d)
                    .push_bind(row.pension_net_20d)
                    .push_bind(row.private_equity_net_20d)
                    .push_bind(row.other_corp_net_20d)
                    .push_bind(row.institution_consistency)
                    .push_bind(row.foreign_consistency)
                    .push_bind(row.pension_consistency)
                    .push_bind(row.private_equity_consistency)
                    .push_bind(row.other_corp_consistency)
                    .push_bind(row.signal.clone());
            });
            qb.push(
                " ON CONFLICT (trade_date, ticker) DO UPDATE SET \
                 whale_score = EXCLUDED.whale_score, \
                 institution_net_20d = EXCLUDED.institution_net_20d, \
                 foreign_net_20d = EXCLUDED.foreign_net_20d, \
                 pension_net_20d = EXCLUDED.pension_net_20d, \
                 private_equity_net_20d = EXCLUDED.private_equity_net_20d, \
                 other_corp_net_20d = EXCLUDED.other_corp_net_20d, \
                 institution_consistency = EXCLUDED.institution_consistency, \
                 foreign_consistency = EXCLUDED.foreign_consistency, \
                 pension_consistency = EXCLUDED.pension_consistency, \
                 private_equity_consistency = EXCLUDED.private_equity_consistency, \
                 other_corp_consistency = EXCLUDED.other_corp_consistency, \
                 signal = EXCLUDED.signal",
            );
            qb
        })
        .await
    }

    pub async fn trend(&self, rows: &[TrendSnapshot]) -> usize {
        self.upsert_batches("trend", rows, |batch| {
            let mut qb = QueryBuilder::new(
                "INSERT INTO analysis_trend_snapshot \
                 (trade_date, ticker, rs_vs_kospi_20d, rs_vs_kospi_60d, rs_percentile, sector) ",
            );
            qb.push_values(batch, |mut b, row| {
                b.push_bind(row.trade_date)
                    .push_bind(row.ticker.clone())
                    .push_bind(row.rs_vs_kospi_20d)
                    .push_bind(row.rs_vs_kospi_60d)
                    .push_bind(row.rs_percentile)
                    .push_bind(row.sector.clone());
            });
            qb.push(
                " ON CONFLICT (trade_date, ticker) DO UPDATE SET \
                 rs_vs_kospi_20d = EXCLUDED.rs_vs_kospi_20d, \
                 rs_vs_kospi_60d = EXCLUDED.rs_vs_kospi_60d, \
                 rs_percentile = EXCLUDED.rs_percentile, sector = EXCLUDED.sector",
            );
            qb
        })
        .await
    }

    pub async fn flow(&self, rows: &[FlowSnapshot]) -> usize {
        self.upsert_batches("flow", rows, |batch| {
            let mut qb = QueryBuilder::new(
                "INSERT INTO analysis_flow_snapshot \
                 (trade_date, ticker, retail_z, retail_intensity, retail_consistency, \
                  retail_signal, smart_ratio, dumb_ratio, divergence_score, divergence_signal, \
                  shift_score, shift_signal) ",
            );
            qb.push_values(batch, |mut b, row| {
                b.push_bind(row.trade_date)
                    .push_bind(row.ticker.clone())
                    .push_bind(row.retail_z)
                    .push_bind(row.retail_intensity)
                    .push_bind(row.retail_consistency)
                    .push_bind(row.retail_signal.clone())
                    .push_bind(row.smart_ratio)
                    .push_bind(row.dumb_ratio)
                    .push_bind(row.divergence_score)
                    .push_bind(row.divergence_signal.clone())
                    .push_bind(row.shift_score)
                    .push_bind(row.shift_signal.clone());
            });
            qb.push(
                " ON CONFLICT (trade_date, ticker) DO UPDATE SET \
                 retail_z = EXCLUDED.retail_z, retail_intensity = EXCLUDED.retail_intensity, \
                 retail_consistency = EXCLUDED.retail_consistency, \
                 retail_signal = EXCLUDED.retail_signal, smart_ratio = EXCLUDED.smart_ratio, \
                 dumb_ratio = EXCLUDED.dumb_ratio, divergence_score = EXCLUDED.divergence_score, \
                 divergence_signal = EXCLUDED.divergence_signal, \
                 shift_score = EXCLUDED.shift_score, shift_signal = EXCLUDED.shift_signal",
            );
            qb
        })
        .await
    }

    pub async fn technical(&self, rows: &[TechnicalSnapshot]) -> usize {
        self.upsert_batches("technical", rows, |batch| {
            let mut qb = QueryBuilder::new(
                "INSERT INTO analysis_technical_snapshot \
                 (trade_date, ticker, disparity_20d, disparity_60d, disparity_120d, \
                  disparity_signal, bb_upper, bb_center, bb_lower, bb_bandwidth, bb_percent_b, \
                  bb_signal, macd, macd_signal_line, macd_histogram, macd_crossover) ",
            );
            qb.push_values(batch, |mut b, row| {
                b.push_bind(row.trade_date)
                    .push_bind(row.ticker.clone())
                    .push_bind(row.disparity_20d)
                    .push_bind(row.disparity_60d)
                    .push_bind(row.disparity_120d)
                    .push_bind(row.disparity_signal.clone())
                    .push_bind(row.bb_upper)
                    .push_bind(row.bb_center)
                    .push_bind(row.bb_lower)
                    .push_bind(row.bb_bandwidth)
                    .push_bind(row.bb_percent_b)
                    .push_bind(row.bb_signal.clone())
                    .push_bind(row.macd)
                    .push_bind(row.macd_signal_line)
                    .push_bind(row.macd_histogram)
                    .push_bind(row.macd_crossover.clone());
            });
            qb.push(
                " ON CONFLICT (trade_date, ticker) DO UPDATE SET \
                 disparity_20d = EXCLUDED.disparity_20d, disparity_60d = EXCLUDED.disparity_60d, \
                 disparity_120d = EXCLUDED.disparity_120d, \
                 disparity_signal = EXCLUDED.disparity_signal, bb_upper = EXCLUDED.bb_upper, \
                 bb_center = EXCLUDED.bb_center, bb_lower = EXCLUDED.bb_lower, \
                 bb_bandwidth = EXCLUDED.bb_bandwidth, bb_percent_b = EXCLUDED.bb_percent_b, \
                 bb_signal = EXCLUDED.bb_signal, macd = EXCLUDED.macd, \
                 macd_signal_line = EXCLUDED.macd_signal_line, \
                 macd_histogram = EXCLUDED.macd_histogram, \
                 macd_crossover = EXCLUDED.macd_crossover",
            );
            qb
        })
        .await
    }

    pub async fn risk(&self, rows: &[RiskSnapshot]) -> usize {
        self.upsert_batches("risk", rows, |batch| {
            let mut qb = QueryBuilder::new(
                "INSERT INTO analysis_risk_snapshot \
                 (trade_date, ticker, volatility_20d, volatility_60d, volatility_1y, risk_level, \
                  beta_60d, beta_252d, beta_interpretation, mdd_60d, mdd_1y, current_drawdown, \
                  recovery_label) ",
            );
            qb.push_values(batch, |mut b, row| {
                b.push_bind(row.trade_date)
                    .push_bind(row.ticker.clone())
                    .push_bind(row.volatility_20d)
                    .push_bind(row.volatility_60d)
                    .push_bind(row.volatility_1y)
                    .push_bind(row.risk_level.clone())
                    .push_bind(row.beta_60d)
                    .push_bind(row.beta_252d)
                    .push_bind(row.beta_interpretation.clone())
                    .push_bind(row.mdd_60d)
                    .push_bind(row.mdd_1y)
                    .push_bind(row.current_drawdown)
                    .push_bind(row.recovery_label.clone());
            });
            qb.push(
                " ON CONFLICT (trade_date, ticker) DO UPDATE SET \
                 volatility_20d = EXCLUDED.volatility_20d, \
                 volatility_60d = EXCLUDED.volatility_60d, \
                 volatility_1y = EXCLUDED.volatility_1y, risk_level = EXCLUDED.risk_level, \
                 beta_60d = EXCLUDED.beta_60d, beta_252d = EXCLUDED.beta_252d, \
                 beta_interpretation = EXCLUDED.beta_interpretation, \
                 mdd_60d = EXCLUDED.mdd_60d, mdd_1y = EXCLUDED.mdd_1y, \
                 current_drawdown = EXCLUDED.current_drawdown, \
                 recovery_label = EXCLUDED.recovery_label",
            );
            qb
        })
        .await
    }

    pub async fn sector_flow(&self, rows: &[SectorFlowSnapshot]) -> usize {
        self.upsert_batches("sector_flow", rows, |batch| {
            let mut qb = QueryBuilder::new(
                "INSERT INTO analysis_sector_flow_snapshot \
                 (trade_date, sector, investor_type, net_purchase, intensity, consistency, \
                  signal, trend_5d, trend_20d, stock_count) ",
            );
            qb.push_values(batch, |mut b, row| {
                b.push_bind(row.trade_date)
                    .push_bind(row.sector.clone())
                    .push_bind(row.investor_type.clone())
                    .push_bind(row.net_purchase)
                    .push_bind(row.intensity)
                    .push_bind(row.consistency)
                    .push_bind(row.signal.clone())
                    .push_bind(row.trend_5d)
                    .push_bind(row.trend_20d)
                    .push_bind(row.stock_count);
            });
            qb.push(
                " ON CONFLICT (trade_date, sector, investor_type) DO UPDATE SET \
                 net_purchase = EXCLUDED.net_purchase, intensity = EXCLUDED.intensity, \
                 consistency = EXCLUDED.consistency, signal = EXCLUDED.signal, \
                 trend_5d = EXCLUDED.trend_5d, trend_20d = EXCLUDED.trend_20d, \
                 stock_count = EXCLUDED.stock_count",
            );
            qb
        })
        .await
    }

    pub async fn simulation(&self, rows: &[SimulationSnapshot]) -> usize {
        self.upsert_batches("simulation", rows, |batch| {
            let mut qb = QueryBuilder::new(
                "INSERT INTO analysis_simulation_snapshot \
                 (trade_date, ticker, simulation_score, simulation_grade, base_price, mu, sigma, \
                  num_simulations, input_days_used, horizons, target_probs, model_breakdown, \
                  sentiment_applied) ",
            );
            qb.push_values(batch, |mut b, row| {
                b.push_bind(row.trade_date)
                    .push_bind(row.ticker.clone())
                    .push_bind(row.simulation_score)
                    .push_bind(row.simulation_grade.clone())
                    .push_bind(row.base_price)
                    .push_bind(row.mu)
                    .push_bind(row.sigma)
                    .push_bind(row.num_simulations)
                    .push_bind(row.input_days_used)
                    .push_bind(row.horizons.clone())
                    .push_bind(row.target_probs.clone())
                    .push_bind(row.model_breakdown.clone())
                    .push_bind(row.sentiment_applied);
            });
            qb.push(
                " ON CONFLICT (trade_date, ticker) DO UPDATE SET \
                 simulation_score = EXCLUDED.simulation_score, \
                 simulation_grade = EXCLUDED.simulation_grade, \
                 base_price = EXCLUDED.base_price, mu = EXCLUDED.mu, sigma = EXCLUDED.sigma, \
                 num_simulations = EXCLUDED.num_simulations, \
                 input_days_used = EXCLUDED.input_days_used, horizons = EXCLUDED.horizons, \
                 target_probs = EXCLUDED.target_probs, \
                 model_breakdown = EXCLUDED.model_breakdown, \
                 sentiment_applied = EXCLUDED.sentiment_applied",
            );
            qb
        })
        .await
    }

    pub async fn news(&self, rows: &[NewsSnapshot]) -> usize {
        self.upsert_batches("news", rows, |batch| {
            let mut qb = QueryBuilder::new(
                "INSERT INTO analysis_news_snapshot \
                 (trade_date, ticker, sentiment_score, direction, intensity, confidence, \
                  effective_score, sentiment_signal, article_count, status, source_breakdown) ",
            );
            qb.push_values(batch, |mut b, row| {
                b.push_bind(row.trade_date)
                    .push_bind(row.ticker.clone())
                    .push_bind(row.sentiment_score)
                    .push_bind(row.direction)
                    .push_bind(row.intensity)
                    .push_bind(row.confidence)
                    .push_bind(row.effective_score)
                    .push_bind(row.sentiment_signal.clone())
                    .push_bind(row.article_count)
                    .push_bind(row.status.clone())
                    .push_bind(row.source_breakdown.clone());
            });
            qb.push(
                " ON CONFLICT (trade_date, ticker) DO UPDATE SET \
                 sentiment_score = EXCLUDED.sentiment_score, direction = EXCLUDED.direction, \
                 intensity = EXCLUDED.intensity, confidence = EXCLUDED.confidence, \
                 effective_score = EXCLUDED.effective_score, \
                 sentiment_signal = EXCLUDED.sentiment_signal, \
                 article_count = EXCLUDED.article_count, status = EXCLUDED.status, \
                 source_breakdown = EXCLUDED.source_breakdown",
            );
            qb
        })
        .await
    }

    /// Article rows are idempotent on the (ticker, source_url) unique key.
    pub async fn articles(&self, rows: &[NewsArticle]) -> usize {
        self.upsert_batches("articles", rows, |batch| {
            let mut qb = QueryBuilder::new(
                "INSERT INTO news_articles \
                 (ticker, title, description, source_url, source_name, published_at, \
                  sentiment_raw, sentiment_label, sentiment_confidence, scoring_method, \
                  article_type, source_type, importance_weight) ",
            );
            qb.push_values(batch, |mut b, row| {
                b.push_bind(row.ticker.clone())
                    .push_bind(row.title.clone())
                    .push_bind(row.description.clone())
                    .push_bind(row.source_url.clone())
                    .push_bind(row.source_name.clone())
                    .push_bind(row.published_at)
                    .push_bind(row.sentiment_raw)
                    .push_bind(row.sentiment_label.clone())
                    .push_bind(row.sentiment_confidence)
                    .push_bind(row.scoring_method.clone())
                    .push_bind(row.article_type.clone())
                    .push_bind(row.source_type.clone())
                    .push_bind(row.importance_weight);
            });
            qb.push(
                " ON CONFLICT ON CONSTRAINT uq_news_ticker_url DO UPDATE SET \
                 title = EXCLUDED.title, description = EXCLUDED.description, \
                 source_name = EXCLUDED.source_name, published_at = EXCLUDED.published_at, \
                 sentiment_raw = EXCLUDED.sentiment_raw, \
                 sentiment_label = EXCLUDED.sentiment_label, \
                 sentiment_confidence = EXCLUDED.sentiment_confidence, \
                 scoring_method = EXCLUDED.scoring_method, \
                 article_type = EXCLUDED.article_type, source_type = EXCLUDED.source_type, \
                 importance_weight = EXCLUDED.importance_weight",
            );
            qb
        })
        .await
    }

    pub async fn composite(&self, rows: &[CompositeSnapshot]) -> usize {
        self.upsert_batches("composite", rows, |batch| {
            let mut qb = QueryBuilder::new(
                "INSERT INTO analysis_composite_snapshot \
                 (trade_date, ticker, composite_score, value_score, flow_score, momentum_score, \
                  forecast_score, sentiment_score, weights_used, axes_available, confidence, \
                  confluence_tier, confluence_pattern, value_signal, flow_signal, \
                  momentum_signal, forecast_signal, sentiment_signal, divergence_type, \
                  divergence_severity, divergence_label, action_label, action_description, \
                  score_tier, score_label, score_color) ",
            );
            qb.push_values(batch, |mut b, row| {
                b.push_bind(row.trade_date)
                    .push_bind(row.ticker.clone())
                    .push_bind(row.composite_score)
                    .push_bind(row.value_score)
                    .push_bind(row.flow_score)
                    .push_bind(row.momentum_score)
                    .push_bind(row.forecast_score)
                    .push_bind(row.sentiment_score)
                    .push_bind(row.weights_used.clone())
                    .push_bind(row.axes_available)
                    .push_bind(row.confidence)
                    .push_bind(row.confluence_tier)
                    .push_bind(row.confluence_pattern.clone())
                    .push_bind(row.value_signal.clone())
                    .push_bind(row.flow_signal.clone())
                    .push_bind(row.momentum_signal.clone())
                    .push_bind(row.forecast_signal.clone())
                    .push_bind(row.sentiment_signal.clone())
                    .push_bind(row.divergence_type.clone())
                    .push_bind(row.divergence_severity.clone())
                    .push_bind(row.divergence_label.clone())
                    .push_bind(row.action_label.clone())
                    .push_bind(row.action_description.clone())
                    .push_bind(row.score_tier.clone())
                    .push_bind(row.score_label.clone())
                    .push_bind(row.score_color.clone());
            });
            qb.push(
                " ON CONFLICT (trade_date, ticker) DO UPDATE SET \
                 composite_score = EXCLUDED.composite_score, \
                 value_score = EXCLUDED.value_score, flow_score = EXCLUDED.flow_score, \
                 momentum_score = EXCLUDED.momentum_score, \
                 forecast_score = EXCLUDED.forecast_score, \
                 sentiment_score = EXCLUDED.sentiment_score, \
                 weights_used = EXCLUDED.weights_used, \
                 axes_available = EXCLUDED.axes_available, confidence = EXCLUDED.confidence, \
                 confluence_tier = EXCLUDED.confluence_tier, \
                 confluence_pattern = EXCLUDED.confluence_pattern, \
                 value_signal = EXCLUDED.value_signal, flow_signal = EXCLUDED.flow_signal, \
                 momentum_signal = EXCLUDED.momentum_signal, \
                 forecast_signal = EXCLUDED.forecast_signal, \
                 sentiment_signal = EXCLUDED.sentiment_signal, \
                 divergence_type = EXCLUDED.divergence_type, \
                 divergence_severity = EXCLUDED.divergence_severity, \
                 divergence_label = EXCLUDED.divergence_label, \
                 action_label = EXCLUDED.action_label, \
                 action_description = EXCLUDED.action_description, \
                 score_tier = EXCLUDED.score_tier, score_label = EXCLUDED.score_label, \
                 score_color = EXCLUDED.score_color",
            );
            qb
        })
        .await
    }
}
