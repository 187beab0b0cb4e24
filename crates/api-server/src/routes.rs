//! Route handlers. Each handler reads one snapshot category and renders it
//! as JSON; missing rows surface as 404.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::{PgPool, Row};

type ApiResult = Result<Json<Value>, (StatusCode, String)>;

fn parse_date(raw: &str) -> Result<NaiveDate, (StatusCode, String)> {
    NaiveDate::parse_from_str(raw, "%Y%m%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .map_err(|_| {
            (
                StatusCode::BAD_REQUEST,
                format!("invalid date '{raw}', expected YYYYMMDD"),
            )
        })
}

fn db_error(e: sqlx::Error) -> (StatusCode, String) {
    tracing::error!("query failed: {}", e);
    (StatusCode::INTERNAL_SERVER_ERROR, "database error".to_string())
}

fn not_found() -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, "snapshot not found".to_string())
}

pub async fn health(State(pool): State<PgPool>) -> ApiResult {
    let db_ok = sqlx::query("SELECT 1").fetch_one(&pool).await.is_ok();
    Ok(Json(json!({ "status": if db_ok { "ok" } else { "degraded" } })))
}

#[derive(Deserialize)]
pub struct RankingParams {
    #[serde(default = "default_limit")]
    limit: i64,
}

fn default_limit() -> i64 {
    50
}

pub async fn composite_ranking(
    State(pool): State<PgPool>,
    Path(date): Path<String>,
    Query(params): Query<RankingParams>,
) -> ApiResult {
    let date = parse_date(&date)?;
    let rows = sqlx::query(
        "SELECT ticker, composite_score::float8 AS composite_score, confluence_tier, \
                action_label, score_tier, score_label, axes_available, confidence::float8 AS confidence \
         FROM analysis_composite_snapshot \
         WHERE trade_date = $1 ORDER BY composite_score DESC LIMIT $2",
    )
    .bind(date)
    .bind(params.limit.clamp(1, 500))
    .fetch_all(&pool)
    .await
    .map_err(db_error)?;

    let ranking: Vec<Value> = rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            json!({
                "rank": i + 1,
                "ticker": row.get::<String, _>("ticker"),
                "composite_score": row.get::<Option<f64>, _>("composite_score"),
                "confluence_tier": row.get::<i32, _>("confluence_tier"),
                "action_label": row.get::<String, _>("action_label"),
                "score_tier": row.get::<String, _>("score_tier"),
                "score_label": row.get::<String, _>("score_label"),
                "axes_available": row.get::<i32, _>("axes_available"),
                "confidence": row.get::<Option<f64>, _>("confidence"),
            })
        })
        .collect();

    Ok(Json(json!({ "trade_date": date, "ranking": ranking })))
}

pub async fn composite_detail(
    State(pool): State<PgPool>,
    Path((date, ticker)): Path<(String, String)>,
) -> ApiResult {
    let date = parse_date(&date)?;
    let row = sqlx::query(
        "SELECT composite_score::float8 AS composite_score, value_score::float8 AS value_score, \
                flow_score::float8 AS flow_score, momentum_score::float8 AS momentum_score, \
                forecast_score::float8 AS forecast_score, \
                sentiment_score::float8 AS sentiment_score, weights_used, axes_available, \
                confidence::float8 AS confidence, confluence_tier, confluence_pattern, \
                value_signal, flow_signal, momentum_signal, forecast_signal, sentiment_signal, \
                divergence_type, divergence_severity, divergence_label, action_label, \
                action_description, score_tier, score_label, score_color \
         FROM analysis_composite_snapshot WHERE trade_date = $1 AND ticker = $2",
    )
    .bind(date)
    .bind(&ticker)
    .fetch_optional(&pool)
    .await
    .map_err(db_error)?
    .ok_or_else(not_found)?;

    Ok(Json(json!({
        "trade_date": date,
        "ticker": ticker,
        "composite_score": row.get::<Option<f64>, _>("composite_score"),
        "value_score": row.get::<Option<f64>, _>("value_score"),
        "flow_score": row.get::<Option<f64>, _>("flow_score"),
        "momentum_score": row.get::<Option<f64>, _>("momentum_score"),
        "forecast_score": row.get::<Option<f64>, _>("forecast_score"),
        "sentiment_score": row.get::<Option<f64>, _>("sentiment_score"),
        "weights_used": row.get::<Option<Value>, _>("weights_used"),
        "axes_available": row.get::<i32, _>("axes_available"),
        "confidence": row.get::<Option<f64>, _>("confidence"),
        "confluence": {
            "tier": row.get::<i32, _>("confluence_tier"),
            "pattern": row.get::<String, _>("confluence_pattern"),
            "signals": {
                "value": row.get::<String, _>("value_signal"),
                "flow": row.get::<String, _>("flow_signal"),
                "momentum": row.get::<String, _>("momentum_signal"),
                "forecast": row.get::<String, _>("forecast_signal"),
                "sentiment": row.get::<String, _>("sentiment_signal"),
            },
        },
        "divergence": {
            "type": row.get::<Option<String>, _>("divergence_type"),
            "severity": row.get::<Option<String>, _>("divergence_severity"),
            "label": row.get::<Option<String>, _>("divergence_label"),
        },
        "action": {
            "label": row.get::<String, _>("action_label"),
            "description": row.get::<String, _>("action_description"),
        },
        "tier": {
            "tier": row.get::<String, _>("score_tier"),
            "label": row.get::<String, _>("score_label"),
            "color": row.get::<String, _>("score_color"),
        },
    })))
}

pub async fn quant_detail(
    State(pool): State<PgPool>,
    Path((date, ticker)): Path<(String, String)>,
) -> ApiResult {
    let date = parse_date(&date)?;
    let row = sqlx::query(
        "SELECT rim_value::float8 AS rim_value, safety_margin::float8 AS safety_margin, \
                fscore, fscore_detail, investment_grade, \
                data_completeness::float8 AS data_completeness \
         FROM analysis_quant_snapshot WHERE trade_date = $1 AND ticker = $2",
    )
    .bind(date)
    .bind(&ticker)
    .fetch_optional(&pool)
    .await
    .map_err(db_error)?
    .ok_or_else(not_found)?;

    Ok(Json(json!({
        "trade_date": date,
        "ticker": ticker,
        "rim_value": row.get::<Option<f64>, _>("rim_value"),
        "safety_margin": row.get::<Option<f64>, _>("safety_margin"),
        "fscore": row.get::<i32, _>("fscore"),
        "fscore_detail": row.get::<Option<Value>, _>("fscore_detail"),
        "investment_grade": row.get::<String, _>("investment_grade"),
        "data_completeness": row.get::<Option<f64>, _>("data_completeness"),
    })))
}

pub async fn whale_detail(
    State(pool): State<PgPool>,
    Path((date, ticker)): Path<(String, String)>,
) -> ApiResult {
    let date = parse_date(&date)?;
    let row = sqlx::query(
        "SELECT whale_score::float8 AS whale_score, institution_net_20d, foreign_net_20d, \
                pension_net_20d, private_equity_net_20d, other_corp_net_20d, \
                institution_consistency::float8 AS institution_consistency, \
                foreign_consistency::float8 AS foreign_consistency, \
                pension_consistency::float8 AS pension_consistency, \
                private_equity_consistency::float8 AS private_equity_consistency, \
                other_corp_consistency::float8 AS other_corp_consistency, signal \
         FROM analysis_whale_snapshot WHERE trade_date = $1 AND ticker = $2",
    )
    .bind(date)
    .bind(&ticker)
    .fetch_optional(&pool)
    .await
    .map_err(db_error)?
    .ok_or_else(not_found)?;

    Ok(Json(json!({
        "trade_date": date,
        "ticker": ticker,
        "whale_score": row.get::<Option<f64>, _>("whale_score"),
        "signal": row.get::<String, _>("signal"),
        "net_20d": {
            "institution": row.get::<Option<i64>, _>("institution_net_20d"),
            "foreign": row.get::<Option<i64>, _>("foreign_net_20d"),
            "pension": row.get::<Option<i64>, _>("pension_net_20d"),
            "private_equity": row.get::<Option<i64>, _>("private_equity_net_20d"),
            "other_corp": row.get::<Option<i64>, _>("other_corp_net_20d"),
        },
        "consistency": {
            "institution": row.get::<Option<f64>, _>("institution_consistency"),
            "foreign": row.get::<Option<f64>, _>("foreign_consistency"),
            "pension": row.get::<Option<f64>, _>("pension_consistency"),
            "private_equity": row.get::<Option<f64>, _>("private_equity_consistency"),
            "other_corp": row.get::<Option<f64>, _>("other_corp_consistency"),
        },
    })))
}

pub async fn trend_detail(
    State(pool): State<PgPool>,
    Path((date, ticker)): Path<(String, String)>,
) -> ApiResult {
    let date = parse_date(&date)?;
    let row = sqlx::query(
        "SELECT rs_vs_kospi_20d::float8 AS rs_vs_kospi_20d, \
                rs_vs_kospi_60d::float8 AS rs_vs_kospi_60d, rs_percentile, sector \
         FROM analysis_trend_snapshot WHERE trade_date = $1 AND ticker = $2",
    )
    .bind(date)
    .bind(&ticker)
    .fetch_optional(&pool)
    .await
    .map_err(db_error)?
    .ok_or_else(not_found)?;

    Ok(Json(json!({
        "trade_date": date,
        "ticker": ticker,
        "rs_vs_kospi_20d": row.get::<Option<f64>, _>("rs_vs_kospi_20d"),
        "rs_vs_kospi_60d": row.get::<Option<f64>, _>("rs_vs_kospi_60d"),
        "rs_percentile": row.get::<Option<i32>, _>("rs_percentile"),
        "sector": row.get::<Option<String>, _>("sector"),
    })))
}

pub async fn flow_detail(
    State(pool): State<PgPool>,
    Path((date, ticker)): Path<(String, String)>,
) -> ApiResult {
    let date = parse_date(&date)?;
    let row = sqlx::query(
        "SELECT retail_z::float8 AS retail_z, retail_intensity::float8 AS retail_intensity, \
                retail_consistency::float8 AS retail_consistency, retail_signal, \
                smart_ratio::float8 AS smart_ratio, dumb_ratio::float8 AS dumb_ratio, \
                divergence_score::float8 AS divergence_score, divergence_signal, \
                shift_score::float8 AS shift_score, shift_signal \
         FROM analysis_flow_snapshot WHERE trade_date = $1 AND ticker = $2",
    )
    .bind(date)
    .bind(&ticker)
    .fetch_optional(&pool)
    .await
    .map_err(db_error)?
    .ok_or_else(not_found)?;

    Ok(Json(json!({
        "trade_date": date,
        "ticker": ticker,
        "retail": {
            "z_score": row.get::<Option<f64>, _>("retail_z"),
            "intensity": row.get::<Option<f64>, _>("retail_intensity"),
            "consistency": row.get::<Option<f64>, _>("retail_consistency"),
            "signal": row.get::<String, _>("retail_signal"),
        },
        "smart_dumb": {
            "smart_ratio": row.get::<Option<f64>, _>("smart_ratio"),
            "dumb_ratio": row.get::<Option<f64>, _>("dumb_ratio"),
            "divergence_score": row.get::<Option<f64>, _>("divergence_score"),
            "signal": row.get::<String, _>("divergence_signal"),
        },
        "momentum_shift": {
            "score": row.get::<Option<f64>, _>("shift_score"),
            "signal": row.get::<String, _>("shift_signal"),
        },
    })))
}

pub async fn technical_detail(
    State(pool): State<PgPool>,
    Path((date, ticker)): Path<(String, String)>,
) -> ApiResult {
    let date = parse_date(&date)?;
    let row = sqlx::query(
        "SELECT disparity_20d::float8 AS disparity_20d, disparity_60d::float8 AS disparity_60d, \
                disparity_120d::float8 AS disparity_120d, disparity_signal, \
                bb_upper::float8 AS bb_upper, bb_center::float8 AS bb_center, \
                bb_lower::float8 AS bb_lower, bb_bandwidth::float8 AS bb_bandwidth, \
                bb_percent_b::float8 AS bb_percent_b, bb_signal, macd::float8 AS macd, \
                macd_signal_line::float8 AS macd_signal_line, \
                macd_histogram::float8 AS macd_histogram, macd_crossover \
         FROM analysis_technical_snapshot WHERE trade_date = $1 AND ticker = $2",
    )
    .bind(date)
    .bind(&ticker)
    .fetch_optional(&pool)
    .await
    .map_err(db_error)?
    .ok_or_else(not_found)?;

    Ok(Json(json!({
        "trade_date": date,
        "ticker": ticker,
        "disparity": {
            "d20": row.get::<Option<f64>, _>("disparity_20d"),
            "d60": row.get::<Option<f64>, _>("disparity_60d"),
            "d120": row.get::<Option<f64>, _>("disparity_120d"),
            "signal": row.get::<String, _>("disparity_signal"),
        },
        "bollinger": {
            "upper": row.get::<Option<f64>, _>("bb_upper"),
            "center": row.get::<Option<f64>, _>("bb_center"),
            "lower": row.get::<Option<f64>, _>("bb_lower"),
            "bandwidth": row.get::<Option<f64>, _>("bb_bandwidth"),
            "percent_b": row.get::<Option<f64>, _>("bb_percent_b"),
            "signal": row.get::<String, _>("bb_signal"),
        },
        "macd": {
            "macd": row.get::<Option<f64>, _>("macd"),
            "signal_line": row.get::<Option<f64>, _>("macd_signal_line"),
            "histogram": row.get::<Option<f64>, _>("macd_histogram"),
            "crossover": row.get::<String, _>("macd_crossover"),
        },
    })))
}

pub async fn risk_detail(
    State(pool): State<PgPool>,
    Path((date, ticker)): Path<(String, String)>,
) -> ApiResult {
    let date = parse_date(&date)?;
    let row = sqlx::query(
        "SELECT volatility_20d::float8 AS volatility_20d, \
                volatility_60d::float8 AS volatility_60d, volatility_1y::float8 AS volatility_1y, \
                risk_level, beta_60d::float8 AS beta_60d, beta_252d::float8 AS beta_252d, \
                beta_interpretation, mdd_60d::float8 AS mdd_60d, mdd_1y::float8 AS mdd_1y, \
                current_drawdown::float8 AS current_drawdown, recovery_label \
         FROM analysis_risk_snapshot WHERE trade_date = $1 AND ticker = $2",
    )
    .bind(date)
    .bind(&ticker)
    .fetch_optional(&pool)
    .await
    .map_err(db_error)?
    .ok_or_else(not_found)?;

    Ok(Json(json!({
        "trade_date": date,
        "ticker": ticker,
        "volatility": {
            "v20": row.get::<Option<f64>, _>("volatility_20d"),
            "v60": row.get::<Option<f64>, _>("volatility_60d"),
            "v1y": row.get::<Option<f64>, _>("volatility_1y"),
            "risk_level": row.get::<String, _>("risk_level"),
        },
        "beta": {
            "b60": row.get::<Option<f64>, _>("beta_60d"),
            "b252": row.get::<Option<f64>, _>("beta_252d"),
            "interpretation": row.get::<String, _>("beta_interpretation"),
        },
        "drawdown": {
            "mdd_60d": row.get::<Option<f64>, _>("mdd_60d"),
            "mdd_1y": row.get::<Option<f64>, _>("mdd_1y"),
            "current": row.get::<Option<f64>, _>("current_drawdown"),
            "recovery_label": row.get::<String, _>("recovery_label"),
        },
    })))
}

pub async fn simulation_detail(
    State(pool): State<PgPool>,
    Path((date, ticker)): Path<(String, String)>,
) -> ApiResult {
    let date = parse_date(&date)?;
    let row = sqlx::query(
        "SELECT simulation_score::float8 AS simulation_score, simulation_grade, base_price, \
                mu::float8 AS mu, sigma::float8 AS sigma, num_simulations, input_days_used, \
                horizons, target_probs, model_breakdown, sentiment_applied \
         FROM analysis_simulation_snapshot WHERE trade_date = $1 AND ticker = $2",
    )
    .bind(date)
    .bind(&ticker)
    .fetch_optional(&pool)
    .await
    .map_err(db_error)?
    .ok_or_else(not_found)?;

    Ok(Json(json!({
        "trade_date": date,
        "ticker": ticker,
        "simulation_score": row.get::<Option<f64>, _>("simulation_score"),
        "simulation_grade": row.get::<Option<String>, _>("simulation_grade"),
        "base_price": row.get::<Option<i64>, _>("base_price"),
        "mu": row.get::<Option<f64>, _>("mu"),
        "sigma": row.get::<Option<f64>, _>("sigma"),
        "num_simulations": row.get::<Option<i32>, _>("num_simulations"),
        "input_days_used": row.get::<Option<i32>, _>("input_days_used"),
        "horizons": row.get::<Option<Value>, _>("horizons"),
        "target_probs": row.get::<Option<Value>, _>("target_probs"),
        "model_breakdown": row.get::<Option<Value>, _>("model_breakdown"),
        "sentiment_applied": row.get::<Option<bool>, _>("sentiment_applied"),
    })))
}

pub async fn news_detail(
    State(pool): State<PgPool>,
    Path((date, ticker)): Path<(String, String)>,
) -> ApiResult {
    let date = parse_date(&date)?;
    let row = sqlx::query(
        "SELECT sentiment_score::float8 AS sentiment_score, direction::float8 AS direction, \
                intensity::float8 AS intensity, confidence::float8 AS confidence, \
                effective_score::float8 AS effective_score, sentiment_signal, article_count, \
                status, source_breakdown \
         FROM analysis_news_snapshot WHERE trade_date = $1 AND ticker = $2",
    )
    .bind(date)
    .bind(&ticker)
    .fetch_optional(&pool)
    .await
    .map_err(db_error)?
    .ok_or_else(not_found)?;

    Ok(Json(json!({
        "trade_date": date,
        "ticker": ticker,
        "sentiment_score": row.get::<Option<f64>, _>("sentiment_score"),
        "direction": row.get::<Option<f64>, _>("direction"),
        "intensity": row.get::<Option<f64>, _>("intensity"),
        "confidence": row.get::<Option<f64>, _>("confidence"),
        "effective_score": row.get::<Option<f64>, _>("effective_score"),
        "signal": row.get::<String, _>("sentiment_signal"),
        "article_count": row.get::<Option<i32>, _>("article_count"),
        "status": row.get::<String, _>("status"),
        "source_breakdown": row.get::<Option<Value>, _>("source_breakdown"),
    })))
}

pub async fn sector_flow_list(
    State(pool): State<PgPool>,
    Path(date): Path<String>,
) -> ApiResult {
    let date = parse_date(&date)?;
    let rows = sqlx::query(
        "SELECT sector, investor_type, net_purchase, intensity::float8 AS intensity, \
                consistency::float8 AS consistency, signal, trend_5d, trend_20d, stock_count \
         FROM analysis_sector_flow_snapshot WHERE trade_date = $1 \
         ORDER BY sector, investor_type",
    )
    .bind(date)
    .fetch_all(&pool)
    .await
    .map_err(db_error)?;

    if rows.is_empty() {
        return Err(not_found());
    }

    let flows: Vec<Value> = rows
        .iter()
        .map(|row| {
            json!({
                "sector": row.get::<String, _>("sector"),
                "investor_type": row.get::<String, _>("investor_type"),
                "net_purchase": row.get::<Option<i64>, _>("net_purchase"),
                "intensity": row.get::<Option<f64>, _>("intensity"),
                "consistency": row.get::<Option<f64>, _>("consistency"),
                "signal": row.get::<String, _>("signal"),
                "trend_5d": row.get::<Option<i64>, _>("trend_5d"),
                "trend_20d": row.get::<Option<i64>, _>("trend_20d"),
                "stock_count": row.get::<Option<i32>, _>("stock_count"),
            })
        })
        .collect();

    Ok(Json(json!({ "trade_date": date, "flows": flows })))
}
