//! Read-only JSON API over the analysis snapshot tables.
//!
//! Every endpoint serves whatever the engine persisted; a missing snapshot
//! is a 404. There are no write paths.

pub mod routes;

use axum::routing::get;
use axum::Router;
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn build_router(pool: PgPool) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/api/composite/:date/ranking", get(routes::composite_ranking))
        .route("/api/composite/:date/:ticker", get(routes::composite_detail))
        .route("/api/quant/:date/:ticker", get(routes::quant_detail))
        .route("/api/whale/:date/:ticker", get(routes::whale_detail))
        .route("/api/trend/:date/:ticker", get(routes::trend_detail))
        .route("/api/flow/:date/:ticker", get(routes::flow_detail))
        .route("/api/technical/:date/:ticker", get(routes::technical_detail))
        .route("/api/risk/:date/:ticker", get(routes::risk_detail))
        .route("/api/simulation/:date/:ticker", get(routes::simulation_detail))
        .route("/api/news/:date/:ticker", get(routes::news_detail))
        .route("/api/sector-flow/:date", get(routes::sector_flow_list))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(pool)
}
