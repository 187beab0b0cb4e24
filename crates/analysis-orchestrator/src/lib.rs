//! Daily analysis engine orchestration: loading, per-ticker pipeline,
//! cross-ticker passes, news sentiment, Monte-Carlo simulation, composite
//! synthesis, and snapshot persistence.

pub mod composite_stage;
pub mod cross;
pub mod engine;
pub mod loader;
pub mod news_stage;
pub mod persist;
pub mod pipeline;
pub mod simulation_stage;

pub use engine::AnalysisEngine;
