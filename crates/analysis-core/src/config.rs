//! Engine configuration, read once from `WB_`-prefixed environment variables.

use crate::error::AnalysisError;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub database_url: String,

    // Valuation
    pub risk_free_rate: f64,
    pub equity_risk_premium: f64,

    // Accumulation flow
    pub whale_lookback_days: usize,

    // Monte-Carlo simulation
    pub num_simulations: usize,
    pub sim_workers: usize,
    pub min_history_days: usize,
    pub max_annualized_sigma: f64,
    pub weight_gbm: f64,
    pub weight_garch: f64,
    pub weight_heston: f64,
    pub weight_merton: f64,
    pub garch_p: usize,
    pub garch_q: usize,
    pub heston_kappa: f64,
    pub heston_theta: f64,
    pub heston_xi: f64,
    pub heston_rho: f64,
    pub merton_lambda: f64,
    pub merton_mu_j: f64,
    pub merton_sigma_j: f64,

    // News sentiment
    pub news_enabled: bool,
    pub news_concurrency: usize,
    pub news_request_delay_ms: u64,
    pub news_lookback_days: i64,
    pub news_half_life_days: f64,
    pub news_min_articles: usize,
    pub sentiment_alpha: f64,
    pub sentiment_beta: f64,
    pub sentiment_delta: f64,
    pub sentiment_gamma_lambda: f64,
    pub sentiment_gamma_mu: f64,
    pub classifier_confidence_threshold: f64,
    pub llm_batch_mode: bool,
    pub llm_max_escalations: usize,
    pub llm_concurrency: usize,
    pub llm_batch_poll_ceiling_secs: u64,

    // External credentials
    pub naver_client_id: String,
    pub naver_client_secret: String,
    pub dart_api_key: String,
    pub anthropic_api_key: String,

    // Read API
    pub api_bind_addr: String,
}

impl EngineConfig {
    /// Build from environment. Only the database URL is required; everything
    /// else falls back to the documented default.
    pub fn from_env() -> Result<Self, AnalysisError> {
        let database_url = match std::env::var("WB_DATABASE_URL") {
            Ok(url) => url,
            Err(_) => {
                // Assemble from components the way the deployment scripts set them.
                let host = env_or("WB_DB_HOST", "localhost");
                let port = env_or("WB_DB_PORT", "5432");
                let name = env_or("WB_DB_NAME", "whaleback");
                let user = env_or("WB_DB_USER", "whaleback");
                let password = std::env::var("WB_DB_PASSWORD").map_err(|_| {
                    AnalysisError::ConfigError(
                        "WB_DATABASE_URL or WB_DB_PASSWORD must be set".to_string(),
                    )
                })?;
                format!("postgres://{user}:{password}@{host}:{port}/{name}")
            }
        };

        Ok(Self {
            database_url,
            risk_free_rate: env_parse("WB_RISK_FREE_RATE", 0.035)?,
            equity_risk_premium: env_parse("WB_EQUITY_RISK_PREMIUM", 0.065)?,
            whale_lookback_days: env_parse("WB_WHALE_LOOKBACK_DAYS", 20)?,
            num_simulations: env_parse("WB_NUM_SIMULATIONS", 10_000)?,
            sim_workers: env_parse("WB_SIM_WORKERS", 4)?,
            min_history_days: env_parse("WB_MIN_HISTORY_DAYS", 60)?,
            max_annualized_sigma: env_parse("WB_MAX_ANNUALIZED_SIGMA", 1.50)?,
            weight_gbm: env_parse("WB_SIM_WEIGHT_GBM", 0.25)?,
            weight_garch: env_parse("WB_SIM_WEIGHT_GARCH", 0.30)?,
            weight_heston: env_parse("WB_SIM_WEIGHT_HESTON", 0.20)?,
            weight_merton: env_parse("WB_SIM_WEIGHT_MERTON", 0.25)?,
            garch_p: env_parse("WB_GARCH_P", 1)?,
            garch_q: env_parse("WB_GARCH_Q", 1)?,
            heston_kappa: env_parse("WB_HESTON_KAPPA", 2.0)?,
            heston_theta: env_parse("WB_HESTON_THETA", 0.04)?,
            heston_xi: env_parse("WB_HESTON_XI", 0.3)?,
            heston_rho: env_parse("WB_HESTON_RHO", -0.7)?,
            merton_lambda: env_parse("WB_MERTON_LAMBDA", 3.0)?,
            merton_mu_j: env_parse("WB_MERTON_MU_J", 0.0)?,
            merton_sigma_j: env_parse("WB_MERTON_SIGMA_J", 0.06)?,
            news_enabled: env_parse("WB_NEWS_ENABLED", true)?,
            news_concurrency: env_parse("WB_NEWS_CONCURRENCY", 3)?,
            news_request_delay_ms: env_parse("WB_NEWS_REQUEST_DELAY_MS", 350)?,
            news_lookback_days: env_parse("WB_NEWS_LOOKBACK_DAYS", 14)?,
            news_half_life_days: env_parse("WB_NEWS_HALF_LIFE_DAYS", 3.0)?,
            news_min_articles: env_parse("WB_NEWS_MIN_ARTICLES", 2)?,
            sentiment_alpha: env_parse("WB_SENTIMENT_ALPHA", 0.08)?,
            sentiment_beta: env_parse("WB_SENTIMENT_BETA", 0.15)?,
            sentiment_delta: env_parse("WB_SENTIMENT_DELTA", 0.50)?,
            sentiment_gamma_lambda: env_parse("WB_SENTIMENT_GAMMA_LAMBDA", 1.50)?,
            sentiment_gamma_mu: env_parse("WB_SENTIMENT_GAMMA_MU", 0.03)?,
            classifier_confidence_threshold: env_parse("WB_CLASSIFIER_CONFIDENCE_THRESHOLD", 0.70)?,
            llm_batch_mode: env_parse("WB_LLM_BATCH_MODE", false)?,
            llm_max_escalations: env_parse("WB_LLM_MAX_ESCALATIONS", 200)?,
            llm_concurrency: env_parse("WB_LLM_CONCURRENCY", 3)?,
            llm_batch_poll_ceiling_secs: env_parse("WB_LLM_BATCH_POLL_CEILING_SECS", 1800)?,
            naver_client_id: env_or("WB_NAVER_CLIENT_ID", ""),
            naver_client_secret: env_or("WB_NAVER_CLIENT_SECRET", ""),
            dart_api_key: env_or("WB_DART_API_KEY", ""),
            anthropic_api_key: env_or("WB_ANTHROPIC_API_KEY", ""),
            api_bind_addr: env_or("WB_API_BIND_ADDR", "0.0.0.0:8000"),
        })
    }

    /// Base ensemble weights keyed by model name.
    pub fn ensemble_weights(&self) -> [(&'static str, f64); 4] {
        [
            ("gbm", self.weight_gbm),
            ("garch", self.weight_garch),
            ("heston", self.weight_heston),
            ("merton", self.weight_merton),
        ]
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T>(key: &str, default: T) -> Result<T, AnalysisError>
where
    T: std::str::FromStr,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| AnalysisError::ConfigError(format!("invalid value for {key}: {raw}"))),
        Err(_) => Ok(default),
    }
}
