//! api-server: serve the analysis snapshots over HTTP.

use analysis_core::EngineConfig;
use sqlx::postgres::PgPoolOptions;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "api_server=info,tower_http=info".into()),
        )
        .init();

    let config = EngineConfig::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;

    let app = api_server::build_router(pool);

    let listener = tokio::net::TcpListener::bind(&config.api_bind_addr).await?;
    tracing::info!("api-server listening on {}", config.api_bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
