use anyhow::Result;
use backend::{app, AppState, Config};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    info!(
        bind = %config.bind_addr,
        random_source = %config.random_source,
        allow_seed_override = config.allow_seed_override,
        draw_delay_ms = config.draw_delay.as_millis() as u64,
        "starting server"
    );

    let state = AppState::from_config(&config).await;
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    axum::serve(listener, app(state)).await?;
    Ok(())
}
