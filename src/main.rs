use std::net::SocketAddr;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use accounts_api::config::AppConfig;
use accounts_api::database::connection::connect_user_directory;
use accounts_api::services::mail_service::build_mailer;
use accounts_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    tracing::info!("Starting in {:?} mode", config.environment);

    let users = connect_user_directory(&config).await?;
    let mailer = build_mailer(&config.mail);
    let addr: SocketAddr = config
        .bind_address()
        .parse()
        .with_context(|| format!("invalid bind address {}", config.bind_address()))?;

    let state = AppState::new(config, users, mailer)?;
    let app = accounts_api::build_router(state);

    tracing::info!("Server starting on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
