use anyhow::Context;
use db::DBService;
use server::{AppState, app, config::Config, init_tracing, shutdown_signal};
use services::services::database_validator::DatabaseValidator;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Config::load();
    let db = DBService::new(config.database_url.as_deref())
        .await
        .context("failed to open database")?;
    let report = DatabaseValidator::new(db.pool.clone()).validate().await?;
    info!("{}", report.summary());

    tokio::fs::create_dir_all(&config.storage_dir)
        .await
        .with_context(|| format!("failed to create {}", config.storage_dir.display()))?;

    let address = config.address();
    let state = AppState::new(db, config);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    info!("Server running on http://{address}");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}
