mod auth;
mod chores;
mod household;
mod payments;
mod problem;
mod router;
mod telemetry;

use std::net::SocketAddr;

use tracing::info;

use hearth_core::HouseholdCalendar;
use hearth_storage::Database;
use hearth_util::{load_env_file, AppConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_env_file();
    let config = AppConfig::from_env()?;

    telemetry::init_tracing(&config)?;
    let metrics = telemetry::init_metrics()?;

    let database = Database::connect(&config.database_url).await?;
    database.run_migrations().await?;
    info!(stage = "app", database = %config.database_url, "database ready");

    let state = router::AppState::new(
        metrics,
        database,
        HouseholdCalendar::system(config.timezone),
        config.due_date_anchor,
        &config.auth_token_secret,
    );

    let addr: SocketAddr = config.bind_addr;
    info!(
        stage = "app",
        %addr,
        env = %config.environment.as_str(),
        anchor = config.due_date_anchor.as_str(),
        "starting HTTP server"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router::app_router(state))
        .await
        .map_err(|err| err.into())
}
