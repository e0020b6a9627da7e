use anyhow::Result;
use axum::Router;
use gridwatch::{api, config::Config, jobs, state::AppState, telemetry};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    let cfg = Config::load()?;

    let app_state = AppState::new(cfg.clone()).await?;
    let app: Router = api::router(app_state.clone(), &cfg);

    if cfg.jobs.enabled {
        jobs::JobScheduler::new(app_state.clone()).spawn();
    } else {
        warn!("background jobs disabled; vendor sync and training must be triggered via the API");
    }

    let addr = cfg.server.socket_addr()?;
    if cfg.server.host == "0.0.0.0" {
        warn!("binding to 0.0.0.0 - the API is unauthenticated, keep it behind a reverse proxy");
    }
    info!(%addr, "starting gridwatch");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(telemetry::shutdown_signal())
        .await?;

    warn!("shutdown complete");
    Ok(())
}
