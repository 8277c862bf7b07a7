use anyhow::Result;
use solar_forecast::{api, config, state::AppState, telemetry};
use config::Config;
use telemetry::init_tracing;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cfg = Config::load()?;
    init_tracing(&cfg.logging);

    let app_state = AppState::new(cfg.clone()).await?;
    app_state.store.ensure_root().await?;

    let app = api::router(app_state, &cfg);
    let addr = cfg.server.socket_addr()?;

    if cfg.server.host == "0.0.0.0" {
        warn!("server binding to 0.0.0.0, the service is reachable from the network");
    }

    info!(
        %addr,
        data_dir = %cfg.storage.data_dir.display(),
        "starting solar forecast service"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(telemetry::shutdown_signal())
        .await?;

    warn!("shutdown complete");
    Ok(())
}
