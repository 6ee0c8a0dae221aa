use anyhow::Context;

use replenish_daemon::app::App;
use replenish_infra::EngineConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    replenish_observability::init_with(EngineConfig::from_env().log_format);
    // Read again with logging installed so malformed values are reported.
    let config = EngineConfig::from_env();

    tracing::info!(
        alert_interval_secs = config.alert_interval.as_secs(),
        run_on_start = config.run_on_start,
        reactivation = config.reactivation.as_str(),
        "configuration loaded"
    );

    let app = App::start(&config);

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("shutdown signal received");

    app.shutdown().await;
    Ok(())
}
