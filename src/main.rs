use anyhow::Result;
use log::{error, info, warn};

use floor_scanner::{
    config::AppConfig,
    notify::build_sink,
    pipeline::{notify, run_once},
    source::RpcChainClient,
    utils::setup_logger,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Reads .env before the logger so LOG_LEVEL applies
    let config = AppConfig::from_env();
    setup_logger()?;
    let config = config.map_err(|e| {
        error!("Invalid configuration: {:#}", e);
        e
    })?;

    let client = RpcChainClient::connect_http(
        &config.rpc_url,
        config.scanner.max_in_flight,
        config.scanner.call_timeout,
    )?;

    // Phase 1: scan and estimate, no notification session involved
    let outcome = match run_once(
        &client,
        config.log_filter(),
        &config.scanner,
        &config.estimator,
    )
    .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("Scan aborted: {}", e);
            return Err(e.into());
        }
    };

    // Phase 2: deliver the estimate if there is one
    let sink = build_sink(&config.notifier)?;
    match notify(sink.as_ref(), outcome.estimate.as_ref()).await {
        Ok(true) => info!("Notification delivered"),
        Ok(false) => {}
        Err(e) => warn!("Notification failed: {:#}", e),
    }

    Ok(())
}
