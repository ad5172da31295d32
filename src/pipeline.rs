use log::{error, info, warn};

use crate::config::{EstimatorConfig, ScannerConfig};
use crate::error::{Result, ScanError};
use crate::estimator::estimate_floor;
use crate::monitoring::RunReport;
use crate::notify::NotificationSink;
use crate::scanner::LogFetcher;
use crate::source::ChainClient;
use crate::types::{FloorEstimate, LogFilter};

#[derive(Debug, Clone, Default)]
pub struct RunOutcome {
    pub estimate: Option<FloorEstimate>,
    pub report: RunReport,
}

/// Computation phase: one chain-height read, the windowed scan, then the estimate.
///
/// Only an unreachable height source is an error; every other failure
/// degrades into fewer samples or an absent estimate.
pub async fn run_once<C>(
    client: &C,
    filter: LogFilter,
    scanner: &ScannerConfig,
    estimator: &EstimatorConfig,
) -> Result<RunOutcome>
where
    C: ChainClient + ?Sized,
{
    info!("Connecting to chain for contract {:?}", filter.address);
    let latest_block = client.latest_block().await.map_err(|e| {
        error!("Could not read chain height: {}", e);
        ScanError::Connectivity(e)
    })?;

    let fetched = LogFetcher::new(client, scanner)
        .fetch_logs(filter, latest_block)
        .await;

    let mut report = RunReport {
        latest_block,
        fetch: fetched.report,
        estimation: None,
    };

    if fetched.logs.is_empty() {
        if report.fetch.is_inconclusive() {
            warn!(
                "Scan inconclusive: all {} chunks failed, chain activity unknown",
                report.fetch.attempted()
            );
        } else {
            info!("No transfers found in the last {} blocks", scanner.window_blocks);
        }
        report.record(None);
        report.log_summary();
        return Ok(RunOutcome {
            estimate: None,
            report,
        });
    }

    let estimation = estimate_floor(&fetched.logs, client, estimator).await;
    report.estimation = Some(estimation.report);
    report.record(estimation.estimate.as_ref());
    report.log_summary();

    Ok(RunOutcome {
        estimate: estimation.estimate,
        report,
    })
}

/// Notification phase. Runs only when an estimate exists; a delivery failure
/// is returned to the caller and leaves the estimate untouched.
pub async fn notify(
    sink: &dyn NotificationSink,
    estimate: Option<&FloorEstimate>,
) -> anyhow::Result<bool> {
    match estimate {
        Some(estimate) => {
            sink.publish(estimate).await?;
            Ok(true)
        }
        None => {
            info!("No valid sales found, skipping notification");
            Ok(false)
        }
    }
}
