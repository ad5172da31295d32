use futures::stream::{self, StreamExt};
use log::{debug, info};

use crate::config::EstimatorConfig;
use crate::source::TransactionResolver;
use crate::types::{FloorEstimate, LogEntry};

/// How the candidate pool was whittled down for one estimate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EstimationReport {
    pub candidates: usize,
    pub resolved: usize,
    pub resolution_failures: usize,
    pub below_threshold: usize,
    pub trimmed: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Estimation {
    pub estimate: Option<FloorEstimate>,
    pub report: EstimationReport,
}

/// The most recent `limit` logs.
pub fn select_candidates(logs: &[LogEntry], limit: usize) -> &[LogEntry] {
    &logs[logs.len().saturating_sub(limit)..]
}

/// Keeps values strictly above `min_value_eth`, sorted ascending.
pub fn sales_pool<I>(values: I, min_value_eth: f64) -> Vec<f64>
where
    I: IntoIterator<Item = f64>,
{
    let mut pool: Vec<f64> = values
        .into_iter()
        .filter(|v| v.is_finite() && *v > min_value_eth)
        .collect();
    pool.sort_by(|a, b| a.total_cmp(b));
    pool
}

/// Drops the lowest value while it is below `gap_ratio` times the next one.
///
/// `pool` must be sorted ascending. Returns how many values were removed.
pub fn trim_low_outliers(pool: &mut Vec<f64>, gap_ratio: f64) -> usize {
    let mut cut = 0;
    while cut + 1 < pool.len() && pool[cut] < pool[cut + 1] * gap_ratio {
        cut += 1;
    }
    pool.drain(..cut);
    cut
}

/// Threshold, gap filter, then the mean of the lowest `pool_size` values.
pub fn floor_from_values(values: &[f64], config: &EstimatorConfig) -> Option<FloorEstimate> {
    let mut pool = sales_pool(values.iter().copied(), config.min_value_eth);
    if pool.is_empty() {
        return None;
    }
    let sample_count = pool.len();

    let trimmed = trim_low_outliers(&mut pool, config.gap_ratio);
    pool.truncate(config.pool_size.max(1));
    let price_eth = pool.iter().sum::<f64>() / pool.len() as f64;

    Some(FloorEstimate {
        price_eth,
        pool,
        sample_count,
        trimmed,
    })
}

/// Resolves the newest candidates to sale values and reduces them to a floor.
///
/// Candidates whose transaction cannot be resolved are left out of the pool.
pub async fn estimate_floor<R>(
    logs: &[LogEntry],
    resolver: &R,
    config: &EstimatorConfig,
) -> Estimation
where
    R: TransactionResolver + ?Sized,
{
    let candidates = select_candidates(logs, config.candidate_limit);
    let mut report = EstimationReport {
        candidates: candidates.len(),
        ..Default::default()
    };

    let resolved: Vec<Option<f64>> = stream::iter(candidates)
        .map(|log| async move {
            match resolver.transaction_value(log.transaction_hash).await {
                Ok(value) => Some(value.value_eth),
                Err(e) => {
                    debug!("Skipping candidate {:?}: {}", log.transaction_hash, e);
                    None
                }
            }
        })
        .buffered(config.max_in_flight.max(1))
        .collect()
        .await;

    let values: Vec<f64> = resolved.into_iter().flatten().collect();
    report.resolved = values.len();
    report.resolution_failures = report.candidates - report.resolved;

    let estimate = floor_from_values(&values, config);
    report.below_threshold = report.resolved - estimate.as_ref().map_or(0, |e| e.sample_count);
    report.trimmed = estimate.as_ref().map_or(0, |e| e.trimmed);

    match &estimate {
        Some(e) => {
            debug!("Valid sales pool: {:?}", e.pool);
            info!(
                "Floor estimate {:.4} ETH from {} sales ({} trimmed)",
                e.price_eth, e.sample_count, e.trimmed
            );
        }
        None if report.candidates > 0 => {
            info!("Transfers found, but no native value attached (likely WETH sales)")
        }
        None => {}
    }

    Estimation { estimate, report }
}
