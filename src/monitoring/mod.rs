use log::{info, warn};
use metrics::{counter, gauge};
use std::{fmt::Display, future::Future, time::Duration};

use crate::estimator::EstimationReport;
use crate::scanner::FetchReport;
use crate::types::FloorEstimate;

const METRIC_CHUNKS_ATTEMPTED: &str = "floor_scanner_chunks_attempted";
const METRIC_CHUNKS_SKIPPED: &str = "floor_scanner_chunks_skipped";
const METRIC_CHUNK_RETRIES: &str = "floor_scanner_chunk_retries";
const METRIC_LOGS_FOUND: &str = "floor_scanner_logs_found";
const METRIC_CANDIDATES_RESOLVED: &str = "floor_scanner_candidates_resolved";
const METRIC_RESOLUTION_FAILURES: &str = "floor_scanner_resolution_failures";
const METRIC_ESTIMATE: &str = "floor_scanner_estimate_eth";

/// Fixed-delay retry budget for a single unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

/// Result of a retried operation plus how many attempts it took.
#[derive(Debug)]
pub struct Retried<T, E> {
    pub result: Result<T, E>,
    pub attempts: u32,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Runs `operation` until it succeeds or the attempt budget is spent,
    /// sleeping `backoff` between attempts. The last error is returned.
    pub async fn run<F, Fut, T, E>(&self, context: &str, mut operation: F) -> Retried<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempts = 0;
        loop {
            attempts += 1;
            match operation().await {
                Ok(value) => {
                    return Retried {
                        result: Ok(value),
                        attempts,
                    }
                }
                Err(e) if attempts >= max_attempts => {
                    return Retried {
                        result: Err(e),
                        attempts,
                    }
                }
                Err(e) => {
                    warn!(
                        "{} failed (attempt {}/{}): {}. Retrying in {:?}",
                        context, attempts, max_attempts, e, self.backoff
                    );
                    if !self.backoff.is_zero() {
                        tokio::time::sleep(self.backoff).await;
                    }
                }
            }
        }
    }
}

/// Everything an operator needs to tell a quiet chain from a degraded provider.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub latest_block: u64,
    pub fetch: FetchReport,
    /// `None` when no logs were found and estimation never ran.
    pub estimation: Option<EstimationReport>,
}

impl RunReport {
    pub fn record(&self, estimate: Option<&FloorEstimate>) {
        counter!(METRIC_CHUNKS_ATTEMPTED, self.fetch.attempted() as u64);
        counter!(METRIC_CHUNKS_SKIPPED, self.fetch.skipped() as u64);
        counter!(METRIC_CHUNK_RETRIES, self.fetch.retries() as u64);
        counter!(METRIC_LOGS_FOUND, self.fetch.logs_found() as u64);

        if let Some(estimation) = &self.estimation {
            counter!(METRIC_CANDIDATES_RESOLVED, estimation.resolved as u64);
            counter!(METRIC_RESOLUTION_FAILURES, estimation.resolution_failures as u64);
        }
        if let Some(estimate) = estimate {
            gauge!(METRIC_ESTIMATE, estimate.price_eth);
        }
    }

    pub fn log_summary(&self) {
        info!(
            "Chunks: {} attempted, {} succeeded, {} skipped ({} retries). Logs found: {}",
            self.fetch.attempted(),
            self.fetch.succeeded(),
            self.fetch.skipped(),
            self.fetch.retries(),
            self.fetch.logs_found(),
        );
        if let Some(e) = &self.estimation {
            info!(
                "Candidates: {} checked, {} resolved, {} failed, {} below threshold, {} trimmed",
                e.candidates, e.resolved, e.resolution_failures, e.below_threshold, e.trimmed
            );
        }
        if self.is_degraded() {
            warn!(
                "Provider degraded: {} of {} chunks skipped, result may be incomplete",
                self.fetch.skipped(),
                self.fetch.attempted()
            );
        }
    }

    /// True when at least one chunk was lost for this run.
    pub fn is_degraded(&self) -> bool {
        self.fetch.skipped() > 0
    }
}
