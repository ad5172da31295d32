use futures::stream::{self, StreamExt};
use log::{debug, info, warn};

use crate::config::ScannerConfig;
use crate::monitoring::RetryPolicy;
use crate::source::LogSource;
use crate::types::{LogEntry, LogFilter, ScanRange};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkStatus {
    Fetched { logs: usize },
    /// Every attempt failed; the chunk's logs are lost for this run.
    Skipped { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkOutcome {
    pub range: ScanRange,
    pub attempts: u32,
    pub status: ChunkStatus,
}

impl ChunkOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self.status, ChunkStatus::Skipped { .. })
    }
}

/// Per-chunk outcomes of one scan, oldest chunk first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchReport {
    pub range: Option<ScanRange>,
    pub chunks: Vec<ChunkOutcome>,
}

impl FetchReport {
    pub fn attempted(&self) -> usize {
        self.chunks.len()
    }

    pub fn succeeded(&self) -> usize {
        self.attempted() - self.skipped()
    }

    pub fn skipped(&self) -> usize {
        self.chunks.iter().filter(|c| c.is_skipped()).count()
    }

    /// Attempts beyond the first, summed over all chunks.
    pub fn retries(&self) -> u32 {
        self.chunks.iter().map(|c| c.attempts.saturating_sub(1)).sum()
    }

    pub fn logs_found(&self) -> usize {
        self.chunks
            .iter()
            .map(|c| match c.status {
                ChunkStatus::Fetched { logs } => logs,
                ChunkStatus::Skipped { .. } => 0,
            })
            .sum()
    }

    /// True when chunks were planned but none of them came back. An empty
    /// log set from such a scan says nothing about chain activity.
    pub fn is_inconclusive(&self) -> bool {
        self.attempted() > 0 && self.succeeded() == 0
    }

    pub fn skipped_ranges(&self) -> impl Iterator<Item = ScanRange> + '_ {
        self.chunks.iter().filter(|c| c.is_skipped()).map(|c| c.range)
    }
}

#[derive(Debug, Clone, Default)]
pub struct FetchResult {
    /// All retrieved logs in block order.
    pub logs: Vec<LogEntry>,
    pub report: FetchReport,
}

/// Pages `eth_getLogs` over a trailing block window in provider-sized chunks.
pub struct LogFetcher<'a, S: ?Sized> {
    source: &'a S,
    config: &'a ScannerConfig,
}

impl<'a, S> LogFetcher<'a, S>
where
    S: LogSource + ?Sized,
{
    pub fn new(source: &'a S, config: &'a ScannerConfig) -> Self {
        Self { source, config }
    }

    /// Fetches every log matching `filter` in the `window_blocks` ending at
    /// `latest_block`.
    ///
    /// Chunks that still fail after the retry budget are skipped and recorded in
    /// the report. An empty result is therefore inconclusive on its own: check
    /// [`FetchReport::skipped`] before reading it as "no transfers".
    pub async fn fetch_logs(&self, filter: LogFilter, latest_block: u64) -> FetchResult {
        let range = ScanRange::trailing(latest_block, self.config.window_blocks);
        let chunks = range.chunks(self.config.chunk_size);
        info!(
            "Plan: scan blocks {} in {} chunks of {}",
            range,
            chunks.len(),
            self.config.chunk_size
        );

        let policy = self.config.retry_policy();
        let last = chunks.len().saturating_sub(1);
        let fetched: Vec<(ChunkOutcome, Vec<LogEntry>)> = stream::iter(chunks.into_iter().enumerate())
            .map(|(i, chunk)| self.fetch_chunk(chunk, filter, policy, i == last))
            .buffered(self.config.max_in_flight.max(1))
            .collect()
            .await;

        let mut result = FetchResult {
            logs: Vec::new(),
            report: FetchReport {
                range: Some(range),
                chunks: Vec::with_capacity(fetched.len()),
            },
        };
        for (outcome, logs) in fetched {
            result.logs.extend(logs);
            result.report.chunks.push(outcome);
        }

        info!("Total transfers found: {}", result.logs.len());
        if result.report.is_inconclusive() {
            warn!("Every chunk in {} failed; the scan is inconclusive", range);
        }
        result
    }

    async fn fetch_chunk(
        &self,
        chunk: ScanRange,
        filter: LogFilter,
        policy: RetryPolicy,
        is_last: bool,
    ) -> (ChunkOutcome, Vec<LogEntry>) {
        let context = format!("get_logs {}", chunk);
        let retried = policy
            .run(&context, || self.source.get_logs(chunk, filter))
            .await;

        match retried.result {
            Ok(logs) => {
                debug!("Scanned {} -> found {} logs", chunk, logs.len());
                if !is_last && !self.config.politeness_delay.is_zero() {
                    tokio::time::sleep(self.config.politeness_delay).await;
                }
                let outcome = ChunkOutcome {
                    range: chunk,
                    attempts: retried.attempts,
                    status: ChunkStatus::Fetched { logs: logs.len() },
                };
                (outcome, logs)
            }
            Err(e) => {
                warn!(
                    "Skipping chunk {} after {} attempts: {}",
                    chunk, retried.attempts, e
                );
                let outcome = ChunkOutcome {
                    range: chunk,
                    attempts: retried.attempts,
                    status: ChunkStatus::Skipped {
                        error: e.to_string(),
                    },
                };
                (outcome, Vec::new())
            }
        }
    }
}

/// Convenience wrapper around [`LogFetcher::fetch_logs`].
pub async fn fetch_logs<S>(
    source: &S,
    filter: LogFilter,
    latest_block: u64,
    config: &ScannerConfig,
) -> FetchResult
where
    S: LogSource + ?Sized,
{
    LogFetcher::new(source, config)
        .fetch_logs(filter, latest_block)
        .await
}
