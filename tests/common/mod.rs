#![allow(dead_code)]

use async_trait::async_trait;
use ethers::types::{Address, H256};
use floor_scanner::{
    config::{EstimatorConfig, ScannerConfig},
    error::SourceError,
    source::{ChainHeightSource, LogSource, TransactionResolver},
    types::{LogEntry, LogFilter, ScanRange, TransactionValue},
};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

pub fn filter() -> LogFilter {
    LogFilter::new(Address::repeat_byte(0xab), H256::repeat_byte(0xdd))
}

pub fn scanner_config(window_blocks: u64, chunk_size: u64) -> ScannerConfig {
    ScannerConfig {
        window_blocks,
        chunk_size,
        max_attempts: 2,
        retry_backoff: Duration::ZERO,
        politeness_delay: Duration::ZERO,
        max_in_flight: 1,
        call_timeout: Duration::from_secs(1),
    }
}

pub fn estimator_config() -> EstimatorConfig {
    EstimatorConfig::default()
}

/// In-memory chain: a set of transfer logs, the ETH value of each transaction,
/// and scripted failures per chunk.
#[derive(Default)]
pub struct FakeChain {
    pub height: Option<u64>,
    logs: Vec<LogEntry>,
    values: HashMap<H256, f64>,
    /// Remaining failures per exact chunk range.
    failures: Mutex<HashMap<ScanRange, u32>>,
    fail_all_logs: bool,
    pub log_calls: AtomicUsize,
    pub resolve_calls: AtomicUsize,
}

impl FakeChain {
    pub fn at_height(height: u64) -> Self {
        Self {
            height: Some(height),
            ..Default::default()
        }
    }

    pub fn unreachable() -> Self {
        Self::default()
    }

    /// Adds a transfer at `block` whose transaction carried `value_eth`.
    pub fn with_sale(mut self, block: u64, value_eth: f64) -> Self {
        let hash = H256::from_low_u64_be(self.logs.len() as u64 + 1);
        self.logs.push(LogEntry {
            transaction_hash: hash,
            block_number: block,
            topics: vec![filter().topic],
            address: filter().address,
        });
        self.values.insert(hash, value_eth);
        self
    }

    /// Adds a transfer whose transaction cannot be resolved.
    pub fn with_unresolvable(mut self, block: u64) -> Self {
        let hash = H256::from_low_u64_be(self.logs.len() as u64 + 1);
        self.logs.push(LogEntry {
            transaction_hash: hash,
            block_number: block,
            topics: vec![filter().topic],
            address: filter().address,
        });
        self
    }

    pub fn failing(self, range: ScanRange, times: u32) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(range, times);
        self
    }

    pub fn failing_everywhere(mut self) -> Self {
        self.fail_all_logs = true;
        self
    }
}

#[async_trait]
impl LogSource for FakeChain {
    async fn get_logs(&self, range: ScanRange, filter: LogFilter) -> Result<Vec<LogEntry>, SourceError> {
        self.log_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_all_logs {
            return Err(SourceError::Rpc("429 Too Many Requests".into()));
        }
        if let Some(remaining) = self.failures.lock().unwrap().get_mut(&range) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(SourceError::Rpc("query returned more than 10000 results".into()));
            }
        }

        Ok(self
            .logs
            .iter()
            .filter(|l| l.address == filter.address && l.topics.first() == Some(&filter.topic))
            .filter(|l| l.block_number >= range.from_block() && l.block_number <= range.to_block())
            .cloned()
            .collect())
    }
}

#[async_trait]
impl TransactionResolver for FakeChain {
    async fn transaction_value(&self, transaction_hash: H256) -> Result<TransactionValue, SourceError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        self.values
            .get(&transaction_hash)
            .map(|value_eth| TransactionValue {
                transaction_hash,
                value_eth: *value_eth,
            })
            .ok_or(SourceError::TransactionNotFound(transaction_hash))
    }
}

#[async_trait]
impl ChainHeightSource for FakeChain {
    async fn latest_block(&self) -> Result<u64, SourceError> {
        self.height
            .ok_or_else(|| SourceError::Rpc("connection refused".into()))
    }
}
