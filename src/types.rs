use ethers::types::{Address, Filter, Log, H256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::SourceError;

/// Inclusive block range `[from_block, to_block]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawScanRange")]
pub struct ScanRange {
    from_block: u64,
    to_block: u64,
}

#[derive(Deserialize)]
struct RawScanRange {
    from_block: u64,
    to_block: u64,
}

impl TryFrom<RawScanRange> for ScanRange {
    type Error = String;

    fn try_from(raw: RawScanRange) -> Result<Self, Self::Error> {
        ScanRange::new(raw.from_block, raw.to_block).ok_or_else(|| {
            format!("inverted block range {}-{}", raw.from_block, raw.to_block)
        })
    }
}

impl ScanRange {
    /// Returns `None` when `from_block > to_block`.
    pub fn new(from_block: u64, to_block: u64) -> Option<Self> {
        (from_block <= to_block).then_some(Self { from_block, to_block })
    }

    /// Window of `window_blocks` ending at `latest_block`, clamped at genesis.
    pub fn trailing(latest_block: u64, window_blocks: u64) -> Self {
        Self {
            from_block: latest_block.saturating_sub(window_blocks),
            to_block: latest_block,
        }
    }

    pub fn from_block(&self) -> u64 {
        self.from_block
    }

    pub fn to_block(&self) -> u64 {
        self.to_block
    }

    /// Number of blocks covered, both ends included.
    pub fn block_count(&self) -> u64 {
        (self.to_block - self.from_block).saturating_add(1)
    }

    /// Splits the range into consecutive sub-ranges of at most `chunk_size` blocks,
    /// oldest first. A `chunk_size` of zero is treated as one.
    pub fn chunks(&self, chunk_size: u64) -> Vec<ScanRange> {
        let step = chunk_size.max(1);
        let mut chunks = Vec::with_capacity((self.block_count() / step + 1) as usize);
        let mut from = self.from_block;
        loop {
            let to = from.saturating_add(step - 1).min(self.to_block);
            chunks.push(ScanRange { from_block: from, to_block: to });
            if to == self.to_block {
                break;
            }
            from = to + 1;
        }
        chunks
    }
}

impl fmt::Display for ScanRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.from_block, self.to_block)
    }
}

/// Contract address and topic0 a scan is restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogFilter {
    pub address: Address,
    pub topic: H256,
}

impl LogFilter {
    pub fn new(address: Address, topic: H256) -> Self {
        Self { address, topic }
    }

    pub fn to_filter(&self, range: ScanRange) -> Filter {
        Filter::new()
            .address(self.address)
            .topic0(self.topic)
            .from_block(range.from_block())
            .to_block(range.to_block())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub transaction_hash: H256,
    pub block_number: u64,
    pub topics: Vec<H256>,
    pub address: Address,
}

impl TryFrom<Log> for LogEntry {
    type Error = SourceError;

    fn try_from(log: Log) -> Result<Self, Self::Error> {
        let transaction_hash = log
            .transaction_hash
            .ok_or(SourceError::MissingField("transactionHash"))?;
        let block_number = log
            .block_number
            .ok_or(SourceError::MissingField("blockNumber"))?
            .as_u64();

        Ok(Self {
            transaction_hash,
            block_number,
            topics: log.topics,
            address: log.address,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransactionValue {
    pub transaction_hash: H256,
    pub value_eth: f64,
}

impl TransactionValue {
    pub fn from_wei(transaction_hash: H256, value: U256) -> Self {
        Self {
            transaction_hash,
            value_eth: wei_to_eth(value),
        }
    }
}

/// Converts a wei amount to ETH with f64 precision.
pub fn wei_to_eth(value: U256) -> f64 {
    ethers::utils::format_ether(value).parse().unwrap_or(f64::MAX)
}

/// A floor price together with the sample it was computed from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloorEstimate {
    pub price_eth: f64,
    /// Values that were averaged, ascending.
    pub pool: Vec<f64>,
    /// Values that survived the threshold filter.
    pub sample_count: usize,
    /// Low outliers removed by the gap filter.
    pub trimmed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::U64;

    #[test]
    fn test_trailing_range_clamps_at_genesis() {
        let range = ScanRange::trailing(500, 70_000);
        assert_eq!(range.from_block(), 0);
        assert_eq!(range.to_block(), 500);
        assert_eq!(range.block_count(), 501);
    }

    #[test]
    fn test_chunks_cover_range_without_overlap() {
        for (latest, window, chunk) in [(100_000u64, 70_000u64, 2_000u64), (10, 10, 3), (7, 0, 5), (1_000, 999, 1)] {
            let range = ScanRange::trailing(latest, window);
            let chunks = range.chunks(chunk);

            assert_eq!(chunks.first().map(|c| c.from_block()), Some(range.from_block()));
            assert_eq!(chunks.last().map(|c| c.to_block()), Some(range.to_block()));
            for c in &chunks {
                assert!(c.block_count() <= chunk);
            }
            for pair in chunks.windows(2) {
                assert_eq!(pair[0].to_block() + 1, pair[1].from_block());
            }
            assert_eq!(chunks.iter().map(|c| c.block_count()).sum::<u64>(), range.block_count());
        }
    }

    #[test]
    fn test_chunks_at_u64_max() {
        let range = ScanRange::new(u64::MAX - 4, u64::MAX).unwrap();
        let chunks = range.chunks(2);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].to_block(), u64::MAX);
    }

    #[test]
    fn test_new_rejects_inverted_range() {
        assert!(ScanRange::new(10, 9).is_none());
        assert!(ScanRange::new(9, 9).is_some());
    }

    #[test]
    fn test_deserialize_rejects_inverted_range() {
        let range: ScanRange = serde_json::from_str(r#"{"from_block":5,"to_block":9}"#).unwrap();
        assert_eq!(range, ScanRange::new(5, 9).unwrap());

        let inverted = serde_json::from_str::<ScanRange>(r#"{"from_block":10,"to_block":9}"#);
        assert!(inverted.is_err());
    }

    #[test]
    fn test_log_entry_requires_hash_and_block() {
        let mut log = Log {
            address: Address::random(),
            topics: vec![H256::random()],
            ..Default::default()
        };
        assert!(LogEntry::try_from(log.clone()).is_err());

        log.transaction_hash = Some(H256::random());
        log.block_number = Some(U64::from(42));
        let entry = LogEntry::try_from(log).unwrap();
        assert_eq!(entry.block_number, 42);
    }

    #[test]
    fn test_wei_to_eth() {
        let half = U256::from(500_000_000_000_000_000u64);
        assert!((wei_to_eth(half) - 0.5).abs() < 1e-12);
        assert_eq!(wei_to_eth(U256::zero()), 0.0);
    }
}
