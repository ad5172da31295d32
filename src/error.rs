use ethers::types::H256;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single call against the chain provider.
///
/// Rate limits, oversized ranges and transport errors all surface as `Rpc`;
/// the provider does not distinguish them reliably.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("rpc call failed: {0}")]
    Rpc(String),
    #[error("rpc call timed out after {0:?}")]
    Timeout(Duration),
    #[error("transaction {0:?} not found")]
    TransactionNotFound(H256),
    #[error("malformed response: missing {0}")]
    MissingField(&'static str),
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("chain height unavailable: {0}")]
    Connectivity(#[source] SourceError),
}

pub type Result<T> = std::result::Result<T, ScanError>;
