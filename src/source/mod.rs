use anyhow::{Context, Result};
use async_trait::async_trait;
use ethers::{
    providers::{Http, Middleware, Provider},
    types::H256,
};
use std::{future::Future, sync::Arc, time::Duration};
use tokio::{sync::Semaphore, time::timeout};

#[cfg(test)]
use mockall::automock;

use crate::error::SourceError;
use crate::types::{LogEntry, LogFilter, ScanRange, TransactionValue};

/// Range-bounded log retrieval.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait LogSource: Send + Sync {
    async fn get_logs(
        &self,
        range: ScanRange,
        filter: LogFilter,
    ) -> std::result::Result<Vec<LogEntry>, SourceError>;
}

/// Resolves the native value moved by a transaction.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TransactionResolver: Send + Sync {
    async fn transaction_value(
        &self,
        transaction_hash: H256,
    ) -> std::result::Result<TransactionValue, SourceError>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChainHeightSource: Send + Sync {
    async fn latest_block(&self) -> std::result::Result<u64, SourceError>;
}

/// Everything a scan needs from the chain.
pub trait ChainClient: LogSource + TransactionResolver + ChainHeightSource {}

impl<T> ChainClient for T where T: LogSource + TransactionResolver + ChainHeightSource {}

/// [`ChainClient`] over any ethers middleware.
///
/// All calls share one semaphore so the provider never sees more than
/// `max_in_flight` concurrent requests, and each call is bounded by
/// `call_timeout`.
#[derive(Debug)]
pub struct RpcChainClient<M> {
    provider: Arc<M>,
    permits: Arc<Semaphore>,
    call_timeout: Duration,
}

impl RpcChainClient<Provider<Http>> {
    pub fn connect_http(rpc_url: &str, max_in_flight: usize, call_timeout: Duration) -> Result<Self> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .with_context(|| "Failed to build HTTP provider from RPC url")?;
        Ok(Self::new(Arc::new(provider), max_in_flight, call_timeout))
    }
}

impl<M: Middleware> RpcChainClient<M> {
    pub fn new(provider: Arc<M>, max_in_flight: usize, call_timeout: Duration) -> Self {
        Self {
            provider,
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
            call_timeout,
        }
    }

    async fn call<T, F>(&self, request: F) -> std::result::Result<T, SourceError>
    where
        F: Future<Output = std::result::Result<T, M::Error>>,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| SourceError::Rpc(e.to_string()))?;

        match timeout(self.call_timeout, request).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(SourceError::Rpc(e.to_string())),
            Err(_) => Err(SourceError::Timeout(self.call_timeout)),
        }
    }
}

#[async_trait]
impl<M: Middleware> LogSource for RpcChainClient<M> {
    async fn get_logs(
        &self,
        range: ScanRange,
        filter: LogFilter,
    ) -> std::result::Result<Vec<LogEntry>, SourceError> {
        let filter = filter.to_filter(range);
        let logs = self.call(self.provider.get_logs(&filter)).await?;

        logs.into_iter().map(LogEntry::try_from).collect()
    }
}

#[async_trait]
impl<M: Middleware> TransactionResolver for RpcChainClient<M> {
    async fn transaction_value(
        &self,
        transaction_hash: H256,
    ) -> std::result::Result<TransactionValue, SourceError> {
        let tx = self
            .call(self.provider.get_transaction(transaction_hash))
            .await?
            .ok_or(SourceError::TransactionNotFound(transaction_hash))?;

        Ok(TransactionValue::from_wei(transaction_hash, tx.value))
    }
}

#[async_trait]
impl<M: Middleware> ChainHeightSource for RpcChainClient<M> {
    async fn latest_block(&self) -> std::result::Result<u64, SourceError> {
        Ok(self.call(self.provider.get_block_number()).await?.as_u64())
    }
}
