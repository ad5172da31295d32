use anyhow::{anyhow, Context, Result};
use ethers::types::{Address, H256};
use serde::{Deserialize, Serialize};
use std::{env, str::FromStr, time::Duration};
use validator::{Validate, ValidationError};

use crate::monitoring::RetryPolicy;
use crate::types::LogFilter;

/// keccak256("Transfer(address,address,uint256)")
pub const TRANSFER_TOPIC: &str =
    "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";

pub const DEFAULT_CONTRACT_ADDRESS: &str = "0x3fd43a658915a7ce5ae0a2e48f72b9fce7ba0c44";
pub const DEFAULT_ALCHEMY_BASE_URL: &str = "https://megaeth-mainnet.g.alchemy.com/v2/";

const MIN_CALL_TIMEOUT: Duration = Duration::from_millis(100);
const MAX_CALL_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ScannerConfig {
    // ~2 hours of MegaETH blocks
    #[validate(range(max = 10_000_000))]
    pub window_blocks: u64,
    #[validate(range(min = 1))]
    pub chunk_size: u64,
    #[validate(range(min = 1, max = 10))]
    pub max_attempts: u32,
    pub retry_backoff: Duration,
    pub politeness_delay: Duration,
    #[validate(range(min = 1, max = 64))]
    pub max_in_flight: usize,
    #[validate(custom = "validate_call_timeout")]
    pub call_timeout: Duration,
}

impl ScannerConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, self.retry_backoff)
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            window_blocks: 70_000,
            chunk_size: 2_000,
            max_attempts: 2,
            retry_backoff: Duration::from_secs(2),
            politeness_delay: Duration::ZERO,
            max_in_flight: 1,
            call_timeout: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EstimatorConfig {
    #[validate(range(min = 1))]
    pub candidate_limit: usize,
    #[validate(range(min = 0.0))]
    pub min_value_eth: f64,
    #[validate(range(min = 0.01, max = 1.0))]
    pub gap_ratio: f64,
    #[validate(range(min = 1))]
    pub pool_size: usize,
    #[validate(range(min = 1, max = 64))]
    pub max_in_flight: usize,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            candidate_limit: 50,
            min_value_eth: 0.0001,
            gap_ratio: 0.70,
            pool_size: 3,
            max_in_flight: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    pub token: String,
    pub channel_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NotifierConfig {
    /// `None` runs the notification phase as a dry run to the log.
    pub discord: Option<DiscordConfig>,
    #[validate(length(min = 1))]
    pub collection_label: String,
    pub window_label: String,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            discord: None,
            collection_label: "World Computer Netizens".to_string(),
            window_label: "last ~2 hours".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AppConfig {
    #[validate(custom = "validate_rpc_url")]
    pub rpc_url: String,
    #[validate(custom = "validate_address")]
    pub contract_address: Address,
    pub transfer_topic: H256,
    #[validate]
    pub scanner: ScannerConfig,
    #[validate]
    pub estimator: EstimatorConfig,
    #[validate]
    pub notifier: NotifierConfig,
}

impl AppConfig {
    /// Reads the configuration from the process environment (a `.env` file is
    /// loaded first if present) and validates it.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        let config = Self::from_lookup(|key| env::var(key).ok())?;
        config.validate_all()?;
        Ok(config)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let rpc_url = match get("RPC_URL") {
            Some(url) => url,
            None => {
                let key = get("ALCHEMY_API_KEY")
                    .ok_or_else(|| anyhow!("Either RPC_URL or ALCHEMY_API_KEY must be set"))?;
                let base = get("ALCHEMY_BASE_URL").unwrap_or_else(|| DEFAULT_ALCHEMY_BASE_URL.to_string());
                format!("{}{}", base, key)
            }
        };

        let contract_address = get("CONTRACT_ADDRESS")
            .unwrap_or_else(|| DEFAULT_CONTRACT_ADDRESS.to_string());
        let contract_address = Address::from_str(contract_address.trim())
            .map_err(|e| anyhow!("Invalid contract address format {}: {}", contract_address, e))?;

        let transfer_topic = get("TRANSFER_TOPIC").unwrap_or_else(|| TRANSFER_TOPIC.to_string());
        let transfer_topic = H256::from_str(transfer_topic.trim())
            .map_err(|e| anyhow!("Invalid transfer topic {}: {}", transfer_topic, e))?;

        let defaults = ScannerConfig::default();
        let scanner = ScannerConfig {
            window_blocks: parse_or(&get, "WINDOW_BLOCKS", defaults.window_blocks)?,
            chunk_size: parse_or(&get, "CHUNK_SIZE", defaults.chunk_size)?,
            max_attempts: parse_or(&get, "MAX_ATTEMPTS", defaults.max_attempts)?,
            retry_backoff: millis_or(&get, "RETRY_BACKOFF_MS", defaults.retry_backoff)?,
            politeness_delay: millis_or(&get, "POLITENESS_DELAY_MS", defaults.politeness_delay)?,
            max_in_flight: parse_or(&get, "MAX_IN_FLIGHT", defaults.max_in_flight)?,
            call_timeout: millis_or(&get, "CALL_TIMEOUT_MS", defaults.call_timeout)?,
        };

        let defaults = EstimatorConfig::default();
        let estimator = EstimatorConfig {
            candidate_limit: parse_or(&get, "CANDIDATE_LIMIT", defaults.candidate_limit)?,
            min_value_eth: parse_or(&get, "MIN_VALUE_ETH", defaults.min_value_eth)?,
            gap_ratio: parse_or(&get, "GAP_RATIO", defaults.gap_ratio)?,
            pool_size: parse_or(&get, "POOL_SIZE", defaults.pool_size)?,
            max_in_flight: scanner.max_in_flight,
        };

        let discord = match get("DISCORD_TOKEN") {
            Some(token) => {
                let channel_id = get("CHANNEL_ID")
                    .ok_or_else(|| anyhow!("CHANNEL_ID must be set when DISCORD_TOKEN is set"))?;
                let channel_id = channel_id
                    .trim()
                    .parse::<u64>()
                    .with_context(|| format!("Invalid CHANNEL_ID: {}", channel_id))?;
                Some(DiscordConfig { token, channel_id })
            }
            None => None,
        };

        let defaults = NotifierConfig::default();
        let notifier = NotifierConfig {
            discord,
            collection_label: get("COLLECTION_LABEL").unwrap_or(defaults.collection_label),
            window_label: get("WINDOW_LABEL").unwrap_or(defaults.window_label),
        };

        Ok(Self {
            rpc_url,
            contract_address,
            transfer_topic,
            scanner,
            estimator,
            notifier,
        })
    }

    pub fn validate_all(&self) -> Result<()> {
        if let Err(e) = self.validate() {
            return Err(anyhow!("Configuration validation failed: {:?}", e));
        }
        Ok(())
    }

    pub fn log_filter(&self) -> LogFilter {
        LogFilter::new(self.contract_address, self.transfer_topic)
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {}: {}", key, raw)),
        None => Ok(default),
    }
}

fn millis_or<G>(get: &G, key: &str, default: Duration) -> Result<Duration>
where
    G: Fn(&str) -> Option<String>,
{
    parse_or(get, key, default.as_millis() as u64).map(Duration::from_millis)
}

// Custom validators
fn validate_rpc_url(rpc_url: &str) -> Result<(), ValidationError> {
    let url = url::Url::parse(rpc_url).map_err(|_| ValidationError::new("invalid_rpc_url"))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        _ => Err(ValidationError::new("unsupported_rpc_scheme")),
    }
}

fn validate_call_timeout(call_timeout: &Duration) -> Result<(), ValidationError> {
    if *call_timeout < MIN_CALL_TIMEOUT || *call_timeout > MAX_CALL_TIMEOUT {
        return Err(ValidationError::new("call_timeout_out_of_range"));
    }
    Ok(())
}

fn validate_address(address: &Address) -> Result<(), ValidationError> {
    if address == &Address::zero() {
        return Err(ValidationError::new("zero_address"));
    }
    Ok(())
}
