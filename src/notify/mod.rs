use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::info;
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::{DiscordConfig, NotifierConfig};
use crate::types::FloorEstimate;

pub const DISCORD_API: &str = "https://discord.com/api/v10";
const EMBED_TITLE: &str = "💎 Floor Price Estimate";
const EMBED_COLOR: u32 = 0xFFAA00;
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Delivers a computed estimate somewhere a human will see it.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn publish(&self, estimate: &FloorEstimate) -> Result<()>;
}

/// Discord embed payload for an estimate.
pub fn render_embed(estimate: &FloorEstimate, collection_label: &str, window_label: &str) -> Value {
    json!({
        "embeds": [{
            "title": EMBED_TITLE,
            "color": EMBED_COLOR,
            "fields": [
                { "name": "Collection", "value": collection_label, "inline": true },
                {
                    "name": "Est. Floor Price",
                    "value": format!("**{:.4} ETH**", estimate.price_eth),
                    "inline": true
                },
                {
                    "name": "Sales Sampled",
                    "value": format!("{} (avg of lowest {})", estimate.sample_count, estimate.pool.len()),
                    "inline": true
                }
            ],
            "footer": { "text": format!("Based on on-chain sales ({})", window_label) }
        }]
    })
}

/// Posts the estimate to a channel through the Discord REST API as a bot.
pub struct DiscordNotifier {
    client: reqwest::Client,
    api_base: String,
    token: String,
    channel_id: u64,
    collection_label: String,
    window_label: String,
}

impl DiscordNotifier {
    pub fn new(discord: &DiscordConfig, config: &NotifierConfig) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_base: DISCORD_API.to_string(),
            token: discord.token.clone(),
            channel_id: discord.channel_id,
            collection_label: config.collection_label.clone(),
            window_label: config.window_label.clone(),
        })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }
}

#[async_trait]
impl NotificationSink for DiscordNotifier {
    async fn publish(&self, estimate: &FloorEstimate) -> Result<()> {
        let url = format!("{}/channels/{}/messages", self.api_base, self.channel_id);
        let payload = render_embed(estimate, &self.collection_label, &self.window_label);

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bot {}", self.token))
            .json(&payload)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!(
                "Discord rejected message for channel {}: {} {}",
                self.channel_id,
                status,
                body
            ));
        }

        info!("Posted price {:.4} ETH to channel {}", estimate.price_eth, self.channel_id);
        Ok(())
    }
}

/// Dry-run sink used when no Discord credentials are configured.
pub struct LogNotifier {
    collection_label: String,
}

impl LogNotifier {
    pub fn new(config: &NotifierConfig) -> Self {
        Self {
            collection_label: config.collection_label.clone(),
        }
    }
}

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn publish(&self, estimate: &FloorEstimate) -> Result<()> {
        info!(
            "[dry-run] {} floor: {:.4} ETH ({} sales)",
            self.collection_label, estimate.price_eth, estimate.sample_count
        );
        Ok(())
    }
}

/// Picks the Discord sink when credentials are present, the log sink otherwise.
pub fn build_sink(config: &NotifierConfig) -> Result<Box<dyn NotificationSink>> {
    match &config.discord {
        Some(discord) => Ok(Box::new(DiscordNotifier::new(discord, config)?)),
        None => Ok(Box::new(LogNotifier::new(config))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimate() -> FloorEstimate {
        FloorEstimate {
            price_eth: 0.523333,
            pool: vec![0.5, 0.52, 0.55],
            sample_count: 4,
            trimmed: 1,
        }
    }

    #[test]
    fn test_render_embed() {
        let payload = render_embed(&estimate(), "World Computer Netizens", "last ~2 hours");
        let embed = &payload["embeds"][0];

        assert_eq!(embed["title"], EMBED_TITLE);
        assert_eq!(embed["color"], 0xFFAA00);
        assert_eq!(embed["fields"][0]["value"], "World Computer Netizens");
        assert_eq!(embed["fields"][1]["value"], "**0.5233 ETH**");
        assert_eq!(embed["fields"][2]["value"], "4 (avg of lowest 3)");
        assert_eq!(embed["footer"]["text"], "Based on on-chain sales (last ~2 hours)");
    }

    #[tokio::test]
    async fn test_build_sink_without_discord_is_dry_run() {
        let sink = build_sink(&NotifierConfig::default()).unwrap();
        assert!(sink.publish(&estimate()).await.is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_discord_reports_error() {
        let discord = DiscordConfig {
            token: "token".to_string(),
            channel_id: 42,
        };
        let notifier = DiscordNotifier::new(&discord, &NotifierConfig::default())
            .unwrap()
            .with_api_base("http://127.0.0.1:9");

        assert!(notifier.publish(&estimate()).await.is_err());
    }
}
