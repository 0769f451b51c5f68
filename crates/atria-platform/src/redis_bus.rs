use anyhow::Result;
use async_trait::async_trait;
use redis::{AsyncCommands, Client};

use atria_core::{NotificationSink, WalletEvent};

const WALLET_EVENTS_CHANNEL: &str = "wallet.events";

/// Redis-backed notification bus. Events are published to a channel for
/// out-of-process consumers (ticketing, messaging); publishing is decoupled
/// from any store transaction.
#[derive(Clone)]
pub struct RedisBus {
    client: Client,
}

impl RedisBus {
    pub fn connect(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)?;
        Ok(Self { client })
    }

    pub async fn publish_json<T: serde::Serialize>(&self, channel: &str, payload: &T) -> Result<()> {
        let mut connection = self.client.get_multiplexed_async_connection().await?;
        let serialized = serde_json::to_string(payload)?;
        let _: i64 = connection.publish(channel, serialized).await?;
        Ok(())
    }
}

#[async_trait]
impl NotificationSink for RedisBus {
    async fn publish(&self, event: &WalletEvent) -> Result<()> {
        self.publish_json(WALLET_EVENTS_CHANNEL, event).await
    }
}
