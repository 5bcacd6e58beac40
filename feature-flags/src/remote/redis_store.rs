use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use tokio::time::timeout;
use tracing::instrument;

use super::{RemoteError, RemoteFlagStore, RemoteRecord};

pub const REMOTE_FLAGS_KEY_PREFIX: &str = "mamapace:feature_flags:";

impl From<redis::RedisError> for RemoteError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_timeout() {
            RemoteError::Timeout
        } else {
            RemoteError::Unavailable(err.to_string())
        }
    }
}

/// Flag records stored as JSON strings in redis, one key per environment.
pub struct RedisRemoteStore {
    client: redis::Client,
    timeout: Duration,
}

impl RedisRemoteStore {
    pub fn new(addr: String, timeout: Duration) -> Result<RedisRemoteStore, RemoteError> {
        let client = redis::Client::open(addr)?;

        Ok(RedisRemoteStore { client, timeout })
    }

    async fn connection(&self) -> Result<redis::aio::Connection, RemoteError> {
        Ok(timeout(self.timeout, self.client.get_async_connection()).await??)
    }
}

pub fn record_key(key: &str) -> String {
    format!("{REMOTE_FLAGS_KEY_PREFIX}{key}")
}

#[async_trait]
impl RemoteFlagStore for RedisRemoteStore {
    #[instrument(skip(self))]
    async fn fetch(&self, key: &str) -> Result<RemoteRecord, RemoteError> {
        let mut conn = self.connection().await?;

        let results = conn.get::<String, Option<String>>(record_key(key));
        let raw: Option<String> = timeout(self.timeout, results).await??;

        let raw = raw.ok_or(RemoteError::NotFound)?;
        Ok(serde_json::from_str(&raw)?)
    }

    #[instrument(skip(self, record))]
    async fn upsert(&self, key: &str, record: &RemoteRecord) -> Result<(), RemoteError> {
        let payload = serde_json::to_string(record)?;
        let mut conn = self.connection().await?;

        let results = conn.set::<String, String, ()>(record_key(key), payload);
        timeout(self.timeout, results).await??;

        Ok(())
    }
}
