use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub mod mock;
pub mod redis_store;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Not found in remote store")]
    NotFound,
    #[error("Timeout error")]
    Timeout,
    #[error("remote store unavailable: {0}")]
    Unavailable(String),
    #[error("failed to (de)serialize remote record: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for RemoteError {
    fn from(err: serde_json::Error) -> Self {
        RemoteError::Serialization(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for RemoteError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        RemoteError::Timeout
    }
}

/// One row of the remote flag table, keyed by environment.
///
/// `flags` stays raw JSON here: the payload is only trusted after it has been
/// checked against the schema during sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRecord {
    pub flags: Value,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub emergency_rollback: bool,
}

/// Key-value backing store for flag records.
#[async_trait]
pub trait RemoteFlagStore {
    /// Reads the single record stored under `key`.
    async fn fetch(&self, key: &str) -> Result<RemoteRecord, RemoteError>;

    /// Inserts or replaces the record stored under `key`.
    async fn upsert(&self, key: &str, record: &RemoteRecord) -> Result<(), RemoteError>;
}
