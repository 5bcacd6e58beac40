use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::instrument;

use crate::{
    api::errors::FlagError,
    flags::{
        flag_models::{FlagName, FlagOverlay, FlagValue, UnknownKeys},
        flag_store::{FlagStore, RemoteLayer},
    },
    health::HealthHandle,
    metrics_consts::{REMOTE_FLAG_WRITES_COUNTER, SYNC_COUNTER},
    remote::{RemoteError, RemoteFlagStore, RemoteRecord},
};

#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error("malformed remote payload: {0}")]
    MalformedPayload(String),
    #[error("remote flags discarded: an emergency rollback happened during the fetch")]
    Superseded,
}

impl SyncError {
    fn outcome_label(&self) -> &'static str {
        match self {
            SyncError::Remote(RemoteError::NotFound) => "not_found",
            SyncError::Remote(RemoteError::Timeout) => "timeout",
            SyncError::Remote(_) => "unavailable",
            SyncError::MalformedPayload(_) => "malformed",
            SyncError::Superseded => "superseded",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub key: String,
    pub updated_at: DateTime<Utc>,
    pub flags_applied: usize,
    pub ignored_keys: Vec<String>,
    pub emergency_rollback: bool,
}

/// Validates a remote record against the schema. Any invalid value rejects the
/// whole record; keys from a newer schema are skipped.
pub fn parse_record(record: RemoteRecord) -> Result<(RemoteLayer, Vec<String>), SyncError> {
    let (flags, ignored) = FlagOverlay::from_json(&record.flags, UnknownKeys::Ignore)
        .map_err(|e| SyncError::MalformedPayload(e.to_string()))?;
    Ok((
        RemoteLayer {
            flags,
            updated_at: record.updated_at,
            emergency_rollback: record.emergency_rollback,
        },
        ignored,
    ))
}

/// Pulls the remote flag record for the store's environment and swaps it in.
pub struct RemoteSync {
    store: Arc<FlagStore>,
    remote: Arc<dyn RemoteFlagStore + Send + Sync>,
    key: String,
}

impl RemoteSync {
    pub fn new(store: Arc<FlagStore>, remote: Arc<dyn RemoteFlagStore + Send + Sync>) -> Self {
        let key = store.environment().remote_key().to_string();
        Self { store, remote, key }
    }

    /// One fetch, one replace. On any failure the store keeps what it had.
    /// Not retried here; [`run_sync_loop`] calls it on a schedule.
    #[instrument(skip_all, fields(key = %self.key))]
    pub async fn sync(&self) -> Result<SyncReport, SyncError> {
        let result = self.try_sync().await;
        match &result {
            Ok(report) => {
                tracing::info!(
                    flags = report.flags_applied,
                    updated_at = %report.updated_at,
                    "remote flags applied"
                );
                if !report.ignored_keys.is_empty() {
                    tracing::warn!(keys = ?report.ignored_keys, "ignored unknown remote flags");
                }
                metrics::counter!(SYNC_COUNTER, "outcome" => "applied").increment(1);
            }
            Err(e) => {
                tracing::warn!("remote sync failed, keeping current flags: {}", e);
                metrics::counter!(SYNC_COUNTER, "outcome" => e.outcome_label()).increment(1);
            }
        }
        result
    }

    async fn try_sync(&self) -> Result<SyncReport, SyncError> {
        let generation = self.store.generation();
        let record = self.remote.fetch(&self.key).await.map_err(|e| match e {
            RemoteError::Serialization(detail) => SyncError::MalformedPayload(detail),
            other => SyncError::Remote(other),
        })?;

        let (layer, ignored_keys) = parse_record(record)?;
        let report = SyncReport {
            key: self.key.clone(),
            updated_at: layer.updated_at,
            flags_applied: layer.flags.len(),
            ignored_keys,
            emergency_rollback: layer.emergency_rollback,
        };

        if !self.store.replace_remote(layer, generation) {
            return Err(SyncError::Superseded);
        }
        Ok(report)
    }

    /// Writes one flag into the remote record, then adopts the written record
    /// as the local remote layer. The current record is read first so other
    /// keys and the emergency marker survive the write. Local state only
    /// changes if the write succeeds.
    #[instrument(skip(self, value), fields(key = %self.key))]
    pub async fn update_remote_flag(
        &self,
        name: FlagName,
        value: FlagValue,
    ) -> Result<(), FlagError> {
        let value = name.validate(value)?;
        let generation = self.store.generation();

        let current = match self.remote.fetch(&self.key).await {
            Ok(record) => Some(record),
            Err(RemoteError::NotFound) => None,
            Err(RemoteError::Serialization(detail)) => {
                return Err(SyncError::MalformedPayload(detail).into())
            }
            Err(e) => return Err(e.into()),
        };
        let (mut flags, emergency_rollback) = match current {
            Some(record) => (record.flags, record.emergency_rollback),
            None => (Value::Object(Map::new()), false),
        };
        let Value::Object(entries) = &mut flags else {
            return Err(SyncError::MalformedPayload(
                "remote flags are not a JSON object".to_string(),
            )
            .into());
        };
        entries.insert(name.to_string(), serde_json::to_value(value)?);

        let record = RemoteRecord {
            flags,
            updated_at: Utc::now(),
            emergency_rollback,
        };
        // never persist a record the next sync would reject
        let (layer, _) = parse_record(record.clone())?;

        if self.store.generation() != generation {
            return Err(SyncError::Superseded.into());
        }
        if let Err(e) = self.remote.upsert(&self.key, &record).await {
            tracing::error!(flag = %name, "failed to write remote flag: {}", e);
            metrics::counter!(REMOTE_FLAG_WRITES_COUNTER, "outcome" => "failed").increment(1);
            return Err(e.into());
        }
        metrics::counter!(REMOTE_FLAG_WRITES_COUNTER, "outcome" => "written").increment(1);
        tracing::info!(flag = %name, ?value, emergency_rollback, "remote flag updated");

        if !self.store.replace_remote(layer, generation) {
            return Err(SyncError::Superseded.into());
        }
        Ok(())
    }
}

/// Re-runs [`RemoteSync::sync`] every `interval`, starting immediately.
/// A failed sync is already logged; the loop itself stays healthy.
pub async fn run_sync_loop(sync: Arc<RemoteSync>, interval: Duration, liveness: HealthHandle) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        if let Err(e) = sync.sync().await {
            tracing::debug!("sync loop continuing after failure: {}", e);
        }
        liveness.report_healthy();
    }
}
