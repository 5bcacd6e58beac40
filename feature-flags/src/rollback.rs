use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::instrument;

use crate::{
    flags::{defaults::emergency_snapshot, flag_store::FlagStore},
    metrics_consts::ROLLBACK_COUNTER,
    remote::{RemoteError, RemoteFlagStore, RemoteRecord},
};

#[derive(Error, Debug)]
pub enum RollbackError {
    #[error("local rollback applied, but persisting it remotely failed: {0}")]
    RemoteWriteFailed(#[source] RemoteError),
    #[error("local rollback applied, but the snapshot could not be serialized: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Operator kill switch: swaps the whole flag state for the safe snapshot.
pub struct EmergencyRollback {
    store: Arc<FlagStore>,
    remote: Arc<dyn RemoteFlagStore + Send + Sync>,
    key: String,
}

impl EmergencyRollback {
    pub fn new(store: Arc<FlagStore>, remote: Arc<dyn RemoteFlagStore + Send + Sync>) -> Self {
        let key = store.environment().remote_key().to_string();
        Self { store, remote, key }
    }

    /// Applies the safe snapshot locally first and unconditionally, then tries
    /// to persist it. A failed remote write is returned but never undoes the
    /// local change.
    #[instrument(skip_all, fields(key = %self.key))]
    pub async fn rollback(&self) -> Result<(), RollbackError> {
        let snapshot = emergency_snapshot();
        self.store.apply_emergency(snapshot.clone());
        tracing::warn!("emergency rollback applied locally");

        let record = RemoteRecord {
            flags: serde_json::to_value(&snapshot)?,
            updated_at: Utc::now(),
            emergency_rollback: true,
        };

        match self.remote.upsert(&self.key, &record).await {
            Ok(()) => {
                tracing::warn!("emergency rollback persisted remotely");
                metrics::counter!(ROLLBACK_COUNTER, "remote" => "persisted").increment(1);
                Ok(())
            }
            Err(e) => {
                tracing::error!("emergency rollback not persisted remotely: {}", e);
                metrics::counter!(ROLLBACK_COUNTER, "remote" => "failed").increment(1);
                Err(RollbackError::RemoteWriteFailed(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::{
        environment::Environment,
        flag_models::{FlagName, FlagValue, Percentage, Variant},
        flag_store::StorePhase,
    };
    use crate::remote::mock::{MockRemoteCall, MockRemoteStore};

    fn assert_locked_down(store: &FlagStore) {
        assert_eq!(
            store.get(FlagName::TargetUserPercentage),
            FlagValue::Percentage(Percentage::ZERO)
        );
        assert_eq!(store.get(FlagName::AbTestingEnabled), FlagValue::Bool(false));
        for test in [
            FlagName::NotificationTimingTest,
            FlagName::NotificationContentTest,
            FlagName::UiVariantTest,
        ] {
            assert_eq!(store.get(test), FlagValue::Variant(Variant::Off));
        }
        assert_eq!(
            store.get(FlagName::TokenEncryptionEnabled),
            FlagValue::Bool(true)
        );
        assert_eq!(store.phase(), StorePhase::EmergencyLocked);
    }

    #[tokio::test]
    async fn test_rollback_applies_and_persists() {
        let remote = MockRemoteStore::new();
        let store = Arc::new(FlagStore::new(Environment::Production75));
        store
            .set(FlagName::UiVariantTest, FlagValue::Variant(Variant::V2))
            .unwrap();
        let rollback = EmergencyRollback::new(store.clone(), Arc::new(remote.clone()));

        rollback.rollback().await.unwrap();

        assert_locked_down(&store);
        let calls = remote.get_calls();
        assert_eq!(calls.len(), 1);
        match &calls[0] {
            MockRemoteCall::Upsert(key, record) => {
                assert_eq!(key, "production");
                assert!(record.emergency_rollback);
                assert_eq!(record.flags, serde_json::to_value(emergency_snapshot()).unwrap());
            }
            other => panic!("Expected an upsert, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rollback_holds_locally_when_remote_write_fails() {
        let remote =
            MockRemoteStore::new().upsert_error(Some(RemoteError::Unavailable("down".to_string())));
        let store = Arc::new(FlagStore::new(Environment::ProductionFull));
        let rollback = EmergencyRollback::new(store.clone(), Arc::new(remote));

        let result = rollback.rollback().await;

        assert!(matches!(result, Err(RollbackError::RemoteWriteFailed(_))));
        assert_locked_down(&store);
    }
}
