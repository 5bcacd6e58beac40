use std::sync::Arc;

use crate::{
    api::errors::FlagError,
    flags::{
        environment::Environment,
        flag_models::{FlagName, FlagOverlay, FlagSet, FlagValue, Variant},
        flag_store::FlagStore,
        targeting::{AbTest, RolloutDecision, TargetingEvaluator},
    },
    metrics_consts::{EVALUATIONS_COUNTER, OVERRIDE_WRITES_COUNTER},
    remote::RemoteFlagStore,
    rollback::{EmergencyRollback, RollbackError},
    sync::{RemoteSync, SyncError, SyncReport},
};

/// Entry point for everything that reads or operates on flags.
///
/// Built once in the composition root and cloned into whatever needs it;
/// clones share one [`FlagStore`].
#[derive(Clone)]
pub struct FlagClient {
    store: Arc<FlagStore>,
    evaluator: TargetingEvaluator,
    sync: Arc<RemoteSync>,
    rollback: Arc<EmergencyRollback>,
}

impl FlagClient {
    pub fn new(environment: Environment, remote: Arc<dyn RemoteFlagStore + Send + Sync>) -> Self {
        let store = Arc::new(FlagStore::new(environment));
        Self {
            evaluator: TargetingEvaluator::new(store.clone()),
            sync: Arc::new(RemoteSync::new(store.clone(), remote.clone())),
            rollback: Arc::new(EmergencyRollback::new(store.clone(), remote)),
            store,
        }
    }

    pub fn store(&self) -> &Arc<FlagStore> {
        &self.store
    }

    pub fn environment(&self) -> Environment {
        self.store.environment()
    }

    pub fn remote_sync(&self) -> Arc<RemoteSync> {
        self.sync.clone()
    }

    // Consumer reads

    pub fn get_flag(&self, name: FlagName) -> FlagValue {
        self.store.get(name)
    }

    pub fn get_flag_by_name(&self, name: &str) -> Result<FlagValue, FlagError> {
        self.store.get_by_name(name)
    }

    pub fn get_all_flags(&self) -> FlagSet {
        self.store.get_all()
    }

    pub fn is_user_in_target_group(&self, user_id: &str) -> bool {
        metrics::counter!(EVALUATIONS_COUNTER, "kind" => "rollout").increment(1);
        self.evaluator.is_user_in_rollout(user_id)
    }

    pub fn rollout_decision(&self, user_id: &str) -> Result<RolloutDecision, FlagError> {
        metrics::counter!(EVALUATIONS_COUNTER, "kind" => "rollout").increment(1);
        self.evaluator.rollout_decision(user_id)
    }

    pub fn get_ab_test_variant(&self, test: AbTest, user_id: &str) -> Variant {
        metrics::counter!(EVALUATIONS_COUNTER, "kind" => "variant").increment(1);
        self.evaluator.get_variant(test, user_id)
    }

    pub fn get_ab_test_variant_by_name(
        &self,
        test_name: &str,
        user_id: &str,
    ) -> Result<Variant, FlagError> {
        metrics::counter!(EVALUATIONS_COUNTER, "kind" => "variant").increment(1);
        self.evaluator.get_variant_by_name(test_name, user_id)
    }

    pub fn is_feature_enabled_for_user(
        &self,
        flag: FlagName,
        user_id: &str,
    ) -> Result<bool, FlagError> {
        metrics::counter!(EVALUATIONS_COUNTER, "kind" => "feature").increment(1);
        self.evaluator.is_feature_enabled_for_user(flag, user_id)
    }

    // Operator writes

    pub fn set_flag_override(&self, name: FlagName, value: FlagValue) -> Result<(), FlagError> {
        self.store.set(name, value)?;
        metrics::counter!(OVERRIDE_WRITES_COUNTER, "op" => "set").increment(1);
        Ok(())
    }

    pub fn set_flag_overrides(&self, batch: &FlagOverlay) {
        self.store.update(batch);
        metrics::counter!(OVERRIDE_WRITES_COUNTER, "op" => "batch").increment(1);
    }

    pub fn clear_flag_override(&self, name: FlagName) -> bool {
        metrics::counter!(OVERRIDE_WRITES_COUNTER, "op" => "clear").increment(1);
        self.store.clear_override(name)
    }

    pub fn clear_all_overrides(&self) {
        metrics::counter!(OVERRIDE_WRITES_COUNTER, "op" => "reset").increment(1);
        self.store.reset()
    }

    pub async fn update_remote_flag(&self, name: FlagName, value: FlagValue) -> Result<(), FlagError> {
        self.sync.update_remote_flag(name, value).await
    }

    pub async fn sync_now(&self) -> Result<SyncReport, SyncError> {
        self.sync.sync().await
    }

    pub async fn emergency_rollback(&self) -> Result<(), RollbackError> {
        self.rollback.rollback().await
    }
}
