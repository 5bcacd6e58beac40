use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    api::errors::FlagError,
    flags::{
        defaults::resolve_baseline,
        environment::Environment,
        flag_models::{FlagKind, FlagName, FlagOverlay, FlagSet, FlagValue, Percentage, Variant},
        overrides::Overrides,
    },
};

/// The remote layer as last fetched. Replaced wholesale, never diffed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLayer {
    pub flags: FlagOverlay,
    pub updated_at: DateTime<Utc>,
    pub emergency_rollback: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StorePhase {
    BaselineOnly,
    Synced,
    SyncedOverridden,
    EmergencyLocked,
}

#[derive(Debug)]
struct StoreState {
    baseline: FlagSet,
    remote: Option<RemoteLayer>,
    /// baseline ⊕ remote, kept in step with both
    merged: FlagSet,
    overrides: Overrides,
    emergency: bool,
    /// Bumped by every emergency rollback so fetches that started before it
    /// can't resurrect the pre-rollback remote layer.
    generation: u64,
}

/// Holds the current flag values for the process.
///
/// Reads resolve Override > remote > baseline. All writers go through this
/// type and every write happens under one lock, so readers see either the
/// state before a batch/merge/rollback or the state after it.
#[derive(Debug)]
pub struct FlagStore {
    environment: Environment,
    state: RwLock<StoreState>,
}

impl FlagStore {
    pub fn new(environment: Environment) -> Self {
        Self::with_baseline(environment, resolve_baseline(environment))
    }

    pub fn with_baseline(environment: Environment, baseline: FlagSet) -> Self {
        tracing::info!(%environment, "seeding flag store from baseline");
        Self {
            environment,
            state: RwLock::new(StoreState {
                merged: baseline.clone(),
                baseline,
                remote: None,
                overrides: Overrides::default(),
                emergency: false,
                generation: 0,
            }),
        }
    }

    // A panic while holding the lock can't leave the state half-written:
    // every mutation below is a set of plain assignments.
    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn get(&self, name: FlagName) -> FlagValue {
        let state = self.read();
        state
            .overrides
            .get(name)
            .unwrap_or_else(|| state.merged.get(name))
    }

    pub fn get_by_name(&self, name: &str) -> Result<FlagValue, FlagError> {
        Ok(self.get(FlagName::parse(name)?))
    }

    pub fn get_bool(&self, name: FlagName) -> Result<bool, FlagError> {
        self.get(name).as_bool().ok_or(FlagError::TypeMismatch {
            flag: name,
            expected: FlagKind::Boolean,
        })
    }

    pub fn get_percentage(&self, name: FlagName) -> Result<Percentage, FlagError> {
        self.get(name).as_percentage().ok_or(FlagError::TypeMismatch {
            flag: name,
            expected: FlagKind::Percentage,
        })
    }

    pub fn get_variant(&self, name: FlagName) -> Result<Variant, FlagError> {
        self.get(name).as_variant().ok_or(FlagError::TypeMismatch {
            flag: name,
            expected: FlagKind::Variant,
        })
    }

    /// Merged baseline and remote values with overrides applied.
    pub fn get_all(&self) -> FlagSet {
        let state = self.read();
        state.merged.overlaid(&state.overrides.snapshot())
    }

    /// Baseline ⊕ remote, ignoring overrides.
    pub fn get_merged(&self) -> FlagSet {
        self.read().merged.clone()
    }

    pub fn overrides(&self) -> FlagOverlay {
        self.read().overrides.snapshot()
    }

    pub fn is_overridden(&self, name: FlagName) -> bool {
        self.read().overrides.get(name).is_some()
    }

    pub fn set(&self, name: FlagName, value: FlagValue) -> Result<(), FlagError> {
        self.write().overrides.set(name, value)?;
        tracing::info!(flag = %name, ?value, "flag override set");
        Ok(())
    }

    /// Applies a batch of overrides in one write.
    pub fn update(&self, batch: &FlagOverlay) {
        self.write().overrides.apply(batch);
        tracing::info!(count = batch.len(), "flag overrides updated");
    }

    pub fn clear_override(&self, name: FlagName) -> bool {
        let cleared = self.write().overrides.clear_one(name);
        if cleared {
            tracing::info!(flag = %name, "flag override cleared");
        }
        cleared
    }

    /// Drops every override. Does not refetch the remote layer.
    pub fn reset(&self) {
        self.write().overrides.clear();
        tracing::info!("all flag overrides cleared");
    }

    pub fn remote_layer(&self) -> Option<RemoteLayer> {
        self.read().remote.clone()
    }

    pub fn generation(&self) -> u64 {
        self.read().generation
    }

    /// Swaps in a freshly fetched remote layer. Returns false, leaving the
    /// state untouched, if an emergency rollback happened since `generation`
    /// was read.
    pub fn replace_remote(&self, layer: RemoteLayer, generation: u64) -> bool {
        let mut state = self.write();
        if state.generation != generation {
            tracing::warn!(
                expected = generation,
                current = state.generation,
                "discarding remote flags fetched before an emergency rollback"
            );
            return false;
        }
        state.merged = state.baseline.overlaid(&layer.flags);
        state.remote = Some(layer);
        true
    }

    /// Replaces everything with `snapshot`: baseline, remote layer and
    /// overrides. Overrides from before the rollback are not restored.
    pub fn apply_emergency(&self, snapshot: FlagSet) {
        let mut state = self.write();
        state.merged = snapshot.clone();
        state.baseline = snapshot;
        state.remote = None;
        state.overrides.clear();
        state.emergency = true;
        state.generation += 1;
    }

    pub fn phase(&self) -> StorePhase {
        let state = self.read();
        if state.emergency {
            StorePhase::EmergencyLocked
        } else if state.remote.is_none() {
            StorePhase::BaselineOnly
        } else if state.overrides.is_empty() {
            StorePhase::Synced
        } else {
            StorePhase::SyncedOverridden
        }
    }
}
