use crate::{
    api::errors::FlagError,
    flags::flag_models::{FlagName, FlagOverlay, FlagValue},
};

/// Process-local flag values that win over both baseline and remote.
/// Never persisted; owned by the [`FlagStore`](super::flag_store::FlagStore).
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    values: FlagOverlay,
}

impl Overrides {
    pub fn get(&self, name: FlagName) -> Option<FlagValue> {
        self.values.get(name)
    }

    pub(crate) fn set(&mut self, name: FlagName, value: FlagValue) -> Result<(), FlagError> {
        self.values.insert(name, value)
    }

    /// Overlay entries are validated on insert, so a batch applies whole.
    pub(crate) fn apply(&mut self, batch: &FlagOverlay) {
        self.values.extend(batch);
    }

    pub(crate) fn clear_one(&mut self, name: FlagName) -> bool {
        self.values.remove(name).is_some()
    }

    pub(crate) fn clear(&mut self) {
        self.values.clear()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn snapshot(&self) -> FlagOverlay {
        self.values.clone()
    }
}
