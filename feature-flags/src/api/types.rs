use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::flags::{
    environment::Environment,
    flag_models::{FlagKind, FlagName, FlagOverlay, FlagSet, FlagValue, Variant},
    flag_store::StorePhase,
    targeting::RolloutDecision,
};

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct FlagsResponse {
    pub environment: Environment,
    pub phase: StorePhase,
    pub flags: FlagSet,
    pub overrides: FlagOverlay,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct FlagResponse {
    pub name: FlagName,
    pub kind: FlagKind,
    pub value: FlagValue,
    pub overridden: bool,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct TargetingResponse {
    pub user_id: String,
    #[serde(flatten)]
    pub decision: RolloutDecision,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct VariantResponse {
    pub test: FlagName,
    pub user_id: String,
    pub variant: Variant,
}

/// Body of single-flag writes. The value is checked against the flag's kind
/// once the name is known.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FlagValueRequest {
    pub value: Value,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct ClearOverrideResponse {
    pub name: FlagName,
    pub cleared: bool,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct RollbackResponse {
    pub local_applied: bool,
    pub remote_persisted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_error: Option<String>,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct ReadinessResponse {
    pub environment: Environment,
    pub phase: StorePhase,
}
