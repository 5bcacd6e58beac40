use axum::extract::{Path, State};
use axum::Json;
use bytes::Bytes;
use serde_json::Value;

use crate::{
    api::{
        errors::FlagError,
        types::{
            ClearOverrideResponse, FlagResponse, FlagValueRequest, FlagsResponse,
            ReadinessResponse, RollbackResponse, TargetingResponse, VariantResponse,
        },
    },
    client::FlagClient,
    flags::flag_models::{FlagName, FlagOverlay, FlagValue, UnknownKeys},
    flags::targeting::AbTest,
    router,
    sync::SyncReport,
};

fn flags_response(client: &FlagClient) -> FlagsResponse {
    let store = client.store();
    FlagsResponse {
        environment: client.environment(),
        phase: store.phase(),
        flags: store.get_all(),
        overrides: store.overrides(),
    }
}

fn flag_response(client: &FlagClient, name: FlagName) -> FlagResponse {
    FlagResponse {
        name,
        kind: name.kind(),
        value: client.get_flag(name),
        overridden: client.store().is_overridden(name),
    }
}

/// Bodies are parsed here rather than by an extractor so malformed JSON comes
/// back in the same error shape as everything else.
fn parse_value(name: FlagName, body: &Bytes) -> Result<FlagValue, FlagError> {
    let request: FlagValueRequest = serde_json::from_slice(body)?;
    FlagValue::from_json(name, &request.value)
}

pub async fn all_flags(State(state): State<router::State>) -> Json<FlagsResponse> {
    Json(flags_response(&state.client))
}

pub async fn flag(
    State(state): State<router::State>,
    Path(name): Path<String>,
) -> Result<Json<FlagResponse>, FlagError> {
    let name = FlagName::parse(&name)?;
    Ok(Json(flag_response(&state.client, name)))
}

pub async fn targeting(
    State(state): State<router::State>,
    Path(user_id): Path<String>,
) -> Result<Json<TargetingResponse>, FlagError> {
    let decision = state.client.rollout_decision(&user_id)?;
    Ok(Json(TargetingResponse { user_id, decision }))
}

pub async fn variant(
    State(state): State<router::State>,
    Path((test, user_id)): Path<(String, String)>,
) -> Result<Json<VariantResponse>, FlagError> {
    let test = AbTest::parse(&test)?;
    let variant = state.client.get_ab_test_variant(test, &user_id);
    Ok(Json(VariantResponse {
        test: test.flag(),
        user_id,
        variant,
    }))
}

pub async fn set_override(
    State(state): State<router::State>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Json<FlagResponse>, FlagError> {
    let name = FlagName::parse(&name)?;
    let value = parse_value(name, &body)?;
    state.client.set_flag_override(name, value)?;
    Ok(Json(flag_response(&state.client, name)))
}

/// Applies a whole object of overrides at once. Unknown names reject the batch.
pub async fn set_overrides(
    State(state): State<router::State>,
    body: Bytes,
) -> Result<Json<FlagsResponse>, FlagError> {
    let raw: Value = serde_json::from_slice(&body)?;
    let (batch, _) = FlagOverlay::from_json(&raw, UnknownKeys::Reject)?;
    state.client.set_flag_overrides(&batch);
    Ok(Json(flags_response(&state.client)))
}

pub async fn clear_override(
    State(state): State<router::State>,
    Path(name): Path<String>,
) -> Result<Json<ClearOverrideResponse>, FlagError> {
    let name = FlagName::parse(&name)?;
    let cleared = state.client.clear_flag_override(name);
    Ok(Json(ClearOverrideResponse { name, cleared }))
}

pub async fn clear_overrides(State(state): State<router::State>) -> Json<FlagsResponse> {
    state.client.clear_all_overrides();
    Json(flags_response(&state.client))
}

pub async fn update_remote(
    State(state): State<router::State>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Json<FlagResponse>, FlagError> {
    let name = FlagName::parse(&name)?;
    let value = parse_value(name, &body)?;
    state.client.update_remote_flag(name, value).await?;
    Ok(Json(flag_response(&state.client, name)))
}

pub async fn sync(State(state): State<router::State>) -> Result<Json<SyncReport>, FlagError> {
    Ok(Json(state.client.sync_now().await?))
}

/// Always succeeds locally. A failed remote write is reported in the body, not
/// as an error status, since the process is already rolled back.
pub async fn rollback(State(state): State<router::State>) -> Json<RollbackResponse> {
    let remote_error = state.client.emergency_rollback().await.err();
    Json(RollbackResponse {
        local_applied: true,
        remote_persisted: remote_error.is_none(),
        remote_error: remote_error.map(|e| e.to_string()),
    })
}

/// The store always holds a complete baseline, so the service can answer from
/// the first request on. The body says which layers are live.
pub async fn readiness(State(state): State<router::State>) -> Json<ReadinessResponse> {
    Json(ReadinessResponse {
        environment: state.client.environment(),
        phase: state.client.store().phase(),
    })
}

pub async fn index() -> &'static str {
    "mamapace feature flags"
}
