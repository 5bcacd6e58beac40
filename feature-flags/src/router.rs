use std::future::ready;

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::{
    api::endpoint,
    client::FlagClient,
    config::Config,
    health::HealthRegistry,
    metrics_utils::{setup_metrics_recorder, track_metrics},
};

#[derive(Clone)]
pub struct State {
    pub client: FlagClient,
}

pub fn router(client: FlagClient, liveness: HealthRegistry, config: &Config) -> Router {
    let state = State { client };

    // liveness/readiness checks
    let status_router = Router::new()
        .route("/", get(endpoint::index))
        .route("/_readiness", get(endpoint::readiness))
        .route("/_liveness", get(move || ready(liveness.get_status())));

    // consumer reads
    let read_router = Router::new()
        .route("/flags", get(endpoint::all_flags))
        .route("/flags/:name", get(endpoint::flag))
        .route("/targeting/:user_id", get(endpoint::targeting))
        .route("/variants/:test/:user_id", get(endpoint::variant));

    // operator writes
    let operator_router = Router::new()
        .route(
            "/overrides",
            post(endpoint::set_overrides).delete(endpoint::clear_overrides),
        )
        .route(
            "/overrides/:name",
            put(endpoint::set_override).delete(endpoint::clear_override),
        )
        .route("/remote/:name", put(endpoint::update_remote))
        .route("/sync", post(endpoint::sync))
        .route("/rollback", post(endpoint::rollback));

    let router = Router::new()
        .merge(status_router)
        .merge(read_router)
        .merge(operator_router)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(track_metrics))
        .with_state(state);

    // Global metrics recorders can play poorly with tests, so only install
    // one when asked to.
    if *config.enable_metrics {
        match setup_metrics_recorder() {
            Some(recorder_handle) => {
                router.route("/metrics", get(move || ready(recorder_handle.render())))
            }
            None => router,
        }
    } else {
        router
    }
}
