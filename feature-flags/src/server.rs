use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use crate::client::FlagClient;
use crate::config::Config;
use crate::health::{HealthHandle, HealthRegistry};
use crate::remote::redis_store::RedisRemoteStore;
use crate::remote::RemoteFlagStore;
use crate::router;
use crate::sync::run_sync_loop;

pub async fn serve<F>(config: Config, listener: TcpListener, shutdown: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    let remote = match RedisRemoteStore::new(config.redis_url.clone(), config.remote_timeout()) {
        Ok(remote) => Arc::new(remote),
        Err(e) => {
            tracing::error!(
                "Failed to create Redis client for URL {}: {}",
                config.redis_url,
                e
            );
            return;
        }
    };

    serve_with_remote(config, remote, listener, shutdown).await
}

/// Runs the service against any remote store. Tests pass a mock here.
pub async fn serve_with_remote<F>(
    config: Config,
    remote: Arc<dyn RemoteFlagStore + Send + Sync>,
    listener: TcpListener,
    shutdown: F,
) where
    F: Future<Output = ()> + Send + 'static,
{
    let environment = config.environment();
    tracing::info!(%environment, "resolved environment");

    let client = FlagClient::new(environment, remote);
    let health = HealthRegistry::new("liveness");

    if *config.enable_remote_sync {
        let interval = config.sync_interval();
        let handle = health.register("remote_sync".to_string(), interval * 3);
        tokio::spawn(run_sync_loop(client.remote_sync(), interval, handle));
    } else {
        tracing::info!("remote sync disabled, serving baseline flags only");
        let simple_loop = health.register("simple_loop".to_string(), Duration::from_secs(30));
        tokio::spawn(liveness_loop(simple_loop));
    }

    let app = router::router(client, health, &config);

    match listener.local_addr() {
        Ok(addr) => tracing::info!("listening on {:?}", addr),
        Err(e) => tracing::warn!("could not read listener address: {}", e),
    }
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
    {
        tracing::error!("server error: {}", e);
    }
}

async fn liveness_loop(handle: HealthHandle) {
    loop {
        handle.report_healthy();
        tokio::time::sleep(Duration::from_secs(10)).await;
    }
}
