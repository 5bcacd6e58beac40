use std::net::SocketAddr;
use std::sync::Arc;

use once_cell::sync::Lazy;
use reqwest::header::CONTENT_TYPE;
use tokio::net::TcpListener;
use tokio::sync::Notify;

use mamapace_flags::config::Config;
use mamapace_flags::remote::mock::MockRemoteStore;
use mamapace_flags::server::serve_with_remote;

pub use mamapace_flags::test_utils::*;

pub static DEFAULT_CONFIG: Lazy<Config> = Lazy::new(Config::default_test_config);

pub fn config_for(app_env: &str, rollout_stage: &str) -> Config {
    Config {
        app_env: app_env.to_string(),
        rollout_stage: rollout_stage.to_string(),
        ..DEFAULT_CONFIG.clone()
    }
}

pub struct ServerHandle {
    pub addr: SocketAddr,
    shutdown: Arc<Notify>,
}

impl ServerHandle {
    pub async fn for_config(config: Config) -> ServerHandle {
        ServerHandle::for_remote(config, MockRemoteStore::new()).await
    }

    pub async fn for_remote(config: Config, remote: MockRemoteStore) -> ServerHandle {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let notify = Arc::new(Notify::new());
        let shutdown = notify.clone();

        tokio::spawn(async move {
            serve_with_remote(config, Arc::new(remote), listener, async move {
                notify.notified().await
            })
            .await
        });
        ServerHandle { addr, shutdown }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{:?}{}", self.addr, path)
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        reqwest::Client::new()
            .get(self.url(path))
            .send()
            .await
            .expect("failed to send request")
    }

    pub async fn put<T: Into<reqwest::Body>>(&self, path: &str, body: T) -> reqwest::Response {
        reqwest::Client::new()
            .put(self.url(path))
            .body(body)
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await
            .expect("failed to send request")
    }

    pub async fn post<T: Into<reqwest::Body>>(&self, path: &str, body: T) -> reqwest::Response {
        reqwest::Client::new()
            .post(self.url(path))
            .body(body)
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await
            .expect("failed to send request")
    }

    pub async fn delete(&self, path: &str) -> reqwest::Response {
        reqwest::Client::new()
            .delete(self.url(path))
            .send()
            .await
            .expect("failed to send request")
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.shutdown.notify_one()
    }
}
