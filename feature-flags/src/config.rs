use std::net::SocketAddr;
use std::ops::Deref;
use std::str::FromStr;
use std::time::Duration;

use envconfig::Envconfig;

use crate::flags::environment::Environment;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlexBool(pub bool);

impl FromStr for FlexBool {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(FlexBool(true)),
            "false" | "0" | "no" | "off" | "" => Ok(FlexBool(false)),
            _ => Err(format!("Invalid boolean value: {}", s)),
        }
    }
}

impl From<FlexBool> for bool {
    fn from(flex: FlexBool) -> Self {
        flex.0
    }
}

impl Deref for FlexBool {
    type Target = bool;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Envconfig, Clone, Debug)]
pub struct Config {
    #[envconfig(default = "127.0.0.1:3001")]
    pub address: SocketAddr,

    /// Runtime environment signal: development, test, staging or production
    #[envconfig(from = "APP_ENV", default = "development")]
    pub app_env: String,

    /// Production checkpoint: initial, alpha, beta, 25, 50, 75 or full
    #[envconfig(from = "ROLLOUT_STAGE", default = "initial")]
    pub rollout_stage: String,

    #[envconfig(default = "redis://localhost:6379/")]
    pub redis_url: String,

    #[envconfig(from = "REMOTE_TIMEOUT_MS", default = "500")]
    pub remote_timeout_ms: u64,

    #[envconfig(from = "SYNC_INTERVAL_SECS", default = "60")]
    pub sync_interval_secs: u64,

    #[envconfig(from = "ENABLE_REMOTE_SYNC", default = "true")]
    pub enable_remote_sync: FlexBool,

    #[envconfig(from = "ENABLE_METRICS", default = "false")]
    pub enable_metrics: FlexBool,

    #[envconfig(from = "DEBUG", default = "false")]
    pub debug: FlexBool,
}

impl Config {
    pub fn default_test_config() -> Self {
        Self {
            address: SocketAddr::from(([127, 0, 0, 1], 0)),
            app_env: "test".to_string(),
            rollout_stage: "initial".to_string(),
            redis_url: "redis://localhost:6379/".to_string(),
            remote_timeout_ms: 100,
            sync_interval_secs: 60,
            enable_remote_sync: FlexBool(false),
            enable_metrics: FlexBool(false),
            debug: FlexBool(false),
        }
    }

    /// Resolved once at startup; see [`Environment::from_signal`].
    pub fn environment(&self) -> Environment {
        Environment::from_signal(&self.app_env, &self.rollout_stage)
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_millis(self.remote_timeout_ms)
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs.max(1))
    }
}
