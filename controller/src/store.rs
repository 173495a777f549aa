use std::{io::ErrorKind, path::PathBuf};

use anyhow::Context;
use climate_common::{BrokerConfig, RuntimeConfig};
use tracing::info;

pub const DEFAULT_CONFIG_PATH: &str = "./thermostat.config.json";

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn from_env() -> Self {
        let path = std::env::var("THERMOSTAT_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::new(path)
    }

    pub async fn load(&self) -> anyhow::Result<RuntimeConfig> {
        let runtime = match tokio::fs::read(&self.path).await {
            Ok(raw) => serde_json::from_slice::<RuntimeConfig>(&raw)
                .with_context(|| format!("malformed config {}", self.path.display()))?,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!("no config at {}, using defaults", self.path.display());
                RuntimeConfig::default()
            }
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {}", self.path.display()))
            }
        };

        runtime
            .validate()
            .with_context(|| format!("invalid config {}", self.path.display()))?;
        Ok(runtime)
    }
}

pub fn apply_env_overrides(runtime: &mut RuntimeConfig, var: impl Fn(&str) -> Option<String>) {
    if let Some(port) = var("CONTROLLER_HTTP_PORT").and_then(|value| value.parse::<u16>().ok()) {
        runtime.server.http_port = port;
    }

    let host = var("MQTT_HOST");
    if host.is_none() && runtime.broker.is_none() {
        return;
    }

    let broker = runtime.broker.get_or_insert_with(BrokerConfig::default);
    if let Some(host) = host {
        broker.host = host;
    }
    if let Some(port) = var("MQTT_PORT").and_then(|value| value.parse::<u16>().ok()) {
        broker.port = port;
    }
    if let Some(user) = var("MQTT_USER") {
        broker.username = user;
    }
    if let Some(pass) = var("MQTT_PASS") {
        broker.password = pass;
    }
}
