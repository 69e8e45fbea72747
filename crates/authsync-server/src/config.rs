//! Operator configuration

use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use authsync_authentik::AuthentikConfig;
use authsync_reconcile::{ControllerConfig, ReconcilerConfig, UpdatePolicy};

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub authentik: AuthentikSettings,
    pub operator: OperatorSettings,
}

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct AuthentikSettings {
    pub url: String,
    pub token: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct OperatorSettings {
    #[serde(default = "default_finalizer")]
    pub finalizer: String,
    #[serde(default = "default_manifests_dir")]
    pub manifests_dir: PathBuf,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_resync_interval_secs")]
    pub resync_interval_secs: u64,
    #[serde(default = "default_reconcile_timeout_secs")]
    pub reconcile_timeout_secs: u64,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
    /// Update drifted Application/Group/User records instead of only logging
    #[serde(default)]
    pub update_existing: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_finalizer() -> String {
    "authsync.io/finalizer".to_string()
}

fn default_manifests_dir() -> PathBuf {
    PathBuf::from("manifests")
}

fn default_concurrency() -> usize {
    4
}

fn default_resync_interval_secs() -> u64 {
    300
}

fn default_reconcile_timeout_secs() -> u64 {
    60
}

fn default_backoff_base_ms() -> u64 {
    500
}

fn default_backoff_max_ms() -> u64 {
    300_000
}

impl Settings {
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("authentik.timeout_secs", 30)?
            .set_default("operator.finalizer", "authsync.io/finalizer")?
            .set_default("operator.manifests_dir", "manifests")?
            // Load from config file if present
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            // Load from environment variables with AUTHSYNC_ prefix
            .add_source(
                config::Environment::with_prefix("AUTHSYNC")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

impl AuthentikSettings {
    pub fn client_config(&self) -> AuthentikConfig {
        AuthentikConfig::new(self.url.clone(), self.token.clone())
            .with_timeout_secs(self.timeout_secs)
    }
}

impl OperatorSettings {
    pub fn reconciler_config(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            finalizer: self.finalizer.clone(),
            update_policy: if self.update_existing {
                UpdatePolicy::UpdateExisting
            } else {
                UpdatePolicy::CreateOnly
            },
        }
    }

    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            concurrency: self.concurrency,
            resync_interval: Duration::from_secs(self.resync_interval_secs),
            reconcile_timeout: Duration::from_secs(self.reconcile_timeout_secs),
            backoff_base: Duration::from_millis(self.backoff_base_ms),
            backoff_max: Duration::from_millis(self.backoff_max_ms),
        }
    }
}
