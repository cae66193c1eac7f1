//! Layered configuration
//!
//! Sources, later wins: built-in defaults, an optional YAML file, then
//! `CHARTMQ_*` environment variables with `__` between sections
//! (`CHARTMQ_BROKER__URI`). A `.env` file is loaded into the environment first.

use chartmq_kube::HelmConfig;
use chartmq_worker::WorkerSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{CliError, Result};

/// Default config file, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "chartmq.yaml";

const ENV_PREFIX: &str = "CHARTMQ";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub app: AppSettings,
    pub broker: BrokerSettings,
    pub database: DatabaseSettings,
    pub helm: HelmConfig,
    pub server: ServerSettings,
    pub log: LogSettings,
}

#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Passphrase for repository credentials at rest
    pub passkey: String,
}

impl std::fmt::Debug for AppSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppSettings")
            .field("passkey", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerSettings {
    pub uri: String,
    pub install_queue: String,
    pub result_queue: String,
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub publish_timeout: Duration,
    pub prefetch: u16,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        let worker = WorkerSettings::default();
        Self {
            uri: worker.uri,
            install_queue: worker.install_queue,
            result_queue: worker.result_queue,
            connect_timeout: worker.connect_timeout,
            publish_timeout: worker.publish_timeout,
            prefetch: worker.prefetch,
        }
    }
}

impl BrokerSettings {
    pub fn worker_settings(&self) -> WorkerSettings {
        WorkerSettings {
            uri: self.uri.clone(),
            install_queue: self.install_queue.clone(),
            result_queue: self.result_queue.clone(),
            connect_timeout: self.connect_timeout,
            publish_timeout: self.publish_timeout,
            prefetch: self.prefetch,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// SQLite file, defaults to the user data directory
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl ServerSettings {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

impl Settings {
    /// Load from `.env`, the config file and the environment
    ///
    /// An explicit `path` must exist. Without one, `chartmq.yaml` is read
    /// when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();
        let settings = Self::build(path, true)?;
        settings.validate()?;
        Ok(settings)
    }

    fn build(path: Option<&Path>, with_env: bool) -> Result<Self> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let mut builder = config::Config::builder().add_source(file);
        if with_env {
            builder = builder.add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );
        }
        Ok(builder.build()?.try_deserialize()?)
    }

    /// Reject settings that cannot work before anything connects
    pub fn validate(&self) -> Result<()> {
        if self.app.passkey.trim().is_empty() {
            return Err(CliError::config_with_help(
                "app.passkey is not set",
                format!("set it in {DEFAULT_CONFIG_FILE} or through {ENV_PREFIX}_APP__PASSKEY"),
            ));
        }
        if self.broker.uri.trim().is_empty() {
            return Err(CliError::config("broker.uri is empty"));
        }

        let timeouts = [
            ("helm.timeout", self.helm.timeout),
            ("helm.repository_timeout", self.helm.repository_timeout),
            ("broker.connect_timeout", self.broker.connect_timeout),
            ("broker.publish_timeout", self.broker.publish_timeout),
        ];
        for (key, value) in timeouts {
            if value.is_zero() {
                return Err(CliError::config(format!("{key} must be greater than zero")));
            }
        }
        if self.broker.prefetch == 0 {
            return Err(CliError::config("broker.prefetch must be at least 1"));
        }
        Ok(())
    }
}
