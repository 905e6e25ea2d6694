//! Layered runtime configuration.
//!
//! Sources, later overriding earlier:
//! 1. Built-in defaults
//! 2. TOML file given with `--config` (if any)
//! 3. `INVENTORY__SECTION__KEY` environment variables
//! 4. `COSMOSDB_*` variables understood by earlier deployments (applied as overrides)

use crate::store::{DocumentBackend, HttpBackend, MemoryBackend, StoreLimits};

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const ENV_PREFIX: &str = "INVENTORY";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub store: StoreSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
    pub request_timeout_ms: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:7071".to_string(),
            request_timeout_ms: 10_000,
        }
    }
}

impl ServerSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Memory,
    Http,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub backend: BackendKind,
    pub endpoint: Option<String>,
    pub database: String,
    pub containers: ContainerSettings,
    pub network_timeout_ms: u64,
    pub read_retry_attempts: usize,
    pub default_page_size: usize,
    pub max_page_size: usize,
    pub max_batch_size: usize,
}

impl Default for StoreSettings {
    fn default() -> Self {
        let limits = StoreLimits::default();
        Self {
            backend: BackendKind::Memory,
            endpoint: None,
            database: "inventory".to_string(),
            containers: ContainerSettings::default(),
            network_timeout_ms: 500,
            read_retry_attempts: 3,
            default_page_size: limits.default_page_size,
            max_page_size: limits.max_page_size,
            max_batch_size: limits.max_batch_size,
        }
    }
}

impl StoreSettings {
    pub fn limits(&self) -> StoreLimits {
        StoreLimits {
            default_page_size: self.default_page_size,
            max_page_size: self.max_page_size,
            max_batch_size: self.max_batch_size,
        }
    }

    /// Collection name of `container` inside the configured database.
    pub fn collection(&self, container: &str) -> String {
        format!("{}.{}", self.database, container)
    }

    /// Opens the configured backend. Called once per process.
    pub fn open_backend(&self) -> Result<Arc<dyn DocumentBackend>, ConfigError> {
        match self.backend {
            BackendKind::Memory => Ok(Arc::new(MemoryBackend::new())),
            BackendKind::Http => {
                let endpoint = self.endpoint.as_deref().ok_or_else(|| {
                    ConfigError::Invalid("store.endpoint is required for the http backend".into())
                })?;
                let backend = HttpBackend::new(
                    endpoint,
                    Duration::from_millis(self.network_timeout_ms),
                    self.read_retry_attempts,
                )
                .map_err(|e| ConfigError::Invalid(e.to_string()))?;
                Ok(Arc::new(backend))
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContainerSettings {
    pub products: String,
    pub locations: String,
    pub inventory: String,
}

impl Default for ContainerSettings {
    fn default() -> Self {
        Self {
            products: "products".to_string(),
            locations: "locations".to_string(),
            inventory: "inventory".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl Settings {
    /// Loads settings from the optional file and the environment, then validates them.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }

        let settings: Settings = builder
            .set_override_option("store.endpoint", std::env::var("COSMOSDB_ENDPOINT").ok())?
            .set_override_option("store.database", std::env::var("COSMOSDB_DATABASE_NAME").ok())?
            .set_override_option(
                "store.containers.products",
                std::env::var("COSMOSDB_CONTAINER_PRODUCTS").ok(),
            )?
            .set_override_option(
                "store.containers.locations",
                std::env::var("COSMOSDB_CONTAINER_LOCATIONS").ok(),
            )?
            .set_override_option(
                "store.containers.inventory",
                std::env::var("COSMOSDB_CONTAINER_INVENTORY").ok(),
            )?
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let store = &self.store;
        if store.backend == BackendKind::Http && store.endpoint.is_none() {
            return Err(ConfigError::Invalid(
                "store.endpoint is required when store.backend is http".into(),
            ));
        }
        if store.default_page_size == 0 || store.max_page_size == 0 || store.max_batch_size == 0 {
            return Err(ConfigError::Invalid(
                "page and batch sizes must be at least 1".into(),
            ));
        }
        if store.default_page_size > store.max_page_size {
            return Err(ConfigError::Invalid(format!(
                "store.default_page_size ({}) exceeds store.max_page_size ({})",
                store.default_page_size, store.max_page_size
            )));
        }
        if store.database.trim().is_empty() {
            return Err(ConfigError::Invalid("store.database must not be empty".into()));
        }
        if self.server.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "server.request_timeout_ms must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
