//! Server configuration with layered loading from TOML and environment variables.

use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use binlevel_core::model::{BinId, BinRecord};
use binlevel_store_firestore::{DEFAULT_BASE_URL, DEFAULT_DATABASE};
use figment::{
    Error as FigmentError, Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

/// Configuration file used when `BINLEVEL_CONFIG` is not set.
pub const DEFAULT_CONFIG_PATH: &str = "binlevel.toml";
/// Environment variable pointing at an alternative configuration file.
pub const CONFIG_PATH_VAR: &str = "BINLEVEL_CONFIG";
/// Prefix of environment variables overriding file settings.
pub const ENV_PREFIX: &str = "BINLEVEL_";

/// Errors that can occur when loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Error from the Figment configuration library.
    #[error("Configuration error: {0}")]
    Figment(Box<FigmentError>),
}

impl From<FigmentError> for ConfigError {
    fn from(err: FigmentError) -> Self {
        Self::Figment(Box::new(err))
    }
}

/// Top-level service configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BinlevelConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Persistence backend.
    #[serde(default)]
    pub store: StoreConfig,
}

impl BinlevelConfig {
    /// Loads configuration from `BINLEVEL_CONFIG` or `binlevel.toml`.
    ///
    /// A missing file is not an error; defaults and environment overrides apply.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the file or an override cannot be parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let path = env::var_os(CONFIG_PATH_VAR)
            .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
        Self::load_from(path)
    }

    /// Loads configuration from the given file, then applies `BINLEVEL_` overrides.
    ///
    /// Nested keys use `__`, e.g. `BINLEVEL_STORE__PROJECT_ID`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the file or an override cannot be parsed.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            info!(path = %path.display(), "No configuration file, using defaults");
        }

        let figment = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        figment.extract::<Self>().map_err(ConfigError::from)
    }

    /// Parses configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the text is not a valid configuration.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Figment::new()
            .merge(Toml::string(content))
            .extract::<Self>()
            .map_err(ConfigError::from)
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address and port to bind the server to.
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Largest accepted request body.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

const fn default_bind_address() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 3000)
}

const fn default_max_body_bytes() -> usize {
    16 * 1024
}

/// Persistence backend selection.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StoreConfig {
    /// Keep everything in process memory.
    Memory {
        /// Bins registered at startup.
        #[serde(default)]
        bins: Vec<BinSeed>,
    },
    /// Cloud Firestore or its emulator.
    Firestore {
        /// Project id; taken from the credentials file when omitted.
        #[serde(default)]
        project_id: Option<String>,
        /// Database name.
        #[serde(default = "default_database")]
        database: String,
        /// Service-account key file. Without one, requests are unauthenticated.
        #[serde(default)]
        credentials_file: Option<PathBuf>,
        /// REST endpoint.
        #[serde(default = "default_base_url")]
        base_url: String,
    },
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::Memory { bins: Vec::new() }
    }
}

impl StoreConfig {
    /// Short name of the backend for logging.
    #[must_use]
    pub const fn backend_name(&self) -> &'static str {
        match self {
            Self::Memory { .. } => "memory",
            Self::Firestore { .. } => "firestore",
        }
    }
}

fn default_database() -> String {
    DEFAULT_DATABASE.to_owned()
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_owned()
}

/// Bin provisioned into the memory store at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct BinSeed {
    /// Bin identifier.
    pub id: String,
    /// Fillable height.
    pub height: f64,
    /// Dead zone below the sensor.
    #[serde(default)]
    pub buffer_height: Option<f64>,
    /// Device token.
    pub token: String,
}

impl From<&BinSeed> for BinRecord {
    fn from(seed: &BinSeed) -> Self {
        BinRecord {
            id: BinId(seed.id.clone()),
            height: seed.height,
            buffer_height: seed.buffer_height,
            token: seed.token.clone(),
            fill_level_percentage: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = BinlevelConfig::parse("").expect("parses");
        assert_eq!(config.server.bind_address, default_bind_address());
        assert_eq!(config.server.max_body_bytes, 16 * 1024);
        assert!(matches!(config.store, StoreConfig::Memory { ref bins } if bins.is_empty()));
    }

    #[test]
    fn parses_memory_seeds() {
        let config = BinlevelConfig::parse(
            r#"
            [server]
            bind_address = "127.0.0.1:8080"

            [store]
            backend = "memory"

            [[store.bins]]
            id = "bin-1"
            height = 120.0
            buffer_height = 8.0
            token = "secret"

            [[store.bins]]
            id = "bin-2"
            height = 90
            token = "other"
            "#,
        )
        .expect("parses");

        assert_eq!(config.server.bind_address.port(), 8080);
        let StoreConfig::Memory { bins } = config.store else {
            panic!("expected memory store");
        };
        assert_eq!(bins.len(), 2);
        let record = BinRecord::from(&bins[1]);
        assert_eq!(record.id, BinId::from("bin-2"));
        assert_eq!(record.buffer_height, None);
        assert!((record.height - 90.0).abs() < f64::EPSILON);
    }

    #[test]
    fn parses_firestore_with_defaults() {
        let config = BinlevelConfig::parse(
            r#"
            [store]
            backend = "firestore"
            credentials_file = "serviceAccountKey.json"
            "#,
        )
        .expect("parses");

        let StoreConfig::Firestore {
            project_id,
            database,
            credentials_file,
            base_url,
        } = config.store
        else {
            panic!("expected firestore store");
        };
        assert_eq!(project_id, None);
        assert_eq!(database, DEFAULT_DATABASE);
        assert_eq!(
            credentials_file,
            Some(PathBuf::from("serviceAccountKey.json"))
        );
        assert_eq!(base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn rejects_unknown_backend() {
        let result = BinlevelConfig::parse(
            r#"
            [store]
            backend = "postgres"
            "#,
        );
        assert!(result.is_err());
    }
}
