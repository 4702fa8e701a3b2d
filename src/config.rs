use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_MIN_CONNECTIONS: u32 = 1;
const CONFIG_DIR: &str = "config";
const ENV_PREFIX: &str = "STOCKLEDGER";

/// Application configuration, layered from an optional per-environment file
/// and `STOCKLEDGER_`-prefixed environment variables.
#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub database_url: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit logs as JSON instead of human-readable lines.
    #[serde(default)]
    pub log_json: bool,

    #[serde(default = "default_env")]
    pub environment: String,

    #[serde(default = "default_max_connections")]
    pub db_max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub db_min_connections: u32,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_env() -> String {
    DEFAULT_ENV.to_string()
}

fn default_max_connections() -> u32 {
    DEFAULT_MAX_CONNECTIONS
}

fn default_min_connections() -> u32 {
    DEFAULT_MIN_CONNECTIONS
}

impl AppConfig {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            log_level: default_log_level(),
            log_json: false,
            environment: default_env(),
            db_max_connections: default_max_connections(),
            db_min_connections: default_min_connections(),
        }
    }

    /// Loads configuration from `config/<env>.toml` (optional) layered with
    /// the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            env::var(format!("{ENV_PREFIX}_ENV")).unwrap_or_else(|_| DEFAULT_ENV.to_string());

        Config::builder()
            .add_source(File::with_name(&format!("{CONFIG_DIR}/{environment}")).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .set_default("environment", environment.clone())?
            .build()?
            .try_deserialize()
    }

    pub fn is_development(&self) -> bool {
        self.environment == DEFAULT_ENV
    }
}

/// Initializes the global tracing subscriber. Safe to call more than once;
/// later calls are no-ops.
pub fn init_tracing(log_level: &str, json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    if json {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    }
}
