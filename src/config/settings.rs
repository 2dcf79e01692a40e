//! Root application configuration, loaded from the environment.
//!
//! Built with a `config::Config` builder producing a typed struct via
//! `serde`, sourced from environment variables rather than a `config.yaml`
//! file, since this crate's deployment target is container env-vars (see
//! the `INDEXER_*` variables below).

use config::{Config, ConfigError, Environment};
use serde::Deserialize;

/// Connection settings for one of the two logical Postgres databases
/// (shared/infra or model/events). Both are constructed the same way,
/// differing only in which env-var prefix supplies them.
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseSettings {
    pub host: String,
    #[serde(default = "default_db_port")]
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

fn default_db_port() -> u16 {
    5432
}

fn default_pool_size() -> usize {
    16
}

#[derive(Debug, Deserialize, Clone)]
pub struct RpcSettings {
    pub avax_rpc: String,
    #[serde(default = "default_rpc_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_rpc_max_retries")]
    pub max_retries: u32,
}

fn default_rpc_timeout_secs() -> u64 {
    30
}

fn default_rpc_max_retries() -> u32 {
    3
}

/// Object-store access. Credentials are optional: when absent, requests are
/// issued unsigned against the bucket's public/HTTP endpoint, for the case
/// where no secrets provider is configured.
#[derive(Debug, Deserialize, Clone)]
pub struct StoreSettings {
    pub gcs_bucket: String,
    pub gcs_credentials_path: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub model_name: String,
    pub gcp_project_id: Option<String>,
    pub shared_db: DatabaseSettings,
    pub model_db: DatabaseSettings,
    pub rpc: RpcSettings,
    pub store: StoreSettings,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    pub log_dir: Option<String>,
}

fn default_workers() -> usize {
    3
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Settings {
    /// Load configuration from `INDEXER_*` environment variables.
    ///
    /// `shared_db__host`, `model_db__port`, etc. use `config`'s `__`
    /// separator convention for nested struct fields; flat aliases
    /// (`INDEXER_DB_HOST`, `INDEXER_AVAX_RPC`, ...) are mapped in explicitly
    /// below since they don't follow that nesting.
    pub fn new() -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("workers", 3)?
            .set_default("log_level", "info")?
            .set_default("shared_db.port", 5432)?
            .set_default("shared_db.name", "indexer_shared")?
            .set_default("shared_db.pool_size", 16)?
            .set_default("model_db.port", 5432)?
            .set_default("model_db.pool_size", 16)?
            .set_default("rpc.timeout_secs", 30)?
            .set_default("rpc.max_retries", 3)?;

        builder = builder.add_source(Environment::with_prefix("INDEXER").separator("__"));

        for (key, env_var) in [
            ("model_name", "INDEXER_MODEL_NAME"),
            ("gcp_project_id", "INDEXER_GCP_PROJECT_ID"),
            ("shared_db.host", "INDEXER_DB_HOST"),
            ("shared_db.port", "INDEXER_DB_PORT"),
            ("shared_db.user", "INDEXER_DB_USER"),
            ("shared_db.password", "INDEXER_DB_PASSWORD"),
            ("shared_db.name", "INDEXER_DB_NAME"),
            ("rpc.avax_rpc", "INDEXER_AVAX_RPC"),
            ("store.gcs_bucket", "INDEXER_GCS_BUCKET"),
            ("store.gcs_credentials_path", "INDEXER_GCS_CREDENTIALS_PATH"),
            ("log_level", "INDEXER_LOG_LEVEL"),
            ("log_dir", "INDEXER_LOG_DIR"),
            ("workers", "WORKERS"),
        ] {
            if let Ok(value) = std::env::var(env_var) {
                builder = builder.set_override(key, value)?;
            }
        }

        // The model DB is named per-Model (`model_db_name`); until the model
        // config is loaded we default it to the shared connection's host
        // with the model name as the database name, overridable explicitly.
        if std::env::var("INDEXER_MODEL_DB_NAME").is_err() {
            if let Ok(model_name) = std::env::var("INDEXER_MODEL_NAME") {
                builder = builder.set_default("model_db.name", model_name)?;
            }
        }
        for (key, env_var) in [
            ("model_db.host", "INDEXER_MODEL_DB_HOST"),
            ("model_db.port", "INDEXER_MODEL_DB_PORT"),
            ("model_db.user", "INDEXER_MODEL_DB_USER"),
            ("model_db.password", "INDEXER_MODEL_DB_PASSWORD"),
            ("model_db.name", "INDEXER_MODEL_DB_NAME"),
        ] {
            if let Ok(value) = std::env::var(env_var) {
                builder = builder.set_override(key, value)?;
            } else if key == "model_db.host" {
                if let Ok(host) = std::env::var("INDEXER_DB_HOST") {
                    builder = builder.set_override(key, host)?;
                }
            } else if key == "model_db.user" {
                if let Ok(user) = std::env::var("INDEXER_DB_USER") {
                    builder = builder.set_override(key, user)?;
                }
            } else if key == "model_db.password" {
                if let Ok(pw) = std::env::var("INDEXER_DB_PASSWORD") {
                    builder = builder.set_override(key, pw)?;
                }
            }
        }

        builder.build()?.try_deserialize()
    }
}
