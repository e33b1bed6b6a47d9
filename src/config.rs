use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Runtime settings.
///
/// Loaded from built-in defaults, then an optional `ledger-query.{toml,yaml,json}`
/// in the working directory, then environment variables (`DATABASE_URL`,
/// `POOL_MAX_SIZE`, ...). A `.env` file is read first if present.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database_url: String,
    pub pool_max_size: u32,
    pub connection_timeout_secs: u64,
    pub statement_timeout_ms: u64,
    pub request_timeout_ms: u64,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::builder()?
            .add_source(File::with_name("ledger-query").required(false))
            .add_source(Environment::default())
            .build()?
            .try_deserialize()
    }

    fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Config::builder()
            .set_default("pool_max_size", 16)?
            .set_default("connection_timeout_secs", 30)?
            .set_default("statement_timeout_ms", 30_000)?
            .set_default("request_timeout_ms", 60_000)
    }

    pub fn statement_timeout(&self) -> Duration {
        Duration::from_millis(self.statement_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
