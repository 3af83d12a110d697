//! Process configuration from the environment.

use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub nats_url: Option<String>,
    pub events_subject: String,
    pub port: u16,
    pub max_connections: u32,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for environment variable {0}")]
    Invalid(&'static str),
}

impl Config {
    /// Read configuration from the process environment. `NATS_URL` is
    /// optional; without it order events only hit the log.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url =
            std::env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;
        let nats_url = std::env::var("NATS_URL").ok();
        let events_subject = std::env::var("ORDER_EVENTS_SUBJECT")
            .unwrap_or_else(|_| "order-events".to_string());
        let port = match std::env::var("PORT") {
            Ok(value) => value.parse().map_err(|_| ConfigError::Invalid("PORT"))?,
            Err(_) => 8080,
        };
        let max_connections = match std::env::var("DATABASE_MAX_CONNECTIONS") {
            Ok(value) => value
                .parse()
                .map_err(|_| ConfigError::Invalid("DATABASE_MAX_CONNECTIONS"))?,
            Err(_) => 10,
        };
        Ok(Self {
            database_url,
            nats_url,
            events_subject,
            port,
            max_connections,
        })
    }
}
