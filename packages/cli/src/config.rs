// ABOUTME: Server configuration read from the environment
// ABOUTME: Port, database location, pool size, CORS origin and link lifetime

use std::env;
use std::num::ParseIntError;
use std::path::PathBuf;

use thiserror::Error;

use stockboard_core::CONFIRMATION_TOKEN_TTL_DAYS;
use stockboard_storage::DbOptions;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid port number: {0}")]
    InvalidPort(ParseIntError),
    #[error("Port {0} is out of valid range (1-65535)")]
    PortOutOfRange(u16),
    #[error("Invalid value for {name}: {value}")]
    InvalidNumber { name: &'static str, value: String },
    #[error("{name} must be greater than zero")]
    NotPositive { name: &'static str },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub port: u16,
    pub database_path: PathBuf,
    pub max_connections: u32,
    pub cors_origin: String,
    pub confirmation_ttl_days: i64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let port_str = env::var("STOCKBOARD_PORT").unwrap_or_else(|_| "4100".to_string());
        let port = port_str.parse::<u16>().map_err(ConfigError::InvalidPort)?;

        // Validate port is in valid range
        if port == 0 {
            return Err(ConfigError::PortOutOfRange(port));
        }

        let database_path = env::var("STOCKBOARD_DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| DbOptions::default_path());

        let max_connections = parse_positive("STOCKBOARD_MAX_CONNECTIONS", 10)?;
        let max_connections =
            u32::try_from(max_connections).map_err(|_| ConfigError::InvalidNumber {
                name: "STOCKBOARD_MAX_CONNECTIONS",
                value: max_connections.to_string(),
            })?;
        let confirmation_ttl_days =
            parse_positive("STOCKBOARD_CONFIRMATION_TTL_DAYS", CONFIRMATION_TOKEN_TTL_DAYS)?;

        let cors_origin = env::var("STOCKBOARD_CORS_ORIGIN")
            .unwrap_or_else(|_| "http://localhost:5173".to_string());

        Ok(Config {
            port,
            database_path,
            max_connections,
            cors_origin,
            confirmation_ttl_days,
        })
    }

    pub fn db_options(&self) -> DbOptions {
        let mut options = DbOptions::new(&self.database_path);
        options.max_connections = self.max_connections;
        options
    }
}

fn parse_positive(name: &'static str, default: i64) -> Result<i64, ConfigError> {
    let value = match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<i64>()
            .map_err(|_| ConfigError::InvalidNumber { name, value: raw })?,
        Err(_) => default,
    };

    if value <= 0 {
        return Err(ConfigError::NotPositive { name });
    }
    Ok(value)
}
