use std::net::SocketAddr;

use thiserror::Error;
use tracing::Level;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid LISTEN_ADDR {value:?}: {source}")]
    ListenAddr {
        value: String,
        source: std::net::AddrParseError,
    },
}

/// Runtime settings, read from the environment (and `.env` when present).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub listen_addr: SocketAddr,
    pub frontend_url: String,
    pub admin_username: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let database_path = dotenv::var("DATABASE_PATH").unwrap_or_else(|_| "db.sqlite".to_string());
        let raw_addr = dotenv::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let listen_addr = raw_addr
            .parse()
            .map_err(|source| ConfigError::ListenAddr {
                value: raw_addr.clone(),
                source,
            })?;
        let frontend_url =
            dotenv::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:5173".to_string());
        let admin_username = dotenv::var("ADMIN_USERNAME")
            .ok()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());

        Ok(Self {
            database_path,
            listen_addr,
            frontend_url,
            admin_username,
        })
    }
}

/// Log level from the first command line argument, INFO when absent or unknown.
pub fn log_level_from_args(args: &[String]) -> Level {
    match args.get(1).map(String::as_str) {
        Some("debug") => Level::DEBUG,
        Some("warn") => Level::WARN,
        Some("error") => Level::ERROR,
        _ => Level::INFO,
    }
}
