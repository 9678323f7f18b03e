use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:3000";
const DEFAULT_DATABASE_PATH: &str = "db.json";
const DEFAULT_LOG_DIR: &str = "logs";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    pub bind_address: SocketAddr,
    pub database_path: PathBuf,
    pub log_dir: PathBuf,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 3000)),
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
        }
    }
}

impl AppSettings {
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from an arbitrary variable source; unset or blank keys
    /// fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let value = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let bind_raw = value("TODO_BIND_ADDRESS").unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());
        let bind_address = bind_raw
            .trim()
            .parse::<SocketAddr>()
            .map_err(|error| AppError::Validation(format!("Invalid TODO_BIND_ADDRESS '{}': {}", bind_raw, error)))?;

        Ok(Self {
            bind_address,
            database_path: value("TODO_DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH)),
            log_dir: value("TODO_LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR)),
        })
    }
}
