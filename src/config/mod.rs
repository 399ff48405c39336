//! Configuration module for the incidence tracker.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::AppError;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key for API authentication (optional)
    pub api_psk: Option<String>,
    /// Path to the SQLite file backing the document store and accounts
    pub db_path: PathBuf,
    /// Directory holding uploaded blobs
    pub blob_root: PathBuf,
    /// Base URL used to build public blob URLs
    pub public_base_url: String,
    /// Blob bucket name
    pub bucket: String,
    /// Path to the local session file
    pub session_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Page size of every list view
    pub load_step: usize,
    /// Quiet period before a search term triggers a refresh
    pub search_debounce: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let api_psk = env::var("INCIDENCIAS_API_PSK").ok();

        let db_path = env::var("INCIDENCIAS_DB_PATH")
            .unwrap_or_else(|_| "./data/incidencias.sqlite".to_string())
            .into();

        let blob_root = env::var("INCIDENCIAS_BLOB_ROOT")
            .unwrap_or_else(|_| "./data/blobs".to_string())
            .into();

        let public_base_url = env::var("INCIDENCIAS_PUBLIC_BASE_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8080".to_string());

        let bucket = env::var("INCIDENCIAS_BUCKET").unwrap_or_else(|_| "images".to_string());

        let session_path = env::var("INCIDENCIAS_SESSION_PATH")
            .unwrap_or_else(|_| "./data/session.json".to_string())
            .into();

        let bind_addr = env::var("INCIDENCIAS_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()
            .map_err(|e| AppError::Internal(format!("Invalid INCIDENCIAS_BIND_ADDR: {}", e)))?;

        let log_level = env::var("INCIDENCIAS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let load_step = env::var("INCIDENCIAS_LOAD_STEP")
            .ok()
            .map(|v| v.parse::<usize>())
            .transpose()
            .map_err(|e| AppError::Internal(format!("Invalid INCIDENCIAS_LOAD_STEP: {}", e)))?
            .filter(|step| *step > 0)
            .unwrap_or(5);

        let debounce_ms = env::var("INCIDENCIAS_SEARCH_DEBOUNCE_MS")
            .ok()
            .map(|v| v.parse::<u64>())
            .transpose()
            .map_err(|e| {
                AppError::Internal(format!("Invalid INCIDENCIAS_SEARCH_DEBOUNCE_MS: {}", e))
            })?
            .unwrap_or(700);

        Ok(Self {
            api_psk,
            db_path,
            blob_root,
            public_base_url,
            bucket,
            session_path,
            bind_addr,
            log_level,
            load_step,
            search_debounce: Duration::from_millis(debounce_ms),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        // Clear any existing env vars
        for key in [
            "INCIDENCIAS_API_PSK",
            "INCIDENCIAS_DB_PATH",
            "INCIDENCIAS_BLOB_ROOT",
            "INCIDENCIAS_PUBLIC_BASE_URL",
            "INCIDENCIAS_BUCKET",
            "INCIDENCIAS_SESSION_PATH",
            "INCIDENCIAS_BIND_ADDR",
            "INCIDENCIAS_LOG_LEVEL",
            "INCIDENCIAS_LOAD_STEP",
            "INCIDENCIAS_SEARCH_DEBOUNCE_MS",
        ] {
            env::remove_var(key);
        }

        let config = Config::from_env().unwrap();

        assert!(config.api_psk.is_none());
        assert_eq!(config.db_path, PathBuf::from("./data/incidencias.sqlite"));
        assert_eq!(config.blob_root, PathBuf::from("./data/blobs"));
        assert_eq!(config.bucket, "images");
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.load_step, 5);
        assert_eq!(config.search_debounce, Duration::from_millis(700));
    }
}
