//! Process configuration, read once from the environment at startup.

use std::path::{Path, PathBuf};

use strip_ansi_escapes::strip;
use thiserror::Error;

pub const DATABASE_URL_ENV: &str = "DATABASE_URL";
pub const UPLOAD_DIR_ENV: &str = "UPLOAD_DIR";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENVS: [&str; 2] = ["BACKEND_PORT", "PORT"];
pub const LOG_LEVEL_ENV: &str = "RUST_LOG";

pub const DEFAULT_DATABASE_URL: &str = "sqlite://plantpods.db?mode=rwc";
pub const DEFAULT_UPLOAD_DIR: &str = "uploads";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to create upload directory {path}: {source}")]
    UploadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_url: String,
    pub upload_dir: PathBuf,
    pub host: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from an arbitrary variable source. Blank values are
    /// treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let port = PORT_ENVS
            .iter()
            .find_map(|name| read(name).map(|raw| (*name, raw)))
            .and_then(|(name, raw)| match parse_port(&raw) {
                Some(port) => Some(port),
                None => {
                    tracing::warn!("Invalid {name} value {raw:?}; using {DEFAULT_PORT}");
                    None
                }
            })
            .unwrap_or(DEFAULT_PORT);

        Self {
            database_url: read(DATABASE_URL_ENV).unwrap_or_else(|| DEFAULT_DATABASE_URL.into()),
            upload_dir: read(UPLOAD_DIR_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOAD_DIR)),
            host: read(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.into()),
            port,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn ensure_upload_dir(&self) -> Result<&Path, ConfigError> {
        std::fs::create_dir_all(&self.upload_dir).map_err(|source| ConfigError::UploadDir {
            path: self.upload_dir.clone(),
            source,
        })?;
        Ok(&self.upload_dir)
    }
}

// Some launchers colourise env values; strip ANSI codes before parsing.
fn parse_port(raw: &str) -> Option<u16> {
    let cleaned = String::from_utf8(strip(raw.as_bytes())).ok()?;
    cleaned.trim().parse::<u16>().ok()
}
