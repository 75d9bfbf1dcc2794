use std::env;

use anyhow::{Context, Result};

use crate::sandbox::Subnet;

const DEFAULT_DATABASE: &str = "environment_data.db";
const DEFAULT_SUBNET: &str = "192.168.1.0/24";

/// Server settings, read once at startup.
///
/// | Env Var                   | Default               |
/// |---------------------------|-----------------------|
/// | `DATABASE_URL`/`SQLITE_DB`| `environment_data.db` |
/// | `HOST`                    | `0.0.0.0`             |
/// | `PORT`                    | `8080`                |
/// | `LOCAL_SUBNET`            | `192.168.1.0/24`      |
/// | `CORS_ORIGINS`            | any origin            |
/// | `WORKERS`                 | actix default         |
/// | `LOG_LEVEL`               | `info`                |
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub local_subnet: Subnet,
    pub cors_origins: Vec<String>,
    pub workers: Option<usize>,
    pub log_level: String,
}

impl Config {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let database_url = lookup("DATABASE_URL")
            .or_else(|| lookup("SQLITE_DB"))
            .unwrap_or_else(|| DEFAULT_DATABASE.to_string());

        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());

        let port = match lookup("PORT") {
            Some(port) => port
                .parse::<u16>()
                .with_context(|| format!("PORT must be a valid port number, got `{port}`"))?,
            None => 8080,
        };

        let local_subnet: Subnet = lookup("LOCAL_SUBNET")
            .as_deref()
            .unwrap_or(DEFAULT_SUBNET)
            .parse()
            .context("LOCAL_SUBNET")?;

        let cors_origins = lookup("CORS_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let workers = lookup("WORKERS")
            .map(|w| {
                w.parse::<usize>()
                    .ok()
                    .filter(|&w| w > 0)
                    .with_context(|| format!("WORKERS must be a positive integer, got `{w}`"))
            })
            .transpose()?;

        let log_level = lookup("LOG_LEVEL")
            .map(|l| l.to_lowercase())
            .unwrap_or_else(|| "info".to_string());

        Ok(Self {
            database_url,
            host,
            port,
            local_subnet,
            cors_origins,
            workers,
            log_level,
        })
    }
}
