use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub storage: StorageBackend,
    pub database_url: Option<String>,
    pub gateway_base_url: String,
    pub gateway_server_key: String,
    pub gateway_webhook_secret: Option<String>,
    pub gateway_timeout: Duration,
    /// `None` allows any origin.
    pub cors_allowed_origins: Option<Vec<String>>,
    pub log_format: LogFormat,
    pub log_request_body: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok(); // Load .env file if present
        Self::from_vars(|key| env::var(key).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let storage = match var("STORAGE").as_deref().map(str::trim) {
            None | Some("") | Some("postgres") => StorageBackend::Postgres,
            Some("memory") => StorageBackend::Memory,
            Some(other) => anyhow::bail!("STORAGE must be 'postgres' or 'memory', got '{}'", other),
        };

        let database_url = var("DATABASE_URL").filter(|url| !url.trim().is_empty());
        if storage == StorageBackend::Postgres && database_url.is_none() {
            anyhow::bail!("DATABASE_URL is required when STORAGE=postgres");
        }

        let gateway_base_url = var("GATEWAY_BASE_URL").context("GATEWAY_BASE_URL is required")?;
        url::Url::parse(&gateway_base_url).context("GATEWAY_BASE_URL is not a valid URL")?;

        let gateway_server_key = var("GATEWAY_SERVER_KEY")
            .filter(|key| !key.trim().is_empty())
            .context("GATEWAY_SERVER_KEY is required")?;

        let gateway_timeout_secs: u64 = var("GATEWAY_TIMEOUT_SECS")
            .unwrap_or_else(|| "10".to_string())
            .parse()
            .context("GATEWAY_TIMEOUT_SECS must be a whole number of seconds")?;
        if gateway_timeout_secs == 0 {
            anyhow::bail!("GATEWAY_TIMEOUT_SECS must be greater than 0");
        }

        let server_port: u16 = var("SERVER_PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse()
            .context("SERVER_PORT must be a port number")?;

        let log_format = match var("LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Ok(Config {
            server_port,
            storage,
            database_url,
            gateway_base_url,
            gateway_server_key,
            gateway_webhook_secret: var("GATEWAY_WEBHOOK_SECRET").filter(|s| !s.is_empty()),
            gateway_timeout: Duration::from_secs(gateway_timeout_secs),
            cors_allowed_origins: parse_origins(var("CORS_ALLOWED_ORIGINS").as_deref()),
            log_format,
            log_request_body: var("LOG_REQUEST_BODY")
                .and_then(|v| v.parse::<bool>().ok())
                .unwrap_or(false),
        })
    }
}

fn parse_origins(raw: Option<&str>) -> Option<Vec<String>> {
    let value = raw?.trim();
    if value.is_empty() || value == "*" {
        return None;
    }

    let origins: Vec<String> = value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect();

    (!origins.is_empty()).then_some(origins)
}
