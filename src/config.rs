use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Load the fixed sample population at startup. On by default; set
    /// SEED_DATA=false to start with an empty store.
    pub seed_data: bool,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let host = std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port = match std::env::var("APP_PORT") {
            Ok(raw) => raw.parse::<u16>().context("APP_PORT must be a port number")?,
            Err(_) => 8080,
        };
        let seed_data = std::env::var("SEED_DATA")
            .map(|v| v != "false")
            .unwrap_or(true);
        Ok(Self {
            host,
            port,
            seed_data,
        })
    }
}
