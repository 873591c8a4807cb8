use common::MqAppConfig;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    /// Allowed origins. `["*"]` allows any origin.
    pub allow_origins: Vec<String>,
    pub max_age: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origins: vec!["*".into()],
            max_age: 3600,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub cors: CorsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// Marketplace app id whose listings are kept. Default: 440.
    pub app_id: u32,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ServicesConfig {
    /// Base URL of the trade offer URL service. Forwarding is off when unset.
    #[serde(default)]
    pub tradeofferurl: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub mq: MqAppConfig,
    pub ingest: IngestConfig,
    #[serde(default)]
    pub services: ServicesConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("LISTINGS_CONFIG").unwrap_or_else(|_| "config/config".into());

        let s = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("ingest.app_id", 440)?
            .add_source(File::with_name(&path).required(false))
            // Override from environment (e.g., LISTINGS__DATABASE__URL)
            .add_source(Environment::with_prefix("LISTINGS").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
