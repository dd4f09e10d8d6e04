use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use contracts::shared::validation::rules::DEFAULT_ESTADOS;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub clients_api: ClientsApiConfig,
    #[serde(default)]
    pub throttle: ThrottleConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClientsApiConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Bearer token; empty means anonymous
    #[serde(default)]
    pub token: String,
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ThrottleConfig {
    pub max_concurrent: usize,
    pub batch_delay_ms: u64,
    pub batch_size: usize,
    pub inter_batch_delay_ms: u64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 5,
            batch_delay_ms: 100,
            batch_size: 3,
            inter_batch_delay_ms: 200,
        }
    }
}

impl ThrottleConfig {
    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    pub fn inter_batch_delay(&self) -> Duration {
        Duration::from_millis(self.inter_batch_delay_ms)
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ValidationConfig {
    pub estados: Vec<String>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            estados: DEFAULT_ESTADOS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Очистка брошенных сессий импорта
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SessionsConfig {
    /// Сессия без изменений дольше этого срока удаляется
    pub max_age_hours: i64,
    pub cleanup_interval_minutes: u64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            max_age_hours: 24,
            cleanup_interval_minutes: 30,
        }
    }
}

impl SessionsConfig {
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_minutes * 60)
    }
}

/// Default configuration embedded in the binary
const DEFAULT_CONFIG: &str = r#"
[server]
host = "127.0.0.1"
port = 3000

[clients_api]
base_url = "http://127.0.0.1:8000"
timeout_secs = 30
token = ""

[throttle]
max_concurrent = 5
batch_delay_ms = 100
batch_size = 3
inter_batch_delay_ms = 200

[validation]
estados = ["ACTIVO", "INACTIVO", "FINALIZADO", "LEGACY"]

[sessions]
max_age_hours = 24
cleanup_interval_minutes = 30
"#;

/// Environment variable with an explicit config path
pub const CONFIG_ENV: &str = "RAPICREDIT_CONFIG";

/// Load configuration
///
/// Search order:
/// 1. Path in `RAPICREDIT_CONFIG`
/// 2. config.toml next to the executable
/// 3. Embedded default config
pub fn load_config() -> anyhow::Result<Config> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        tracing::info!("Loading config from {}: {}", CONFIG_ENV, path);
        return load_from_path(Path::new(&path));
    }

    if let Some(config_path) = config_next_to_exe() {
        if config_path.exists() {
            tracing::info!("Loading config from: {}", config_path.display());
            return load_from_path(&config_path);
        }
        tracing::warn!("config.toml not found at: {}", config_path.display());
    }

    tracing::info!("Using default embedded configuration");
    parse_config(DEFAULT_CONFIG)
}

fn config_next_to_exe() -> Option<PathBuf> {
    let exe_path = std::env::current_exe().ok()?;
    Some(exe_path.parent()?.join("config.toml"))
}

pub fn load_from_path(path: &Path) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Cannot read {}: {}", path.display(), e))?;
    parse_config(&contents)
}

pub fn parse_config(contents: &str) -> anyhow::Result<Config> {
    let config: Config = toml::from_str(contents)?;
    if config.throttle.max_concurrent == 0 || config.throttle.batch_size == 0 {
        anyhow::bail!("throttle.max_concurrent and throttle.batch_size must be greater than 0");
    }
    if config.sessions.max_age_hours <= 0 || config.sessions.cleanup_interval_minutes == 0 {
        anyhow::bail!("sessions.max_age_hours and sessions.cleanup_interval_minutes must be greater than 0");
    }
    Ok(config)
}
