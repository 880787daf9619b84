use crate::domains::path_optimization::CoordinatorSettings;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub coordinator: CoordinatorConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Per-subscriber backlog of undelivered events.
    pub event_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    pub stop_timeout_ms: u64,
    pub emit_pause_ms: u64,
    pub report_buffer: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Domain log file; console only when unset.
    pub file: Option<String>,
    pub level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            event_capacity: 256,
        }
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            stop_timeout_ms: 1000,
            emit_pause_ms: 10,
            report_buffer: 1,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: None,
            level: "info".to_string(),
        }
    }
}

impl CoordinatorConfig {
    pub fn emit_pause(&self) -> Duration {
        Duration::from_millis(self.emit_pause_ms)
    }

    pub fn settings(&self) -> CoordinatorSettings {
        CoordinatorSettings {
            stop_timeout: Duration::from_millis(self.stop_timeout_ms),
            report_buffer: self.report_buffer,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Config {
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    /// Precedence: PATHOPT_CONFIG env var -> ./config.toml -> built-in defaults
    pub async fn load() -> Result<Self> {
        match resolve_config_path() {
            Some(path) => Self::from_file(path).await,
            None => Ok(Self::default()),
        }
    }
}

fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(v) = env::var("PATHOPT_CONFIG") {
        return Some(PathBuf::from(v));
    }
    let cwd_default = Path::new("config.toml");
    cwd_default.exists().then(|| cwd_default.to_path_buf())
}
