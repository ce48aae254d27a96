use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_INTERVAL_MS: u64 = 9_000; // 9-second pulse cycle
pub const DEFAULT_RECENT_HISTORY: usize = 10;
pub const DEFAULT_VAULT_LEVEL: u8 = 7;

/// Compliance treaty identifier. Mixed into every claimroot anchor and
/// required in `x-faa-treaty` when compliance mode is strict.
pub const TREATY_ID: &str = "FAA-TREATY-OMNI-4321-A13XN";

/// Top-level config (pulsetrade.toml + PULSE_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PulseConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub vault: VaultConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Target tick interval in milliseconds. Burn rate is measured against it.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// How many cycle records `getStats` returns.
    #[serde(default = "default_recent_history")]
    pub recent_history: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_INTERVAL_MS,
            recent_history: DEFAULT_RECENT_HISTORY,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryBackend {
    #[default]
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default)]
    pub backend: HistoryBackend,
    /// SQLite file, only read when `backend = "sqlite"`.
    #[serde(default = "default_history_path")]
    pub path: String,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            backend: HistoryBackend::Memory,
            path: default_history_path(),
        }
    }
}

/// Where the chat-backed analyzer sends its prompts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_analysis_endpoint")]
    pub endpoint: String,
    /// Provider requested when the data source does not name one.
    #[serde(default = "default_provider")]
    pub provider: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            endpoint: default_analysis_endpoint(),
            provider: default_provider(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplianceMode {
    #[default]
    Strict,
    Relaxed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Minimum `x-vault-level` admitted by the auth layers.
    #[serde(default = "default_vault_level")]
    pub level: u8,
    #[serde(default)]
    pub compliance_mode: ComplianceMode,
    #[serde(default)]
    pub audit_log: bool,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_VAULT_LEVEL,
            compliance_mode: ComplianceMode::Strict,
            audit_log: false,
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_interval_ms() -> u64 {
    DEFAULT_INTERVAL_MS
}
fn default_recent_history() -> usize {
    DEFAULT_RECENT_HISTORY
}
fn default_vault_level() -> u8 {
    DEFAULT_VAULT_LEVEL
}
fn default_provider() -> String {
    "openai".to_string()
}
fn default_analysis_endpoint() -> String {
    format!("http://localhost:{DEFAULT_PORT}/api/ai/chat")
}
fn default_history_path() -> String {
    format!("{}/history.db", home_dir())
}

impl PulseConfig {
    /// Load config from a TOML file with PULSE_* env var overrides.
    ///
    /// Nested keys use a double underscore: `PULSE_SCHEDULER__INTERVAL_MS=3000`.
    /// A missing file is not an error; every section has defaults.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: PulseConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("PULSE_").split("__"))
            .extract()?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.scheduler.interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "scheduler.interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.history.backend == HistoryBackend::Sqlite && self.history.path.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "history.path is required for the sqlite backend".to_string(),
            ));
        }
        Ok(())
    }
}

fn home_dir() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.pulsetrade")
}

fn default_config_path() -> String {
    format!("{}/pulsetrade.toml", home_dir())
}
