use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Result;

/// Top-level configuration for the Cradle engine.
///
/// Loaded from `~/.cradle/config.toml` by default. Each section corresponds
/// to one engine concern; unknown or missing sections fall back to defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CradleConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub agent: AgentConfig,
}

impl Default for CradleConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            chat: ChatConfig::default(),
            agent: AgentConfig::default(),
        }
    }
}

impl CradleConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: CradleConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for the SQLite transcript store.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.cradle/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Conversation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Number of recent dialogue turns kept for multi-turn context.
    pub context_turns: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self { context_turns: 5 }
    }
}

/// Remote backend agent settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Base URL of the backend; the engine posts to `{base_url}/agent`.
    pub base_url: String,
    /// User identifier sent with every agent request.
    pub user_id: String,
    /// Request deadline in milliseconds.
    pub timeout_ms: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            user_id: "default".to_string(),
            timeout_ms: 15_000,
        }
    }
}
