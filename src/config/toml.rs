//! TOML configuration file parsing

use crate::classify::SubnetMatch;
use crate::config::AppConfig;
use crate::error::ConfigError;
use serde::Deserialize;

/// TOML configuration structure
#[derive(Debug, Deserialize)]
pub struct TomlConfig {
    pub target_namespace: Option<String>,
    pub keep_namespace: Option<bool>,
    pub classification: Option<ClassificationConfig>,
    pub namespace: Option<NamespaceConfig>,
    pub logging: Option<LoggingConfig>,
}

/// Interface classification settings
#[derive(Debug, Deserialize)]
pub struct ClassificationConfig {
    pub excluded_prefixes: Option<Vec<String>>,
    pub subnet_match: Option<SubnetMatch>,
}

/// Namespace settings
#[derive(Debug, Deserialize)]
pub struct NamespaceConfig {
    pub dir: Option<String>,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    pub level: Option<String>,
}

impl TomlConfig {
    /// Apply the values present in the file over base configuration
    pub fn apply_to_config(self, mut base_config: AppConfig) -> Result<AppConfig, ConfigError> {
        if let Some(name) = self.target_namespace {
            base_config.target_namespace = name;
        }

        if let Some(keep) = self.keep_namespace {
            base_config.keep_namespace = keep;
        }

        if let Some(classification) = self.classification {
            if let Some(prefixes) = classification.excluded_prefixes {
                base_config.excluded_prefixes = prefixes;
            }
            if let Some(rule) = classification.subnet_match {
                base_config.subnet_match = rule;
            }
        }

        if let Some(dir) = self.namespace.and_then(|n| n.dir) {
            base_config.netns_dir = dir;
        }

        if let Some(level) = self.logging.and_then(|l| l.level) {
            base_config.log_level = level;
        }

        Ok(base_config)
    }
}

/// Load configuration from TOML file
pub fn load_toml_config(path: &str) -> Result<TomlConfig, ConfigError> {
    let content = std::fs::read_to_string(path)
        .map_err(|_| ConfigError::FileNotFound { path: path.to_string() })?;

    toml::from_str(&content)
        .map_err(|e| ConfigError::InvalidFormat(e.to_string()))
}
