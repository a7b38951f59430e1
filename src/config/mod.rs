//! Configuration management module
//!
//! Handles loading configuration from multiple sources with proper precedence:
//! CLI arguments > environment variables > TOML files > defaults

use crate::classify::SubnetMatch;
use crate::error::ConfigError;
use crate::netops::DEFAULT_NETNS_DIR;
use crate::network::filter::DEFAULT_EXCLUDED_PREFIXES;
use crate::network::InterfaceFilter;

pub mod cli;
pub mod env;
pub mod toml;

/// Namespace the secondary interface is handed off to by default
pub const DEFAULT_TARGET_NAMESPACE: &str = "podns";

/// Main configuration structure
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub target_namespace: String,
    pub netns_dir: String,
    pub excluded_prefixes: Vec<String>,
    pub subnet_match: SubnetMatch,
    pub keep_namespace: bool,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            target_namespace: DEFAULT_TARGET_NAMESPACE.to_string(),
            netns_dir: DEFAULT_NETNS_DIR.to_string(),
            excluded_prefixes: DEFAULT_EXCLUDED_PREFIXES
                .iter()
                .map(|p| p.to_string())
                .collect(),
            subnet_match: SubnetMatch::default(),
            keep_namespace: false,
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Interface filter built from the excluded prefixes
    pub fn interface_filter(&self) -> InterfaceFilter {
        InterfaceFilter::new(self.excluded_prefixes.iter().cloned())
    }

    /// Check the merged configuration for values the kernel would reject
    pub fn validate(&self) -> Result<(), ConfigError> {
        let name = self.target_namespace.as_str();
        if name.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "target_namespace".to_string(),
            });
        }
        if name == "." || name == ".." || name.contains('/') {
            return Err(ConfigError::ValidationError(format!(
                "target namespace '{}' must be a plain name, not a path",
                name
            )));
        }

        if self.netns_dir.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "netns_dir".to_string(),
            });
        }

        if self.excluded_prefixes.iter().any(|p| p.trim().is_empty()) {
            return Err(ConfigError::ValidationError(
                "excluded interface prefixes must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Merge defaults, the TOML file, environment and CLI flags, then validate
pub fn load_configuration(args: &cli::CliArgs) -> Result<AppConfig, ConfigError> {
    let mut config = AppConfig::default();

    if let Some(ref path) = args.config {
        let file = toml::load_toml_config(path)?;
        config = file.apply_to_config(config)?;
    }

    config = env::apply_env_config(config)?;
    config = args.apply_to_config(config)?;
    config.validate()?;
    Ok(config)
}
