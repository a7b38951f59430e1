//! Environment variable configuration handling

use crate::config::AppConfig;
use crate::error::ConfigError;
use std::env;

/// Environment variable prefix
const ENV_PREFIX: &str = "NETNS_HANDOFF_";

/// Apply environment variable configuration over base configuration
pub fn apply_env_config(base_config: AppConfig) -> Result<AppConfig, ConfigError> {
    apply_env_from(base_config, |key| env::var(key).ok())
}

/// Apply configuration from any variable lookup, keyed by full variable name
pub fn apply_env_from<F>(mut base_config: AppConfig, lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

    if let Some(name) = var("TARGET_NAMESPACE") {
        base_config.target_namespace = name;
    }

    if let Some(dir) = var("NETNS_DIR") {
        base_config.netns_dir = dir;
    }

    // Format: NETNS_HANDOFF_EXCLUDED_PREFIXES="veth,lo,docker"
    if let Some(prefixes) = var("EXCLUDED_PREFIXES") {
        base_config.excluded_prefixes = parse_prefix_list(&prefixes);
    }

    if let Some(rule) = var("SUBNET_MATCH") {
        base_config.subnet_match = rule.trim().parse().map_err(ConfigError::InvalidFormat)?;
    }

    if let Some(keep) = var("KEEP_NAMESPACE") {
        base_config.keep_namespace = parse_bool(&keep)?;
    }

    if let Some(level) = var("LOG_LEVEL") {
        base_config.log_level = level;
    }

    Ok(base_config)
}

/// Parse a comma-separated list of interface name prefixes
pub fn parse_prefix_list(prefixes: &str) -> Vec<String> {
    prefixes
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bool(value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidFormat(format!(
            "Invalid boolean value: '{}'",
            other
        ))),
    }
}
