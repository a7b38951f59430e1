//! Command-line argument parsing

use crate::classify::SubnetMatch;
use crate::config::AppConfig;
use crate::error::ConfigError;
use clap::Parser;

/// Command-line arguments structure
#[derive(Parser, Debug)]
#[command(name = "netns-handoff")]
#[command(about = "Move the secondary network interface into an isolated network namespace")]
#[command(version)]
pub struct CliArgs {
    /// Configuration file path
    #[arg(short, long, help = "Path to TOML configuration file")]
    pub config: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, help = "Set the logging level")]
    pub log_level: Option<String>,

    /// Name of the namespace to move the secondary interface into
    #[arg(short, long, help = "Destination network namespace name")]
    pub target_namespace: Option<String>,

    /// Directory holding named namespaces
    #[arg(long, help = "Directory where named network namespaces are mounted")]
    pub netns_dir: Option<String>,

    /// Comma-separated interface name prefixes to ignore
    #[arg(
        long,
        help = "Interface name prefixes excluded from classification, e.g. 'veth,lo,docker'"
    )]
    pub excluded_prefixes: Option<String>,

    /// Subnet comparison for the shared-subnet fallback
    #[arg(long, help = "Subnet match rule: 'prefix-length' or 'network'")]
    pub subnet_match: Option<SubnetMatch>,

    /// Leave the destination namespace in place after the run
    #[arg(long, help = "Do not delete the destination namespace on exit")]
    pub keep_namespace: bool,

    /// Validate configuration and exit
    #[arg(
        long,
        help = "Validate configuration and exit without touching any namespace"
    )]
    pub validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    pub print_default_config: bool,
}

impl CliArgs {
    /// Apply CLI arguments over base configuration
    pub fn apply_to_config(&self, mut base_config: AppConfig) -> Result<AppConfig, ConfigError> {
        if let Some(ref level) = self.log_level {
            base_config.log_level = level.clone();
        }

        if let Some(ref name) = self.target_namespace {
            base_config.target_namespace = name.clone();
        }

        if let Some(ref dir) = self.netns_dir {
            base_config.netns_dir = dir.clone();
        }

        if let Some(ref prefixes) = self.excluded_prefixes {
            base_config.excluded_prefixes = crate::config::env::parse_prefix_list(prefixes);
        }

        if let Some(rule) = self.subnet_match {
            base_config.subnet_match = rule;
        }

        if self.keep_namespace {
            base_config.keep_namespace = true;
        }

        Ok(base_config)
    }
}

/// Print default configuration in TOML format
pub fn print_default_config() {
    let default_config = AppConfig::default();

    println!("# netns-handoff configuration");
    println!("# This is the default configuration with all available options");
    println!();
    println!("# Namespace the secondary interface is moved into");
    println!("target_namespace = \"{}\"", default_config.target_namespace);
    println!();
    println!("# Keep the namespace after a successful run instead of deleting it");
    println!("keep_namespace = {}", default_config.keep_namespace);
    println!();
    println!("[classification]");
    println!("# Interfaces whose names start with these prefixes are ignored");
    let prefixes: Vec<String> = default_config
        .excluded_prefixes
        .iter()
        .map(|p| format!("\"{}\"", p))
        .collect();
    println!("excluded_prefixes = [{}]", prefixes.join(", "));
    println!("# Shared-subnet fallback rule: prefix-length or network");
    println!("subnet_match = \"{}\"", default_config.subnet_match);
    println!();
    println!("[namespace]");
    println!("# Directory where named network namespaces are mounted");
    println!("dir = \"{}\"", default_config.netns_dir);
    println!();
    println!("[logging]");
    println!("# Log level: trace, debug, info, warn, error");
    println!("level = \"{}\"", default_config.log_level);
}
