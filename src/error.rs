//! Centralized error types and handling

use crate::migrate::MigrationStage;
use crate::netops::NetopsError;
use thiserror::Error;

/// Main application error type
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Network operation error: {0}")]
    Network(#[from] NetworkError),

    #[error("Migration error: {0}")]
    Migration(#[from] MigrationError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Classification and migration failures, each tagged with its target
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Failed to {operation} namespace {namespace}: {source}")]
    NamespaceAccess {
        operation: &'static str,
        namespace: String,
        #[source]
        source: NetopsError,
    },

    #[error("Failed to {operation} in namespace {namespace}: {source}")]
    Inventory {
        operation: String,
        namespace: String,
        #[source]
        source: NetopsError,
    },

    #[error("No default route found in namespace {namespace}")]
    NoDefaultRoute { namespace: String },

    #[error("No secondary interface found in namespace {namespace} (primary: {primary})")]
    NoSecondaryInterface { namespace: String, primary: String },

    #[error("Link {link:?} not found in namespace {namespace}")]
    LinkNotFound { link: String, namespace: String },

    #[error("Failed to {step} for link {link:?} in namespace {namespace}: {source}")]
    MigrationStep {
        step: &'static str,
        link: String,
        namespace: String,
        #[source]
        source: NetopsError,
    },
}

/// A migration that stopped partway, with the last stage it completed
#[derive(Debug, Error)]
#[error("migration stopped after stage {stage}: {source}")]
pub struct MigrationError {
    pub stage: MigrationStage,
    #[source]
    pub source: NetworkError,
}

impl MigrationError {
    /// Last stage the migration completed before failing
    pub fn last_stage(&self) -> MigrationStage {
        self.stage
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid configuration format: {0}")]
    InvalidFormat(String),

    #[error("Missing required configuration: {field}")]
    MissingRequired { field: String },

    #[error("Configuration validation error: {0}")]
    ValidationError(String),
}
