//! End-to-end handoff: report, classify, migrate, verify, clean up

use crate::classify::{resolve_primary, resolve_secondary, Classification};
use crate::config::AppConfig;
use crate::error::{AppError, NetworkError};
use crate::migrate::{MigrationOutcome, MigrationPlan, Migrator};
use crate::netops::{Namespace, NamespaceOps};
use crate::network::{interface_details, take_inventory, InterfaceDetails};
use tracing::{info, warn};

/// Everything a successful run found and did
#[derive(Debug, Clone)]
pub struct HandoffReport {
    pub classification: Classification,
    pub outcome: MigrationOutcome,
    /// The secondary interface as seen from inside the destination namespace
    pub verified: InterfaceDetails,
    pub namespace_deleted: bool,
}

/// Run the whole handoff against `ops`. Stops at the first failure without
/// undoing anything.
pub async fn run<O: NamespaceOps>(ops: &O, config: &AppConfig) -> Result<HandoffReport, AppError> {
    let current = ops.open_current().await.map_err(|source| NetworkError::NamespaceAccess {
        operation: "open current",
        namespace: "current".to_string(),
        source,
    })?;
    let current_path = current.path().display().to_string();

    take_inventory(&current).await?.report(&current_path);

    let primary = resolve_primary(&current).await?;
    info!(namespace = %current_path, interface = %primary, "Primary interface");

    let classification = resolve_secondary(
        &current,
        &primary,
        &config.interface_filter(),
        config.subnet_match,
    )
    .await?;
    info!(
        namespace = %current_path,
        interface = %classification.secondary,
        qualification = ?classification.qualification,
        "Secondary interface"
    );

    let plan = MigrationPlan {
        destination: config.target_namespace.clone(),
        interface: classification.secondary.clone(),
        address: classification.address,
        route: classification.route.clone(),
    };
    let outcome = Migrator::new(ops).migrate(&current, &plan).await?;
    info!(
        interface = %plan.interface,
        namespace = %config.target_namespace,
        "Successfully moved secondary interface"
    );

    let destination = ops
        .open(&outcome.namespace_path)
        .await
        .map_err(|source| NetworkError::NamespaceAccess {
            operation: "open",
            namespace: outcome.namespace_path.display().to_string(),
            source,
        })?;
    let verified = interface_details(&destination, &plan.interface).await?;
    info!(
        interface = %verified.name,
        address = ?verified.address,
        default_route = ?verified.default_route.as_ref().map(ToString::to_string),
        namespace = %config.target_namespace,
        "Interface details in destination namespace"
    );
    drop(destination);

    let namespace_deleted = if config.keep_namespace {
        info!(namespace = %config.target_namespace, "Keeping namespace");
        false
    } else {
        match ops.delete_named(&config.target_namespace).await {
            Ok(()) => {
                info!(namespace = %config.target_namespace, "Deleted namespace");
                true
            }
            Err(e) => {
                warn!(namespace = %config.target_namespace, "Failed to delete namespace: {}", e);
                false
            }
        }
    };

    Ok(HandoffReport {
        classification,
        outcome,
        verified,
        namespace_deleted,
    })
}
