//! Namespace migration
//!
//! Moves one interface into a named namespace and restores its address, link
//! state and route there. Steps run strictly in order and nothing is undone on
//! failure; the error says how far the migration got.

use crate::error::{MigrationError, NetworkError};
use crate::netops::{Link, Namespace, NamespaceOps, NetopsError, Route};
use ipnetwork::{IpNetwork, Ipv4Network};
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, info};

/// Progress of a migration. Stages only ever advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MigrationStage {
    Pending,
    /// Destination namespace exists
    Created,
    /// Interface found in the source namespace
    Located,
    /// Interface now lives in the destination namespace
    Moved,
    Addressed,
    Up,
    Routed,
}

impl fmt::Display for MigrationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MigrationStage::Pending => "pending",
            MigrationStage::Created => "created",
            MigrationStage::Located => "located",
            MigrationStage::Moved => "moved",
            MigrationStage::Addressed => "addressed",
            MigrationStage::Up => "up",
            MigrationStage::Routed => "routed",
        };
        f.write_str(name)
    }
}

/// What to move and how to configure it on arrival
#[derive(Debug, Clone)]
pub struct MigrationPlan {
    pub destination: String,
    pub interface: String,
    pub address: Ipv4Network,
    pub route: Route,
}

/// A completed migration
#[derive(Debug, Clone)]
pub struct MigrationOutcome {
    pub namespace_path: PathBuf,
    pub stage: MigrationStage,
}

/// Drives one migration through its stages
pub struct Migrator<'a, O: NamespaceOps> {
    ops: &'a O,
    stage: MigrationStage,
}

impl<'a, O: NamespaceOps> Migrator<'a, O> {
    pub fn new(ops: &'a O) -> Self {
        Self {
            ops,
            stage: MigrationStage::Pending,
        }
    }

    fn advance(&mut self, stage: MigrationStage) {
        debug!(from = %self.stage, to = %stage, "Migration stage reached");
        self.stage = stage;
    }

    fn fail(&self, source: NetworkError) -> MigrationError {
        MigrationError {
            stage: self.stage,
            source,
        }
    }

    /// Create the destination namespace, reusing it if it already exists
    async fn create_destination(&self, name: &str) -> Result<PathBuf, NetworkError> {
        match self.ops.create_named(name).await {
            Ok(path) => Ok(path),
            Err(NetopsError::AlreadyExists { path, .. }) => {
                info!(
                    namespace = name,
                    path = %path.display(),
                    "Namespace already exists, reusing it"
                );
                Ok(path)
            }
            Err(source) => Err(NetworkError::NamespaceAccess {
                operation: "create",
                namespace: name.to_string(),
                source,
            }),
        }
    }

    /// Run every step of `plan`, moving `plan.interface` out of `source`
    pub async fn migrate(
        mut self,
        source: &O::Namespace,
        plan: &MigrationPlan,
    ) -> Result<MigrationOutcome, MigrationError> {
        let path = self
            .create_destination(&plan.destination)
            .await
            .map_err(|e| self.fail(e))?;
        self.advance(MigrationStage::Created);

        let destination = self.ops.open(&path).await.map_err(|e| {
            self.fail(NetworkError::NamespaceAccess {
                operation: "open",
                namespace: path.display().to_string(),
                source: e,
            })
        })?;

        let link = source.find_link(&plan.interface).await.map_err(|e| {
            self.fail(match e {
                NetopsError::LinkNotFound(link) => NetworkError::LinkNotFound {
                    link,
                    namespace: source.path().display().to_string(),
                },
                other => step_error("find link", &plan.interface, source.path(), other),
            })
        })?;
        self.advance(MigrationStage::Located);

        source
            .move_link(&link, &destination)
            .await
            .map_err(|e| self.fail(step_error("move link", &link.name, destination.path(), e)))?;
        self.advance(MigrationStage::Moved);
        info!(
            interface = %link.name,
            namespace = %destination.path().display(),
            "Moved interface into namespace"
        );

        // The kernel may renumber the link on arrival.
        let link: Link = destination.find_link(&plan.interface).await.map_err(|e| {
            self.fail(step_error(
                "find moved link",
                &plan.interface,
                destination.path(),
                e,
            ))
        })?;

        destination
            .add_address(&link, IpNetwork::V4(plan.address))
            .await
            .map_err(|e| {
                self.fail(step_error("add address", &link.name, destination.path(), e))
            })?;
        self.advance(MigrationStage::Addressed);

        destination
            .set_up(&link)
            .await
            .map_err(|e| {
                self.fail(step_error("bring up link", &link.name, destination.path(), e))
            })?;
        self.advance(MigrationStage::Up);

        destination
            .add_route(&plan.route)
            .await
            .map_err(|e| self.fail(step_error("add route", &link.name, destination.path(), e)))?;
        self.advance(MigrationStage::Routed);

        info!(
            interface = %link.name,
            address = %plan.address,
            route = %plan.route,
            namespace = %destination.path().display(),
            "Interface configured in namespace"
        );
        Ok(MigrationOutcome {
            namespace_path: path,
            stage: self.stage,
        })
    }
}

fn step_error(
    step: &'static str,
    link: &str,
    namespace: &std::path::Path,
    source: NetopsError,
) -> NetworkError {
    NetworkError::MigrationStep {
        step,
        link: link.to_string(),
        namespace: namespace.display().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netops::memory::{MemoryNamespaceOps, OperationKind};
    use std::net::Ipv4Addr;
    use std::path::Path;

    fn world() -> MemoryNamespaceOps {
        let ops = MemoryNamespaceOps::new();
        let current = ops.current_path();
        ops.add_link(&current, "eth0", true, &["10.0.0.5/24".parse().unwrap()]);
        ops.add_link(&current, "eth1", true, &["10.0.1.7/24".parse().unwrap()]);
        ops.push_route(&current, Route::default_via(Ipv4Addr::new(10, 0, 0, 1), "eth0", 100));
        ops
    }

    fn plan() -> MigrationPlan {
        MigrationPlan {
            destination: "podns".to_string(),
            interface: "eth1".to_string(),
            address: "10.0.1.7/24".parse().unwrap(),
            route: Route::default_via(Ipv4Addr::new(10, 0, 0, 1), "eth1", 100),
        }
    }

    #[tokio::test]
    async fn test_migrate_relocates_interface() {
        let ops = world();
        let source = ops.open_current().await.unwrap();

        let outcome = Migrator::new(&ops).migrate(&source, &plan()).await.unwrap();

        assert_eq!(outcome.stage, MigrationStage::Routed);
        assert_eq!(outcome.namespace_path, PathBuf::from("/run/netns/podns"));

        let current = ops.state(&ops.current_path()).unwrap();
        assert!(current.link("eth1").is_none());
        assert!(current.link("eth0").is_some());

        let podns = ops.state(&outcome.namespace_path).unwrap();
        let eth1 = podns.link("eth1").unwrap();
        assert!(eth1.up);
        assert_eq!(eth1.addresses, vec!["10.0.1.7/24".parse::<IpNetwork>().unwrap()]);
        assert_eq!(podns.routes, vec![plan().route]);
    }

    #[tokio::test]
    async fn test_migrate_reuses_existing_namespace() {
        let ops = world();
        let existing = ops.insert_named("podns");
        let source = ops.open_current().await.unwrap();

        let outcome = Migrator::new(&ops).migrate(&source, &plan()).await.unwrap();

        assert_eq!(outcome.namespace_path, existing);
        assert!(ops.state(&existing).unwrap().link("eth1").unwrap().up);
    }

    #[tokio::test]
    async fn test_migrate_step_order() {
        let ops = world();
        let source = ops.open_current().await.unwrap();

        Migrator::new(&ops).migrate(&source, &plan()).await.unwrap();

        let mutations: Vec<OperationKind> = ops
            .journal_kinds()
            .into_iter()
            .filter(|k| {
                matches!(
                    k,
                    OperationKind::CreateNamespace
                        | OperationKind::MoveLink
                        | OperationKind::AddAddress
                        | OperationKind::SetUp
                        | OperationKind::AddRoute
                )
            })
            .collect();
        assert_eq!(
            mutations,
            vec![
                OperationKind::CreateNamespace,
                OperationKind::MoveLink,
                OperationKind::AddAddress,
                OperationKind::SetUp,
                OperationKind::AddRoute,
            ]
        );

        let journal = ops.journal();
        let moved = journal
            .iter()
            .find(|op| op.kind == OperationKind::MoveLink)
            .unwrap();
        assert_eq!(moved.namespace, ops.current_path());
        assert_eq!(moved.target, "eth1");
        let routed = journal
            .iter()
            .find(|op| op.kind == OperationKind::AddRoute)
            .unwrap();
        assert_eq!(routed.namespace, PathBuf::from("/run/netns/podns"));
        assert_eq!(routed.target, "eth1");
    }

    #[tokio::test]
    async fn test_failed_open_reports_created_stage() {
        let ops = world();
        let source = ops.open_current().await.unwrap();
        ops.fail_on(OperationKind::OpenNamespace);

        let err = Migrator::new(&ops).migrate(&source, &plan()).await.unwrap_err();

        assert_eq!(err.last_stage(), MigrationStage::Created);
        assert!(matches!(
            err.source,
            NetworkError::NamespaceAccess { operation: "open", .. }
        ));
        assert!(!ops.journal_kinds().contains(&OperationKind::MoveLink));
        assert!(ops.state(&ops.current_path()).unwrap().link("eth1").is_some());
    }

    #[tokio::test]
    async fn test_failed_relookup_reports_moved_stage() {
        let ops = world();
        let source = ops.open_current().await.unwrap();
        ops.fail_in(OperationKind::ListLinks, Path::new("/run/netns/podns"));

        let err = Migrator::new(&ops).migrate(&source, &plan()).await.unwrap_err();

        assert_eq!(err.last_stage(), MigrationStage::Moved);
        assert!(matches!(
            err.source,
            NetworkError::MigrationStep { step: "find moved link", .. }
        ));
        assert!(!ops.journal_kinds().contains(&OperationKind::AddAddress));
        let podns = ops.state(&PathBuf::from("/run/netns/podns")).unwrap();
        assert!(podns.link("eth1").is_some());
    }

    #[tokio::test]
    async fn test_failed_move_stops_before_address() {
        let ops = world();
        ops.fail_on(OperationKind::MoveLink);
        let source = ops.open_current().await.unwrap();

        let err = Migrator::new(&ops).migrate(&source, &plan()).await.unwrap_err();

        assert_eq!(err.last_stage(), MigrationStage::Located);
        assert!(matches!(err.source, NetworkError::MigrationStep { step: "move link", .. }));
        let kinds = ops.journal_kinds();
        assert!(!kinds.contains(&OperationKind::AddAddress));
        assert!(!kinds.contains(&OperationKind::AddRoute));
        assert!(ops.state(&ops.current_path()).unwrap().link("eth1").is_some());
    }

    #[tokio::test]
    async fn test_failed_up_leaves_moved_and_addressed() {
        let ops = world();
        ops.fail_on(OperationKind::SetUp);
        let source = ops.open_current().await.unwrap();

        let err = Migrator::new(&ops).migrate(&source, &plan()).await.unwrap_err();

        assert_eq!(err.last_stage(), MigrationStage::Addressed);
        assert!(!ops.journal_kinds().contains(&OperationKind::AddRoute));

        let podns = ops.state(&PathBuf::from("/run/netns/podns")).unwrap();
        let eth1 = podns.link("eth1").unwrap();
        assert!(!eth1.up);
        assert_eq!(eth1.addresses.len(), 1);
        assert!(podns.routes.is_empty());
    }

    #[tokio::test]
    async fn test_failed_route_reports_up_stage() {
        let ops = world();
        ops.fail_on(OperationKind::AddRoute);
        let source = ops.open_current().await.unwrap();

        let err = Migrator::new(&ops).migrate(&source, &plan()).await.unwrap_err();

        assert_eq!(err.last_stage(), MigrationStage::Up);
        assert!(err.to_string().contains("after stage up"));
    }

    #[tokio::test]
    async fn test_missing_link() {
        let ops = world();
        let source = ops.open_current().await.unwrap();
        let mut plan = plan();
        plan.interface = "eth7".to_string();

        let err = Migrator::new(&ops).migrate(&source, &plan).await.unwrap_err();

        assert_eq!(err.last_stage(), MigrationStage::Created);
        assert!(matches!(
            err.source,
            NetworkError::LinkNotFound { ref link, .. } if link == "eth7"
        ));
    }

    #[tokio::test]
    async fn test_create_failure_is_namespace_access() {
        let ops = world();
        ops.fail_on(OperationKind::CreateNamespace);
        let source = ops.open_current().await.unwrap();

        let err = Migrator::new(&ops).migrate(&source, &plan()).await.unwrap_err();

        assert_eq!(err.last_stage(), MigrationStage::Pending);
        assert!(matches!(
            err.source,
            NetworkError::NamespaceAccess { operation: "create", .. }
        ));
    }

    #[test]
    fn test_stages_are_ordered() {
        assert!(MigrationStage::Pending < MigrationStage::Created);
        assert!(MigrationStage::Moved < MigrationStage::Addressed);
        assert!(MigrationStage::Up < MigrationStage::Routed);
    }
}
