//! Secondary interface resolution

use crate::classify::{Classification, Qualification, SubnetMatch};
use crate::error::NetworkError;
use crate::netops::Namespace;
use crate::network::{interface_details, inventory_error, InterfaceDetails, InterfaceFilter};
use tracing::{debug, info};

/// Find the first eligible interface other than `primary` that can be handed
/// off, in link discovery order.
///
/// A candidate with an IPv4 address and its own default route qualifies as is.
/// A candidate with an IPv4 address but no default route qualifies when
/// `subnet_match` accepts its address against the primary's, and then gets the
/// primary's default route rewritten to its own device.
pub async fn resolve_secondary<N: Namespace>(
    namespace: &N,
    primary: &str,
    filter: &InterfaceFilter,
    subnet_match: SubnetMatch,
) -> Result<Classification, NetworkError> {
    let links = namespace
        .links()
        .await
        .map_err(inventory_error(namespace, "list links"))?;

    // Fetched on the first fallback candidate only
    let mut primary_details: Option<InterfaceDetails> = None;

    for link in links {
        if !filter.is_eligible(&link.name) || link.name == primary {
            continue;
        }

        let details = interface_details(namespace, &link.name).await?;
        let Some(address) = details.address else {
            debug!(interface = %link.name, "Skipping interface without IPv4 address");
            continue;
        };

        if let Some(route) = details.default_route {
            info!(
                interface = %link.name,
                %address,
                "Secondary interface found with own default route"
            );
            return Ok(Classification {
                primary: primary.to_string(),
                secondary: link.name,
                address,
                route,
                qualification: Qualification::OwnRoute,
            });
        }

        debug!(
            interface = %link.name,
            %address,
            primary,
            "No default route, checking subnet against primary"
        );
        if primary_details.is_none() {
            primary_details = Some(interface_details(namespace, primary).await?);
        }
        let (Some(primary_address), Some(primary_route)) = (
            primary_details.as_ref().and_then(|d| d.address),
            primary_details.as_ref().and_then(|d| d.default_route.as_ref()),
        ) else {
            debug!(primary, "Primary has no IPv4 address or default route to share");
            continue;
        };

        if subnet_match.matches(primary_address, address) {
            info!(
                interface = %link.name,
                %address,
                "Secondary interface found in primary's subnet"
            );
            return Ok(Classification {
                primary: primary.to_string(),
                route: primary_route.with_device(link.name.as_str()),
                secondary: link.name,
                address,
                qualification: Qualification::SharedSubnet,
            });
        }
    }

    Err(NetworkError::NoSecondaryInterface {
        namespace: namespace.path().display().to_string(),
        primary: primary.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netops::memory::{MemoryNamespaceOps, OperationKind};
    use crate::netops::{NamespaceOps, Route};
    use ipnetwork::IpNetwork;
    use std::net::Ipv4Addr;

    fn net(s: &str) -> IpNetwork {
        s.parse().unwrap()
    }

    async fn resolve(
        ns: &impl Namespace,
        subnet_match: SubnetMatch,
    ) -> Result<Classification, NetworkError> {
        resolve_secondary(ns, "eth0", &InterfaceFilter::default(), subnet_match).await
    }

    /// eth0 is the primary at 10.0.0.5/24 with a default route via 10.0.0.1
    fn world_with_primary() -> MemoryNamespaceOps {
        let ops = MemoryNamespaceOps::new();
        let current = ops.current_path();
        ops.add_link(&current, "lo", true, &[net("127.0.0.1/8")]);
        ops.add_link(&current, "eth0", true, &[net("10.0.0.5/24")]);
        ops.push_route(&current, Route::default_via(Ipv4Addr::new(10, 0, 0, 1), "eth0", 100));
        ops
    }

    #[tokio::test]
    async fn test_shared_subnet_fallback_synthesizes_route() {
        let ops = world_with_primary();
        ops.add_link(&ops.current_path(), "eth1", true, &[net("10.0.1.7/24")]);

        let ns = ops.open_current().await.unwrap();
        let result = resolve(&ns, SubnetMatch::PrefixLength).await.unwrap();

        assert_eq!(result.primary, "eth0");
        assert_eq!(result.secondary, "eth1");
        assert_eq!(result.address, "10.0.1.7/24".parse().unwrap());
        assert_eq!(result.qualification, Qualification::SharedSubnet);
        assert_eq!(
            result.route,
            Route::default_via(Ipv4Addr::new(10, 0, 0, 1), "eth1", 100)
        );
    }

    #[tokio::test]
    async fn test_own_route_preferred_and_first_candidate_wins() {
        let ops = world_with_primary();
        let current = ops.current_path();
        ops.add_link(&current, "eth1", true, &[net("172.16.0.9/16")]);
        ops.add_link(&current, "eth2", true, &[net("10.0.0.8/24")]);
        ops.push_route(&current, Route::default_via(Ipv4Addr::new(172, 16, 0, 1), "eth1", 600));

        let ns = ops.open_current().await.unwrap();
        let result = resolve(&ns, SubnetMatch::PrefixLength).await.unwrap();

        assert_eq!(result.secondary, "eth1");
        assert_eq!(result.qualification, Qualification::OwnRoute);
        assert_eq!(
            result.route,
            Route::default_via(Ipv4Addr::new(172, 16, 0, 1), "eth1", 600)
        );
    }

    #[tokio::test]
    async fn test_mismatched_prefix_length_is_skipped() {
        let ops = world_with_primary();
        let current = ops.current_path();
        ops.add_link(&current, "eth1", true, &[net("192.168.0.4/16")]);
        ops.add_link(&current, "eth2", true, &[net("192.168.7.4/24")]);

        let ns = ops.open_current().await.unwrap();
        let result = resolve(&ns, SubnetMatch::PrefixLength).await.unwrap();

        assert_eq!(result.secondary, "eth2");
    }

    #[tokio::test]
    async fn test_network_rule_rejects_other_subnet() {
        let ops = world_with_primary();
        ops.add_link(&ops.current_path(), "eth1", true, &[net("10.0.1.7/24")]);

        let ns = ops.open_current().await.unwrap();
        let result = resolve(&ns, SubnetMatch::Network).await;

        assert!(matches!(result, Err(NetworkError::NoSecondaryInterface { .. })));
    }

    #[tokio::test]
    async fn test_no_ipv4_candidate() {
        let ops = world_with_primary();
        let current = ops.current_path();
        ops.add_link(&current, "eth1", true, &[net("fe80::2/64")]);
        ops.add_link(&current, "eth2", true, &[]);
        ops.add_link(&current, "docker0", true, &[net("172.17.0.1/16")]);

        let ns = ops.open_current().await.unwrap();
        let result = resolve(&ns, SubnetMatch::PrefixLength).await;

        match result {
            Err(NetworkError::NoSecondaryInterface { primary, .. }) => {
                assert_eq!(primary, "eth0")
            }
            other => panic!("Expected NoSecondaryInterface, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_filtered_interfaces_never_selected() {
        let ops = world_with_primary();
        let current = ops.current_path();
        ops.add_link(&current, "veth9", true, &[net("10.0.0.9/24")]);
        ops.push_route(&current, Route::default_via(Ipv4Addr::new(10, 0, 0, 1), "veth9", 0));

        let ns = ops.open_current().await.unwrap();
        let result = resolve(&ns, SubnetMatch::PrefixLength).await;

        assert!(matches!(result, Err(NetworkError::NoSecondaryInterface { .. })));
    }

    #[tokio::test]
    async fn test_address_failure_propagates() {
        let ops = world_with_primary();
        ops.add_link(&ops.current_path(), "eth1", true, &[net("10.0.1.7/24")]);
        ops.fail_on(OperationKind::ListAddresses);

        let ns = ops.open_current().await.unwrap();
        let result = resolve(&ns, SubnetMatch::PrefixLength).await;

        assert!(matches!(result, Err(NetworkError::Inventory { .. })));
    }

    #[tokio::test]
    async fn test_primary_without_ipv4_keeps_searching() {
        let ops = MemoryNamespaceOps::new();
        let current = ops.current_path();
        ops.add_link(&current, "eth0", true, &[net("fe80::1/64")]);
        ops.add_link(&current, "eth1", true, &[net("10.0.1.7/24")]);
        ops.add_link(&current, "eth2", true, &[net("172.16.0.9/16")]);
        ops.push_route(&current, Route::default_via(Ipv4Addr::new(10, 0, 0, 1), "eth0", 100));
        ops.push_route(&current, Route::default_via(Ipv4Addr::new(172, 16, 0, 1), "eth2", 600));

        let ns = ops.open_current().await.unwrap();
        let result = resolve(&ns, SubnetMatch::PrefixLength).await.unwrap();

        assert_eq!(result.secondary, "eth2");
        assert_eq!(result.qualification, Qualification::OwnRoute);
        assert_eq!(result.address, "172.16.0.9/16".parse().unwrap());
    }
}
