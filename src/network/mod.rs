//! Network inventory module
//!
//! Reads links, addresses and routes out of a namespace and applies the
//! interface filter

use crate::error::NetworkError;
use crate::netops::{Link, Namespace, NetopsError, Route, DEFAULT_DESTINATION};
use ipnetwork::{IpNetwork, Ipv4Network};
use tracing::{debug, info, warn};

pub mod filter;

pub use filter::InterfaceFilter;

/// IPv4 address and own default route of one interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceDetails {
    pub name: String,
    pub address: Option<Ipv4Network>,
    pub default_route: Option<Route>,
}

/// A link with the addresses assigned to it
#[derive(Debug, Clone)]
pub struct LinkEntry {
    pub link: Link,
    pub addresses: Vec<IpNetwork>,
}

/// Point-in-time view of a namespace
#[derive(Debug, Clone)]
pub struct Inventory {
    pub links: Vec<LinkEntry>,
    pub routes: Vec<Route>,
}

impl Inventory {
    /// Log every link, address and route
    pub fn report(&self, namespace: &str) {
        info!(namespace, "Network interfaces and their addresses:");
        for entry in &self.links {
            info!(interface = %entry.link.name, up = entry.link.up, "Interface");
            for address in &entry.addresses {
                info!(interface = %entry.link.name, %address, "  Address");
            }
        }

        info!(namespace, "Routes:");
        for route in &self.routes {
            info!(
                destination = %route.destination,
                gateway = ?route.gateway,
                device = %route.device,
                priority = route.priority,
                "Route"
            );
        }
    }
}

pub(crate) fn inventory_error(
    namespace: &impl Namespace,
    operation: impl Into<String>,
) -> impl FnOnce(NetopsError) -> NetworkError {
    let namespace = namespace.path().display().to_string();
    let operation = operation.into();
    move |source| NetworkError::Inventory {
        operation,
        namespace,
        source,
    }
}

/// List links, their addresses and all routes.
///
/// A link whose addresses cannot be read is reported with none; failing to
/// list links or routes is fatal.
pub async fn take_inventory<N: Namespace>(namespace: &N) -> Result<Inventory, NetworkError> {
    let links = namespace
        .links()
        .await
        .map_err(inventory_error(namespace, "list links"))?;

    let mut entries = Vec::with_capacity(links.len());
    for link in links {
        let addresses = match namespace.addresses(&link).await {
            Ok(addresses) => addresses,
            Err(e) => {
                warn!(interface = %link.name, "Failed to get addresses: {}", e);
                Vec::new()
            }
        };
        entries.push(LinkEntry { link, addresses });
    }

    let routes = namespace
        .routes(None)
        .await
        .map_err(inventory_error(namespace, "list routes"))?;

    Ok(Inventory {
        links: entries,
        routes,
    })
}

/// First IPv4 address in the list; IPv6 entries are skipped
pub fn first_ipv4(addresses: &[IpNetwork]) -> Option<Ipv4Network> {
    addresses.iter().find_map(|address| match address {
        IpNetwork::V4(net) => Some(*net),
        IpNetwork::V6(_) => None,
    })
}

/// Look up an interface's first IPv4 address and its own default route
pub async fn interface_details<N: Namespace>(
    namespace: &N,
    name: &str,
) -> Result<InterfaceDetails, NetworkError> {
    let link = namespace.find_link(name).await.map_err(|e| match e {
        NetopsError::LinkNotFound(link) => NetworkError::LinkNotFound {
            link,
            namespace: namespace.path().display().to_string(),
        },
        other => inventory_error(namespace, format!("find link {:?}", name))(other),
    })?;

    let addresses = namespace
        .addresses(&link)
        .await
        .map_err(inventory_error(namespace, format!("get addresses of {:?}", name)))?;
    let address = first_ipv4(&addresses);

    let routes = namespace
        .routes(Some(DEFAULT_DESTINATION))
        .await
        .map_err(inventory_error(namespace, "list default routes"))?;
    let default_route = routes
        .into_iter()
        .find(|r| r.device == name && r.is_default());

    debug!(
        interface = name,
        address = ?address,
        default_route = ?default_route.as_ref().map(ToString::to_string),
        "Interface details"
    );

    Ok(InterfaceDetails {
        name: name.to_string(),
        address,
        default_route,
    })
}
