//! Network namespace operations boundary
//!
//! Everything the classifier and migrator need from the kernel goes through the
//! [`NamespaceOps`] and [`Namespace`] traits. [`rtnl`] talks to the kernel over
//! rtnetlink; [`memory`] keeps an in-memory world for tests.

use ipnetwork::{IpNetwork, IpNetworkError, Ipv4Network};
use std::fmt;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub mod memory;
pub mod rtnl;

/// Path of the namespace the current process runs in
pub const CURRENT_NAMESPACE_PATH: &str = "/proc/self/ns/net";

/// Directory where named namespaces are bind-mounted
pub const DEFAULT_NETNS_DIR: &str = "/run/netns";

/// Destination prefix matching all IPv4 traffic
pub const DEFAULT_DESTINATION: Ipv4Network =
    match Ipv4Network::new_checked(Ipv4Addr::UNSPECIFIED, 0) {
        Some(net) => net,
        None => panic!("0.0.0.0/0 is a valid network"),
    };

/// Errors reported by a namespace operations backend
#[derive(Debug, Error)]
pub enum NetopsError {
    #[error("netlink request failed: {0}")]
    Netlink(#[from] rtnetlink::Error),

    #[error("namespace operation failed: {0}")]
    Netns(#[from] netns_rs::Error),

    #[error("namespace {name:?} already exists at {}", .path.display())]
    AlreadyExists { name: String, path: PathBuf },

    #[error("namespace {} does not exist", .0.display())]
    NamespaceNotFound(PathBuf),

    #[error("link {0:?} not found")]
    LinkNotFound(String),

    #[error("invalid address: {0}")]
    InvalidAddress(#[from] IpNetworkError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("operation rejected: {0}")]
    Rejected(String),
}

/// A network link as seen inside one namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub name: String,
    pub index: u32,
    pub up: bool,
}

/// An IPv4 route entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub destination: Ipv4Network,
    pub gateway: Option<Ipv4Addr>,
    pub device: String,
    pub priority: u32,
}

impl Route {
    /// Default route through `gateway` on `device`
    pub fn default_via(gateway: Ipv4Addr, device: impl Into<String>, priority: u32) -> Self {
        Self {
            destination: DEFAULT_DESTINATION,
            gateway: Some(gateway),
            device: device.into(),
            priority,
        }
    }

    /// Whether the destination matches all traffic
    pub fn is_default(&self) -> bool {
        self.destination.prefix() == 0
    }

    /// Same route, owned by another device
    pub fn with_device(&self, device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            ..self.clone()
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.destination)?;
        if let Some(gateway) = self.gateway {
            write!(f, " via {}", gateway)?;
        }
        write!(f, " dev {} metric {}", self.device, self.priority)
    }
}

/// Namespace-level operations: creating, opening and deleting namespaces
#[allow(async_fn_in_trait)]
pub trait NamespaceOps {
    type Namespace: Namespace;

    /// Open the namespace the process currently runs in
    async fn open_current(&self) -> Result<Self::Namespace, NetopsError>;

    /// Create a named namespace and return its path.
    ///
    /// Fails with [`NetopsError::AlreadyExists`] when the name is taken.
    async fn create_named(&self, name: &str) -> Result<PathBuf, NetopsError>;

    /// Open a namespace by path
    async fn open(&self, path: &Path) -> Result<Self::Namespace, NetopsError>;

    /// Delete a named namespace
    async fn delete_named(&self, name: &str) -> Result<(), NetopsError>;

    /// Canonical path of a named namespace
    fn named_path(&self, name: &str) -> PathBuf;
}

/// Operations inside one open namespace. Dropping the handle closes it.
#[allow(async_fn_in_trait)]
pub trait Namespace {
    fn path(&self) -> &Path;

    /// All links, in kernel discovery order
    async fn links(&self) -> Result<Vec<Link>, NetopsError>;

    async fn find_link(&self, name: &str) -> Result<Link, NetopsError>;

    /// Address prefixes assigned to a link, both families
    async fn addresses(&self, link: &Link) -> Result<Vec<IpNetwork>, NetopsError>;

    async fn add_address(&self, link: &Link, address: IpNetwork) -> Result<(), NetopsError>;

    async fn set_up(&self, link: &Link) -> Result<(), NetopsError>;

    /// Move a link into `destination`. The link is no longer visible here afterwards.
    async fn move_link(&self, link: &Link, destination: &Self) -> Result<(), NetopsError>;

    /// IPv4 routes, optionally only those whose destination equals `destination`
    async fn routes(&self, destination: Option<Ipv4Network>) -> Result<Vec<Route>, NetopsError>;

    async fn add_route(&self, route: &Route) -> Result<(), NetopsError>;
}
