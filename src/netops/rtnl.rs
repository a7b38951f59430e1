//! Kernel namespace backend using rtnetlink and netns-rs

use crate::netops::{
    Link, Namespace, NamespaceOps, NetopsError, Route, CURRENT_NAMESPACE_PATH,
};
use futures_util::stream::TryStreamExt;
use ipnetwork::{IpNetwork, Ipv4Network};
use netns_rs::{Env, NetNs};
use rtnetlink::packet_route::address::AddressAttribute;
use rtnetlink::packet_route::link::{LinkAttribute, LinkFlags, LinkMessage};
use rtnetlink::packet_route::route::{RouteAddress, RouteAttribute, RouteMessage};
use rtnetlink::packet_route::AddressFamily;
use rtnetlink::{new_connection, Handle, LinkUnspec, RouteMessageBuilder};
use std::collections::HashMap;
use std::fs::File;
use std::net::Ipv4Addr;
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Namespace operations against the running kernel
#[derive(Debug, Clone)]
pub struct RtnlNamespaceOps {
    netns_dir: NetnsDir,
}

impl RtnlNamespaceOps {
    /// Create a backend whose named namespaces live under `netns_dir`
    pub fn new(netns_dir: impl Into<PathBuf>) -> Self {
        Self {
            netns_dir: NetnsDir(netns_dir.into()),
        }
    }
}

/// netns-rs environment rooted at a namespace directory
#[derive(Debug, Clone, PartialEq, Eq)]
struct NetnsDir(PathBuf);

impl Env for NetnsDir {
    fn persist_dir(&self) -> PathBuf {
        self.0.clone()
    }
}

/// Split a named namespace path into its directory and name
fn split_named(path: &Path) -> Result<(NetnsDir, &str), NetopsError> {
    let name = namespace_name(path)?;
    let dir = path
        .parent()
        .ok_or_else(|| NetopsError::NamespaceNotFound(path.to_path_buf()))?;
    Ok((NetnsDir(dir.to_path_buf()), name))
}

/// Open an rtnetlink connection in the calling thread's namespace and drive it
/// on the runtime.
fn connect() -> Result<Handle, NetopsError> {
    let (connection, handle, _) = new_connection()?;
    tokio::spawn(connection);
    Ok(handle)
}

fn namespace_name(path: &Path) -> Result<&str, NetopsError> {
    path.file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| NetopsError::NamespaceNotFound(path.to_path_buf()))
}

impl NamespaceOps for RtnlNamespaceOps {
    type Namespace = RtnlNamespace;

    async fn open_current(&self) -> Result<RtnlNamespace, NetopsError> {
        self.open(Path::new(CURRENT_NAMESPACE_PATH)).await
    }

    async fn create_named(&self, name: &str) -> Result<PathBuf, NetopsError> {
        let path = self.named_path(name);
        if path.exists() {
            return Err(NetopsError::AlreadyExists {
                name: name.to_string(),
                path,
            });
        }

        let ns = NetNs::new_with_env(name, self.netns_dir.clone())?;
        debug!(namespace = name, path = %ns.path().display(), "Created network namespace");
        Ok(ns.path().to_path_buf())
    }

    async fn open(&self, path: &Path) -> Result<RtnlNamespace, NetopsError> {
        if !path.exists() {
            return Err(NetopsError::NamespaceNotFound(path.to_path_buf()));
        }
        let file = File::open(path)?;

        // Netlink sockets stay bound to the namespace they were opened in, so the
        // socket for a named namespace is created from inside it.
        let handle = if path == Path::new(CURRENT_NAMESPACE_PATH) {
            connect()?
        } else {
            let (env, name) = split_named(path)?;
            NetNs::get_from_env(name, env)?.run(|_| connect())??
        };

        debug!(path = %path.display(), "Opened network namespace");
        Ok(RtnlNamespace {
            path: path.to_path_buf(),
            file,
            handle,
        })
    }

    async fn delete_named(&self, name: &str) -> Result<(), NetopsError> {
        NetNs::get_from_env(name, self.netns_dir.clone())?.remove()?;
        debug!(namespace = name, "Deleted network namespace");
        Ok(())
    }

    fn named_path(&self, name: &str) -> PathBuf {
        self.netns_dir.persist_dir().join(name)
    }
}

/// An open namespace: its nsfs file and a netlink connection bound to it
pub struct RtnlNamespace {
    path: PathBuf,
    file: File,
    handle: Handle,
}

impl RtnlNamespace {
    async fn link_messages(&self) -> Result<Vec<LinkMessage>, NetopsError> {
        let mut stream = self.handle.link().get().execute();
        let mut messages = Vec::new();
        while let Some(message) = stream.try_next().await? {
            messages.push(message);
        }
        Ok(messages)
    }

    async fn link_names(&self) -> Result<HashMap<u32, String>, NetopsError> {
        Ok(self
            .link_messages()
            .await?
            .iter()
            .filter_map(|m| link_from_message(m).map(|l| (l.index, l.name)))
            .collect())
    }
}

fn link_from_message(message: &LinkMessage) -> Option<Link> {
    let name = message.attributes.iter().find_map(|attr| match attr {
        LinkAttribute::IfName(name) => Some(name.clone()),
        _ => None,
    })?;
    Some(Link {
        name,
        index: message.header.index,
        up: message.header.flags.contains(LinkFlags::Up),
    })
}

/// Convert an IPv4 route message, resolving its output interface to a name
fn route_from_message(message: &RouteMessage, names: &HashMap<u32, String>) -> Option<Route> {
    if message.header.address_family != AddressFamily::Inet {
        return None;
    }

    let mut destination = Ipv4Addr::UNSPECIFIED;
    let mut gateway = None;
    let mut device = None;
    let mut priority = 0;
    for attr in &message.attributes {
        match attr {
            RouteAttribute::Destination(RouteAddress::Inet(addr)) => destination = *addr,
            RouteAttribute::Gateway(RouteAddress::Inet(addr)) => gateway = Some(*addr),
            RouteAttribute::Oif(index) => device = names.get(index).cloned(),
            RouteAttribute::Priority(value) => priority = *value,
            _ => {}
        }
    }

    let destination = Ipv4Network::new(destination, message.header.destination_prefix_length).ok()?;
    Some(Route {
        destination,
        gateway,
        device: device.unwrap_or_default(),
        priority,
    })
}

impl Namespace for RtnlNamespace {
    fn path(&self) -> &Path {
        &self.path
    }

    async fn links(&self) -> Result<Vec<Link>, NetopsError> {
        Ok(self
            .link_messages()
            .await?
            .iter()
            .filter_map(link_from_message)
            .collect())
    }

    async fn find_link(&self, name: &str) -> Result<Link, NetopsError> {
        self.links()
            .await?
            .into_iter()
            .find(|l| l.name == name)
            .ok_or_else(|| NetopsError::LinkNotFound(name.to_string()))
    }

    async fn addresses(&self, link: &Link) -> Result<Vec<IpNetwork>, NetopsError> {
        let mut stream = self
            .handle
            .address()
            .get()
            .set_link_index_filter(link.index)
            .execute();

        let mut addresses = Vec::new();
        while let Some(message) = stream.try_next().await? {
            let prefix = message.header.prefix_len;
            // IFA_LOCAL carries the interface's own address on point-to-point links.
            let local = message.attributes.iter().find_map(|attr| match attr {
                AddressAttribute::Local(ip) => Some(*ip),
                _ => None,
            });
            let address = local.or_else(|| {
                message.attributes.iter().find_map(|attr| match attr {
                    AddressAttribute::Address(ip) => Some(*ip),
                    _ => None,
                })
            });
            if let Some(ip) = address {
                addresses.push(IpNetwork::new(ip, prefix)?);
            }
        }
        Ok(addresses)
    }

    async fn add_address(&self, link: &Link, address: IpNetwork) -> Result<(), NetopsError> {
        self.handle
            .address()
            .add(link.index, address.ip(), address.prefix())
            .execute()
            .await?;
        Ok(())
    }

    async fn set_up(&self, link: &Link) -> Result<(), NetopsError> {
        self.handle
            .link()
            .set(LinkUnspec::new_with_index(link.index).up().build())
            .execute()
            .await?;
        Ok(())
    }

    async fn move_link(&self, link: &Link, destination: &Self) -> Result<(), NetopsError> {
        self.handle
            .link()
            .set(
                LinkUnspec::new_with_index(link.index)
                    .setns_by_fd(destination.file.as_raw_fd())
                    .build(),
            )
            .execute()
            .await?;
        Ok(())
    }

    async fn routes(&self, destination: Option<Ipv4Network>) -> Result<Vec<Route>, NetopsError> {
        let names = self.link_names().await?;
        let request = RouteMessageBuilder::<Ipv4Addr>::default().build();
        let mut stream = self.handle.route().get(request).execute();

        let mut routes = Vec::new();
        while let Some(message) = stream.try_next().await? {
            if let Some(route) = route_from_message(&message, &names) {
                if destination.map_or(true, |d| route.destination == d) {
                    routes.push(route);
                }
            }
        }
        Ok(routes)
    }

    async fn add_route(&self, route: &Route) -> Result<(), NetopsError> {
        let link = self.find_link(&route.device).await?;
        let mut builder = RouteMessageBuilder::<Ipv4Addr>::default()
            .destination_prefix(route.destination.network(), route.destination.prefix())
            .output_interface(link.index)
            .priority(route.priority);
        if let Some(gateway) = route.gateway {
            builder = builder.gateway(gateway);
        }
        self.handle.route().add(builder.build()).execute().await?;
        Ok(())
    }
}
