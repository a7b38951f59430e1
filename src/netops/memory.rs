//! In-memory namespace backend
//!
//! Models namespaces, links, addresses and routes as plain data so the
//! classifier and migrator can run without privileges. Every mutating call is
//! recorded in a journal, and any operation kind can be made to fail.

use crate::netops::{
    Link, Namespace, NamespaceOps, NetopsError, Route, CURRENT_NAMESPACE_PATH, DEFAULT_NETNS_DIR,
};
use ipnetwork::{IpNetwork, Ipv4Network};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Kinds of operation the backend records and can be told to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    CreateNamespace,
    OpenNamespace,
    DeleteNamespace,
    ListLinks,
    ListAddresses,
    ListRoutes,
    MoveLink,
    AddAddress,
    SetUp,
    AddRoute,
}

/// A journal entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub kind: OperationKind,
    pub namespace: PathBuf,
    pub target: String,
}

/// Copy of one namespace's state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceState {
    pub links: Vec<LinkState>,
    pub routes: Vec<Route>,
}

impl NamespaceState {
    pub fn link(&self, name: &str) -> Option<&LinkState> {
        self.links.iter().find(|l| l.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkState {
    pub name: String,
    pub index: u32,
    pub up: bool,
    pub addresses: Vec<IpNetwork>,
}

#[derive(Debug, Default)]
struct World {
    namespaces: BTreeMap<PathBuf, NamespaceState>,
    journal: Vec<Operation>,
    failures: HashSet<OperationKind>,
    scoped_failures: HashSet<(OperationKind, PathBuf)>,
    next_index: u32,
}

impl World {
    fn record(
        &mut self,
        kind: OperationKind,
        namespace: &Path,
        target: &str,
    ) -> Result<(), NetopsError> {
        if self.failures.contains(&kind)
            || self.scoped_failures.contains(&(kind, namespace.to_path_buf()))
        {
            return Err(NetopsError::Rejected(format!("{:?} on {:?}", kind, target)));
        }
        self.journal.push(Operation {
            kind,
            namespace: namespace.to_path_buf(),
            target: target.to_string(),
        });
        Ok(())
    }

    fn namespace(&self, path: &Path) -> Result<&NamespaceState, NetopsError> {
        self.namespaces
            .get(path)
            .ok_or_else(|| NetopsError::NamespaceNotFound(path.to_path_buf()))
    }

    fn namespace_mut(&mut self, path: &Path) -> Result<&mut NamespaceState, NetopsError> {
        self.namespaces
            .get_mut(path)
            .ok_or_else(|| NetopsError::NamespaceNotFound(path.to_path_buf()))
    }

    fn link_mut(&mut self, path: &Path, name: &str) -> Result<&mut LinkState, NetopsError> {
        self.namespace_mut(path)?
            .links
            .iter_mut()
            .find(|l| l.name == name)
            .ok_or_else(|| NetopsError::LinkNotFound(name.to_string()))
    }
}

/// In-memory [`NamespaceOps`] implementation
#[derive(Debug, Clone)]
pub struct MemoryNamespaceOps {
    world: Arc<Mutex<World>>,
    netns_dir: PathBuf,
}

impl MemoryNamespaceOps {
    /// A world holding only the current namespace, with no links
    pub fn new() -> Self {
        let mut world = World {
            next_index: 1,
            ..World::default()
        };
        world
            .namespaces
            .insert(PathBuf::from(CURRENT_NAMESPACE_PATH), NamespaceState::default());
        Self {
            world: Arc::new(Mutex::new(world)),
            netns_dir: PathBuf::from(DEFAULT_NETNS_DIR),
        }
    }

    fn lock(&self) -> MutexGuard<'_, World> {
        self.world.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Path of the current namespace
    pub fn current_path(&self) -> PathBuf {
        PathBuf::from(CURRENT_NAMESPACE_PATH)
    }

    /// Register a named namespace as if it had been created earlier
    pub fn insert_named(&self, name: &str) -> PathBuf {
        let path = self.named_path(name);
        self.lock().namespaces.entry(path.clone()).or_default();
        path
    }

    /// Add a link to a namespace
    pub fn add_link(&self, namespace: &Path, name: &str, up: bool, addresses: &[IpNetwork]) {
        let mut world = self.lock();
        let index = world.next_index;
        world.next_index += 1;
        world.namespaces.entry(namespace.to_path_buf()).or_default().links.push(LinkState {
            name: name.to_string(),
            index,
            up,
            addresses: addresses.to_vec(),
        });
    }

    /// Append a route to a namespace's table
    pub fn push_route(&self, namespace: &Path, route: Route) {
        self.lock()
            .namespaces
            .entry(namespace.to_path_buf())
            .or_default()
            .routes
            .push(route);
    }

    /// Make every future operation of `kind` fail
    pub fn fail_on(&self, kind: OperationKind) {
        self.lock().failures.insert(kind);
    }

    /// Make every future operation of `kind` inside `namespace` fail
    pub fn fail_in(&self, kind: OperationKind, namespace: &Path) {
        self.lock()
            .scoped_failures
            .insert((kind, namespace.to_path_buf()));
    }

    /// Recorded operations, in order
    pub fn journal(&self) -> Vec<Operation> {
        self.lock().journal.clone()
    }

    /// Kinds of the recorded operations, in order
    pub fn journal_kinds(&self) -> Vec<OperationKind> {
        self.lock().journal.iter().map(|op| op.kind).collect()
    }

    pub fn state(&self, namespace: &Path) -> Option<NamespaceState> {
        self.lock().namespaces.get(namespace).cloned()
    }

    fn handle(&self, path: PathBuf) -> MemoryNamespace {
        MemoryNamespace {
            world: Arc::clone(&self.world),
            path,
        }
    }
}

impl Default for MemoryNamespaceOps {
    fn default() -> Self {
        Self::new()
    }
}

impl NamespaceOps for MemoryNamespaceOps {
    type Namespace = MemoryNamespace;

    async fn open_current(&self) -> Result<MemoryNamespace, NetopsError> {
        self.open(&self.current_path()).await
    }

    async fn create_named(&self, name: &str) -> Result<PathBuf, NetopsError> {
        let path = self.named_path(name);
        let mut world = self.lock();
        world.record(OperationKind::CreateNamespace, &path, name)?;
        if world.namespaces.contains_key(&path) {
            return Err(NetopsError::AlreadyExists {
                name: name.to_string(),
                path,
            });
        }
        world.namespaces.insert(path.clone(), NamespaceState::default());
        Ok(path)
    }

    async fn open(&self, path: &Path) -> Result<MemoryNamespace, NetopsError> {
        let mut world = self.lock();
        world.record(OperationKind::OpenNamespace, path, "")?;
        world.namespace(path)?;
        Ok(self.handle(path.to_path_buf()))
    }

    async fn delete_named(&self, name: &str) -> Result<(), NetopsError> {
        let path = self.named_path(name);
        let mut world = self.lock();
        world.record(OperationKind::DeleteNamespace, &path, name)?;
        let state = world
            .namespaces
            .remove(&path)
            .ok_or_else(|| NetopsError::NamespaceNotFound(path.clone()))?;

        // Physical links fall back to the initial namespace when theirs goes away.
        if let Some(current) = world.namespaces.get_mut(Path::new(CURRENT_NAMESPACE_PATH)) {
            current.links.extend(state.links.into_iter().map(|mut link| {
                link.up = false;
                link.addresses.clear();
                link
            }));
        }
        Ok(())
    }

    fn named_path(&self, name: &str) -> PathBuf {
        self.netns_dir.join(name)
    }
}

/// Handle to one namespace of a [`MemoryNamespaceOps`] world
#[derive(Debug)]
pub struct MemoryNamespace {
    world: Arc<Mutex<World>>,
    path: PathBuf,
}

impl MemoryNamespace {
    fn lock(&self) -> MutexGuard<'_, World> {
        self.world.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Namespace for MemoryNamespace {
    fn path(&self) -> &Path {
        &self.path
    }

    async fn links(&self) -> Result<Vec<Link>, NetopsError> {
        let mut world = self.lock();
        world.record(OperationKind::ListLinks, &self.path, "")?;
        Ok(world
            .namespace(&self.path)?
            .links
            .iter()
            .map(|l| Link {
                name: l.name.clone(),
                index: l.index,
                up: l.up,
            })
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
        let mut world = self.lock();
        world.record(OperationKind::ListAddresses, &self.path, &link.name)?;
        Ok(world.link_mut(&self.path, &link.name)?.addresses.clone())
    }

    async fn add_address(&self, link: &Link, address: IpNetwork) -> Result<(), NetopsError> {
        let mut world = self.lock();
        world.record(OperationKind::AddAddress, &self.path, &link.name)?;
        let state = world.link_mut(&self.path, &link.name)?;
        if !state.addresses.contains(&address) {
            state.addresses.push(address);
        }
        Ok(())
    }

    async fn set_up(&self, link: &Link) -> Result<(), NetopsError> {
        let mut world = self.lock();
        world.record(OperationKind::SetUp, &self.path, &link.name)?;
        world.link_mut(&self.path, &link.name)?.up = true;
        Ok(())
    }

    async fn move_link(&self, link: &Link, destination: &Self) -> Result<(), NetopsError> {
        let mut world = self.lock();
        world.record(OperationKind::MoveLink, &self.path, &link.name)?;
        world.namespace(&destination.path)?;

        let source = world.namespace_mut(&self.path)?;
        let position = source
            .links
            .iter()
            .position(|l| l.name == link.name)
            .ok_or_else(|| NetopsError::LinkNotFound(link.name.clone()))?;
        let mut moved = source.links.remove(position);
        source.routes.retain(|r| r.device != link.name);

        // The kernel drops addresses and takes the link down on a namespace move.
        moved.up = false;
        moved.addresses.clear();
        world.namespace_mut(&destination.path)?.links.push(moved);
        Ok(())
    }

    async fn routes(&self, destination: Option<Ipv4Network>) -> Result<Vec<Route>, NetopsError> {
        let mut world = self.lock();
        world.record(OperationKind::ListRoutes, &self.path, "")?;
        Ok(world
            .namespace(&self.path)?
            .routes
            .iter()
            .filter(|r| destination.map_or(true, |d| r.destination == d))
            .cloned()
            .collect())
    }

    async fn add_route(&self, route: &Route) -> Result<(), NetopsError> {
        let mut world = self.lock();
        world.record(OperationKind::AddRoute, &self.path, &route.device)?;
        let state = world.namespace_mut(&self.path)?;
        if state.link(&route.device).is_none() {
            return Err(NetopsError::LinkNotFound(route.device.clone()));
        }
        state.routes.push(route.clone());
        Ok(())
    }
}
