//! Primary interface resolution

use crate::error::NetworkError;
use crate::netops::{Namespace, Route, DEFAULT_DESTINATION};
use crate::network::inventory_error;
use tracing::{debug, info};

/// Pick the effective default route: the lowest priority wins, and on equal
/// priority the route listed first wins.
pub fn select_default_route(routes: &[Route]) -> Option<&Route> {
    let mut best: Option<&Route> = None;
    for route in routes {
        if !route.is_default() || route.device.is_empty() {
            continue;
        }
        debug!(route = %route, "Default route found");
        if best.map_or(true, |b| route.priority < b.priority) {
            best = Some(route);
        }
    }
    best
}

/// Name of the interface carrying the namespace's effective default route
pub async fn resolve_primary<N: Namespace>(namespace: &N) -> Result<String, NetworkError> {
    let routes = namespace
        .routes(Some(DEFAULT_DESTINATION))
        .await
        .map_err(inventory_error(namespace, "list default routes"))?;

    let route = select_default_route(&routes).ok_or_else(|| NetworkError::NoDefaultRoute {
        namespace: namespace.path().display().to_string(),
    })?;

    info!(
        namespace = %namespace.path().display(),
        interface = %route.device,
        "Primary interface resolved"
    );
    Ok(route.device.clone())
}
