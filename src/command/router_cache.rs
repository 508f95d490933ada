use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::debug;

use crate::store::split_namespace;
use crate::store::ShardedCollection;
use crate::store::ShardingCatalog;

use super::FlushSelector;

/// What a `flushRouterConfig` call invalidates. Every selector form the
/// command accepts normalizes to one of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushScope {
    Full,
    Database(String),
    Namespace(String),
}

impl FlushScope {
    pub fn from_selector(selector: &FlushSelector) -> Self {
        match selector {
            FlushSelector::None | FlushSelector::Flag(_) => FlushScope::Full,
            FlushSelector::Scope(s) if s.contains('.') => FlushScope::Namespace(s.clone()),
            FlushSelector::Scope(s) => FlushScope::Database(s.clone()),
        }
    }
}

/// One routing-table snapshot, tagged with the catalog epoch it was built
/// from.
#[derive(Debug, Default)]
pub(crate) struct RoutingSnapshot {
    epoch: u64,
    routes: HashMap<String, ShardedCollection>,
}

/// Per-router cache of the config server's routing table.
///
/// Lookups go through the last snapshot; the snapshot is rebuilt when its
/// epoch trails the catalog or when a flush marked it stale. Marking stale
/// never blocks the flush caller on a rebuild.
#[derive(Debug)]
pub(crate) struct RouterCache {
    snapshot: ArcSwap<RoutingSnapshot>,
    stale: AtomicBool,
}

impl RouterCache {
    pub(crate) fn new() -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(RoutingSnapshot::default()),
            stale: AtomicBool::new(false),
        }
    }

    /// Routing entry for `namespace`, refreshing from the catalog first when
    /// the snapshot is stale. `None` means the namespace is unsharded.
    pub(crate) fn resolve(
        &self,
        catalog: &ShardingCatalog,
        namespace: &str,
    ) -> Option<ShardedCollection> {
        self.refresh_if_stale(catalog);
        self.snapshot.load().routes.get(namespace).cloned()
    }

    fn refresh_if_stale(
        &self,
        catalog: &ShardingCatalog,
    ) {
        let epoch = catalog.epoch();
        if !self.stale.swap(false, Ordering::AcqRel) && self.snapshot.load().epoch == epoch {
            return;
        }
        let routes = catalog.routing_snapshot().into_iter().collect();
        self.snapshot.store(Arc::new(RoutingSnapshot { epoch, routes }));
        debug!("router cache rebuilt at epoch {}", epoch);
    }

    /// Drops cached routing entries per `scope` and forces a rebuild on the
    /// next lookup.
    pub(crate) fn invalidate(
        &self,
        scope: &FlushScope,
    ) {
        let current = self.snapshot.load();
        let routes: HashMap<String, ShardedCollection> = match scope {
            FlushScope::Full => HashMap::new(),
            FlushScope::Database(db) => current
                .routes
                .iter()
                .filter(|(ns, _)| split_namespace(ns).0 != db)
                .map(|(ns, route)| (ns.clone(), route.clone()))
                .collect(),
            FlushScope::Namespace(target) => current
                .routes
                .iter()
                .filter(|(ns, _)| *ns != target)
                .map(|(ns, route)| (ns.clone(), route.clone()))
                .collect(),
        };
        self.snapshot.store(Arc::new(RoutingSnapshot {
            epoch: current.epoch,
            routes,
        }));
        self.stale.store(true, Ordering::Release);
    }

    #[cfg(test)]
    pub(crate) fn cached_route_count(&self) -> usize {
        self.snapshot.load().routes.len()
    }
}
