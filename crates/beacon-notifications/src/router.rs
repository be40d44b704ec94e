//! Route table used by the link resolver.
//!
//! Destinations are injected through the [`Router`] trait at composition
//! time; [`RouteTable`] is the in-process implementation and can gain or lose
//! routes while the application runs.

use dashmap::DashMap;
use indexmap::IndexMap;
use tracing::debug;

use crate::error::{NotificationError, Result};
use crate::types::{DestinationRef, LaunchableTarget};

/// Maps opaque path strings to destinations
pub trait Router: Send + Sync {
    /// Look up a path. Must reflect the current table, never a cached view.
    fn resolve(&self, path: &str) -> Option<DestinationRef>;

    /// Produce a launchable target for a resolved destination
    fn build_launchable(
        &self,
        destination: &DestinationRef,
        params: &IndexMap<String, String>,
        request_code: i32,
    ) -> LaunchableTarget {
        LaunchableTarget {
            destination: destination.clone(),
            params: params.clone(),
            request_code,
        }
    }
}

/// Concurrent path → destination table
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: DashMap<String, DestinationRef>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from `(path, destination)` pairs.
    pub fn from_routes<I, P>(routes: I) -> Result<Self>
    where
        I: IntoIterator<Item = (P, DestinationRef)>,
        P: Into<String>,
    {
        let table = Self::new();
        for (path, destination) in routes {
            table.register(path, destination)?;
        }
        Ok(table)
    }

    /// Register (or replace) a route. Returns the destination it replaced.
    pub fn register(
        &self,
        path: impl Into<String>,
        destination: DestinationRef,
    ) -> Result<Option<DestinationRef>> {
        let path = path.into();
        if path.trim().is_empty() {
            return Err(NotificationError::InvalidConfig(
                "route path must not be empty".into(),
            ));
        }
        debug!(path = %path, destination = %destination.name, "Route registered");
        Ok(self.routes.insert(path, destination))
    }

    pub fn unregister(&self, path: &str) -> Option<DestinationRef> {
        let removed = self.routes.remove(path).map(|(_, destination)| destination);
        if removed.is_some() {
            debug!(path = %path, "Route unregistered");
        }
        removed
    }

    /// Snapshot of all routes, sorted by path
    pub fn routes(&self) -> Vec<(String, DestinationRef)> {
        let mut routes: Vec<_> = self
            .routes
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        routes.sort_by(|a, b| a.0.cmp(&b.0));
        routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl Router for RouteTable {
    fn resolve(&self, path: &str) -> Option<DestinationRef> {
        self.routes.get(path).map(|entry| entry.value().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DestinationKind;

    #[test]
    fn test_register_and_resolve() {
        let table = RouteTable::new();
        table
            .register("/app/second", DestinationRef::screen("SecondScreen"))
            .unwrap();

        let destination = table.resolve("/app/second").unwrap();
        assert_eq!(destination.name, "SecondScreen");
        assert_eq!(destination.kind, DestinationKind::Screen);
        assert!(table.resolve("/app/third").is_none());
    }

    #[test]
    fn test_unregister_is_visible_immediately() {
        let table = RouteTable::from_routes([
            ("/app/main", DestinationRef::screen("MainScreen")),
            ("/app/second", DestinationRef::screen("SecondScreen")),
        ])
        .unwrap();

        assert_eq!(table.len(), 2);
        assert!(table.unregister("/app/second").is_some());
        assert!(table.resolve("/app/second").is_none());
        assert!(table.unregister("/app/second").is_none());
    }

    #[test]
    fn test_register_replaces_existing() {
        let table = RouteTable::new();
        table
            .register("/app/second", DestinationRef::screen("Old"))
            .unwrap();
        let previous = table
            .register("/app/second", DestinationRef::screen("New"))
            .unwrap();

        assert_eq!(previous.unwrap().name, "Old");
        assert_eq!(table.resolve("/app/second").unwrap().name, "New");
    }

    #[test]
    fn test_empty_path_rejected() {
        let table = RouteTable::new();
        let result = table.register("  ", DestinationRef::screen("Nowhere"));
        assert!(matches!(result, Err(NotificationError::InvalidConfig(_))));
        assert!(table.is_empty());
    }

    #[test]
    fn test_routes_sorted() {
        let table = RouteTable::from_routes([
            ("/b", DestinationRef::screen("B")),
            ("/a", DestinationRef::service("A")),
        ])
        .unwrap();

        let paths: Vec<_> = table.routes().into_iter().map(|(path, _)| path).collect();
        assert_eq!(paths, vec!["/a", "/b"]);
    }
}
