//! Deep-link parsing and resolution.
//!
//! Wire format: `<scheme>://route<path>?<k1>=<v1>&<k2>=<v2>`. The scheme and
//! authority are ignored; a literal `route` authority prefix is stripped and
//! the rest of the string up to `?` is the router path, verbatim.

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};
use url::form_urlencoded;

use crate::error::{NotificationError, Result};
use crate::router::Router;
use crate::types::{DestinationRef, LaunchableTarget};

/// Authority prefix that marks an in-app route
const ROUTE_AUTHORITY: &str = "route";

/// A parsed deep link
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeepLink {
    pub path: String,
    /// Query parameters in order of first appearance; a repeated key keeps
    /// its first position and its last value.
    pub params: IndexMap<String, String>,
}

impl DeepLink {
    pub fn parse(link: &str) -> Result<Self> {
        if link.is_empty() {
            return Ok(Self::default());
        }
        if let Some(c) = link.chars().find(|c| c.is_whitespace() || c.is_control()) {
            return Err(NotificationError::malformed(format!(
                "unexpected character {c:?} in {link:?}"
            )));
        }

        // Fragments never reach the router
        let link = link.split_once('#').map_or(link, |(head, _)| head);

        let after_scheme = if let Some(rest) = link.strip_prefix("//") {
            Some(rest)
        } else if let Some((scheme, rest)) = link.split_once("://")
            && !scheme.contains(['/', '?'])
        {
            validate_scheme(scheme, link)?;
            Some(rest)
        } else {
            None
        };

        let path_and_query = match after_scheme {
            Some(rest) => match rest.strip_prefix(ROUTE_AUTHORITY) {
                Some(routed) => routed,
                None => rest
                    .find(['/', '?'])
                    .map_or("", |authority_end| &rest[authority_end..]),
            },
            None => link,
        };

        let (path, query) = path_and_query
            .split_once('?')
            .unwrap_or((path_and_query, ""));

        let mut params = IndexMap::new();
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            if key.is_empty() {
                return Err(NotificationError::malformed(format!(
                    "empty query parameter name in {link:?}"
                )));
            }
            params.insert(key.into_owned(), value.into_owned());
        }

        Ok(Self {
            path: path.to_string(),
            params,
        })
    }
}

fn validate_scheme(scheme: &str, link: &str) -> Result<()> {
    let mut chars = scheme.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    if valid {
        Ok(())
    } else {
        Err(NotificationError::malformed(format!(
            "invalid scheme {scheme:?} in {link:?}"
        )))
    }
}

/// Turns links into destinations and launchable targets.
///
/// Every call goes to the router; nothing is cached, so routes registered or
/// removed at runtime are honored immediately.
#[derive(Clone)]
pub struct LinkResolver {
    router: Arc<dyn Router>,
}

impl LinkResolver {
    pub fn new(router: Arc<dyn Router>) -> Self {
        Self { router }
    }

    pub fn parse(link: &str) -> Result<DeepLink> {
        DeepLink::parse(link)
    }

    pub fn resolve_destination(&self, path: &str) -> Result<DestinationRef> {
        if path.is_empty() {
            return Err(NotificationError::NoRouteFound(String::new()));
        }
        self.router
            .resolve(path)
            .ok_or_else(|| NotificationError::NoRouteFound(path.to_string()))
    }

    /// Launch target for a notification click action.
    ///
    /// Returns `None` when the link is malformed or its path has no screen
    /// destination; the notification is then sent without a click action.
    pub fn build_launch_target(&self, link: &str, request_code: i32) -> Option<LaunchableTarget> {
        match self.target_for(link, request_code) {
            Ok(target) => Some(target),
            Err(e) if e.is_routing() => {
                warn!(link = %link, error = %e, "Link has no launch target");
                None
            }
            Err(e) => {
                error!(link = %link, error = %e, "Failed to build launch target");
                None
            }
        }
    }

    /// Click-time routing: resolve a link into the target to navigate to.
    pub fn open(&self, link: &str) -> Result<LaunchableTarget> {
        let target = self.target_for(link, 0)?;
        debug!(
            link = %link,
            destination = %target.destination.name,
            params = target.params.len(),
            "Link opened"
        );
        Ok(target)
    }

    /// Whether `current` is the destination `path` routes to.
    pub fn is_destination_for(&self, current: &DestinationRef, path: &str) -> bool {
        self.resolve_destination(path)
            .map(|destination| destination.is_launchable() && &destination == current)
            .unwrap_or(false)
    }

    fn target_for(&self, link: &str, request_code: i32) -> Result<LaunchableTarget> {
        let deep_link = DeepLink::parse(link)?;
        let destination = self.resolve_destination(&deep_link.path)?;
        if !destination.is_launchable() {
            return Err(NotificationError::NoRouteFound(format!(
                "{} (not a screen)",
                deep_link.path
            )));
        }
        Ok(self
            .router
            .build_launchable(&destination, &deep_link.params, request_code))
    }
}
