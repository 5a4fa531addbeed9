// src/proxy/mod.rs

//! Host-header reverse proxy.
//!
//! Requests whose `Host` matches a project's `proxy.fromHost` are forwarded
//! to `localhost:<toPort>`; everything else is left to the gateway (for
//! WebSocket upgrades) or answered with 404.

pub mod forward;

use std::collections::HashMap;

use crate::config::Project;

pub use forward::{Forwarder, forward_upgrade};

/// `fromHost` → local port.
#[derive(Debug, Clone, Default)]
pub struct ProxyTable {
    routes: HashMap<String, u16>,
}

impl ProxyTable {
    /// Empty table; every lookup misses.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn from_projects<'a>(projects: impl IntoIterator<Item = &'a Project>) -> Self {
        let routes = projects
            .into_iter()
            .filter_map(|p| p.proxy.as_ref())
            .map(|rule| (rule.from_host.clone(), rule.to_port))
            .collect();
        Self { routes }
    }

    /// Exact match on the raw `Host` header value, port included.
    pub fn lookup(&self, host: Option<&str>) -> Option<u16> {
        host.and_then(|h| self.routes.get(h)).copied()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u16)> {
        self.routes.iter().map(|(host, port)| (host.as_str(), *port))
    }
}
