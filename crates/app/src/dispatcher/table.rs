//! Immutable route table snapshot.
//!
//! A table is never mutated once published; writers clone it, edit the copy
//! and swap it in whole.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use council_domain::automation::{Automation, HttpMethod, PathTemplate, normalize_path};
use serde::Serialize;

use crate::ports::{BackendStatus, RecordRepository};
use crate::resolver::BoundHandler;

/// `(method, full normalized path)` of one live route.
pub type RouteKey = (HttpMethod, String);

/// One live route.
#[derive(Debug)]
pub struct RouteRecord {
    pub method: HttpMethod,
    pub path: String,
    pub template: PathTemplate,
    pub handler: BoundHandler,
    pub storage: BackendStatus,
    /// Served by the dispatcher itself rather than declared by the automation.
    pub builtin: bool,
}

impl RouteRecord {
    #[must_use]
    pub fn key(&self) -> RouteKey {
        (self.method, self.path.clone())
    }

    #[must_use]
    pub fn owner(&self) -> &str {
        &self.handler.automation().name
    }
}

/// Diagnostic view of a live route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteInfo {
    pub method: HttpMethod,
    pub path: String,
    pub automation: String,
    pub handler: String,
    pub storage: BackendStatus,
    pub builtin: bool,
}

/// What the table remembers about a registered automation.
#[derive(Clone)]
pub(crate) struct Registration {
    pub(crate) automation: Arc<Automation>,
    pub(crate) records: Arc<dyn RecordRepository>,
    pub(crate) keys: BTreeSet<RouteKey>,
}

#[derive(Clone, Default)]
pub struct RouteTable {
    routes: HashMap<RouteKey, Arc<RouteRecord>>,
    templates: Vec<Arc<RouteRecord>>,
    registrations: HashMap<String, Registration>,
}

impl RouteTable {
    /// Find the route serving `method path`: exact literal match first, then
    /// the template with the most literal segments.
    #[must_use]
    pub fn lookup(
        &self,
        method: HttpMethod,
        path: &str,
    ) -> Option<(Arc<RouteRecord>, BTreeMap<String, String>)> {
        let normalized = normalize_path(path);
        if let Some(route) = self.routes.get(&(method, normalized.clone()))
            && route.template.is_literal()
        {
            return Some((Arc::clone(route), BTreeMap::new()));
        }
        self.templates
            .iter()
            .filter(|route| route.method == method)
            .find_map(|route| {
                route
                    .template
                    .matches(&normalized)
                    .map(|captured| (Arc::clone(route), captured))
            })
    }

    #[must_use]
    pub fn get(&self, key: &RouteKey) -> Option<&Arc<RouteRecord>> {
        self.routes.get(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    #[must_use]
    pub fn is_registered(&self, name: &str) -> bool {
        self.registrations.contains_key(name)
    }

    pub(crate) fn registration(&self, name: &str) -> Option<&Registration> {
        self.registrations.get(name)
    }

    pub(crate) fn registration_mut(&mut self, name: &str) -> Option<&mut Registration> {
        self.registrations.get_mut(name)
    }

    pub(crate) fn set_registration(&mut self, name: &str, registration: Registration) {
        self.registrations.insert(name.to_string(), registration);
    }

    /// Insert or replace a route. The caller checks ownership beforehand.
    pub(crate) fn insert(&mut self, route: RouteRecord) {
        let key = route.key();
        if let Some(registration) = self.registrations.get_mut(route.owner()) {
            registration.keys.insert(key.clone());
        }
        self.routes.insert(key, Arc::new(route));
    }

    pub(crate) fn remove_route(&mut self, key: &RouteKey) -> Option<Arc<RouteRecord>> {
        let removed = self.routes.remove(key)?;
        if let Some(registration) = self.registrations.get_mut(removed.owner()) {
            registration.keys.remove(key);
        }
        Some(removed)
    }

    /// Remove a route only when `owner` serves it.
    pub(crate) fn remove_owned(&mut self, key: &RouteKey, owner: &str) -> Option<Arc<RouteRecord>> {
        if self.routes.get(key)?.owner() != owner {
            return None;
        }
        self.remove_route(key)
    }

    /// Drop every route of `name` and forget the registration.
    pub(crate) fn remove_automation(&mut self, name: &str) -> Option<usize> {
        let registration = self.registrations.remove(name)?;
        let mut removed = 0;
        for key in &registration.keys {
            if self.routes.remove(key).is_some() {
                removed += 1;
            }
        }
        Some(removed)
    }

    /// Rebuild the template index. Call once after a batch of edits.
    pub(crate) fn reindex(&mut self) {
        let mut templates: Vec<_> = self
            .routes
            .values()
            .filter(|route| !route.template.is_literal())
            .cloned()
            .collect();
        templates.sort_by(|a, b| {
            b.template
                .literal_segments()
                .cmp(&a.template.literal_segments())
                .then_with(|| a.path.cmp(&b.path))
        });
        self.templates = templates;
    }

    /// Every live route sorted by path then method.
    #[must_use]
    pub fn routes(&self) -> Vec<RouteInfo> {
        let mut routes: Vec<_> = self
            .routes
            .values()
            .map(|route| RouteInfo {
                method: route.method,
                path: route.path.clone(),
                automation: route.owner().to_string(),
                handler: route.handler.name().to_string(),
                storage: route.storage,
                builtin: route.builtin,
            })
            .collect();
        routes.sort_by(|a, b| a.path.cmp(&b.path).then(a.method.cmp(&b.method)));
        routes
    }
}
