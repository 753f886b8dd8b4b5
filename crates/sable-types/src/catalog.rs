//! Global name resolution against a catalog.

use std::cell::RefCell;
use std::collections::HashMap;

use sable_plan::IdentPart;
use tracing::trace;

use crate::types::StaticType;

/// Per-query context: where unqualified global names are looked up first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub namespace: Vec<String>,
}

impl Session {
    pub fn new<I, S>(namespace: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            namespace: namespace.into_iter().map(Into::into).collect(),
        }
    }
}

/// A catalog object matched by a path.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    /// Fully qualified name of the object.
    pub name: Vec<String>,
    pub ty: StaticType,
    /// How many leading path parts named the object; the rest navigate into it.
    pub matched: usize,
}

/// Source of global variable types.
pub trait Catalog {
    fn lookup(&self, path: &[IdentPart], session: &Session) -> Option<CatalogEntry>;
}

/// A catalog held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    objects: Vec<(Vec<String>, StaticType)>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an object under a dotted name such as `"db.public.users"`.
    pub fn with(mut self, name: &str, ty: StaticType) -> Self {
        self.define(name.split('.').map(str::to_string).collect(), ty);
        self
    }

    pub fn define(&mut self, name: Vec<String>, ty: StaticType) {
        self.objects.push((name, ty));
    }

    /// Longest object name matched by a prefix of `path`, after `prefix`.
    fn longest_match(&self, prefix: &[String], path: &[IdentPart]) -> Option<CatalogEntry> {
        let mut best: Option<CatalogEntry> = None;
        for (name, ty) in &self.objects {
            let Some(rest) = name.strip_prefix(prefix) else {
                continue;
            };
            if rest.is_empty() || rest.len() > path.len() {
                continue;
            }
            let matches = rest.iter().zip(path).all(|(n, part)| part.matches(n));
            let longer = best.as_ref().map_or(true, |b| rest.len() > b.matched);
            if matches && longer {
                best = Some(CatalogEntry {
                    name: name.clone(),
                    ty: ty.clone(),
                    matched: rest.len(),
                });
            }
        }
        best
    }
}

impl Catalog for MemoryCatalog {
    fn lookup(&self, path: &[IdentPart], session: &Session) -> Option<CatalogEntry> {
        if !session.namespace.is_empty() {
            if let Some(entry) = self.longest_match(&session.namespace, path) {
                return Some(entry);
            }
        }
        self.longest_match(&[], path)
    }
}

/// Memoizes catalog lookups for one compilation.
pub struct CatalogCache<'a> {
    catalog: &'a dyn Catalog,
    session: &'a Session,
    entries: RefCell<HashMap<Vec<String>, Option<CatalogEntry>>>,
}

impl<'a> CatalogCache<'a> {
    pub fn new(catalog: &'a dyn Catalog, session: &'a Session) -> Self {
        Self {
            catalog,
            session,
            entries: RefCell::new(HashMap::new()),
        }
    }

    pub fn lookup(&self, path: &[IdentPart]) -> Option<CatalogEntry> {
        let key: Vec<String> = path.iter().map(IdentPart::normalized).collect();
        if let Some(hit) = self.entries.borrow().get(&key) {
            return hit.clone();
        }
        let entry = self.catalog.lookup(path, self.session);
        trace!(path = ?key, found = entry.is_some(), "catalog lookup");
        self.entries.borrow_mut().insert(key, entry.clone());
        entry
    }
}
