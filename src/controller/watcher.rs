//! # Dependency Watcher
//!
//! Tracks which `SchemaMigration` resources depend on objects the controller
//! does not own (Secrets, ConfigMaps), so a change to one of those objects can
//! be turned into re-evaluation requests for every dependent.
//!
//! The forward index (dependent -> externals) is the source of truth. The
//! reverse index (external -> dependents) is updated in the same critical
//! section, so a reader never observes one without the other.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Namespaced object identity used on both sides of the index
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceKey {
    pub namespace: String,
    pub name: String,
}

impl ResourceKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[derive(Debug)]
struct Index<K> {
    forward: BTreeMap<K, BTreeSet<K>>,
    reverse: BTreeMap<K, BTreeSet<K>>,
}

impl<K: Ord + Clone> Index<K> {
    fn link(&mut self, external: &K, dependent: &K) {
        self.forward
            .entry(dependent.clone())
            .or_default()
            .insert(external.clone());
        self.reverse
            .entry(external.clone())
            .or_default()
            .insert(dependent.clone());
    }

    fn unlink(&mut self, external: &K, dependent: &K) {
        if let Some(dependents) = self.reverse.get_mut(external) {
            dependents.remove(dependent);
            if dependents.is_empty() {
                self.reverse.remove(external);
            }
        }
    }
}

/// Concurrent reverse index from external objects to their dependents
///
/// Cheap to share behind an `Arc`. All operations take a single short-lived
/// lock and never block on I/O.
#[derive(Debug)]
pub struct DependencyWatcher<K> {
    index: Mutex<Index<K>>,
}

impl<K: Ord + Clone> Default for DependencyWatcher<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + Clone> DependencyWatcher<K> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            index: Mutex::new(Index {
                forward: BTreeMap::new(),
                reverse: BTreeMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Index<K>> {
        // The index is consistent after every statement that mutates it.
        self.index.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record that `dependent` depends on `external`. Re-adding an edge is a no-op.
    pub fn watch(&self, external: &K, dependent: &K) {
        self.lock().link(external, dependent);
    }

    /// Replace the complete set of externals `dependent` depends on
    ///
    /// Edges missing from `externals` are removed, so an object dropped from
    /// the resource no longer triggers it.
    pub fn set_dependencies<I>(&self, dependent: &K, externals: I)
    where
        I: IntoIterator<Item = K>,
    {
        let next: BTreeSet<K> = externals.into_iter().collect();
        let mut index = self.lock();

        let previous = index.forward.remove(dependent).unwrap_or_default();
        for stale in previous.difference(&next) {
            index.unlink(stale, dependent);
        }
        for external in &next {
            index.link(external, dependent);
        }
    }

    /// Dependents of `external`. Unknown externals yield an empty set.
    pub fn on_external_change(&self, external: &K) -> BTreeSet<K> {
        self.lock()
            .reverse
            .get(external)
            .cloned()
            .unwrap_or_default()
    }

    /// Drop every edge of a dependent that no longer exists
    pub fn forget(&self, dependent: &K) {
        self.set_dependencies(dependent, std::iter::empty());
    }

    /// Number of dependents with at least one edge
    pub fn dependents_count(&self) -> usize {
        self.lock().forward.len()
    }

    /// Total number of edges
    pub fn edge_count(&self) -> usize {
        self.lock().forward.values().map(BTreeSet::len).sum()
    }
}
