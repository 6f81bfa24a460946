//! The listener registry a host keeps in a private field.
//!
//! Storage is an ordered list of buckets, one per distinct key, so dispatch
//! visits keys in the order they were first created. The registry itself is
//! created lazily on the first attach; inspection and removal never create
//! it.
//!
//! The lock is only held while copying or editing the bucket list. Dispatch
//! works from a snapshot, which lets handlers attach and detach freely.

use std::fmt;
use std::sync::{OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::Value;

use crate::config;
use crate::key::EventKey;
use crate::listener::{Group, Handler, Listener, ListenerId};

/// Owned copy of a registry: keys in creation order with their listeners.
pub type RegistrySnapshot<H, A> = Vec<(EventKey, Vec<Listener<H, A>>)>;

struct Bucket<H, A> {
    key: EventKey,
    listeners: Vec<Listener<H, A>>,
}

impl<H, A> Bucket<H, A> {
    /// Returns how many listeners were removed.
    fn retain(&mut self, keep: impl Fn(&Listener<H, A>) -> bool) -> usize {
        let before = self.listeners.len();
        self.listeners.retain(|l| keep(l));
        before - self.listeners.len()
    }
}

struct Registry<H, A> {
    property: String,
    buckets: RwLock<Vec<Bucket<H, A>>>,
}

/// Listener registry owned by a host of type `H` whose dispatch arguments
/// are of type `A`.
pub struct Listeners<H, A = Value> {
    registry: OnceLock<Registry<H, A>>,
}

impl<H, A> Listeners<H, A> {
    /// Creates an empty, not yet materialized registry.
    pub const fn new() -> Self {
        Self {
            registry: OnceLock::new(),
        }
    }

    /// Returns true once the first listener has been attached.
    pub fn is_created(&self) -> bool {
        self.registry.get().is_some()
    }

    /// Registry property captured when the registry was created.
    pub fn property(&self) -> Option<&str> {
        self.registry.get().map(|r| r.property.as_str())
    }

    /// Number of listeners across all keys.
    pub fn len(&self) -> usize {
        self.read()
            .map(|buckets| buckets.iter().map(|b| b.listeners.len()).sum())
            .unwrap_or(0)
    }

    /// Returns true if no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies the registry without creating it.
    pub fn snapshot(&self) -> RegistrySnapshot<H, A> {
        self.read()
            .map(|buckets| {
                buckets
                    .iter()
                    .map(|b| (b.key.clone(), b.listeners.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn push(&self, listener: Listener<H, A>) {
        let registry = self.registry.get_or_init(|| {
            let property = config::registry_property();
            tracing::trace!(property = %property, "creating listener registry");
            Registry {
                property,
                buckets: RwLock::new(Vec::new()),
            }
        });
        let mut buckets = registry
            .buckets
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        match buckets.iter_mut().find(|b| b.key == *listener.key()) {
            Some(bucket) => bucket.listeners.push(listener),
            None => buckets.push(Bucket {
                key: listener.key().clone(),
                listeners: vec![listener],
            }),
        }
    }

    /// Listeners whose key matches `event`, in dispatch order.
    pub(crate) fn matching(&self, event: &str) -> Vec<Listener<H, A>> {
        self.read()
            .map(|buckets| {
                buckets
                    .iter()
                    .filter(|b| b.key.matches(event))
                    .flat_map(|b| b.listeners.iter().cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn remove_key(&self, key: &EventKey) -> usize {
        let Some(mut buckets) = self.write() else {
            return 0;
        };
        match buckets.iter().position(|b| b.key == *key) {
            Some(index) => buckets.remove(index).listeners.len(),
            None => 0,
        }
    }

    pub(crate) fn remove_handler(&self, key: &EventKey, handler: &Handler<H, A>) -> usize {
        self.retain_in(key, |l| l.handler() != handler)
    }

    pub(crate) fn remove_group(&self, group: &Group) -> usize {
        let Some(mut buckets) = self.write() else {
            return 0;
        };
        buckets
            .iter_mut()
            .map(|bucket| bucket.retain(|l| !l.in_group(group)))
            .sum()
    }

    pub(crate) fn remove_listener(&self, key: &EventKey, id: ListenerId) -> bool {
        self.retain_in(key, |l| l.id() != id) > 0
    }

    /// Keeps the listeners under `key` that `keep` accepts. The bucket stays
    /// even when emptied so the key keeps its place in dispatch order; only
    /// `remove_key` drops a key.
    fn retain_in(&self, key: &EventKey, keep: impl Fn(&Listener<H, A>) -> bool) -> usize {
        let Some(mut buckets) = self.write() else {
            return 0;
        };
        buckets
            .iter_mut()
            .find(|b| b.key == *key)
            .map(|bucket| bucket.retain(keep))
            .unwrap_or(0)
    }

    fn read(&self) -> Option<RwLockReadGuard<'_, Vec<Bucket<H, A>>>> {
        self.registry
            .get()
            .map(|r| r.buckets.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn write(&self) -> Option<RwLockWriteGuard<'_, Vec<Bucket<H, A>>>> {
        self.registry
            .get()
            .map(|r| r.buckets.write().unwrap_or_else(PoisonError::into_inner))
    }
}

impl<H, A> Default for Listeners<H, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H, A> fmt::Debug for Listeners<H, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("property", &self.property())
            .field("len", &self.len())
            .finish()
    }
}
