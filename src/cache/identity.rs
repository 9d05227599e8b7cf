//! Bidirectional object ⇄ handle mapping.
//!
//! Handles are what clients use to refer back to live objects and proxies.
//! Identity is the allocation address of the shared reference, and the cache
//! keeps a strong reference to everything it hands out, so an address can
//! never be reused while its handle is live.
//!
//! Handles are valid for one generation: `clear` starts a new generation and
//! restarts numbering at 1. Clients must drop every handle they hold when
//! they reset the agent.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use serde::{Deserialize, Serialize};

use crate::interactive::ProxyRef;
use crate::model::ObjectRef;
use crate::observability::metrics;

/// Client-facing reference to a cached object or proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Handle(i64);

impl Handle {
    /// Sentinel used before a handle is allocated.
    pub const NONE: Handle = Handle(0);

    pub fn new(raw: i64) -> Self {
        Self(raw)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }

    pub fn is_none(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Anything the cache can hand out a handle for.
#[derive(Clone)]
pub enum Cached {
    Object(ObjectRef),
    Proxy(ProxyRef),
}

impl Cached {
    fn address(&self) -> usize {
        match self {
            Cached::Object(obj) => Arc::as_ptr(obj) as *const () as usize,
            Cached::Proxy(proxy) => proxy.address(),
        }
    }
}

impl fmt::Debug for Cached {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cached::Object(obj) => write!(f, "Object({})", obj.runtime_type().name()),
            Cached::Proxy(proxy) => write!(f, "Proxy({proxy:?})"),
        }
    }
}

#[derive(Default)]
struct Entries {
    by_address: HashMap<usize, Handle>,
    by_handle: HashMap<Handle, Cached>,
    last_handle: i64,
    generation: u64,
}

/// Thread-safe identity cache.
#[derive(Default)]
pub struct IdentityCache {
    entries: RwLock<Entries>,
}

impl IdentityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the handle for `item`, allocating the next one on first sight.
    pub fn get_handle(&self, item: &Cached) -> Handle {
        let address = item.address();

        if let Some(handle) = self.entries.read().by_address.get(&address) {
            return *handle;
        }

        let entries = self.entries.upgradable_read();
        if let Some(handle) = entries.by_address.get(&address) {
            return *handle;
        }

        let mut entries = RwLockUpgradableReadGuard::upgrade(entries);
        entries.last_handle += 1;
        let handle = Handle(entries.last_handle);
        entries.by_address.insert(address, handle);
        entries.by_handle.insert(handle, item.clone());
        metrics::record_identity_cache_size(entries.by_handle.len());

        tracing::trace!(handle = %handle, item = ?item, "Allocated handle");
        handle
    }

    pub fn handle_for_object(&self, obj: &ObjectRef) -> Handle {
        self.get_handle(&Cached::Object(Arc::clone(obj)))
    }

    pub fn handle_for_proxy(&self, proxy: &ProxyRef) -> Handle {
        self.get_handle(&Cached::Proxy(proxy.clone()))
    }

    /// Resolve a handle from the current generation.
    pub fn get(&self, handle: Handle) -> Option<Cached> {
        self.entries.read().by_handle.get(&handle).cloned()
    }

    pub fn get_object(&self, handle: Handle) -> Option<ObjectRef> {
        match self.get(handle)? {
            Cached::Object(obj) => Some(obj),
            Cached::Proxy(_) => None,
        }
    }

    pub fn get_proxy(&self, handle: Handle) -> Option<ProxyRef> {
        match self.get(handle)? {
            Cached::Proxy(proxy) => Some(proxy),
            Cached::Object(_) => None,
        }
    }

    /// Every proxy with a live handle.
    pub fn proxies(&self) -> Vec<ProxyRef> {
        self.entries
            .read()
            .by_handle
            .values()
            .filter_map(|item| match item {
                Cached::Proxy(proxy) => Some(proxy.clone()),
                Cached::Object(_) => None,
            })
            .collect()
    }

    /// Drop every entry and start a new handle generation.
    pub fn clear(&self) {
        let mut entries = self.entries.write();
        let dropped = entries.by_handle.len();
        entries.by_address.clear();
        entries.by_handle.clear();
        entries.last_handle = 0;
        entries.generation += 1;
        metrics::record_identity_cache_size(0);

        tracing::debug!(dropped, generation = entries.generation, "Identity cache cleared");
    }

    pub fn generation(&self) -> u64 {
        self.entries.read().generation
    }

    pub fn len(&self) -> usize {
        self.entries.read().by_handle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
