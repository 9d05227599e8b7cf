//! View-hierarchy capture.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::model::{ErrorValue, Value};

/// Produces the root of a host view hierarchy as an inspectable value.
pub trait ViewHierarchyProvider: Send + Sync {
    /// Hierarchy kinds this provider can capture.
    fn hierarchy_kinds(&self) -> Vec<String>;

    /// Capture one hierarchy. `Ok(None)` means the kind is unknown.
    fn capture(&self, hierarchy_kind: &str) -> Result<Option<Value>, ErrorValue>;
}

/// Provider backed by a fixed set of root values.
#[derive(Default)]
pub struct StaticViewHierarchy {
    roots: RwLock<BTreeMap<String, Value>>,
}

impl StaticViewHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(self, kind: impl Into<String>, root: impl Into<Value>) -> Self {
        self.roots.write().insert(kind.into(), root.into());
        self
    }
}

impl ViewHierarchyProvider for StaticViewHierarchy {
    fn hierarchy_kinds(&self) -> Vec<String> {
        self.roots.read().keys().cloned().collect()
    }

    fn capture(&self, hierarchy_kind: &str) -> Result<Option<Value>, ErrorValue> {
        Ok(self.roots.read().get(hierarchy_kind).cloned())
    }
}
