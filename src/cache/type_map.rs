//! Type-keyed handler registry with inheritance-aware lookup.
//!
//! # Data Flow
//! ```text
//! lookup(type)
//!   → exact binding for the type?               → all of its values
//!   → nearest base type with eligible bindings? → promote, return
//!   → most-derived interface with bindings?     → promote, return
//!   → name binding matching the type name?      → rebind to the type, retry
//! ```
//!
//! # Design Decisions
//! - Readers never lock: the table is an immutable map behind `ArcSwap`
//! - Writers (registration, promotion, rebind) serialize on a mutex and
//!   publish a whole new map, so a reader sees a promotion fully or not at all
//! - Bindings registered with `exact_match_required` only answer exact
//!   lookups and are never promoted
//! - The base walk stops at the first ancestor with at least one eligible
//!   binding; ancestors whose bindings are all exact-only are skipped

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use crate::model::{RuntimeType, TypeHandle, TypeRef};
use crate::observability::metrics;

/// Key of a binding: a concrete type, or a type name awaiting resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKey {
    Type(TypeHandle),
    Name(String),
}

impl From<&TypeRef> for TypeKey {
    fn from(ty: &TypeRef) -> Self {
        TypeKey::Type(ty.handle())
    }
}

impl From<&RuntimeType> for TypeKey {
    fn from(ty: &RuntimeType) -> Self {
        TypeKey::Type(ty.handle())
    }
}

impl From<&str> for TypeKey {
    fn from(name: &str) -> Self {
        TypeKey::Name(name.to_string())
    }
}

impl From<String> for TypeKey {
    fn from(name: String) -> Self {
        TypeKey::Name(name)
    }
}

#[derive(Clone)]
struct Binding<V> {
    value: V,
    exact_match_required: bool,
}

type Table<V> = HashMap<TypeKey, Vec<Binding<V>>>;

/// Registry mapping types to ordered handler lists, most recent first.
pub struct TypeMap<V> {
    table: ArcSwap<Table<V>>,
    write_lock: Mutex<()>,
}

impl<V: Clone> Default for TypeMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> TypeMap<V> {
    pub fn new() -> Self {
        Self {
            table: ArcSwap::from_pointee(HashMap::new()),
            write_lock: Mutex::new(()),
        }
    }

    /// Bind `value` to `key`, ahead of any earlier bindings for that key.
    pub fn add(&self, key: impl Into<TypeKey>, exact_match_required: bool, value: V) {
        let key = key.into();
        let _guard = self.write_lock.lock();
        let mut table = Table::clone(&self.table.load());
        table.entry(key).or_default().insert(
            0,
            Binding {
                value,
                exact_match_required,
            },
        );
        self.table.store(Arc::new(table));
    }

    /// Values bound to `ty`, following the resolution order above.
    pub fn lookup(&self, ty: &TypeRef) -> Vec<V> {
        let table = self.table.load_full();

        if let Some(found) = Self::resolve(&table, ty) {
            if found.promote {
                self.promote(ty, &found.bindings);
            }
            return found.bindings.into_iter().map(|b| b.value).collect();
        }

        let name_key = TypeKey::Name(ty.name().to_string());
        if table.contains_key(&name_key) && self.rebind(name_key, ty) {
            return self.lookup(ty);
        }

        Vec::new()
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.table.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.load().is_empty()
    }

    fn resolve(table: &Table<V>, ty: &TypeRef) -> Option<Resolved<V>> {
        if let Some(bindings) = table.get(&TypeKey::from(ty)) {
            return Some(Resolved {
                bindings: bindings.clone(),
                promote: false,
            });
        }

        let ancestors = ty.ancestry().into_iter().skip(1);
        let interfaces = ty.most_derived_interfaces().into_iter();

        ancestors.chain(interfaces).find_map(|candidate| {
            let eligible: Vec<Binding<V>> = table
                .get(&TypeKey::from(&candidate))?
                .iter()
                .filter(|b| !b.exact_match_required)
                .cloned()
                .collect();

            (!eligible.is_empty()).then_some(Resolved {
                bindings: eligible,
                promote: true,
            })
        })
    }

    /// Bind the resolved list directly to `ty` so the next lookup is exact.
    fn promote(&self, ty: &TypeRef, bindings: &[Binding<V>]) {
        let key = TypeKey::from(ty);
        let _guard = self.write_lock.lock();
        let current = self.table.load();
        if current.contains_key(&key) {
            return;
        }

        let mut table = Table::clone(&current);
        let promoted = bindings
            .iter()
            .map(|b| Binding {
                value: b.value.clone(),
                exact_match_required: false,
            })
            .collect();
        table.insert(key, promoted);
        self.table.store(Arc::new(table));

        metrics::record_dispatch_promotion();
        tracing::trace!(type_name = %ty.name(), "Promoted dispatch binding");
    }

    /// Move a name binding onto the concrete type that now carries the name.
    fn rebind(&self, name_key: TypeKey, ty: &TypeRef) -> bool {
        let _guard = self.write_lock.lock();
        let mut table = Table::clone(&self.table.load());
        let Some(bindings) = table.remove(&name_key) else {
            // Another thread rebound it first; the retry will find it.
            return table.contains_key(&TypeKey::from(ty));
        };

        table.entry(TypeKey::from(ty)).or_default().extend(bindings);
        self.table.store(Arc::new(table));

        tracing::debug!(type_name = %ty.name(), "Resolved name binding to runtime type");
        true
    }
}

struct Resolved<V> {
    bindings: Vec<Binding<V>>,
    promote: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::well_known;
    use std::sync::Barrier;
    use std::thread;

    struct Hierarchy {
        iface: TypeRef,
        base: TypeRef,
        concrete: TypeRef,
    }

    fn hierarchy() -> Hierarchy {
        let object = &well_known::types().object;
        let iface = RuntimeType::interface("Demo.IShape").build();
        let base = RuntimeType::class("Demo.Shape").base(object).build();
        let concrete = RuntimeType::class("Demo.Circle")
            .base(&base)
            .implements(&iface)
            .build();
        Hierarchy {
            iface,
            base,
            concrete,
        }
    }

    #[test]
    fn exact_lookup_returns_most_recent_first() {
        let h = hierarchy();
        let map = TypeMap::new();
        map.add(&h.concrete, false, "first");
        map.add(&h.concrete, false, "second");

        assert_eq!(map.lookup(&h.concrete), vec!["second", "first"]);
    }

    #[test]
    fn interface_binding_is_promoted_once() {
        let h = hierarchy();
        let map = TypeMap::new();
        map.add(&h.iface, false, "shape-handler");
        assert_eq!(map.len(), 1);

        assert_eq!(map.lookup(&h.concrete), vec!["shape-handler"]);
        assert_eq!(map.len(), 2);

        assert_eq!(map.lookup(&h.concrete), vec!["shape-handler"]);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn base_type_wins_over_interface() {
        let h = hierarchy();
        let map = TypeMap::new();
        map.add(&h.iface, false, "iface");
        map.add(&h.base, false, "base");

        assert_eq!(map.lookup(&h.concrete), vec!["base"]);
    }

    #[test]
    fn exact_only_bindings_are_not_inherited() {
        let h = hierarchy();
        let map = TypeMap::new();
        map.add(&h.base, true, "exact-only");

        assert!(map.lookup(&h.concrete).is_empty());
        assert_eq!(map.lookup(&h.base), vec!["exact-only"]);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn mixed_bindings_promote_only_eligible() {
        let h = hierarchy();
        let map = TypeMap::new();
        map.add(&h.base, false, "inherited");
        map.add(&h.base, true, "exact-only");

        assert_eq!(map.lookup(&h.concrete), vec!["inherited"]);
        assert_eq!(map.lookup(&h.base), vec!["exact-only", "inherited"]);
    }

    #[test]
    fn name_binding_resolves_to_runtime_type() {
        let h = hierarchy();
        let map = TypeMap::new();
        map.add("Demo.Circle", false, "by-name");

        assert_eq!(map.lookup(&h.concrete), vec!["by-name"]);
        assert_eq!(map.len(), 1);
        assert_eq!(map.lookup(&h.concrete), vec!["by-name"]);
    }

    #[test]
    fn concurrent_lookups_promote_exactly_once() {
        let h = hierarchy();
        let map = Arc::new(TypeMap::new());
        map.add(&h.iface, false, "shape-handler");
        map.add(&h.iface, false, "fallback");

        let start = Arc::new(Barrier::new(8));
        let workers: Vec<_> = (0..8)
            .map(|_| {
                let map = Arc::clone(&map);
                let start = Arc::clone(&start);
                let concrete = h.concrete.clone();
                thread::spawn(move || {
                    start.wait();
                    (0..64).map(|_| map.lookup(&concrete)).collect::<Vec<_>>()
                })
            })
            .collect();

        for worker in workers {
            for found in worker.join().expect("worker") {
                assert_eq!(found, vec!["fallback", "shape-handler"]);
            }
        }
        assert_eq!(map.len(), 2);
        assert_eq!(map.lookup(&h.iface), vec!["fallback", "shape-handler"]);
    }

    #[test]
    fn unknown_types_resolve_to_nothing() {
        let h = hierarchy();
        let map: TypeMap<&str> = TypeMap::new();
        assert!(map.lookup(&h.concrete).is_empty());
        assert!(map.is_empty());
    }
}
